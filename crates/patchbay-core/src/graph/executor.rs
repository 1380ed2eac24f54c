//! Schedule execution for one sample type.
//!
//! An [`Executor`] instantiates a [`CompiledSchedule`] for `f32` or `f64`: it
//! owns the scratch pools sized for the schedule, one delay line per
//! compensation step, and a staging buffer per node. Running a block performs
//! no allocation.
//!
//! Nodes see their channels through a staging buffer. A node running in the
//! executor's precision has its output slots swapped into the staging buffer
//! and back, so only its read-only inputs are copied. A node whose native
//! precision differs from the executor's gets a staging buffer of its own
//! type, and every channel is converted on the way in and outputs on the way
//! out.

use std::sync::Arc;

use super::buffer::{ChannelPool, DelayLine};
use super::node::Node;
use super::schedule::{CompiledSchedule, ProcessStep};
use super::states::PrepareSettings;
use crate::audio_buffer::AudioBuffer;
use crate::midi::MidiBuffer;
use crate::processor::{IoKind, Processor, Transport};
use crate::sample::{Precision, Sample, convert_into};

/// Sample types a processor can run natively.
pub trait NativeSample: Sample {
    /// Runs `processor` on `audio` in this precision.
    fn call(
        processor: &mut dyn Processor,
        audio: &mut AudioBuffer<'_, Self>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
        bypassed: bool,
    );
}

impl NativeSample for f32 {
    #[inline]
    fn call(
        processor: &mut dyn Processor,
        audio: &mut AudioBuffer<'_, Self>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
        bypassed: bool,
    ) {
        if bypassed {
            processor.process_bypassed(audio, midi, transport);
        } else {
            processor.process(audio, midi, transport);
        }
    }
}

impl NativeSample for f64 {
    #[inline]
    fn call(
        processor: &mut dyn Processor,
        audio: &mut AudioBuffer<'_, Self>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
        bypassed: bool,
    ) {
        if bypassed {
            processor.process_bypassed_f64(audio, midi, transport);
        } else {
            processor.process_f64(audio, midi, transport);
        }
    }
}

enum Staging<T> {
    Native(Vec<Vec<T>>),
    Single(Vec<Vec<f32>>),
    Double(Vec<Vec<f64>>),
}

impl<T: Sample> Staging<T> {
    fn new(precision: Precision, channels: usize, block_size: usize) -> Self {
        if precision == T::PRECISION {
            Self::Native(vec![vec![T::ZERO; block_size]; channels])
        } else if precision == Precision::Double {
            Self::Double(vec![vec![0.0; block_size]; channels])
        } else {
            Self::Single(vec![vec![0.0; block_size]; channels])
        }
    }
}

struct ProcessOp<T> {
    node: Arc<Node>,
    channels: Vec<usize>,
    outputs: usize,
    events: usize,
    staging: Staging<T>,
}

enum Op<T> {
    Clear(usize),
    Copy { source: usize, dest: usize },
    Add { source: usize, dest: usize },
    Delay { buffer: usize, line: DelayLine<T> },
    ClearEvents(usize),
    CopyEvents { source: usize, dest: usize },
    AddEvents { source: usize, dest: usize },
    Process(ProcessOp<T>),
}

/// Host-side data for the block being rendered.
struct HostIo<'a, T> {
    input: &'a AudioBuffer<'a, T>,
    midi_in: &'a MidiBuffer,
    output: &'a mut [Vec<T>],
    midi_out: &'a mut MidiBuffer,
}

/// Everything one un-split block needs.
struct BlockState<T> {
    ops: Vec<Op<T>>,
    audio: ChannelPool<T>,
    events: Vec<MidiBuffer>,
    output: Vec<Vec<T>>,
    midi_out: MidiBuffer,
}

/// A compiled schedule instantiated for sample type `T`.
pub struct Executor<T> {
    state: BlockState<T>,
    block_size: usize,
    midi_chunk: MidiBuffer,
    midi_merged: MidiBuffer,
}

impl<T: NativeSample> Executor<T> {
    /// Builds the executor and its pools. Control thread only.
    ///
    /// `event_capacity` bounds every event buffer.
    pub fn new(schedule: &CompiledSchedule, settings: &PrepareSettings, event_capacity: usize) -> Self {
        let block_size = settings.block_size.max(1);
        let mut output_channels = 0;

        let ops = schedule
            .steps
            .iter()
            .map(|step| match step {
                ProcessStep::ClearChannel { buffer } => Op::Clear(*buffer),
                ProcessStep::CopyChannel { source, dest } => Op::Copy {
                    source: *source,
                    dest: *dest,
                },
                ProcessStep::AddChannel { source, dest } => Op::Add {
                    source: *source,
                    dest: *dest,
                },
                ProcessStep::DelayChannel { buffer, delay } => Op::Delay {
                    buffer: *buffer,
                    line: DelayLine::new(*delay),
                },
                ProcessStep::ClearEvents { buffer } => Op::ClearEvents(*buffer),
                ProcessStep::CopyEvents { source, dest } => Op::CopyEvents {
                    source: *source,
                    dest: *dest,
                },
                ProcessStep::AddEvents { source, dest } => Op::AddEvents {
                    source: *source,
                    dest: *dest,
                },
                ProcessStep::Process {
                    node,
                    channels,
                    outputs,
                    events,
                } => {
                    if node.io_kind() == Some(IoKind::AudioOutput) {
                        output_channels = output_channels.max(channels.len());
                    }
                    let precision = if settings.precision == Precision::Double
                        && node.capabilities().double_precision
                    {
                        Precision::Double
                    } else {
                        Precision::Single
                    };
                    Op::Process(ProcessOp {
                        node: Arc::clone(node),
                        channels: channels.clone(),
                        outputs: *outputs,
                        events: *events,
                        staging: Staging::new(precision, channels.len(), block_size),
                    })
                }
            })
            .collect();

        Self {
            state: BlockState {
                ops,
                audio: ChannelPool::new(schedule.audio_buffer_count, block_size),
                events: (0..schedule.event_buffer_count)
                    .map(|_| MidiBuffer::with_capacity(event_capacity))
                    .collect(),
                output: vec![vec![T::ZERO; block_size]; output_channels],
                midi_out: MidiBuffer::with_capacity(event_capacity),
            },
            block_size,
            midi_chunk: MidiBuffer::with_capacity(event_capacity),
            midi_merged: MidiBuffer::with_capacity(event_capacity),
        }
    }

    /// Largest block rendered without splitting.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Renders one host block in place.
    ///
    /// `audio` carries the graph input on entry and the graph output on return;
    /// `midi` likewise. Blocks longer than [`block_size`](Self::block_size) are
    /// rendered in chunks, with the transport position advanced per chunk and
    /// output events re-timed into the caller's buffer.
    pub fn perform(&mut self, audio: &mut AudioBuffer<'_, T>, midi: &mut MidiBuffer, transport: Option<&Transport>) {
        let num_samples = audio.num_samples();
        if num_samples <= self.block_size {
            self.state.perform_block(audio, midi, transport);
            return;
        }

        self.midi_merged.clear();
        let mut start = 0;
        while start < num_samples {
            let len = (num_samples - start).min(self.block_size);
            let offset = start as isize;

            self.midi_chunk.clear();
            self.midi_chunk.add_events(midi, start, len, -offset);

            let chunk_transport = transport.map(|t| Transport {
                position_samples: t.position_samples.map(|p| p + start as i64),
                ..*t
            });
            let mut chunk = audio.slice(start, len);
            self.state
                .perform_block(&mut chunk, &mut self.midi_chunk, chunk_transport.as_ref());

            self.midi_merged.add_events(&self.midi_chunk, 0, len, offset);
            start += len;
        }
        midi.copy_from(&self.midi_merged);
    }
}

impl<T: NativeSample> BlockState<T> {
    fn perform_block(&mut self, audio: &mut AudioBuffer<'_, T>, midi: &mut MidiBuffer, transport: Option<&Transport>) {
        let n = audio.num_samples();
        for channel in &mut self.output {
            channel[..n].fill(T::ZERO);
        }
        self.midi_out.clear();

        {
            let mut io = HostIo {
                input: &*audio,
                midi_in: &*midi,
                output: &mut self.output,
                midi_out: &mut self.midi_out,
            };
            for op in &mut self.ops {
                match op {
                    Op::Clear(buffer) => self.audio.clear(*buffer, n),
                    Op::Copy { source, dest } => self.audio.copy(*source, *dest, n),
                    Op::Add { source, dest } => self.audio.add(*source, *dest, n),
                    Op::Delay { buffer, line } => line.process_block_inplace(self.audio.get_mut(*buffer, n)),
                    Op::ClearEvents(buffer) => self.events[*buffer].clear(),
                    Op::CopyEvents { source, dest } => copy_events(&mut self.events, *source, *dest),
                    Op::AddEvents { source, dest } => add_events(&mut self.events, *source, *dest, n),
                    Op::Process(process) => {
                        process.run(&mut self.audio, &mut self.events, &mut io, n, transport);
                    }
                }
            }
        }

        for ch in 0..audio.num_channels() {
            match self.output.get(ch) {
                Some(out) => audio.channel_mut(ch).copy_from_slice(&out[..n]),
                None => audio.clear_channel(ch),
            }
        }
        midi.copy_from(&self.midi_out);
    }
}

impl<T: NativeSample> ProcessOp<T> {
    fn run(
        &mut self,
        pool: &mut ChannelPool<T>,
        events: &mut [MidiBuffer],
        io: &mut HostIo<'_, T>,
        n: usize,
        transport: Option<&Transport>,
    ) {
        let midi = &mut events[self.events];
        match self.node.io_kind() {
            Some(IoKind::AudioInput) => {
                for (k, &buffer) in self.channels.iter().enumerate().take(self.outputs) {
                    if k < io.input.num_channels() {
                        pool.get_mut(buffer, n).copy_from_slice(io.input.channel(k));
                    } else {
                        pool.clear(buffer, n);
                    }
                }
            }
            Some(IoKind::AudioOutput) => {
                for (out, &buffer) in io.output.iter_mut().zip(&self.channels) {
                    for (d, s) in out[..n].iter_mut().zip(pool.get(buffer, n)) {
                        *d += *s;
                    }
                }
            }
            Some(IoKind::MidiInput) => midi.add_events(io.midi_in, 0, n, 0),
            Some(IoKind::MidiOutput) => io.midi_out.add_events(midi, 0, n, 0),
            None => match &mut self.staging {
                Staging::Native(staging) => {
                    run_native(&self.node, &self.channels, self.outputs, staging, pool, midi, n, transport);
                }
                Staging::Single(staging) => {
                    run_staged(&self.node, &self.channels, self.outputs, staging, pool, midi, n, transport);
                }
                Staging::Double(staging) => {
                    run_staged(&self.node, &self.channels, self.outputs, staging, pool, midi, n, transport);
                }
            },
        }
    }
}

/// Runs a node in the executor's own precision. Output slots are owned by
/// this node and distinct, so they are swapped rather than copied; inputs
/// past the outputs may be shared and are copied.
#[allow(clippy::too_many_arguments)]
fn run_native<T: NativeSample>(
    node: &Node,
    channels: &[usize],
    outputs: usize,
    staging: &mut [Vec<T>],
    pool: &mut ChannelPool<T>,
    midi: &mut MidiBuffer,
    n: usize,
    transport: Option<&Transport>,
) {
    for (k, (slot, &buffer)) in staging.iter_mut().zip(channels).enumerate() {
        if k < outputs {
            pool.swap(buffer, slot);
        } else {
            slot[..n].copy_from_slice(pool.get(buffer, n));
        }
    }

    match node.try_processor() {
        Some(mut processor) => {
            let bypassed = node.is_bypassed() && !processor.has_bypass_parameter();
            let mut audio = AudioBuffer::new(&mut *staging, n);
            T::call(&mut **processor, &mut audio, midi, transport, bypassed);
        }
        // The control thread holds the node: silence it for this block.
        None => {
            for slot in staging.iter_mut().take(outputs) {
                slot[..n].fill(T::ZERO);
            }
            midi.clear();
        }
    }

    for (slot, &buffer) in staging.iter_mut().zip(channels).take(outputs) {
        pool.swap(buffer, slot);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_staged<T: Sample, N: NativeSample>(
    node: &Node,
    channels: &[usize],
    outputs: usize,
    staging: &mut [Vec<N>],
    pool: &mut ChannelPool<T>,
    midi: &mut MidiBuffer,
    n: usize,
    transport: Option<&Transport>,
) {
    for (slot, &buffer) in staging.iter_mut().zip(channels) {
        convert_into(pool.get(buffer, n), &mut slot[..n]);
    }

    match node.try_processor() {
        Some(mut processor) => {
            let bypassed = node.is_bypassed() && !processor.has_bypass_parameter();
            let mut audio = AudioBuffer::new(&mut *staging, n);
            N::call(&mut **processor, &mut audio, midi, transport, bypassed);
        }
        // The control thread holds the node: silence it for this block.
        None => {
            for slot in staging.iter_mut() {
                slot[..n].fill(N::ZERO);
            }
            midi.clear();
        }
    }

    for (slot, &buffer) in staging.iter().zip(channels).take(outputs) {
        convert_into(&slot[..n], pool.get_mut(buffer, n));
    }
}

fn copy_events(events: &mut [MidiBuffer], source: usize, dest: usize) {
    if let Some((from, to)) = event_pair(events, source, dest) {
        to.copy_from(from);
    }
}

fn add_events(events: &mut [MidiBuffer], source: usize, dest: usize, n: usize) {
    if let Some((from, to)) = event_pair(events, source, dest) {
        to.add_events(from, 0, n, 0);
    }
}

fn event_pair(events: &mut [MidiBuffer], source: usize, dest: usize) -> Option<(&MidiBuffer, &mut MidiBuffer)> {
    if source == dest {
        return None;
    }
    if source < dest {
        let (lo, hi) = events.split_at_mut(dest);
        Some((&lo[source], &mut hi[0]))
    } else {
        let (lo, hi) = events.split_at_mut(source);
        Some((&hi[0], &mut lo[dest]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::compiler::{GraphSnapshot, compile};
    use crate::graph::node::{Connection, NodeId};
    use crate::midi::MidiEvent;
    use crate::processor::GraphIo;

    struct Gain(f32);

    impl Processor for Gain {
        fn num_input_channels(&self) -> usize {
            1
        }
        fn num_output_channels(&self) -> usize {
            1
        }
        fn prepare(&mut self, _: f64, _: usize) {}
        fn release(&mut self) {}
        fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _: &mut MidiBuffer, _: Option<&Transport>) {
            for s in audio.channel_mut(0) {
                *s *= self.0;
            }
        }
    }

    /// Writes the transport position into every sample.
    struct Position;

    impl Processor for Position {
        fn num_input_channels(&self) -> usize {
            0
        }
        fn num_output_channels(&self) -> usize {
            1
        }
        fn prepare(&mut self, _: f64, _: usize) {}
        fn release(&mut self) {}
        fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _: &mut MidiBuffer, t: Option<&Transport>) {
            let pos = t.and_then(|t| t.position_samples).unwrap_or(-1) as f32;
            audio.channel_mut(0).fill(pos);
        }
    }

    /// Sums two inputs into one output, then overwrites its read-only input.
    struct SumAndScribble;

    impl SumAndScribble {
        fn run<T: Sample>(audio: &mut AudioBuffer<'_, T>) {
            for i in 0..audio.num_samples() {
                let sum = audio.channel(0)[i] + audio.channel(1)[i];
                audio.channel_mut(0)[i] = sum;
            }
            audio.channel_mut(1).fill(T::from_f64(100.0));
        }
    }

    impl Processor for SumAndScribble {
        fn num_input_channels(&self) -> usize {
            2
        }
        fn num_output_channels(&self) -> usize {
            1
        }
        fn supports_double_precision(&self) -> bool {
            true
        }
        fn prepare(&mut self, _: f64, _: usize) {}
        fn release(&mut self) {}
        fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _: &mut MidiBuffer, _: Option<&Transport>) {
            Self::run(audio);
        }
        fn process_f64(&mut self, audio: &mut AudioBuffer<'_, f64>, _: &mut MidiBuffer, _: Option<&Transport>) {
            Self::run(audio);
        }
    }

    /// Input feeds both ports of the summing node and the output directly.
    fn shared_input_graph() -> GraphSnapshot {
        let mut s = GraphSnapshot::default();
        s.nodes.add(Box::new(GraphIo::new(IoKind::AudioInput, 1)), NodeId(1)).unwrap();
        s.nodes.add(Box::new(SumAndScribble), NodeId(2)).unwrap();
        s.nodes.add(Box::new(GraphIo::new(IoKind::AudioOutput, 1)), NodeId(3)).unwrap();
        for c in [
            Connection::audio(NodeId(1), 0, NodeId(2), 0),
            Connection::audio(NodeId(1), 0, NodeId(2), 1),
            Connection::audio(NodeId(2), 0, NodeId(3), 0),
            Connection::audio(NodeId(1), 0, NodeId(3), 0),
        ] {
            assert!(s.connections.add(&s.nodes, &c));
        }
        s
    }

    fn io_graph(middle: Box<dyn Processor>) -> GraphSnapshot {
        let mut s = GraphSnapshot::default();
        s.nodes.add(Box::new(GraphIo::new(IoKind::AudioInput, 1)), NodeId(1)).unwrap();
        s.nodes.add(middle, NodeId(2)).unwrap();
        s.nodes.add(Box::new(GraphIo::new(IoKind::AudioOutput, 1)), NodeId(3)).unwrap();
        s.connections.add(&s.nodes, &Connection::audio(NodeId(1), 0, NodeId(2), 0));
        s.connections.add(&s.nodes, &Connection::audio(NodeId(2), 0, NodeId(3), 0));
        s
    }

    fn settings(block_size: usize) -> PrepareSettings {
        PrepareSettings::new(Precision::Single, 48000.0, block_size)
    }

    #[test]
    fn test_gain_through_io_nodes() {
        let schedule = compile(&io_graph(Box::new(Gain(2.0))));
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);
        let mut data = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut MidiBuffer::new(), None);
        assert_eq!(data[0], vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_native_node_keeps_shared_input_intact() {
        let schedule = compile(&shared_input_graph());
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);
        for _ in 0..2 {
            let mut data = vec![vec![1.0f32, 2.0, -1.0, 0.5]];
            let mut audio = AudioBuffer::from_channels(&mut data);
            exec.perform(&mut audio, &mut MidiBuffer::new(), None);
            assert_eq!(data[0], vec![3.0, 6.0, -3.0, 1.5]);
        }
    }

    #[test]
    fn test_native_and_bridged_double_agree() {
        let schedule = compile(&shared_input_graph());
        let mut native =
            Executor::<f64>::new(&schedule, &PrepareSettings::new(Precision::Double, 48000.0, 4), 16);
        let mut bridged = Executor::<f64>::new(&schedule, &settings(4), 16);
        for exec in [&mut native, &mut bridged] {
            let mut data = vec![vec![0.25f64, -0.5, 1.0, 2.0, 4.0, 0.0]];
            let mut audio = AudioBuffer::from_channels(&mut data);
            exec.perform(&mut audio, &mut MidiBuffer::new(), None);
            assert_eq!(data[0], vec![0.75, -1.5, 3.0, 6.0, 12.0, 0.0]);
        }
    }

    #[test]
    fn test_double_executor_bridges_single_node() {
        let schedule = compile(&io_graph(Box::new(Gain(0.5))));
        let mut exec = Executor::<f64>::new(&schedule, &settings(4), 16);
        let mut data = vec![vec![1.0f64, -1.0, 0.25, 0.0]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut MidiBuffer::new(), None);
        assert_eq!(data[0], vec![0.5, -0.5, 0.125, 0.0]);
    }

    #[test]
    fn test_oversized_block_is_chunked() {
        let schedule = compile(&io_graph(Box::new(Gain(3.0))));
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);
        assert_eq!(exec.block_size(), 4);
        let mut data = vec![(0..10).map(|i| i as f32).collect::<Vec<_>>()];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut MidiBuffer::new(), None);
        let expected: Vec<f32> = (0..10).map(|i| i as f32 * 3.0).collect();
        assert_eq!(data[0], expected);
    }

    #[test]
    fn test_chunks_advance_transport() {
        let mut s = GraphSnapshot::default();
        s.nodes.add(Box::new(Position), NodeId(1)).unwrap();
        s.nodes.add(Box::new(GraphIo::new(IoKind::AudioOutput, 1)), NodeId(2)).unwrap();
        s.connections.add(&s.nodes, &Connection::audio(NodeId(1), 0, NodeId(2), 0));
        let schedule = compile(&s);
        let mut exec = Executor::<f32>::new(&schedule, &settings(2), 16);

        let mut data = vec![vec![0.0f32; 5]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        let transport = Transport {
            position_samples: Some(100),
            ..Transport::default()
        };
        exec.perform(&mut audio, &mut MidiBuffer::new(), Some(&transport));
        assert_eq!(data[0], vec![100.0, 100.0, 102.0, 102.0, 104.0]);
    }

    #[test]
    fn test_midi_passes_through_and_is_retimed() {
        let mut s = GraphSnapshot::default();
        s.nodes.add(Box::new(GraphIo::new(IoKind::MidiInput, 0)), NodeId(1)).unwrap();
        s.nodes.add(Box::new(GraphIo::new(IoKind::MidiOutput, 0)), NodeId(2)).unwrap();
        assert!(s.connections.add(&s.nodes, &Connection::midi(NodeId(1), NodeId(2))));
        let schedule = compile(&s);
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);

        let mut midi = MidiBuffer::new();
        midi.add_event(MidiEvent::note_on(1, 0, 60, 100));
        midi.add_event(MidiEvent::note_on(6, 0, 62, 100));
        let mut data = vec![vec![0.0f32; 8]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut midi, None);
        let times: Vec<usize> = midi.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![1, 6]);
    }

    #[test]
    fn test_locked_node_is_silenced() {
        let snapshot = io_graph(Box::new(Gain(1.0)));
        let schedule = compile(&snapshot);
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);
        let node = Arc::clone(snapshot.nodes.get(NodeId(2)).unwrap());

        let guard = node.processor();
        let mut data = vec![vec![1.0f32; 4]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut MidiBuffer::new(), None);
        drop(guard);
        assert_eq!(data[0], vec![0.0; 4]);
    }

    #[test]
    fn test_extra_host_channels_are_cleared() {
        let schedule = compile(&io_graph(Box::new(Gain(1.0))));
        let mut exec = Executor::<f32>::new(&schedule, &settings(4), 16);
        let mut data = vec![vec![1.0f32; 4], vec![1.0f32; 4]];
        let mut audio = AudioBuffer::from_channels(&mut data);
        exec.perform(&mut audio, &mut MidiBuffer::new(), None);
        assert_eq!(data[0], vec![1.0; 4]);
        assert_eq!(data[1], vec![0.0; 4]);
    }
}
