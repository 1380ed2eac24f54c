//! Integration tests for the patchbay-core processing graph.
//!
//! Drives the public facade end to end: graph edits on the control side,
//! rendering through [`GraphRenderer`], and signal-level checks for latency
//! compensation, block splitting, feedback, MIDI routing and cross-thread
//! plan handoff.

use std::time::Duration;

use patchbay_core::{
    AudioBuffer, Connection, GraphLayout, GraphRenderer, IoKind, MidiBuffer, MidiEvent, NodeId, Precision,
    PrepareSettings, ProcessingGraph, Processor, Transport,
};

const SAMPLE_RATE: f64 = 48000.0;

// ============================================================================
// Test processors
// ============================================================================

/// Mono gain.
struct Gain(f32);

impl Processor for Gain {
    fn name(&self) -> &str {
        "gain"
    }
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

/// Mono delay that reports its length as latency.
struct Delay {
    ring: Vec<f32>,
    pos: usize,
}

impl Delay {
    fn new(samples: usize) -> Self {
        Self {
            ring: vec![0.0; samples],
            pos: 0,
        }
    }
}

impl Processor for Delay {
    fn name(&self) -> &str {
        "delay"
    }
    fn num_input_channels(&self) -> usize {
        1
    }
    fn num_output_channels(&self) -> usize {
        1
    }
    fn latency_samples(&self) -> usize {
        self.ring.len()
    }
    fn prepare(&mut self, _: f64, _: usize) {
        self.ring.fill(0.0);
        self.pos = 0;
    }
    fn release(&mut self) {}
    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _: &mut MidiBuffer, _: Option<&Transport>) {
        for s in audio.channel_mut(0) {
            let out = self.ring[self.pos];
            self.ring[self.pos] = *s;
            self.pos = (self.pos + 1) % self.ring.len();
            *s = out;
        }
    }
}

/// Emits 1, 2, 3, ... across blocks.
struct Ramp(f32);

impl Processor for Ramp {
    fn name(&self) -> &str {
        "ramp"
    }
    fn num_input_channels(&self) -> usize {
        0
    }
    fn num_output_channels(&self) -> usize {
        1
    }
    fn prepare(&mut self, _: f64, _: usize) {
        self.0 = 0.0;
    }
    fn release(&mut self) {}
    fn process(&mut self, audio: &mut AudioBuffer<'_, f32>, _: &mut MidiBuffer, _: Option<&Transport>) {
        for s in audio.channel_mut(0) {
            self.0 += 1.0;
            *s = self.0;
        }
    }
}

/// Shifts note messages up an octave.
struct Transpose {
    scratch: Vec<MidiEvent>,
}

impl Processor for Transpose {
    fn name(&self) -> &str {
        "transpose"
    }
    fn num_input_channels(&self) -> usize {
        0
    }
    fn num_output_channels(&self) -> usize {
        0
    }
    fn accepts_midi(&self) -> bool {
        true
    }
    fn produces_midi(&self) -> bool {
        true
    }
    fn prepare(&mut self, _: f64, _: usize) {
        self.scratch = Vec::with_capacity(64);
    }
    fn release(&mut self) {}
    fn process(&mut self, _: &mut AudioBuffer<'_, f32>, midi: &mut MidiBuffer, _: Option<&Transport>) {
        self.scratch.clear();
        self.scratch.extend(midi.iter().copied());
        midi.clear();
        for event in &self.scratch {
            let data = event.data();
            let shifted = MidiEvent::new(event.time, &[data[0], data[1].saturating_add(12), data[2]])
                .unwrap_or(*event);
            midi.add_event(shifted);
        }
    }
}

fn mono_graph() -> (ProcessingGraph, GraphRenderer) {
    ProcessingGraph::new(GraphLayout { inputs: 1, outputs: 1 })
}

fn connect(graph: &mut ProcessingGraph, source: NodeId, dest: NodeId) {
    graph.add_connection(Connection::audio(source, 0, dest, 0)).unwrap();
}

fn render(renderer: &mut GraphRenderer, input: &[f32]) -> Vec<f32> {
    let mut block = vec![input.to_vec()];
    renderer.process(&mut block, &mut MidiBuffer::new(), None);
    block.remove(0)
}

// ============================================================================
// 1. Latency compensation
// ============================================================================

/// Ramp feeds the output directly and through a 5-sample delay.
fn build_compensated(block_size: usize) -> (ProcessingGraph, GraphRenderer) {
    let (mut graph, renderer) = mono_graph();
    let ramp = graph.add_node(Box::new(Ramp(0.0))).unwrap().id();
    let delay = graph.add_node(Box::new(Delay::new(5))).unwrap().id();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, ramp, delay);
    connect(&mut graph, ramp, output);
    connect(&mut graph, delay, output);
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, block_size));
    (graph, renderer)
}

#[test]
fn parallel_paths_are_aligned() {
    let (graph, mut renderer) = build_compensated(64);
    assert_eq!(graph.latency_samples(), 5);

    let out = render(&mut renderer, &[0.0; 64]);
    for (i, &s) in out.iter().enumerate() {
        let expected = if i >= 5 { 2.0 * (i - 4) as f32 } else { 0.0 };
        assert_eq!(s, expected, "sample {i}");
    }
}

#[test]
fn impulse_through_diamond_arrives_once() {
    let (mut graph, mut renderer) = mono_graph();
    let input = graph.add_io_node(IoKind::AudioInput).unwrap().id();
    let slow = graph.add_node(Box::new(Delay::new(3))).unwrap().id();
    let fast = graph.add_node(Box::new(Gain(1.0))).unwrap().id();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, input, slow);
    connect(&mut graph, input, fast);
    connect(&mut graph, slow, output);
    connect(&mut graph, fast, output);
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 32));

    let mut impulse = vec![0.0f32; 32];
    impulse[0] = 1.0;
    let out = render(&mut renderer, &impulse);
    let mut expected = vec![0.0f32; 32];
    expected[3] = 2.0;
    assert_eq!(out, expected);
    assert_eq!(renderer.latency_samples(), 3);
}

// ============================================================================
// 2. Block splitting
// ============================================================================

#[test]
fn chunked_render_matches_single_block() {
    let (_whole_graph, mut whole) = build_compensated(64);
    let (_split_graph, mut split) = build_compensated(16);

    for _ in 0..3 {
        assert_eq!(render(&mut whole, &[0.0; 64]), render(&mut split, &[0.0; 64]));
    }
}

#[test]
fn chunked_midi_keeps_event_times() {
    let (mut graph, mut renderer) = mono_graph();
    let midi_in = graph.add_io_node(IoKind::MidiInput).unwrap().id();
    let midi_out = graph.add_io_node(IoKind::MidiOutput).unwrap().id();
    graph.add_connection(Connection::midi(midi_in, midi_out)).unwrap();
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 8));

    let mut midi = MidiBuffer::new();
    for time in [2, 10, 25] {
        midi.add_event(MidiEvent::note_on(time, 0, 60, 100));
    }
    let mut block = vec![vec![0.0f32; 32]];
    renderer.process(&mut block, &mut midi, None);

    let times: Vec<usize> = midi.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![2, 10, 25]);
}

// ============================================================================
// 3. Topologies
// ============================================================================

#[test]
fn feedback_loop_reads_silence() {
    let (mut graph, mut renderer) = mono_graph();
    let input = graph.add_io_node(IoKind::AudioInput).unwrap().id();
    let a = graph.add_node(Box::new(Gain(1.0))).unwrap().id();
    let b = graph.add_node(Box::new(Gain(0.5))).unwrap().id();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, input, a);
    connect(&mut graph, a, b);
    connect(&mut graph, b, a);
    connect(&mut graph, a, output);
    assert!(graph.is_an_input_to(a, a));
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 16));

    for _ in 0..4 {
        assert_eq!(render(&mut renderer, &[0.25; 16]), vec![0.25; 16]);
    }
}

#[test]
fn midi_routes_through_processor() {
    let (mut graph, mut renderer) = mono_graph();
    let midi_in = graph.add_io_node(IoKind::MidiInput).unwrap().id();
    let transpose = graph
        .add_node(Box::new(Transpose { scratch: Vec::new() }))
        .unwrap()
        .id();
    let midi_out = graph.add_io_node(IoKind::MidiOutput).unwrap().id();
    graph.add_connection(Connection::midi(midi_in, transpose)).unwrap();
    graph.add_connection(Connection::midi(transpose, midi_out)).unwrap();
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 16));

    let mut midi = MidiBuffer::new();
    midi.add_event(MidiEvent::note_on(3, 0, 60, 100));
    renderer.process(&mut vec![vec![0.0f32; 16]], &mut midi, None);

    let events: Vec<MidiEvent> = midi.iter().copied().collect();
    assert_eq!(events, vec![MidiEvent::note_on(3, 0, 72, 100)]);
}

#[test]
fn unrouted_midi_is_dropped() {
    let (mut graph, mut renderer) = mono_graph();
    graph.add_io_node(IoKind::MidiInput).unwrap();
    graph.add_io_node(IoKind::MidiOutput).unwrap();
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 16));

    let mut midi = MidiBuffer::new();
    midi.add_event(MidiEvent::note_on(0, 0, 60, 100));
    renderer.process(&mut vec![vec![0.0f32; 16]], &mut midi, None);
    assert!(midi.is_empty());
}

#[test]
fn bypassed_node_passes_input() {
    let (mut graph, mut renderer) = mono_graph();
    let input = graph.add_io_node(IoKind::AudioInput).unwrap().id();
    let gain = graph.add_node(Box::new(Gain(2.0))).unwrap();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, input, gain.id());
    connect(&mut graph, gain.id(), output);
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 16));

    assert_eq!(render(&mut renderer, &[0.5; 16]), vec![1.0; 16]);
    gain.set_bypassed(true);
    assert_eq!(render(&mut renderer, &[0.5; 16]), vec![0.5; 16]);
}

#[test]
fn double_precision_host_with_single_precision_node() {
    let (mut graph, mut renderer) = mono_graph();
    let input = graph.add_io_node(IoKind::AudioInput).unwrap().id();
    let gain = graph.add_node(Box::new(Gain(0.5))).unwrap().id();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, input, gain);
    connect(&mut graph, gain, output);
    graph.prepare(PrepareSettings::new(Precision::Double, SAMPLE_RATE, 16));

    let mut block = vec![vec![0.5f64; 16]];
    renderer.process_f64(&mut block, &mut MidiBuffer::new(), None);
    assert_eq!(block[0], vec![0.25; 16]);
}

// ============================================================================
// 4. Cross-thread handoff
// ============================================================================

#[test]
fn renderer_thread_picks_up_rewiring() {
    let (mut graph, mut renderer) = mono_graph();
    let input = graph.add_io_node(IoKind::AudioInput).unwrap().id();
    let output = graph.add_io_node(IoKind::AudioOutput).unwrap().id();
    connect(&mut graph, input, output);
    graph.prepare(PrepareSettings::new(Precision::Single, SAMPLE_RATE, 32));
    let reclaimer = graph.spawn_reclaimer(Duration::from_millis(2)).unwrap();

    // Each block renders under exactly one plan: passthrough (1.0), the
    // disconnected intermediate plans (0.0) or the gain path (0.5).
    let audio = std::thread::spawn(move || {
        let mut blocks = Vec::new();
        for _ in 0..5000 {
            let out = render(&mut renderer, &[1.0; 32]);
            let done = out == vec![0.5; 32];
            blocks.push(out);
            if done {
                break;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
        blocks
    });

    let gain = graph.add_node(Box::new(Gain(0.5))).unwrap().id();
    graph
        .remove_connection(Connection::audio(input, 0, output, 0))
        .unwrap();
    connect(&mut graph, input, gain);
    connect(&mut graph, gain, output);

    let blocks = audio.join().unwrap();
    assert_eq!(blocks.last(), Some(&vec![0.5; 32]));
    for block in &blocks {
        let first = block[0];
        assert!([1.0, 0.0, 0.5].contains(&first), "unexpected level {first}");
        assert!(block.iter().all(|&s| s == first), "block mixes plans: {block:?}");
    }
    drop(reclaimer);
}
