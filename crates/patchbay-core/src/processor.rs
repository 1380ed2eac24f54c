//! The processing-unit contract hosted by graph nodes.
//!
//! A [`Processor`] is opaque to the graph: it reports its channel counts, MIDI
//! capabilities and latency, and processes one block at a time. The graph
//! guarantees that `prepare`, `release` and the `process*` methods of a given
//! processor are never called concurrently.
//!
//! ## Design Decisions
//!
//! - **Object-safe**: nodes store `Box<dyn Processor>`.
//! - **Single precision required**: `process` is mandatory. Processors that
//!   report [`supports_double_precision`](Processor::supports_double_precision)
//!   also override [`process_f64`](Processor::process_f64).
//! - **No allocations** in any `process*` method.

use crate::audio_buffer::AudioBuffer;
use crate::midi::MidiBuffer;
use crate::sample::Precision;

/// Host transport state for the current block.
///
/// When a host block is split into chunks, the position is advanced per chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transport {
    /// Playhead position in samples, if known.
    pub position_samples: Option<i64>,
    /// Tempo in beats per minute, if known.
    pub tempo_bpm: Option<f64>,
    /// Whether the host transport is running.
    pub is_playing: bool,
}

/// Role of a graph boundary node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IoKind {
    /// Feeds the host's input audio into the graph.
    AudioInput,
    /// Collects graph audio into the host's output.
    AudioOutput,
    /// Feeds the host's input events into the graph.
    MidiInput,
    /// Collects graph events into the host's output events.
    MidiOutput,
}

/// Core trait for every unit hosted in a graph node.
///
/// # Example
///
/// ```rust
/// use patchbay_core::{AudioBuffer, MidiBuffer, Processor, Transport};
///
/// struct Gain(f32);
///
/// impl Processor for Gain {
///     fn num_input_channels(&self) -> usize { 1 }
///     fn num_output_channels(&self) -> usize { 1 }
///     fn prepare(&mut self, _sample_rate: f64, _block_size: usize) {}
///     fn release(&mut self) {}
///     fn process(
///         &mut self,
///         audio: &mut AudioBuffer<'_, f32>,
///         _midi: &mut MidiBuffer,
///         _transport: Option<&Transport>,
///     ) {
///         for s in audio.channel_mut(0) {
///             *s *= self.0;
///         }
///     }
/// }
/// ```
pub trait Processor: Send {
    /// Display name, used in logs.
    fn name(&self) -> &str {
        "processor"
    }

    /// Number of audio input channels.
    fn num_input_channels(&self) -> usize;

    /// Number of audio output channels.
    fn num_output_channels(&self) -> usize;

    /// Whether the processor reads events from its MIDI port.
    fn accepts_midi(&self) -> bool {
        false
    }

    /// Whether the processor writes events to its MIDI port.
    fn produces_midi(&self) -> bool {
        false
    }

    /// Processing latency in samples.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Whether [`process_f64`](Self::process_f64) is implemented natively.
    fn supports_double_precision(&self) -> bool {
        false
    }

    /// Whether the processor handles bypass itself.
    ///
    /// When false, a bypassed node is run through
    /// [`process_bypassed`](Self::process_bypassed) instead of `process`.
    fn has_bypass_parameter(&self) -> bool {
        false
    }

    /// Selects the precision `prepare` should allocate for.
    fn set_processing_precision(&mut self, _precision: Precision) {}

    /// Allocates resources for the given playback configuration.
    fn prepare(&mut self, sample_rate: f64, block_size: usize);

    /// Frees resources acquired in `prepare`.
    fn release(&mut self);

    /// Clears internal state without touching configuration.
    fn reset(&mut self) {}

    /// Informs the processor whether it runs offline.
    fn set_non_realtime(&mut self, _non_realtime: bool) {}

    /// Processes one block in place.
    ///
    /// The buffer holds `max(inputs, outputs)` channels. Input data arrives in
    /// the first `num_input_channels` channels; outputs are read back from the
    /// first `num_output_channels`.
    fn process(
        &mut self,
        audio: &mut AudioBuffer<'_, f32>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
    );

    /// Double-precision variant of [`process`](Self::process).
    ///
    /// Only called when [`supports_double_precision`](Self::supports_double_precision)
    /// returns true. The default clears the block.
    fn process_f64(
        &mut self,
        audio: &mut AudioBuffer<'_, f64>,
        _midi: &mut MidiBuffer,
        _transport: Option<&Transport>,
    ) {
        audio.clear();
    }

    /// Processes a block while bypassed.
    ///
    /// Default passes inputs through and clears outputs with no matching input.
    fn process_bypassed(
        &mut self,
        audio: &mut AudioBuffer<'_, f32>,
        _midi: &mut MidiBuffer,
        _transport: Option<&Transport>,
    ) {
        for ch in self.num_input_channels()..audio.num_channels() {
            audio.clear_channel(ch);
        }
    }

    /// Double-precision variant of [`process_bypassed`](Self::process_bypassed).
    fn process_bypassed_f64(
        &mut self,
        audio: &mut AudioBuffer<'_, f64>,
        _midi: &mut MidiBuffer,
        _transport: Option<&Transport>,
    ) {
        for ch in self.num_input_channels()..audio.num_channels() {
            audio.clear_channel(ch);
        }
    }

    /// Marks graph boundary nodes. Regular processors return `None`.
    fn io_kind(&self) -> Option<IoKind> {
        None
    }
}

/// Placeholder processor for the graph's boundary ports.
///
/// The executor never calls `process` on these; it copies between the host
/// block and the node's scratch buffers instead.
#[derive(Debug, Clone)]
pub struct GraphIo {
    kind: IoKind,
    channels: usize,
}

impl GraphIo {
    /// Creates a boundary node. `channels` is ignored for MIDI kinds.
    pub fn new(kind: IoKind, channels: usize) -> Self {
        let channels = match kind {
            IoKind::AudioInput | IoKind::AudioOutput => channels,
            IoKind::MidiInput | IoKind::MidiOutput => 0,
        };
        Self { kind, channels }
    }

    /// The boundary role.
    pub fn kind(&self) -> IoKind {
        self.kind
    }
}

impl Processor for GraphIo {
    fn name(&self) -> &str {
        match self.kind {
            IoKind::AudioInput => "Audio Input",
            IoKind::AudioOutput => "Audio Output",
            IoKind::MidiInput => "MIDI Input",
            IoKind::MidiOutput => "MIDI Output",
        }
    }

    fn num_input_channels(&self) -> usize {
        if self.kind == IoKind::AudioOutput {
            self.channels
        } else {
            0
        }
    }

    fn num_output_channels(&self) -> usize {
        if self.kind == IoKind::AudioInput {
            self.channels
        } else {
            0
        }
    }

    fn accepts_midi(&self) -> bool {
        self.kind == IoKind::MidiOutput
    }

    fn produces_midi(&self) -> bool {
        self.kind == IoKind::MidiInput
    }

    fn supports_double_precision(&self) -> bool {
        true
    }

    fn prepare(&mut self, _sample_rate: f64, _block_size: usize) {}

    fn release(&mut self) {}

    fn process(
        &mut self,
        _audio: &mut AudioBuffer<'_, f32>,
        _midi: &mut MidiBuffer,
        _transport: Option<&Transport>,
    ) {
    }

    fn process_f64(
        &mut self,
        _audio: &mut AudioBuffer<'_, f64>,
        _midi: &mut MidiBuffer,
        _transport: Option<&Transport>,
    ) {
    }

    fn io_kind(&self) -> Option<IoKind> {
        Some(self.kind)
    }
}
