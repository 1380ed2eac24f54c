//! Patchbay Core - real-time audio/MIDI processing graph
//!
//! Hosts a dynamic graph of audio/MIDI processors behind a single callback:
//! the control thread edits topology, the audio thread renders a precompiled
//! plan without blocking or allocating.
//!
//! # Core Abstractions
//!
//! ## Processors
//!
//! - [`Processor`] - Object-safe trait for every unit a node hosts
//! - [`GraphIo`] - Boundary nodes bridging host audio/MIDI into the graph
//! - [`Transport`] - Host playhead state forwarded to processors
//!
//! ## Buffers
//!
//! - [`AudioBuffer`] - Borrowed multichannel block view
//! - [`MidiBuffer`] / [`MidiEvent`] - Bounded, time-stamped event lists
//! - [`Sample`] / [`Precision`] - `f32` and `f64` processing
//!
//! ## Graph
//!
//! - [`ProcessingGraph`] - Control-thread editor and lifecycle owner
//! - [`GraphRenderer`] - Real-time renderer
//! - [`compile`](graph::compile) - Ordering, buffer assignment and latency
//!   compensation into a [`CompiledSchedule`](graph::CompiledSchedule)
//!
//! # Feature Flags
//!
//! - `tracing` - debug logs for graph edits, compilation and lifecycle
//! - `serde` - (de)serialization for [`Precision`] and [`PrepareSettings`]

pub mod audio_buffer;
pub mod error;
pub mod graph;
pub mod midi;
pub mod processor;
pub mod sample;

pub use audio_buffer::AudioBuffer;
pub use error::GraphError;
pub use graph::{
    Connection, GraphLayout, GraphRenderer, Node, NodeAndChannel, NodeId, PrepareSettings, ProcessingGraph,
    UpdateKind,
};
pub use midi::{DEFAULT_EVENT_CAPACITY, MidiBuffer, MidiEvent};
pub use processor::{GraphIo, IoKind, Processor, Transport};
pub use sample::{Precision, Sample, convert_into};
