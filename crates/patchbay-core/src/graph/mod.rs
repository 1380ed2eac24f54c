//! Processing graph: topology, compilation, execution and real-time handoff.
//!
//! Edit the graph on the control thread (add/remove nodes, connect ports),
//! compile it into a flat [`CompiledSchedule`], bind the schedule to prepare
//! settings as a [`RenderPlan`], and hand the plan to the audio thread, which
//! runs it per block without allocating.
//!
//! # Architecture
//!
//! The system uses a **two-object split**:
//!
//! - [`ProcessingGraph`]: owned by the control thread. Holds topology
//!   ([`Nodes`], [`Connections`]) and node lifecycle ([`NodeStates`]), rebuilds
//!   and publishes plans. Never touched by the audio thread.
//! - [`GraphRenderer`]: owned by the audio thread. Adopts the newest plan
//!   through a `try_lock` exchange ([`plan_channel`]) and renders with it.
//!
//! # Buffer Reuse
//!
//! The compiler tags every scratch channel with the output port whose signal
//! it currently holds. A channel is freed after its last reader and reused by
//! later nodes, so a linear chain needs a constant number of buffers.
//!
//! # Latency Compensation
//!
//! Each node reports
//! [`latency_samples()`](crate::Processor::latency_samples). The compiler
//! tracks the accumulated latency at every node and inserts delay steps on
//! shorter paths wherever signals with different latency are summed.
//!
//! # Cycles
//!
//! Connections may form feedback loops. Nodes in a cycle are ordered as they
//! are encountered, and an input whose source has not yet run reads silence.
//!
//! # Example
//!
//! ```rust
//! use patchbay_core::graph::{Connection, GraphLayout, ProcessingGraph};
//! use patchbay_core::{IoKind, Precision, PrepareSettings};
//!
//! let (mut graph, _renderer) = ProcessingGraph::new(GraphLayout::default());
//! let input = graph.add_io_node(IoKind::AudioInput)?;
//! let output = graph.add_io_node(IoKind::AudioOutput)?;
//! graph.add_connection(Connection::audio(input.id(), 0, output.id(), 0))?;
//! graph.add_connection(Connection::audio(input.id(), 1, output.id(), 1))?;
//! graph.prepare(PrepareSettings::new(Precision::Single, 48000.0, 256));
//! assert_eq!(graph.latency_samples(), 0);
//! # Ok::<(), patchbay_core::GraphError>(())
//! ```

pub mod buffer;
pub mod compiler;
pub mod connections;
pub mod exchange;
pub mod executor;
pub mod node;
pub mod nodes;
pub mod plan;
pub mod processing;
pub mod schedule;
pub mod states;

pub use buffer::{ChannelPool, DelayLine};
pub use compiler::{GraphSnapshot, compile, order_nodes};
pub use connections::Connections;
pub use exchange::{PlanPublisher, PlanReceiver, Reclaimer, plan_channel};
pub use executor::Executor;
pub use node::{Capabilities, Connection, MIDI_CHANNEL_INDEX, Node, NodeAndChannel, NodeId};
pub use nodes::Nodes;
pub use plan::RenderPlan;
pub use processing::{GraphLayout, GraphRenderer, ProcessingGraph, RenderSample, UpdateKind};
pub use schedule::{CompiledSchedule, ProcessStep, ZERO_BUFFER};
pub use states::{NodeStates, PrepareSettings, RequestedSettings};
