//! Compiled schedule types.
//!
//! A [`CompiledSchedule`] is the precision-independent output of the plan
//! compiler: a flat list of [`ProcessStep`] instructions over two pools of
//! scratch buffers (audio channels and event streams), plus buffer counts and
//! the graph's total latency. Index 0 of each pool is a read-only buffer that
//! always holds silence (or no events).

use core::fmt;
use std::sync::Arc;

use super::node::{Node, NodeId};

/// Index of the read-only silent buffer in both pools.
pub const ZERO_BUFFER: usize = 0;

/// A single instruction in the compiled schedule.
#[derive(Clone, Debug)]
pub enum ProcessStep {
    /// Zero one audio buffer.
    ClearChannel {
        /// Audio buffer to clear.
        buffer: usize,
    },

    /// Copy one audio buffer into another.
    CopyChannel {
        /// Audio buffer to read.
        source: usize,
        /// Audio buffer to overwrite.
        dest: usize,
    },

    /// Sum one audio buffer into another.
    AddChannel {
        /// Audio buffer to read.
        source: usize,
        /// Audio buffer to add into.
        dest: usize,
    },

    /// Delay an audio buffer in place through a ring buffer owned by this step.
    ///
    /// Inserted so that every path into a node carries equal latency.
    DelayChannel {
        /// Audio buffer to delay.
        buffer: usize,
        /// Delay in samples.
        delay: usize,
    },

    /// Remove every event from an event buffer.
    ClearEvents {
        /// Event buffer to clear.
        buffer: usize,
    },

    /// Replace one event buffer with the contents of another.
    CopyEvents {
        /// Event buffer to read.
        source: usize,
        /// Event buffer to overwrite.
        dest: usize,
    },

    /// Merge one event buffer into another.
    AddEvents {
        /// Event buffer to read.
        source: usize,
        /// Event buffer to merge into.
        dest: usize,
    },

    /// Run one node over its assigned buffers.
    ///
    /// `channels[i]` is the audio buffer bound to the node's channel `i`; the
    /// list holds `max(inputs, outputs)` entries. Only the first `outputs`
    /// channels are written back after processing.
    Process {
        /// The node to run.
        node: Arc<Node>,
        /// Audio buffer per node channel.
        channels: Vec<usize>,
        /// Number of output channels written back.
        outputs: usize,
        /// Event buffer bound to the node's MIDI port.
        events: usize,
    },
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClearChannel { buffer } => write!(f, "ClearChannel buf[{buffer}]"),
            Self::CopyChannel { source, dest } => write!(f, "CopyChannel buf[{source}] → buf[{dest}]"),
            Self::AddChannel { source, dest } => write!(f, "AddChannel buf[{source}] → buf[{dest}]"),
            Self::DelayChannel { buffer, delay } => {
                write!(f, "DelayChannel buf[{buffer}] by {delay} samples")
            }
            Self::ClearEvents { buffer } => write!(f, "ClearEvents midi[{buffer}]"),
            Self::CopyEvents { source, dest } => write!(f, "CopyEvents midi[{source}] → midi[{dest}]"),
            Self::AddEvents { source, dest } => write!(f, "AddEvents midi[{source}] → midi[{dest}]"),
            Self::Process {
                node,
                channels,
                outputs,
                events,
            } => {
                let bufs: Vec<String> = channels.iter().map(|b| format!("buf[{b}]")).collect();
                write!(
                    f,
                    "Process {} [{}] outs={outputs} midi[{events}]",
                    node.id(),
                    bufs.join(", ")
                )
            }
        }
    }
}

/// Immutable output of the plan compiler.
#[derive(Clone, Debug)]
pub struct CompiledSchedule {
    pub(crate) steps: Vec<ProcessStep>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) audio_buffer_count: usize,
    pub(crate) event_buffer_count: usize,
    pub(crate) latency_samples: usize,
}

impl CompiledSchedule {
    /// Instructions in execution order.
    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    /// Returns the number of processing steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Node ids in the order they are processed.
    pub fn node_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Audio scratch buffers required, including the silent buffer.
    pub fn audio_buffer_count(&self) -> usize {
        self.audio_buffer_count
    }

    /// Event scratch buffers required, including the empty buffer.
    pub fn event_buffer_count(&self) -> usize {
        self.event_buffer_count
    }

    /// Total graph latency in samples.
    pub fn latency_samples(&self) -> usize {
        self.latency_samples
    }

    /// Number of latency-compensation delay steps.
    pub fn delay_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, ProcessStep::DelayChannel { .. }))
            .count()
    }

    /// The `Process` step for `id`, if the node is scheduled.
    pub fn process_step(&self, id: NodeId) -> Option<&ProcessStep> {
        self.steps
            .iter()
            .find(|s| matches!(s, ProcessStep::Process { node, .. } if node.id() == id))
    }
}

impl fmt::Display for CompiledSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} steps, {} audio buffers, {} event buffers, latency {} samples",
            self.steps.len(),
            self.audio_buffer_count,
            self.event_buffer_count,
            self.latency_samples
        )?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  step[{i}]: {step}")?;
        }
        Ok(())
    }
}
