//! Node lifecycle tracking.
//!
//! [`NodeStates`] remembers which nodes have been prepared for the current
//! [`PrepareSettings`]. When the settings change every node is released and
//! prepared again; otherwise only nodes added since the last pass are prepared.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::NodeId;
use super::nodes::Nodes;
use crate::sample::Precision;

/// Playback configuration every node and plan must agree on.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrepareSettings {
    /// Numeric precision of the host's buffers.
    pub precision: Precision,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Maximum block size in samples.
    pub block_size: usize,
}

impl PrepareSettings {
    /// Creates settings.
    pub fn new(precision: Precision, sample_rate: f64, block_size: usize) -> Self {
        Self {
            precision,
            sample_rate,
            block_size,
        }
    }
}

/// Shared cell holding the most recently requested settings.
///
/// Written by the control thread, read by the real-time thread with
/// [`try_get`](Self::try_get).
#[derive(Clone, Debug, Default)]
pub struct RequestedSettings {
    cell: Arc<Mutex<Option<PrepareSettings>>>,
}

impl RequestedSettings {
    /// Stores new settings, blocking.
    pub fn set(&self, settings: Option<PrepareSettings>) {
        *self.cell.lock() = settings;
    }

    /// Reads the settings, blocking.
    pub fn get(&self) -> Option<PrepareSettings> {
        *self.cell.lock()
    }

    /// Reads the settings without blocking. Returns `None` if contended.
    #[inline]
    pub fn try_get(&self) -> Option<Option<PrepareSettings>> {
        self.cell.try_lock().map(|guard| *guard)
    }
}

/// Tracks which nodes are prepared for which settings.
#[derive(Debug, Default)]
pub struct NodeStates {
    requested: RequestedSettings,
    current: Option<PrepareSettings>,
    prepared: BTreeSet<NodeId>,
    non_realtime: bool,
}

impl NodeStates {
    /// Handle the real-time side reads requested settings through.
    pub fn requested(&self) -> RequestedSettings {
        self.requested.clone()
    }

    /// Sets the settings the next [`apply`](Self::apply) will use. `None`
    /// releases every node.
    pub fn set_requested(&self, settings: Option<PrepareSettings>) {
        self.requested.set(settings);
    }

    /// Settings last applied to the nodes.
    pub fn current(&self) -> Option<PrepareSettings> {
        self.current
    }

    /// Offline flag passed to nodes when they are prepared.
    pub fn set_non_realtime(&mut self, non_realtime: bool) {
        self.non_realtime = non_realtime;
    }

    /// Returns true if `id` has been prepared for the current settings.
    pub fn is_prepared(&self, id: NodeId) -> bool {
        self.prepared.contains(&id)
    }

    /// Brings every node in line with the requested settings.
    ///
    /// Control thread only. Returns the settings now in effect.
    pub fn apply(&mut self, nodes: &Nodes) -> Option<PrepareSettings> {
        let next = self.requested.get();
        let changed = next != self.current;
        self.current = next;

        if changed {
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_states: settings changed to {:?}, releasing {} nodes", next, nodes.len());
            for node in nodes.iter() {
                node.processor().release();
            }
            self.prepared.clear();
        } else {
            self.prepared.retain(|id| nodes.get(*id).is_some());
        }

        let settings = self.current?;
        for node in nodes.iter() {
            if !self.prepared.insert(node.id()) {
                continue;
            }
            let mut processor = node.processor();
            let precision = if processor.supports_double_precision() {
                settings.precision
            } else {
                Precision::Single
            };
            processor.set_processing_precision(precision);
            processor.set_non_realtime(self.non_realtime);
            processor.prepare(settings.sample_rate, settings.block_size);
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_states: prepared {} ({}) at {:?}", node.id(), processor.name(), precision);
        }
        Some(settings)
    }
}
