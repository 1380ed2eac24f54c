//! Graph node and port types.
//!
//! Each node wraps one [`Processor`] behind a lock together with a stable
//! [`NodeId`] and a bypass flag. Ports are addressed by [`NodeAndChannel`];
//! the reserved channel [`MIDI_CHANNEL_INDEX`] names a node's MIDI port.

use core::cmp::Ordering;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use parking_lot::{Mutex, MutexGuard};

use crate::processor::{IoKind, Processor};

/// Channel index reserved for a node's MIDI port.
pub const MIDI_CHANNEL_INDEX: usize = 0x1000;

/// Unique identifier for a node in the processing graph.
///
/// Automatically assigned ids start at 1, increase monotonically and are never
/// reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Wraps a raw identifier, for use with
    /// [`add_node_with_id`](super::ProcessingGraph::add_node_with_id).
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// One port of one node: an audio channel or the MIDI port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAndChannel {
    /// Owning node.
    pub node: NodeId,
    /// Audio channel index, or [`MIDI_CHANNEL_INDEX`].
    pub channel: usize,
}

impl NodeAndChannel {
    /// Audio or MIDI port by raw channel index.
    #[inline]
    pub const fn new(node: NodeId, channel: usize) -> Self {
        Self { node, channel }
    }

    /// The MIDI port of `node`.
    #[inline]
    pub const fn midi(node: NodeId) -> Self {
        Self::new(node, MIDI_CHANNEL_INDEX)
    }

    /// Returns true if this is a MIDI port.
    #[inline]
    pub fn is_midi(&self) -> bool {
        self.channel == MIDI_CHANNEL_INDEX
    }
}

impl fmt::Display for NodeAndChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_midi() {
            write!(f, "{}:midi", self.node)
        } else {
            write!(f, "{}:{}", self.node, self.channel)
        }
    }
}

/// A directed connection between an output port and an input port.
///
/// Ordered by source node, destination node, source channel, destination channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Output port the signal leaves from.
    pub source: NodeAndChannel,
    /// Input port the signal arrives at.
    pub destination: NodeAndChannel,
}

impl Connection {
    /// Creates a connection.
    #[inline]
    pub const fn new(source: NodeAndChannel, destination: NodeAndChannel) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Audio connection between two channels.
    pub const fn audio(source: NodeId, source_channel: usize, dest: NodeId, dest_channel: usize) -> Self {
        Self::new(
            NodeAndChannel::new(source, source_channel),
            NodeAndChannel::new(dest, dest_channel),
        )
    }

    /// MIDI connection between two nodes.
    pub const fn midi(source: NodeId, dest: NodeId) -> Self {
        Self::new(NodeAndChannel::midi(source), NodeAndChannel::midi(dest))
    }

    fn sort_key(&self) -> (NodeId, NodeId, usize, usize) {
        (
            self.source.node,
            self.destination.node,
            self.source.channel,
            self.destination.channel,
        )
    }
}

impl Ord for Connection {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Connection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Capability facts read from a processor in one lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Audio input channel count.
    pub inputs: usize,
    /// Audio output channel count.
    pub outputs: usize,
    /// Reads from the MIDI port.
    pub accepts_midi: bool,
    /// Writes to the MIDI port.
    pub produces_midi: bool,
    /// Reported latency in samples.
    pub latency: usize,
    /// Implements double-precision processing.
    pub double_precision: bool,
    /// Handles bypass itself.
    pub has_bypass_parameter: bool,
}

/// A node in the processing graph.
///
/// Shared between the graph and compiled plans through `Arc<Node>`. The
/// processor lock is taken blocking by the control thread and only with
/// `try_lock` by the real-time thread.
pub struct Node {
    id: NodeId,
    io_kind: Option<IoKind>,
    bypassed: AtomicBool,
    processor: Mutex<Box<dyn Processor>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, processor: Box<dyn Processor>) -> Self {
        Self {
            id,
            io_kind: processor.io_kind(),
            bypassed: AtomicBool::new(false),
            processor: Mutex::new(processor),
        }
    }

    /// The node's identifier.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Boundary role, if this is a graph I/O node.
    #[inline]
    pub fn io_kind(&self) -> Option<IoKind> {
        self.io_kind
    }

    /// Locks the processor, blocking until the real-time side releases it.
    ///
    /// Control thread only. Holding the guard silences this node in the
    /// real-time thread for as long as it is held.
    pub fn processor(&self) -> MutexGuard<'_, Box<dyn Processor>> {
        self.processor.lock()
    }

    /// Locks the processor if it is free.
    #[inline]
    pub fn try_processor(&self) -> Option<MutexGuard<'_, Box<dyn Processor>>> {
        self.processor.try_lock()
    }

    /// Returns true if the node is bypassed.
    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(AtomicOrdering::Relaxed)
    }

    /// Sets the bypass flag. Takes effect on the next block.
    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, AtomicOrdering::Relaxed);
    }

    /// Reads all capability facts from the processor.
    pub fn capabilities(&self) -> Capabilities {
        let p = self.processor.lock();
        Capabilities {
            inputs: p.num_input_channels(),
            outputs: p.num_output_channels(),
            accepts_midi: p.accepts_midi(),
            produces_midi: p.produces_midi(),
            latency: p.latency_samples(),
            double_precision: p.supports_double_precision(),
            has_bypass_parameter: p.has_bypass_parameter(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("io_kind", &self.io_kind)
            .field("bypassed", &self.is_bypassed())
            .finish_non_exhaustive()
    }
}
