//! Processing graph facade: the control-thread editor and the real-time renderer.
//!
//! [`ProcessingGraph`] owns the topology, lifecycle state and the publishing
//! end of the plan exchange. Every successful edit recompiles the graph (or
//! marks it dirty, see [`UpdateKind`]) and publishes a fresh [`RenderPlan`].
//! [`GraphRenderer`] lives on the audio thread: it adopts the newest plan at
//! the top of each block and renders with it.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::compiler::{GraphSnapshot, compile};
use super::connections::Connections;
use super::exchange::{PlanPublisher, PlanReceiver, Reclaimer, plan_channel};
use super::node::{Connection, Node, NodeId};
use super::nodes::Nodes;
use super::plan::RenderPlan;
use super::schedule::CompiledSchedule;
use super::states::{NodeStates, PrepareSettings, RequestedSettings};
use crate::audio_buffer::AudioBuffer;
use crate::error::GraphError;
use crate::midi::{DEFAULT_EVENT_CAPACITY, MidiBuffer};
use crate::processor::{GraphIo, IoKind, Processor, Transport};
use crate::sample::Sample;

/// When an edit rebuilds the render plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateKind {
    /// Rebuild and publish during the edit call.
    #[default]
    Sync,
    /// Mark the graph dirty; rebuild in
    /// [`handle_pending_update`](ProcessingGraph::handle_pending_update).
    Async,
}

/// Channel counts of the graph's audio boundary nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphLayout {
    /// Channels an audio input node provides.
    pub inputs: usize,
    /// Channels an audio output node collects.
    pub outputs: usize,
}

impl Default for GraphLayout {
    fn default() -> Self {
        Self {
            inputs: 2,
            outputs: 2,
        }
    }
}

/// Control-thread side of a processing graph.
///
/// # Usage
///
/// 1. Create the pair with [`new()`](Self::new) and move the
///    [`GraphRenderer`] to the audio thread
/// 2. Add nodes: [`add_node()`](Self::add_node), [`add_io_node()`](Self::add_io_node)
/// 3. Connect ports: [`add_connection()`](Self::add_connection)
/// 4. Start rendering: [`prepare()`](Self::prepare)
///
/// ```rust
/// use patchbay_core::graph::{Connection, GraphLayout, ProcessingGraph};
/// use patchbay_core::{IoKind, MidiBuffer, Precision, PrepareSettings};
///
/// let (mut graph, mut renderer) = ProcessingGraph::new(GraphLayout { inputs: 1, outputs: 1 });
/// let input = graph.add_io_node(IoKind::AudioInput).unwrap();
/// let output = graph.add_io_node(IoKind::AudioOutput).unwrap();
/// graph
///     .add_connection(Connection::audio(input.id(), 0, output.id(), 0))
///     .unwrap();
/// graph.prepare(PrepareSettings::new(Precision::Single, 48000.0, 64));
///
/// let mut channels = vec![vec![0.5f32; 64]];
/// renderer.process(&mut channels, &mut MidiBuffer::new(), None);
/// assert_eq!(channels[0][0], 0.5);
/// ```
pub struct ProcessingGraph {
    layout: GraphLayout,
    nodes: Nodes,
    connections: Connections,
    states: NodeStates,
    publisher: PlanPublisher,
    last_node_id: u32,
    update_kind: UpdateKind,
    update_pending: bool,
    event_capacity: usize,
    latency_samples: usize,
    non_realtime: Arc<AtomicBool>,
}

impl ProcessingGraph {
    /// Creates an empty graph and its real-time renderer.
    pub fn new(layout: GraphLayout) -> (Self, GraphRenderer) {
        Self::with_event_capacity(layout, DEFAULT_EVENT_CAPACITY)
    }

    /// Like [`new`](Self::new), bounding every scratch event buffer to
    /// `event_capacity` events.
    pub fn with_event_capacity(layout: GraphLayout, event_capacity: usize) -> (Self, GraphRenderer) {
        let (publisher, receiver) = plan_channel();
        let states = NodeStates::default();
        let non_realtime = Arc::new(AtomicBool::new(false));
        let renderer = GraphRenderer {
            receiver,
            requested: states.requested(),
            last_requested: None,
            non_realtime: Arc::clone(&non_realtime),
        };
        let graph = Self {
            layout,
            nodes: Nodes::default(),
            connections: Connections::default(),
            states,
            publisher,
            last_node_id: 0,
            update_kind: UpdateKind::Sync,
            update_pending: false,
            event_capacity: event_capacity.max(1),
            latency_samples: 0,
            non_realtime,
        };
        (graph, renderer)
    }

    /// Boundary channel counts.
    pub fn layout(&self) -> GraphLayout {
        self.layout
    }

    // --- Node mutations ---

    /// Adds a node under the next unused id.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNodeId`] if the id counter reaches an id that was
    /// taken explicitly.
    pub fn add_node(&mut self, processor: Box<dyn Processor>) -> Result<Arc<Node>, GraphError> {
        let id = NodeId(self.last_node_id.saturating_add(1));
        self.add_node_with_id(processor, id)
    }

    /// Adds a node under a caller-chosen id.
    ///
    /// Later automatic ids continue above the largest id seen.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNodeId`] if `id` is already in the graph.
    pub fn add_node_with_id(&mut self, processor: Box<dyn Processor>, id: NodeId) -> Result<Arc<Node>, GraphError> {
        let node = self
            .nodes
            .add(processor, id)
            .ok_or(GraphError::DuplicateNodeId(id))?;
        self.last_node_id = self.last_node_id.max(id.0);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: node {id} ({})", node.processor().name());
        self.topology_changed();
        Ok(node)
    }

    /// Adds a boundary node whose channel count follows the graph layout.
    pub fn add_io_node(&mut self, kind: IoKind) -> Result<Arc<Node>, GraphError> {
        let channels = match kind {
            IoKind::AudioInput => self.layout.inputs,
            IoKind::AudioOutput => self.layout.outputs,
            IoKind::MidiInput | IoKind::MidiOutput => 0,
        };
        self.add_node(Box::new(GraphIo::new(kind, channels)))
    }

    /// Disconnects and removes a node, returning the graph's handle to it.
    ///
    /// A plan still in use may keep the node alive until it is reclaimed.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if there is no such node.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Arc<Node>, GraphError> {
        if self.nodes.get(id).is_none() {
            return Err(GraphError::NodeNotFound(id));
        }
        self.connections.disconnect_node(id);
        let node = self.nodes.remove(id).ok_or(GraphError::NodeNotFound(id))?;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_remove: node {id}");
        self.topology_changed();
        Ok(node)
    }

    /// Looks up a node.
    pub fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        self.nodes.get(id).cloned()
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        self.nodes.as_slice()
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Removes every node and connection.
    pub fn clear(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        self.nodes = Nodes::default();
        self.connections = Connections::default();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_clear");
        self.topology_changed();
    }

    // --- Connections ---

    /// Adds a connection.
    ///
    /// # Errors
    ///
    /// [`GraphError::IllegalConnection`] if the connection breaks a structural
    /// rule, [`GraphError::AlreadyConnected`] if it is already present.
    pub fn add_connection(&mut self, c: Connection) -> Result<(), GraphError> {
        if !Connections::is_connection_legal(&self.nodes, &c) {
            return Err(GraphError::IllegalConnection(c));
        }
        if !self.connections.add(&self.nodes, &c) {
            return Err(GraphError::AlreadyConnected(c));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {c}");
        self.topology_changed();
        Ok(())
    }

    /// Removes a connection.
    ///
    /// # Errors
    ///
    /// [`GraphError::ConnectionNotFound`] if it is not present.
    pub fn remove_connection(&mut self, c: Connection) -> Result<(), GraphError> {
        if !self.connections.remove(&c) {
            return Err(GraphError::ConnectionNotFound(c));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {c}");
        self.topology_changed();
        Ok(())
    }

    /// Removes every connection touching `id`. Returns false if there were none.
    pub fn disconnect_node(&mut self, id: NodeId) -> bool {
        if !self.connections.disconnect_node(id) {
            return false;
        }
        self.topology_changed();
        true
    }

    /// Drops connections made illegal by processors changing their channel
    /// counts or MIDI flags. Returns true if any were removed.
    pub fn remove_illegal_connections(&mut self) -> bool {
        let removed = self.connections.remove_illegal(&self.nodes);
        if removed {
            self.topology_changed();
        }
        removed
    }

    /// Returns true if any port of `source` feeds any port of `dest` directly.
    pub fn is_connected(&self, source: NodeId, dest: NodeId) -> bool {
        self.connections.is_node_connected(source, dest)
    }

    /// Returns true if exactly this connection is present.
    pub fn is_connection_present(&self, c: &Connection) -> bool {
        self.connections.is_connected(c)
    }

    /// Returns true if `source` reaches `dest` through any path.
    pub fn is_an_input_to(&self, source: NodeId, dest: NodeId) -> bool {
        self.connections.is_an_input_to(source, dest)
    }

    /// Returns true if `c` is legal and not yet present.
    pub fn can_connect(&self, c: &Connection) -> bool {
        self.connections.can_connect(&self.nodes, c)
    }

    /// Returns true if `c` satisfies the structural rules.
    pub fn is_connection_legal(&self, c: &Connection) -> bool {
        Connections::is_connection_legal(&self.nodes, c)
    }

    /// All connections in sorted order.
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.all()
    }

    // --- Lifecycle ---

    /// Prepares every node for `settings` and starts publishing plans.
    pub fn prepare(&mut self, settings: PrepareSettings) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "graph_prepare: {:?} {} Hz, block {}",
            settings.precision,
            settings.sample_rate,
            settings.block_size
        );
        self.states.set_requested(Some(settings));
        self.rebuild();
    }

    /// Releases every node and withdraws the active plan.
    pub fn release(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::info!("graph_release");
        self.states.set_requested(None);
        self.rebuild();
    }

    /// Clears the internal state of every processor.
    pub fn reset(&self) {
        for node in self.nodes.iter() {
            node.processor().reset();
        }
    }

    /// Tells every processor, and the renderer, whether rendering is offline.
    pub fn set_non_realtime(&mut self, non_realtime: bool) {
        self.non_realtime.store(non_realtime, Ordering::Relaxed);
        self.states.set_non_realtime(non_realtime);
        for node in self.nodes.iter() {
            node.processor().set_non_realtime(non_realtime);
        }
    }

    /// Selects when edits rebuild the plan.
    ///
    /// With [`UpdateKind::Async`] in non-realtime mode, a renderer on the same
    /// thread waits for a plan that only [`handle_pending_update`] can build,
    /// so flush before rendering.
    ///
    /// [`handle_pending_update`]: Self::handle_pending_update
    pub fn set_update_kind(&mut self, kind: UpdateKind) {
        self.update_kind = kind;
    }

    /// Returns true if an asynchronous edit has not been built yet.
    pub fn has_pending_update(&self) -> bool {
        self.update_pending
    }

    /// Builds and publishes the plan for edits made under [`UpdateKind::Async`].
    pub fn handle_pending_update(&mut self) {
        if self.update_pending {
            self.rebuild();
        }
    }

    /// Drops a plan the renderer has finished with. Returns true if one was dropped.
    pub fn reclaim(&self) -> bool {
        self.publisher.reclaim()
    }

    /// Starts a thread that reclaims retired plans every `interval`.
    pub fn spawn_reclaimer(&self, interval: Duration) -> std::io::Result<Reclaimer> {
        self.publisher.spawn_reclaimer(interval)
    }

    /// Latency of the most recently built plan, in samples.
    pub fn latency_samples(&self) -> usize {
        self.latency_samples
    }

    /// Settings the nodes are currently prepared for.
    pub fn settings(&self) -> Option<PrepareSettings> {
        self.states.current()
    }

    /// Value copy of the current topology.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            connections: self.connections.clone(),
        }
    }

    /// Compiles the current topology without publishing it.
    pub fn compile(&self) -> CompiledSchedule {
        compile(&self.snapshot())
    }

    fn topology_changed(&mut self) {
        self.publisher.reclaim();
        match self.update_kind {
            UpdateKind::Sync => self.rebuild(),
            UpdateKind::Async => self.update_pending = true,
        }
    }

    fn rebuild(&mut self) {
        self.update_pending = false;
        self.publisher.reclaim();

        let plan = self.states.apply(&self.nodes).map(|settings| {
            let plan = RenderPlan::build(&self.snapshot(), settings, self.event_capacity);
            self.latency_samples = plan.latency_samples();
            Box::new(plan)
        });
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_publish: plan={}", plan.is_some());
        self.publisher.publish(plan);
    }
}

/// Real-time side of a processing graph.
///
/// Never blocks in realtime mode: without a plan, or with a plan built for
/// settings other than the last requested ones, it outputs silence.
pub struct GraphRenderer {
    receiver: PlanReceiver,
    requested: RequestedSettings,
    last_requested: Option<PrepareSettings>,
    non_realtime: Arc<AtomicBool>,
}

impl GraphRenderer {
    /// Renders one single-precision block in place.
    ///
    /// `channels` holds the graph input on entry and the output on return.
    pub fn process(&mut self, channels: &mut [Vec<f32>], midi: &mut MidiBuffer, transport: Option<&Transport>) {
        let mut audio = AudioBuffer::from_channels(channels);
        self.process_buffer(&mut audio, midi, transport);
    }

    /// Renders one double-precision block in place.
    pub fn process_f64(&mut self, channels: &mut [Vec<f64>], midi: &mut MidiBuffer, transport: Option<&Transport>) {
        let mut audio = AudioBuffer::from_channels(channels);
        self.process_buffer(&mut audio, midi, transport);
    }

    /// Renders into an existing buffer view.
    pub fn process_buffer<T: RenderSample>(
        &mut self,
        audio: &mut AudioBuffer<'_, T>,
        midi: &mut MidiBuffer,
        transport: Option<&Transport>,
    ) {
        self.receiver.adopt();

        if self.non_realtime.load(Ordering::Relaxed) {
            while !self.receiver.has_plan() && self.requested_settings().is_some() {
                std::thread::sleep(Duration::from_millis(1));
                self.receiver.adopt();
            }
        }

        let requested = self.requested_settings();
        match self.receiver.active() {
            Some(plan) if Some(*plan.settings()) == requested => T::render(plan, audio, midi, transport),
            _ => {
                audio.clear();
                midi.clear();
            }
        }
    }

    /// Sets offline mode, in which a missing plan is waited for.
    pub fn set_non_realtime(&mut self, non_realtime: bool) {
        self.non_realtime.store(non_realtime, Ordering::Relaxed);
    }

    /// Latency of the active plan, in samples.
    pub fn latency_samples(&self) -> usize {
        self.receiver.latency_samples()
    }

    fn requested_settings(&mut self) -> Option<PrepareSettings> {
        if let Some(current) = self.requested.try_get() {
            self.last_requested = current;
        }
        self.last_requested
    }
}

/// Sample types a [`RenderPlan`] can render.
pub trait RenderSample: Sample {
    /// Runs the plan's executor for this sample type.
    fn render(plan: &mut RenderPlan, audio: &mut AudioBuffer<'_, Self>, midi: &mut MidiBuffer, transport: Option<&Transport>);
}

impl RenderSample for f32 {
    #[inline]
    fn render(plan: &mut RenderPlan, audio: &mut AudioBuffer<'_, Self>, midi: &mut MidiBuffer, transport: Option<&Transport>) {
        plan.process(audio, midi, transport);
    }
}

impl RenderSample for f64 {
    #[inline]
    fn render(plan: &mut RenderPlan, audio: &mut AudioBuffer<'_, Self>, midi: &mut MidiBuffer, transport: Option<&Transport>) {
        plan.process_f64(audio, midi, transport);
    }
}
