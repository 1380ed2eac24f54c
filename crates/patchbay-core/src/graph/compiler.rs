//! Plan compiler: node ordering, scratch-buffer assignment and latency
//! compensation.
//!
//! The compiler walks the nodes in dependency order and, for every node, emits
//! the buffer operations that gather its inputs followed by one
//! [`ProcessStep::Process`]. Scratch buffers are tagged with the output port
//! whose data they hold; after each node, any buffer whose data no later node
//! reads is returned to the free list. A chain of any length therefore needs
//! only a handful of buffers.
//!
//! Latency is tracked per node as `max(source latencies) + own latency`. Each
//! input whose source carries less latency than the slowest source of the same
//! node is delayed by the difference, so all paths into a node line up.
//!
//! Cycles are allowed. A source that has not been processed yet when its
//! consumer runs is read as silence, giving the loop one block of delay.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::connections::Connections;
use super::node::{Capabilities, Connection, MIDI_CHANNEL_INDEX, Node, NodeAndChannel, NodeId};
use super::nodes::Nodes;
use super::schedule::{CompiledSchedule, ProcessStep, ZERO_BUFFER};

/// Value copy of a graph's topology, taken when compiling.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    /// Nodes in id order.
    pub nodes: Nodes,
    /// All connections.
    pub connections: Connections,
}

/// What a scratch buffer currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferTag {
    /// The permanent silent buffer at index 0.
    ReadOnlyEmpty,
    /// Available for assignment.
    Free,
    /// In use for the current node only.
    Anonymous,
    /// Holds the output of this port.
    Owned(NodeAndChannel),
}

/// Collects every transitive source of `child`, reusing the sets already
/// computed for other nodes.
fn all_parents_of(
    child: NodeId,
    known: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    connections: &Connections,
) -> BTreeSet<NodeId> {
    let mut parents = BTreeSet::new();
    let mut stack = vec![child];

    while let Some(current) = stack.pop() {
        for parent in connections.source_nodes_for(current) {
            if parent == current || !parents.insert(parent) {
                continue;
            }
            match known.get(&parent) {
                Some(ancestors) => parents.extend(ancestors.iter().copied()),
                None => stack.push(parent),
            }
        }
    }
    parents
}

/// Orders nodes so that every node follows the nodes it depends on.
///
/// Nodes are inserted one at a time, each just before the first already-placed
/// node that has it as an ancestor. On a cycle the order is arbitrary.
pub fn order_nodes(nodes: &Nodes, connections: &Connections) -> Vec<Arc<Node>> {
    let mut result: Vec<Arc<Node>> = Vec::with_capacity(nodes.len());
    let mut parents: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

    for node in nodes.iter() {
        let id = node.id();
        let position = result
            .iter()
            .position(|placed| parents.get(&placed.id()).is_some_and(|p| p.contains(&id)))
            .unwrap_or(result.len());
        result.insert(position, Arc::clone(node));

        let ancestors = all_parents_of(id, &parents, connections);
        parents.insert(id, ancestors);
    }
    result
}

/// Compiles a graph snapshot into a schedule.
pub fn compile(snapshot: &GraphSnapshot) -> CompiledSchedule {
    let schedule = Builder::new(snapshot).build();

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            "graph_compile: {} nodes, {} steps, {} audio buffers, {} event buffers",
            schedule.order.len(),
            schedule.steps.len(),
            schedule.audio_buffer_count,
            schedule.event_buffer_count
        );
        tracing::debug!(
            "graph_latency: {} samples, {} compensation delays",
            schedule.latency_samples,
            schedule.delay_count()
        );
        for (i, step) in schedule.steps.iter().enumerate() {
            tracing::debug!("  step[{i}]: {step}");
        }
    }

    schedule
}

struct Builder<'a> {
    connections: &'a Connections,
    order: Vec<Arc<Node>>,
    caps: Vec<Capabilities>,
    audio: Vec<BufferTag>,
    events: Vec<BufferTag>,
    delays: BTreeMap<NodeId, usize>,
    total_latency: usize,
    steps: Vec<ProcessStep>,
}

impl<'a> Builder<'a> {
    fn new(snapshot: &'a GraphSnapshot) -> Self {
        let order = order_nodes(&snapshot.nodes, &snapshot.connections);
        let caps = order.iter().map(|n| n.capabilities()).collect();
        Self {
            connections: &snapshot.connections,
            order,
            caps,
            audio: vec![BufferTag::ReadOnlyEmpty],
            events: vec![BufferTag::ReadOnlyEmpty],
            delays: BTreeMap::new(),
            total_latency: 0,
            steps: Vec::new(),
        }
    }

    fn build(mut self) -> CompiledSchedule {
        for index in 0..self.order.len() {
            self.compile_node(index);
            self.free_unused_audio(index);
            self.free_unused_events(index);
        }
        CompiledSchedule {
            order: self.order.iter().map(|n| n.id()).collect(),
            steps: self.steps,
            audio_buffer_count: self.audio.len(),
            event_buffer_count: self.events.len(),
            latency_samples: self.total_latency,
        }
    }

    fn compile_node(&mut self, index: usize) {
        let node = Arc::clone(&self.order[index]);
        let id = node.id();
        let caps = self.caps[index];
        let max_latency = self.input_latency(id);

        let mut channels = Vec::with_capacity(caps.inputs.max(caps.outputs));
        for input in 0..caps.inputs {
            let buffer = self.audio_input(index, id, input, caps.outputs, max_latency);
            channels.push(buffer);
            if input < caps.outputs {
                debug_assert_ne!(buffer, ZERO_BUFFER);
                self.audio[buffer] = BufferTag::Owned(NodeAndChannel::new(id, input));
            }
        }
        for output in caps.inputs..caps.outputs {
            let buffer = free_buffer(&mut self.audio);
            channels.push(buffer);
            self.audio[buffer] = BufferTag::Owned(NodeAndChannel::new(id, output));
        }

        let events = self.event_input(index, id, &caps);
        if caps.produces_midi {
            self.events[events] = BufferTag::Owned(NodeAndChannel::midi(id));
        }

        let latency = max_latency + caps.latency;
        self.delays.insert(id, latency);
        if caps.outputs == 0 {
            self.total_latency = self.total_latency.max(latency);
        }

        self.steps.push(ProcessStep::Process {
            node,
            channels,
            outputs: caps.outputs,
            events,
        });
    }

    fn node_delay(&self, id: NodeId) -> usize {
        self.delays.get(&id).copied().unwrap_or(0)
    }

    fn input_latency(&self, id: NodeId) -> usize {
        self.connections
            .source_nodes_for(id)
            .into_iter()
            .map(|src| self.node_delay(src))
            .max()
            .unwrap_or(0)
    }

    fn compensation(&self, source: NodeId, max_latency: usize) -> usize {
        max_latency.saturating_sub(self.node_delay(source))
    }

    fn audio_input(
        &mut self,
        index: usize,
        id: NodeId,
        input: usize,
        outputs: usize,
        max_latency: usize,
    ) -> usize {
        let port = NodeAndChannel::new(id, input);
        let sources: Vec<NodeAndChannel> = self.connections.sources_for(&port).copied().collect();

        match sources.as_slice() {
            [] => self.silent_input(input, outputs),
            [source] => {
                let Some(mut buffer) = buffer_containing(&self.audio, source) else {
                    // Feedback: the source runs later in this block.
                    return self.silent_input(input, outputs);
                };
                let delay = self.compensation(source.node, max_latency);
                if (input < outputs || delay > 0) && self.is_needed_later(index, Some(input), source) {
                    let fresh = free_buffer(&mut self.audio);
                    self.steps.push(ProcessStep::CopyChannel {
                        source: buffer,
                        dest: fresh,
                    });
                    if input >= outputs {
                        self.audio[fresh] = BufferTag::Anonymous;
                    }
                    buffer = fresh;
                }
                if delay > 0 {
                    self.steps.push(ProcessStep::DelayChannel { buffer, delay });
                }
                buffer
            }
            _ => self.mixed_audio_input(index, input, &sources, max_latency),
        }
    }

    /// An input with no usable source reads silence; if the node also writes
    /// this channel it gets a cleared buffer of its own.
    fn silent_input(&mut self, input: usize, outputs: usize) -> usize {
        if input >= outputs {
            return ZERO_BUFFER;
        }
        let buffer = free_buffer(&mut self.audio);
        self.steps.push(ProcessStep::ClearChannel { buffer });
        buffer
    }

    fn mixed_audio_input(
        &mut self,
        index: usize,
        input: usize,
        sources: &[NodeAndChannel],
        max_latency: usize,
    ) -> usize {
        let reusable = sources.iter().enumerate().find_map(|(i, source)| {
            buffer_containing(&self.audio, source)
                .filter(|_| !self.is_needed_later(index, Some(input), source))
                .map(|buffer| (i, buffer))
        });

        let (skip, target) = match reusable {
            Some((i, buffer)) => {
                let delay = self.compensation(sources[i].node, max_latency);
                if delay > 0 {
                    self.steps.push(ProcessStep::DelayChannel { buffer, delay });
                }
                (i, buffer)
            }
            None => {
                let target = free_buffer(&mut self.audio);
                self.audio[target] = BufferTag::Anonymous;
                match buffer_containing(&self.audio, &sources[0]) {
                    Some(source) => {
                        self.steps.push(ProcessStep::CopyChannel { source, dest: target });
                        let delay = self.compensation(sources[0].node, max_latency);
                        if delay > 0 {
                            self.steps.push(ProcessStep::DelayChannel { buffer: target, delay });
                        }
                    }
                    None => self.steps.push(ProcessStep::ClearChannel { buffer: target }),
                }
                (0, target)
            }
        };

        for (i, source) in sources.iter().enumerate() {
            if i == skip {
                continue;
            }
            let Some(mut buffer) = buffer_containing(&self.audio, source) else {
                continue;
            };
            let delay = self.compensation(source.node, max_latency);
            if delay > 0 {
                if self.is_needed_later(index, Some(input), source) {
                    let scratch = free_buffer(&mut self.audio);
                    self.steps.push(ProcessStep::CopyChannel {
                        source: buffer,
                        dest: scratch,
                    });
                    buffer = scratch;
                }
                self.steps.push(ProcessStep::DelayChannel { buffer, delay });
            }
            self.steps.push(ProcessStep::AddChannel {
                source: buffer,
                dest: target,
            });
        }
        target
    }

    fn event_input(&mut self, index: usize, id: NodeId, caps: &Capabilities) -> usize {
        let port = NodeAndChannel::midi(id);
        let sources: Vec<NodeAndChannel> = self.connections.sources_for(&port).copied().collect();

        match sources.as_slice() {
            [] => {
                let buffer = free_buffer(&mut self.events);
                if caps.accepts_midi || caps.produces_midi {
                    self.steps.push(ProcessStep::ClearEvents { buffer });
                }
                buffer
            }
            [source] => match buffer_containing(&self.events, source) {
                Some(buffer) if self.is_needed_later(index, Some(MIDI_CHANNEL_INDEX), source) => {
                    let fresh = free_buffer(&mut self.events);
                    self.steps.push(ProcessStep::CopyEvents {
                        source: buffer,
                        dest: fresh,
                    });
                    fresh
                }
                Some(buffer) => buffer,
                None => {
                    let buffer = free_buffer(&mut self.events);
                    self.steps.push(ProcessStep::ClearEvents { buffer });
                    buffer
                }
            },
            _ => {
                let reusable = sources.iter().enumerate().find_map(|(i, source)| {
                    buffer_containing(&self.events, source)
                        .filter(|_| !self.is_needed_later(index, Some(MIDI_CHANNEL_INDEX), source))
                        .map(|buffer| (i, buffer))
                });
                let (skip, target) = match reusable {
                    Some(found) => found,
                    None => {
                        let target = free_buffer(&mut self.events);
                        self.events[target] = BufferTag::Anonymous;
                        match buffer_containing(&self.events, &sources[0]) {
                            Some(source) => self.steps.push(ProcessStep::CopyEvents { source, dest: target }),
                            None => self.steps.push(ProcessStep::ClearEvents { buffer: target }),
                        }
                        (0, target)
                    }
                };
                for (i, source) in sources.iter().enumerate() {
                    if i == skip {
                        continue;
                    }
                    if let Some(buffer) = buffer_containing(&self.events, source) {
                        self.steps.push(ProcessStep::AddEvents {
                            source: buffer,
                            dest: target,
                        });
                    }
                }
                target
            }
        }
    }

    /// Returns true if any node from `from` onwards reads `output`.
    ///
    /// `ignore_input` skips one input port of the node at `from` only.
    fn is_needed_later(&self, from: usize, ignore_input: Option<usize>, output: &NodeAndChannel) -> bool {
        let mut ignore = ignore_input;
        for (node, caps) in self.order.iter().zip(&self.caps).skip(from) {
            let id = node.id();
            if output.is_midi() {
                if ignore != Some(MIDI_CHANNEL_INDEX)
                    && self
                        .connections
                        .is_connected(&Connection::new(*output, NodeAndChannel::midi(id)))
                {
                    return true;
                }
            } else if (0..caps.inputs).any(|i| {
                ignore != Some(i)
                    && self
                        .connections
                        .is_connected(&Connection::new(*output, NodeAndChannel::new(id, i)))
            }) {
                return true;
            }
            ignore = None;
        }
        false
    }

    fn free_unused_audio(&mut self, index: usize) {
        let freed: Vec<usize> = self.unused(&self.audio, index);
        for i in freed {
            self.audio[i] = BufferTag::Free;
        }
    }

    fn free_unused_events(&mut self, index: usize) {
        let freed: Vec<usize> = self.unused(&self.events, index);
        for i in freed {
            self.events[i] = BufferTag::Free;
        }
    }

    fn unused(&self, tags: &[BufferTag], index: usize) -> Vec<usize> {
        tags.iter()
            .enumerate()
            .filter(|(_, tag)| match tag {
                BufferTag::Anonymous => true,
                BufferTag::Owned(port) => !self.is_needed_later(index, None, port),
                BufferTag::ReadOnlyEmpty | BufferTag::Free => false,
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// First free buffer after the silent one, growing the pool if none is free.
fn free_buffer(tags: &mut Vec<BufferTag>) -> usize {
    if let Some(i) = tags.iter().skip(1).position(|t| *t == BufferTag::Free) {
        return i + 1;
    }
    tags.push(BufferTag::Free);
    tags.len() - 1
}

fn buffer_containing(tags: &[BufferTag], port: &NodeAndChannel) -> Option<usize> {
    tags.iter().position(|t| *t == BufferTag::Owned(*port))
}
