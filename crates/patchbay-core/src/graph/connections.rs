//! Connection set indexed by destination port.
//!
//! Connections are stored as `destination -> {sources}` so that the compiler
//! can fetch every source feeding a port in one lookup. Node-level queries use
//! ordered range scans over all ports of a node.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use super::node::{Connection, NodeAndChannel, NodeId};
use super::nodes::Nodes;

fn ports_of(node: NodeId) -> RangeInclusive<NodeAndChannel> {
    NodeAndChannel::new(node, 0)..=NodeAndChannel::new(node, usize::MAX)
}

/// All connections of a graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connections {
    sources_for_destination: BTreeMap<NodeAndChannel, BTreeSet<NodeAndChannel>>,
}

impl Connections {
    /// Checks the structural rules for `c` against `nodes`.
    ///
    /// Both nodes must exist and differ, both ports must be MIDI or both audio,
    /// audio channels must be within the processors' channel counts, and MIDI
    /// needs a producing source and an accepting destination.
    pub fn is_connection_legal(nodes: &Nodes, c: &Connection) -> bool {
        let source_is_midi = c.source.is_midi();
        let dest_is_midi = c.destination.is_midi();

        if c.source.node == c.destination.node || source_is_midi != dest_is_midi {
            return false;
        }
        let (Some(source), Some(dest)) = (nodes.get(c.source.node), nodes.get(c.destination.node))
        else {
            return false;
        };
        let source_ok = {
            let p = source.processor();
            if source_is_midi {
                p.produces_midi()
            } else {
                c.source.channel < p.num_output_channels()
            }
        };
        source_ok && {
            let p = dest.processor();
            if dest_is_midi {
                p.accepts_midi()
            } else {
                c.destination.channel < p.num_input_channels()
            }
        }
    }

    /// Returns true if `c` is legal and not yet present.
    pub fn can_connect(&self, nodes: &Nodes, c: &Connection) -> bool {
        Self::is_connection_legal(nodes, c) && !self.is_connected(c)
    }

    /// Adds `c` if [`can_connect`](Self::can_connect) allows it.
    pub fn add(&mut self, nodes: &Nodes, c: &Connection) -> bool {
        if !self.can_connect(nodes, c) {
            return false;
        }
        self.sources_for_destination
            .entry(c.destination)
            .or_default()
            .insert(c.source);
        true
    }

    /// Removes `c`. Returns false if it was not present.
    pub fn remove(&mut self, c: &Connection) -> bool {
        let Some(sources) = self.sources_for_destination.get_mut(&c.destination) else {
            return false;
        };
        let removed = sources.remove(&c.source);
        if sources.is_empty() {
            self.sources_for_destination.remove(&c.destination);
        }
        removed
    }

    /// Drops every connection that is no longer legal, e.g. after a processor
    /// changed its channel counts.
    pub fn remove_illegal(&mut self, nodes: &Nodes) -> bool {
        let mut any_removed = false;
        self.sources_for_destination.retain(|dest, sources| {
            let before = sources.len();
            sources.retain(|src| Self::is_connection_legal(nodes, &Connection::new(*src, *dest)));
            any_removed |= sources.len() != before;
            !sources.is_empty()
        });
        any_removed
    }

    /// Removes every connection into or out of `node`.
    pub fn disconnect_node(&mut self, node: NodeId) -> bool {
        let incoming: Vec<NodeAndChannel> = self
            .sources_for_destination
            .range(ports_of(node))
            .map(|(dest, _)| *dest)
            .collect();
        let mut result = !incoming.is_empty();
        for dest in incoming {
            self.sources_for_destination.remove(&dest);
        }

        self.sources_for_destination.retain(|_, sources| {
            let before = sources.len();
            sources.retain(|src| src.node != node);
            result |= sources.len() != before;
            !sources.is_empty()
        });
        result
    }

    /// Returns true if exactly this connection is present.
    pub fn is_connected(&self, c: &Connection) -> bool {
        self.sources_for_destination
            .get(&c.destination)
            .is_some_and(|sources| sources.contains(&c.source))
    }

    /// Returns true if any port of `source` feeds any port of `dest` directly.
    pub fn is_node_connected(&self, source: NodeId, dest: NodeId) -> bool {
        self.sources_for_destination
            .range(ports_of(dest))
            .any(|(_, sources)| sources.range(ports_of(source)).next().is_some())
    }

    /// Distinct nodes feeding any port of `dest`, in id order.
    pub fn source_nodes_for(&self, dest: NodeId) -> BTreeSet<NodeId> {
        self.sources_for_destination
            .range(ports_of(dest))
            .flat_map(|(_, sources)| sources.iter().map(|s| s.node))
            .collect()
    }

    /// Sources feeding one port, in port order.
    pub fn sources_for(&self, port: &NodeAndChannel) -> impl Iterator<Item = &NodeAndChannel> {
        self.sources_for_destination.get(port).into_iter().flatten()
    }

    /// Number of sources feeding one port.
    pub fn source_count(&self, port: &NodeAndChannel) -> usize {
        self.sources_for_destination.get(port).map_or(0, BTreeSet::len)
    }

    /// Returns true if `source` reaches `dest` through one or more connections.
    ///
    /// `is_an_input_to(n, n)` is true exactly when `n` lies on a cycle.
    pub fn is_an_input_to(&self, source: NodeId, dest: NodeId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![dest];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for parent in self.source_nodes_for(current) {
                if parent == source {
                    return true;
                }
                if !visited.contains(&parent) {
                    stack.push(parent);
                }
            }
        }
        false
    }

    /// Every connection, sorted by (source node, destination node, source
    /// channel, destination channel).
    pub fn all(&self) -> Vec<Connection> {
        let mut result: Vec<Connection> = self
            .sources_for_destination
            .iter()
            .flat_map(|(dest, sources)| sources.iter().map(|src| Connection::new(*src, *dest)))
            .collect();
        result.sort();
        result
    }

    /// Total number of connections.
    pub fn len(&self) -> usize {
        self.sources_for_destination.values().map(BTreeSet::len).sum()
    }

    /// Returns true if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.sources_for_destination.is_empty()
    }
}
