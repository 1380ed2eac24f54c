//! Error types for graph editing.

use crate::graph::node::{Connection, NodeId};

/// Errors returned by [`ProcessingGraph`](crate::graph::ProcessingGraph) edits.
///
/// A rejected edit leaves the graph unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node with this id is already in the graph.
    #[error("node {0} already exists")]
    DuplicateNodeId(NodeId),
    /// The specified node was not found in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The connection breaks a structural rule (missing node, self-loop,
    /// mixed port kinds, or channel out of range).
    #[error("illegal connection {0}")]
    IllegalConnection(Connection),
    /// The connection is already present.
    #[error("connection {0} already exists")]
    AlreadyConnected(Connection),
    /// The connection to remove is not present.
    #[error("connection {0} not found")]
    ConnectionNotFound(Connection),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeAndChannel;

    #[test]
    fn test_messages_name_the_offending_item() {
        let c = Connection::new(
            NodeAndChannel::new(NodeId::new(1), 0),
            NodeAndChannel::midi(NodeId::new(2)),
        );
        assert_eq!(GraphError::NodeNotFound(NodeId::new(7)).to_string(), "node NodeId(7) not found");
        assert_eq!(
            GraphError::IllegalConnection(c).to_string(),
            "illegal connection NodeId(1):0 -> NodeId(2):midi"
        );
    }
}
