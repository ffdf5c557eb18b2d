// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::data::SharedNodeData;
use crate::node::{ModelUpdate, Node, NodeId};
use crate::port::{PortDirection, PortIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a connection: both of its endpoints.
///
/// Endpoints never change; moving an end means removing the connection and
/// adding a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId {
    /// Producer node
    pub out_node: NodeId,
    /// Producer output port
    pub out_port: PortIndex,
    /// Consumer node
    pub in_node: NodeId,
    /// Consumer input port
    pub in_port: PortIndex,
}

impl ConnectionId {
    /// Create a connection ID from its endpoints
    pub fn new(out_node: NodeId, out_port: PortIndex, in_node: NodeId, in_port: PortIndex) -> Self {
        Self {
            out_node,
            out_port,
            in_node,
            in_port,
        }
    }

    /// Node on the given end
    pub fn node(&self, direction: PortDirection) -> NodeId {
        match direction {
            PortDirection::In => self.in_node,
            PortDirection::Out => self.out_node,
        }
    }

    /// Port index on the given end
    pub fn port(&self, direction: PortDirection) -> PortIndex {
        match direction {
            PortDirection::In => self.in_port,
            PortDirection::Out => self.out_port,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.out_node == node_id || self.in_node == node_id
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.out_node, self.out_port, self.in_node, self.in_port
        )
    }
}

/// A connection between an output port and an input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
}

impl Connection {
    /// Create a new connection
    pub fn new(out_node: NodeId, out_port: PortIndex, in_node: NodeId, in_port: PortIndex) -> Self {
        Self {
            id: ConnectionId::new(out_node, out_port, in_node, in_port),
        }
    }

    /// Connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Node on the given end
    pub fn node(&self, direction: PortDirection) -> NodeId {
        self.id.node(direction)
    }

    /// Port index on the given end
    pub fn port_index(&self, direction: PortDirection) -> PortIndex {
        self.id.port(direction)
    }

    /// Deliver a producer payload to the consumer node
    pub(crate) fn propagate_data(&self, consumer: &mut Node, data: Option<SharedNodeData>) -> ModelUpdate {
        debug_assert_eq!(consumer.id(), self.id.in_node);
        consumer.propagate_data(data, self.id.in_port)
    }

    /// Tell the consumer its input went away
    pub(crate) fn propagate_empty_data(&self, consumer: &mut Node) -> ModelUpdate {
        self.propagate_data(consumer, None)
    }
}
