// SPDX-License-Identifier: MIT OR Apache-2.0
//! Abstract graph model contract shared by every graph container.
//!
//! Presentation code depends only on [`FlowSceneModel`] and the
//! [`GraphEvent`]s a container fires after each committed write.

use crate::connection::ConnectionId;
use crate::graph::GraphError;
use crate::node::{NodeId, NodeValidationState};
use crate::port::{ConnectionPolicy, NodeDataType, PortDirection, PortIndex};
use egui::Pos2;

/// Notification fired after a mutation has been committed.
///
/// Events carry ids only; listeners re-resolve state through the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEvent {
    /// A node was added
    NodeAdded(NodeId),
    /// A node is about to be erased; it can still be queried
    NodeAboutToBeRemoved(NodeId),
    /// A node was erased
    NodeRemoved(NodeId),
    /// A node changed position
    NodeMoved(NodeId),
    /// A node's port count or port types changed
    NodePortUpdated(NodeId),
    /// A node's validation state or message changed
    NodeValidationUpdated(NodeId),
    /// A connection was added
    ConnectionAdded(ConnectionId),
    /// A connection left both port slots and is about to be erased
    ConnectionAboutToBeRemoved(ConnectionId),
    /// A connection was erased
    ConnectionRemoved(ConnectionId),
}

/// Receives graph notifications.
///
/// Listeners only get shared access to the model, so they cannot mutate the
/// graph structure while a notification is being delivered.
pub trait GraphListener {
    /// Handle one event
    fn on_event(&mut self, event: &GraphEvent, model: &dyn FlowSceneModel);
}

impl<F> GraphListener for F
where
    F: FnMut(&GraphEvent, &dyn FlowSceneModel),
{
    fn on_event(&mut self, event: &GraphEvent, model: &dyn FlowSceneModel) {
        self(event, model);
    }
}

/// Read/write interface of a graph container.
///
/// Write operations leave the graph consistent or fail without any partial
/// mutation. Containers that do not support a write keep the default,
/// which fails with [`GraphError::Unsupported`].
pub trait FlowSceneModel {
    // Scene

    /// Names of the node models that can be created
    fn model_registry(&self) -> Vec<String>;

    /// Category of a node model
    fn node_type_category(&self, _name: &str) -> Option<String> {
        None
    }

    /// Converter model for data flowing from `from` into `to`
    fn converter_node(&self, _from: &NodeDataType, _to: &NodeDataType) -> Option<String> {
        None
    }

    // Retrieval

    /// All node ids, in enumeration order
    fn node_ids(&self) -> Vec<NodeId>;

    /// Check if a node id resolves
    fn has_node(&self, id: NodeId) -> bool;

    /// Type identifier of a node's model
    fn node_type_identifier(&self, id: NodeId) -> Option<String>;

    /// Caption of a node; empty when the model hides it
    fn node_caption(&self, id: NodeId) -> Option<String>;

    /// Position of a node
    fn node_location(&self, id: NodeId) -> Option<Pos2>;

    /// Whether a node may be resized
    fn node_resizable(&self, id: NodeId) -> Option<bool>;

    /// Validation state of a node
    fn node_validation_state(&self, id: NodeId) -> Option<NodeValidationState>;

    /// Validation message of a node
    fn node_validation_message(&self, id: NodeId) -> Option<String>;

    /// Number of ports in a direction
    fn node_port_count(&self, id: NodeId, direction: PortDirection) -> Option<usize>;

    /// Caption of a port
    fn node_port_caption(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Option<String>;

    /// Data type of a port
    fn node_port_data_type(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Option<NodeDataType>;

    /// Cardinality of a port; input ports are always `One`
    fn node_port_connection_policy(
        &self,
        id: NodeId,
        direction: PortDirection,
        index: PortIndex,
    ) -> Option<ConnectionPolicy>;

    /// `(peer node, peer port)` pairs connected to a port
    fn node_port_connections(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Vec<(NodeId, PortIndex)>;

    // Mutation

    /// Connect an output port to an input port
    fn add_connection(
        &mut self,
        _out_node: NodeId,
        _out_port: PortIndex,
        _in_node: NodeId,
        _in_port: PortIndex,
    ) -> Result<ConnectionId, GraphError> {
        Err(GraphError::Unsupported("add_connection"))
    }

    /// Remove the connection between two ports
    fn remove_connection(
        &mut self,
        _out_node: NodeId,
        _out_port: PortIndex,
        _in_node: NodeId,
        _in_port: PortIndex,
    ) -> Result<(), GraphError> {
        Err(GraphError::Unsupported("remove_connection"))
    }

    /// Create a node from a registered model name
    fn add_node(&mut self, _type_id: &str, _position: Pos2) -> Result<NodeId, GraphError> {
        Err(GraphError::Unsupported("add_node"))
    }

    /// Remove a node that has no connections left
    fn remove_node(&mut self, _id: NodeId) -> Result<(), GraphError> {
        Err(GraphError::Unsupported("remove_node"))
    }

    /// Move a node
    fn move_node(&mut self, _id: NodeId, _position: Pos2) -> Result<(), GraphError> {
        Err(GraphError::Unsupported("move_node"))
    }

    // Helpers

    /// Remove every connection touching a node, then the node.
    ///
    /// All or nothing: if any step fails, connections removed so far are
    /// added back and the error is returned.
    fn remove_node_with_connections(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.has_node(id) {
            return Err(GraphError::NodeNotFound(id));
        }

        let mut edges: Vec<ConnectionId> = Vec::new();
        for direction in [PortDirection::In, PortDirection::Out] {
            let count = self.node_port_count(id, direction).unwrap_or(0);
            for port in 0..count {
                for (peer, peer_port) in self.node_port_connections(id, direction, port) {
                    let edge = match direction {
                        PortDirection::In => ConnectionId::new(peer, peer_port, id, port),
                        PortDirection::Out => ConnectionId::new(id, port, peer, peer_port),
                    };
                    edges.push(edge);
                }
            }
        }

        let mut removed: Vec<ConnectionId> = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Err(err) = self.remove_connection(edge.out_node, edge.out_port, edge.in_node, edge.in_port) {
                restore_connections(self, &removed);
                return Err(err);
            }
            removed.push(edge);
        }

        if let Err(err) = self.remove_node(id) {
            restore_connections(self, &removed);
            return Err(err);
        }
        Ok(())
    }
}

fn restore_connections<M: FlowSceneModel + ?Sized>(model: &mut M, removed: &[ConnectionId]) {
    for edge in removed.iter().rev() {
        if let Err(err) = model.add_connection(edge.out_node, edge.out_port, edge.in_node, edge.in_port) {
            tracing::error!("Failed to restore connection {edge}: {err}");
        }
    }
}
