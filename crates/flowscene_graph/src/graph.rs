// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concrete graph model owning nodes and connections.

use crate::connection::{Connection, ConnectionId};
use crate::data::SharedNodeData;
use crate::model::{FlowSceneModel, GraphEvent, GraphListener};
use crate::node::{ModelUpdate, Node, NodeDataModel, NodeId, NodeValidationState};
use crate::port::{ConnectionPolicy, NodeDataType, PortDirection, PortIndex};
use crate::registry::DataModelRegistry;
use egui::Pos2;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Upper bound on model updates handled for one change before propagation stops
const MAX_PROPAGATION_STEPS: usize = 10_000;

/// The reference graph model.
///
/// Every write commits first, then notifies listeners synchronously, then
/// pushes any new payloads downstream. A new connection is the exception:
/// its consumer is primed before connection-added fires.
pub struct DataFlowModel {
    /// Node model factories and type converters
    registry: Arc<DataModelRegistry>,
    /// Nodes in enumeration order
    nodes: IndexMap<NodeId, Node>,
    /// Canonical connection table
    connections: IndexMap<ConnectionId, Connection>,
    /// Notification receivers
    listeners: Vec<Box<dyn GraphListener>>,
}

impl DataFlowModel {
    /// Create an empty graph using the given registry
    pub fn new(registry: Arc<DataModelRegistry>) -> Self {
        Self {
            registry,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Registry this graph creates nodes from
    pub fn registry(&self) -> &DataModelRegistry {
        &self.registry
    }

    /// Subscribe to graph notifications
    pub fn add_listener(&mut self, listener: impl GraphListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Add a node around an already constructed model
    pub fn add_node_with_model(&mut self, model: Box<dyn NodeDataModel>, position: Pos2) -> NodeId {
        self.insert_node(NodeId::new(), model, position)
    }

    pub(crate) fn insert_node(&mut self, id: NodeId, model: Box<dyn NodeDataModel>, position: Pos2) -> NodeId {
        debug_assert!(!self.nodes.contains_key(&id));
        let node = Node::new(id, model, position);
        tracing::debug!("Node added: {} ({})", id, node.model().name());
        self.nodes.insert(id, node);
        self.emit(GraphEvent::NodeAdded(id));
        id
    }

    /// Change a node's model from outside the graph (e.g. an editor widget).
    ///
    /// The returned [`ModelUpdate`] is applied like one coming from
    /// [`NodeDataModel::set_in_data`].
    pub fn update_node_model<F>(&mut self, node_id: NodeId, f: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut dyn NodeDataModel) -> ModelUpdate,
    {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let update = f(node.model_mut());
        self.apply_update(node_id, update);
        Ok(())
    }

    /// Push the current output of a port through all its connections
    pub fn node_data_updated(&mut self, node_id: NodeId, port: PortIndex) -> Result<(), GraphError> {
        self.check_port(node_id, PortDirection::Out, port)?;
        self.apply_update(node_id, ModelUpdate::data(port));
        Ok(())
    }

    /// Remove every node together with its connections
    pub fn clear_scene(&mut self) -> Result<(), GraphError> {
        while let Some(id) = self.nodes.keys().next().copied() {
            self.remove_node_with_connections(id)?;
        }
        Ok(())
    }

    fn check_port(&self, node_id: NodeId, direction: PortDirection, index: PortIndex) -> Result<&IndexSet<ConnectionId>, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.connections(direction, index).ok_or(GraphError::PortOutOfRange {
            node: node_id,
            direction,
            index,
        })
    }

    fn slot_mut(
        &mut self,
        node_id: NodeId,
        direction: PortDirection,
        index: PortIndex,
    ) -> Result<&mut IndexSet<ConnectionId>, GraphError> {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.connections_mut(direction, index).ok_or(GraphError::PortOutOfRange {
            node: node_id,
            direction,
            index,
        })
    }

    fn deliver(&mut self, connection_id: ConnectionId, data: Option<SharedNodeData>) -> Option<ModelUpdate> {
        let connection = self.connections.get(&connection_id)?;
        let consumer = self.nodes.get_mut(&connection_id.in_node)?;
        Some(connection.propagate_data(consumer, data))
    }

    /// Apply a model update and everything it sets off downstream
    fn apply_update(&mut self, origin: NodeId, update: ModelUpdate) {
        let mut pending = VecDeque::from([(origin, update)]);
        let mut steps = 0;

        while let Some((node_id, update)) = pending.pop_front() {
            steps += 1;
            if steps > MAX_PROPAGATION_STEPS {
                tracing::warn!("Data propagation from {origin} stopped after {MAX_PROPAGATION_STEPS} steps");
                break;
            }

            if update.ports_changed {
                self.refresh_ports(node_id);
            }
            if update.validation_changed && self.nodes.contains_key(&node_id) {
                self.emit(GraphEvent::NodeValidationUpdated(node_id));
            }

            for port in update.data_updated {
                let Some(node) = self.nodes.get(&node_id) else {
                    break;
                };
                let Some(slot) = node.connections(PortDirection::Out, port) else {
                    continue;
                };
                let targets: Vec<ConnectionId> = slot.iter().copied().collect();
                let data = node.model().out_data(port);

                for connection_id in targets {
                    if let Some(next) = self.deliver(connection_id, data.clone()) {
                        if !next.is_empty() {
                            pending.push_back((connection_id.in_node, next));
                        }
                    }
                }
            }
        }
    }

    /// Resize a node's slots after its model changed port layout
    fn refresh_ports(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };

        let mut stale = Vec::new();
        for direction in [PortDirection::In, PortDirection::Out] {
            let declared = node.model().port_count(direction);
            for index in declared..node.port_count(direction) {
                if let Some(slot) = node.connections(direction, index) {
                    stale.extend(slot.iter().copied());
                }
            }
        }

        for connection_id in stale {
            if let Err(err) = self.remove_connection(
                connection_id.out_node,
                connection_id.out_port,
                connection_id.in_node,
                connection_id.in_port,
            ) {
                tracing::error!("Failed to drop connection {connection_id} from vanished port: {err}");
            }
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.resize_slots();
        }
        self.emit(GraphEvent::NodePortUpdated(node_id));
    }

    fn emit(&mut self, event: GraphEvent) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in &mut listeners {
            listener.on_event(&event, &*self);
        }
        self.listeners = listeners;
    }
}

impl FlowSceneModel for DataFlowModel {
    fn model_registry(&self) -> Vec<String> {
        self.registry
            .registered_model_names()
            .map(str::to_string)
            .collect()
    }

    fn node_type_category(&self, name: &str) -> Option<String> {
        self.registry.category(name).map(str::to_string)
    }

    fn converter_node(&self, from: &NodeDataType, to: &NodeDataType) -> Option<String> {
        self.registry.type_converter(from, to).map(str::to_string)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node_type_identifier(&self, id: NodeId) -> Option<String> {
        self.node(id).map(|n| n.model().name().to_string())
    }

    fn node_caption(&self, id: NodeId) -> Option<String> {
        let model = self.node(id)?.model();
        if model.caption_visible() {
            Some(model.caption())
        } else {
            Some(String::new())
        }
    }

    fn node_location(&self, id: NodeId) -> Option<Pos2> {
        self.node(id).map(Node::position)
    }

    fn node_resizable(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(|n| n.model().resizable())
    }

    fn node_validation_state(&self, id: NodeId) -> Option<NodeValidationState> {
        self.node(id).map(|n| n.model().validation_state())
    }

    fn node_validation_message(&self, id: NodeId) -> Option<String> {
        self.node(id).map(|n| n.model().validation_message())
    }

    fn node_port_count(&self, id: NodeId, direction: PortDirection) -> Option<usize> {
        self.node(id).map(|n| n.port_count(direction))
    }

    fn node_port_caption(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Option<String> {
        self.check_port(id, direction, index).ok()?;
        self.node(id).map(|n| n.model().port_caption(direction, index))
    }

    fn node_port_data_type(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Option<NodeDataType> {
        self.check_port(id, direction, index).ok()?;
        self.node(id).map(|n| n.model().data_type(direction, index))
    }

    fn node_port_connection_policy(
        &self,
        id: NodeId,
        direction: PortDirection,
        index: PortIndex,
    ) -> Option<ConnectionPolicy> {
        self.check_port(id, direction, index).ok()?;
        match direction {
            PortDirection::In => Some(ConnectionPolicy::One),
            PortDirection::Out => self
                .node(id)
                .map(|n| n.model().port_out_connection_policy(index)),
        }
    }

    fn node_port_connections(&self, id: NodeId, direction: PortDirection, index: PortIndex) -> Vec<(NodeId, PortIndex)> {
        let Ok(slot) = self.check_port(id, direction, index) else {
            return Vec::new();
        };
        let peer = direction.opposite();
        slot.iter()
            .map(|connection_id| (connection_id.node(peer), connection_id.port(peer)))
            .collect()
    }

    fn add_connection(
        &mut self,
        out_node: NodeId,
        out_port: PortIndex,
        in_node: NodeId,
        in_port: PortIndex,
    ) -> Result<ConnectionId, GraphError> {
        let id = ConnectionId::new(out_node, out_port, in_node, in_port);

        if out_node == in_node {
            return Err(GraphError::SelfLoop(out_node));
        }
        if self.connections.contains_key(&id) {
            return Err(GraphError::ConnectionExists(id));
        }

        let existing = self.check_port(out_node, PortDirection::Out, out_port)?.len();
        let policy = self
            .node_port_connection_policy(out_node, PortDirection::Out, out_port)
            .unwrap_or_default();
        if !policy.accepts(existing) {
            return Err(GraphError::PortOccupied {
                node: out_node,
                direction: PortDirection::Out,
                index: out_port,
            });
        }
        if !self.check_port(in_node, PortDirection::In, in_port)?.is_empty() {
            return Err(GraphError::PortOccupied {
                node: in_node,
                direction: PortDirection::In,
                index: in_port,
            });
        }

        // both endpoints validated; commit
        self.slot_mut(out_node, PortDirection::Out, out_port)?.insert(id);
        self.slot_mut(in_node, PortDirection::In, in_port)?.insert(id);
        self.connections
            .insert(id, Connection::new(out_node, out_port, in_node, in_port));
        tracing::debug!("Connection added: {id}");

        // prime the consumer with whatever the producer currently holds
        let data = self
            .nodes
            .get(&out_node)
            .and_then(|n| n.model().out_data(out_port));
        if let Some(update) = self.deliver(id, data) {
            self.apply_update(in_node, update);
        }

        // a port-shape change while priming can drop the new edge again
        if self.connections.contains_key(&id) {
            self.emit(GraphEvent::ConnectionAdded(id));
        }
        Ok(id)
    }

    fn remove_connection(
        &mut self,
        out_node: NodeId,
        out_port: PortIndex,
        in_node: NodeId,
        in_port: PortIndex,
    ) -> Result<(), GraphError> {
        let id = ConnectionId::new(out_node, out_port, in_node, in_port);
        if !self.connections.contains_key(&id) {
            return Err(GraphError::ConnectionNotFound(id));
        }

        let in_producer = self
            .check_port(out_node, PortDirection::Out, out_port)
            .is_ok_and(|slot| slot.contains(&id));
        let in_consumer = self
            .check_port(in_node, PortDirection::In, in_port)
            .is_ok_and(|slot| slot.contains(&id));
        debug_assert!(in_producer && in_consumer, "connection {id} missing from its port slots");
        if !(in_producer && in_consumer) {
            tracing::error!("Connection {id} is missing from its port slots");
            return Err(GraphError::Inconsistent(format!(
                "connection {id} missing from its port slots"
            )));
        }

        // the consumer observes its input going away
        let update = match (self.connections.get(&id), self.nodes.get_mut(&in_node)) {
            (Some(connection), Some(consumer)) => connection.propagate_empty_data(consumer),
            _ => ModelUpdate::none(),
        };

        self.slot_mut(out_node, PortDirection::Out, out_port)?.shift_remove(&id);
        self.slot_mut(in_node, PortDirection::In, in_port)?.shift_remove(&id);

        self.emit(GraphEvent::ConnectionAboutToBeRemoved(id));
        self.connections.shift_remove(&id);
        tracing::debug!("Connection removed: {id}");
        self.emit(GraphEvent::ConnectionRemoved(id));

        self.apply_update(in_node, update);
        Ok(())
    }

    fn add_node(&mut self, type_id: &str, position: Pos2) -> Result<NodeId, GraphError> {
        let model = self
            .registry
            .create(type_id)
            .ok_or_else(|| GraphError::UnknownModel(type_id.to_string()))?;
        Ok(self.insert_node(NodeId::new(), model, position))
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        if node.has_connections() {
            tracing::warn!("Refusing to remove node {id}: it still has connections");
            return Err(GraphError::NodeHasConnections(id));
        }

        self.emit(GraphEvent::NodeAboutToBeRemoved(id));
        self.nodes.shift_remove(&id);
        tracing::debug!("Node removed: {id}");
        self.emit(GraphEvent::NodeRemoved(id));
        Ok(())
    }

    fn move_node(&mut self, id: NodeId, position: Pos2) -> Result<(), GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound(id))?
            .set_position(position);
        self.emit(GraphEvent::NodeMoved(id));
        Ok(())
    }
}

impl fmt::Debug for DataFlowModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFlowModel")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Error from a graph read or write
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// No model registered under this name
    #[error("No registered model with name {0}")]
    UnknownModel(String),

    /// Port index outside the node's declared ports
    #[error("Port {direction} {index} out of range on node {node}")]
    PortOutOfRange {
        /// Node
        node: NodeId,
        /// Port direction
        direction: PortDirection,
        /// Port index
        index: PortIndex,
    },

    /// Connection not found
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Connection already exists
    #[error("Connection already exists: {0}")]
    ConnectionExists(ConnectionId),

    /// Port cannot take another connection
    #[error("Port {direction} {index} on node {node} is already connected")]
    PortOccupied {
        /// Node
        node: NodeId,
        /// Port direction
        direction: PortDirection,
        /// Port index
        index: PortIndex,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed on node {0}")]
    SelfLoop(NodeId),

    /// Node still has connections
    #[error("Node {0} still has connections")]
    NodeHasConnections(NodeId),

    /// Internal bookkeeping is out of sync
    #[error("Graph is inconsistent: {0}")]
    Inconsistent(String),

    /// The container does not implement this write
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::calculator::DecimalData;
    use crate::testing::{stub_registry, EventLog, Inbox, StubModel};
    use std::cell::Cell;
    use std::rc::Rc;

    fn model() -> DataFlowModel {
        DataFlowModel::new(Arc::new(stub_registry()))
    }

    fn value(data: &Option<SharedNodeData>) -> Option<f64> {
        data.as_ref()
            .and_then(|d| d.downcast_ref::<DecimalData>())
            .map(DecimalData::number)
    }

    #[test]
    fn test_add_node() {
        let mut model = model();
        let id = model.add_node("source", Pos2::new(10.0, 20.0)).unwrap();

        assert!(model.has_node(id));
        assert_eq!(model.node_ids(), vec![id]);
        assert_eq!(model.node_type_identifier(id).as_deref(), Some("source"));
        assert_eq!(model.node_location(id), Some(Pos2::new(10.0, 20.0)));
        assert_eq!(model.node_port_count(id, PortDirection::In), Some(0));
        assert_eq!(model.node_port_count(id, PortDirection::Out), Some(1));
    }

    #[test]
    fn test_add_unknown_node_fails() {
        let mut model = model();
        let err = model.add_node("nope", Pos2::ZERO).unwrap_err();
        assert!(matches!(err, GraphError::UnknownModel(name) if name == "nope"));
        assert_eq!(model.node_count(), 0);
    }

    #[test]
    fn test_node_ids_are_unique() {
        let mut model = model();
        let a = model.add_node("source", Pos2::ZERO).unwrap();
        let b = model.add_node("source", Pos2::ZERO).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_add_connection_updates_both_endpoints() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();

        let id = model.add_connection(source, 0, sink, 0).unwrap();

        assert_eq!(model.connection_count(), 1);
        assert_eq!(model.node_port_connections(source, PortDirection::Out, 0), vec![(sink, 0)]);
        assert_eq!(model.node_port_connections(sink, PortDirection::In, 0), vec![(source, 0)]);
        let node = model.node(source).unwrap();
        assert_eq!(node.connections(PortDirection::Out, 0).unwrap().len(), 1);
        assert!(model.connection(&id).is_some());
    }

    #[test]
    fn test_remove_connection_is_inverse_of_add() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        let before_out = model.node_port_connections(source, PortDirection::Out, 0);
        let before_in = model.node_port_connections(sink, PortDirection::In, 0);

        model.add_connection(source, 0, sink, 0).unwrap();
        model.remove_connection(source, 0, sink, 0).unwrap();

        assert_eq!(model.node_port_connections(source, PortDirection::Out, 0), before_out);
        assert_eq!(model.node_port_connections(sink, PortDirection::In, 0), before_in);
        assert_eq!(model.connection_count(), 0);
    }

    #[test]
    fn test_remove_missing_connection_fails() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        let err = model.remove_connection(source, 0, sink, 0).unwrap_err();
        assert!(matches!(err, GraphError::ConnectionNotFound(_)));
    }

    #[test]
    fn test_in_port_accepts_one_connection() {
        let mut model = model();
        let a = model.add_node("source", Pos2::ZERO).unwrap();
        let b = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();

        model.add_connection(a, 0, sink, 0).unwrap();
        let err = model.add_connection(b, 0, sink, 0).unwrap_err();

        assert!(matches!(err, GraphError::PortOccupied { direction: PortDirection::In, .. }));
        assert_eq!(model.node_port_connections(sink, PortDirection::In, 0), vec![(a, 0)]);
        assert!(model.node_port_connections(b, PortDirection::Out, 0).is_empty());
    }

    #[test]
    fn test_many_out_port_accumulates() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sinks: Vec<NodeId> = (0..3)
            .map(|_| model.add_node("sink", Pos2::ZERO).unwrap())
            .collect();

        for sink in &sinks {
            model.add_connection(source, 0, *sink, 0).unwrap();
        }

        assert_eq!(model.node_port_connections(source, PortDirection::Out, 0).len(), 3);
        assert_eq!(model.connection_count(), 3);
    }

    #[test]
    fn test_one_out_port_rejects_second_connection() {
        let mut model = model();
        let single = model.add_node("single", Pos2::ZERO).unwrap();
        let first = model.add_node("sink", Pos2::ZERO).unwrap();
        let second = model.add_node("sink", Pos2::ZERO).unwrap();
        let original = model.add_connection(single, 0, first, 0).unwrap();

        let err = model.add_connection(single, 0, second, 0).unwrap_err();

        assert!(matches!(err, GraphError::PortOccupied { direction: PortDirection::Out, .. }));
        assert!(model.connection(&original).is_some());
        assert_eq!(model.node_port_connections(single, PortDirection::Out, 0), vec![(first, 0)]);
        assert!(model.node_port_connections(second, PortDirection::In, 0).is_empty());
    }

    #[test]
    fn test_connection_validation() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        let relay = model.add_node("relay", Pos2::ZERO).unwrap();

        assert!(matches!(
            model.add_connection(source, 1, sink, 0),
            Err(GraphError::PortOutOfRange { .. })
        ));
        assert!(matches!(
            model.add_connection(source, 0, NodeId::new(), 0),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(matches!(
            model.add_connection(relay, 0, relay, 0),
            Err(GraphError::SelfLoop(_))
        ));

        model.add_connection(source, 0, sink, 0).unwrap();
        assert!(matches!(
            model.add_connection(source, 0, sink, 0),
            Err(GraphError::ConnectionExists(_))
        ));
        assert_eq!(model.connection_count(), 1);
    }

    #[test]
    fn test_remove_node_requires_no_connections() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        model.add_connection(source, 0, sink, 0).unwrap();

        assert!(matches!(model.remove_node(sink), Err(GraphError::NodeHasConnections(_))));
        assert!(model.has_node(sink));

        model.remove_connection(source, 0, sink, 0).unwrap();
        model.remove_node(sink).unwrap();
        assert!(!model.has_node(sink));
        assert_eq!(model.node_ids(), vec![source]);
    }

    #[test]
    fn test_move_node() {
        let mut model = model();
        let id = model.add_node("source", Pos2::ZERO).unwrap();
        let log = EventLog::default();
        model.add_listener(log.listener());

        model.move_node(id, Pos2::new(5.0, 6.0)).unwrap();

        assert_eq!(model.node_location(id), Some(Pos2::new(5.0, 6.0)));
        assert_eq!(log.events(), vec![GraphEvent::NodeMoved(id)]);
        assert!(model.move_node(NodeId::new(), Pos2::ZERO).is_err());
    }

    #[test]
    fn test_event_sequence() {
        let mut model = model();
        let log = EventLog::default();
        model.add_listener(log.listener());

        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        let conn = model.add_connection(source, 0, sink, 0).unwrap();
        model.remove_connection(source, 0, sink, 0).unwrap();
        model.remove_node(sink).unwrap();

        assert_eq!(
            log.events(),
            vec![
                GraphEvent::NodeAdded(source),
                GraphEvent::NodeAdded(sink),
                GraphEvent::ConnectionAdded(conn),
                GraphEvent::ConnectionAboutToBeRemoved(conn),
                GraphEvent::ConnectionRemoved(conn),
                GraphEvent::NodeAboutToBeRemoved(sink),
                GraphEvent::NodeRemoved(sink),
            ]
        );
    }

    #[test]
    fn test_listener_sees_committed_state() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();

        let seen = Rc::new(Cell::new(None));
        let seen_in_listener = Rc::clone(&seen);
        model.add_listener(move |event: &GraphEvent, model: &dyn FlowSceneModel| match event {
            GraphEvent::ConnectionAdded(id) => {
                let peers = model.node_port_connections(id.in_node, PortDirection::In, id.in_port);
                seen_in_listener.set(Some(peers.len()));
            }
            GraphEvent::ConnectionRemoved(id) => {
                let peers = model.node_port_connections(id.in_node, PortDirection::In, id.in_port);
                seen_in_listener.set(Some(peers.len()));
            }
            _ => {}
        });

        model.add_connection(source, 0, sink, 0).unwrap();
        assert_eq!(seen.get(), Some(1));
        model.remove_connection(source, 0, sink, 0).unwrap();
        assert_eq!(seen.get(), Some(0));
    }

    #[test]
    fn test_connection_primes_and_clears_consumer() {
        let mut model = model();
        let inbox = Inbox::default();
        let source = model.add_node_with_model(
            Box::new(StubModel::new("source").with_outputs(["decimal"]).with_output_value(0, 4.5)),
            Pos2::ZERO,
        );
        let sink = model.add_node_with_model(
            Box::new(StubModel::new("sink").with_inputs(["decimal"]).with_inbox(inbox.clone())),
            Pos2::ZERO,
        );

        model.add_connection(source, 0, sink, 0).unwrap();
        model.remove_connection(source, 0, sink, 0).unwrap();

        let received: Vec<Option<f64>> = inbox.take().iter().map(value).collect();
        assert_eq!(received, vec![Some(4.5), None]);
    }

    #[test]
    fn test_data_propagates_downstream() {
        let mut model = model();
        let inbox = Inbox::default();
        let head = model.add_node("relay", Pos2::ZERO).unwrap();
        let relay = model.add_node("relay", Pos2::ZERO).unwrap();
        let sink = model.add_node_with_model(
            Box::new(StubModel::new("sink").with_inputs(["decimal"]).with_inbox(inbox.clone())),
            Pos2::ZERO,
        );
        model.add_connection(head, 0, relay, 0).unwrap();
        model.add_connection(relay, 0, sink, 0).unwrap();
        inbox.take();

        model
            .update_node_model(head, |m| m.set_in_data(Some(DecimalData::shared(7.0)), 0))
            .unwrap();

        let received: Vec<Option<f64>> = inbox.take().iter().map(value).collect();
        assert_eq!(received, vec![Some(7.0)]);
    }

    #[test]
    fn test_validation_update_emits_event() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node_with_model(
            Box::new(StubModel::new("checked").with_inputs(["decimal"]).validating()),
            Pos2::ZERO,
        );
        assert_eq!(model.node_validation_state(sink), Some(NodeValidationState::Warning));

        let log = EventLog::default();
        model.add_listener(log.listener());
        let conn = model.add_connection(source, 0, sink, 0).unwrap();

        assert_eq!(model.node_validation_state(sink), Some(NodeValidationState::Valid));
        assert_eq!(
            log.events(),
            vec![GraphEvent::NodeValidationUpdated(sink), GraphEvent::ConnectionAdded(conn)]
        );
    }

    #[test]
    fn test_consumer_primed_before_connection_added() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node_with_model(
            Box::new(StubModel::new("checked").with_inputs(["decimal"]).validating()),
            Pos2::ZERO,
        );

        let seen = Rc::new(Cell::new(None));
        let seen_in_listener = Rc::clone(&seen);
        model.add_listener(move |event: &GraphEvent, model: &dyn FlowSceneModel| {
            if let GraphEvent::ConnectionAdded(id) = event {
                seen_in_listener.set(model.node_validation_state(id.in_node));
            }
        });

        model.add_connection(source, 0, sink, 0).unwrap();
        assert_eq!(seen.get(), Some(NodeValidationState::Valid));
    }

    /// Model whose input count is driven from the test
    struct Resizable {
        inputs: Rc<Cell<usize>>,
    }

    impl NodeDataModel for Resizable {
        fn name(&self) -> &str {
            "resizable"
        }

        fn port_count(&self, direction: PortDirection) -> usize {
            match direction {
                PortDirection::In => self.inputs.get(),
                PortDirection::Out => 0,
            }
        }

        fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
            NodeDataType::new("decimal", "Decimal")
        }

        fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
            None
        }

        fn set_in_data(&mut self, _data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
            ModelUpdate::none()
        }
    }

    #[test]
    fn test_port_shape_change_drops_vanished_connections() {
        let mut model = model();
        let inputs = Rc::new(Cell::new(2));
        let node = model.add_node_with_model(
            Box::new(Resizable { inputs: Rc::clone(&inputs) }),
            Pos2::ZERO,
        );
        let a = model.add_node("source", Pos2::ZERO).unwrap();
        let b = model.add_node("source", Pos2::ZERO).unwrap();
        model.add_connection(a, 0, node, 0).unwrap();
        let dropped = model.add_connection(b, 0, node, 1).unwrap();

        let log = EventLog::default();
        model.add_listener(log.listener());
        inputs.set(1);
        model
            .update_node_model(node, |_| ModelUpdate::none().with_ports_changed())
            .unwrap();

        assert_eq!(model.node_port_count(node, PortDirection::In), Some(1));
        assert_eq!(model.connection_count(), 1);
        assert!(model.node_port_connections(b, PortDirection::Out, 0).is_empty());
        assert_eq!(
            log.events(),
            vec![
                GraphEvent::ConnectionAboutToBeRemoved(dropped),
                GraphEvent::ConnectionRemoved(dropped),
                GraphEvent::NodePortUpdated(node),
            ]
        );
    }

    #[test]
    fn test_port_queries() {
        let mut model = model();
        let single = model.add_node("single", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();

        assert_eq!(
            model.node_port_connection_policy(single, PortDirection::Out, 0),
            Some(ConnectionPolicy::One)
        );
        assert_eq!(
            model.node_port_connection_policy(sink, PortDirection::In, 0),
            Some(ConnectionPolicy::One)
        );
        assert_eq!(
            model.node_port_data_type(sink, PortDirection::In, 0).map(|t| t.id),
            Some("decimal".to_string())
        );
        assert_eq!(model.node_port_data_type(sink, PortDirection::In, 1), None);
        assert_eq!(model.node_port_caption(sink, PortDirection::In, 0).as_deref(), Some("decimal"));
        assert!(model.node_port_connections(NodeId::new(), PortDirection::In, 0).is_empty());
    }

    #[test]
    fn test_clear_scene() {
        let mut model = model();
        let source = model.add_node("source", Pos2::ZERO).unwrap();
        let sink = model.add_node("sink", Pos2::ZERO).unwrap();
        model.add_connection(source, 0, sink, 0).unwrap();

        model.clear_scene().unwrap();

        assert_eq!(model.node_count(), 0);
        assert_eq!(model.connection_count(), 0);
    }
}
