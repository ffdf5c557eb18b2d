// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::connection::ConnectionId;
use crate::data::SharedNodeData;
use crate::port::{ConnectionPolicy, NodeDataType, PortDirection, PortIndex};
use egui::Pos2;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// Validation state reported by a node model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeValidationState {
    /// Node is fine
    #[default]
    Valid,
    /// Node works but something is off
    Warning,
    /// Node cannot produce output
    Error,
}

/// Type-specific part of a saved node; always carries a `"name"` entry
pub type ModelPayload = serde_json::Map<String, Value>;

/// What changed inside a node model after it was touched.
///
/// Returned by [`NodeDataModel::set_in_data`] and by host-side updates so the
/// graph can push new output data downstream and notify listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct ModelUpdate {
    /// Output ports whose data changed
    pub data_updated: Vec<PortIndex>,
    /// Port count or port types changed
    pub ports_changed: bool,
    /// Validation state or message changed
    pub validation_changed: bool,
}

impl ModelUpdate {
    /// Nothing changed
    pub fn none() -> Self {
        Self::default()
    }

    /// Output data changed on a single port
    pub fn data(port: PortIndex) -> Self {
        Self {
            data_updated: vec![port],
            ..Self::default()
        }
    }

    /// Output data changed on several ports
    pub fn data_on(ports: impl IntoIterator<Item = PortIndex>) -> Self {
        Self {
            data_updated: ports.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Mark the validation state as changed
    pub fn with_validation_changed(mut self) -> Self {
        self.validation_changed = true;
        self
    }

    /// Mark the port layout as changed
    pub fn with_ports_changed(mut self) -> Self {
        self.ports_changed = true;
        self
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.data_updated.is_empty() && !self.ports_changed && !self.validation_changed
    }

    /// Fold another update into this one
    pub fn merge(&mut self, other: ModelUpdate) {
        for port in other.data_updated {
            if !self.data_updated.contains(&port) {
                self.data_updated.push(port);
            }
        }
        self.ports_changed |= other.ports_changed;
        self.validation_changed |= other.validation_changed;
    }
}

/// A pluggable processing unit living inside a node.
///
/// The registry creates these by type identifier. Port counts are read when
/// the node is created and again whenever the model reports
/// [`ModelUpdate::ports_changed`].
pub trait NodeDataModel {
    /// Type identifier this model is registered under
    fn name(&self) -> &str;

    /// Display caption
    fn caption(&self) -> String {
        self.name().to_string()
    }

    /// Whether the caption is shown at all
    fn caption_visible(&self) -> bool {
        true
    }

    /// Number of ports in a direction
    fn port_count(&self, direction: PortDirection) -> usize;

    /// Data type of a port
    fn data_type(&self, direction: PortDirection, index: PortIndex) -> NodeDataType;

    /// Caption of a port
    fn port_caption(&self, direction: PortDirection, index: PortIndex) -> String {
        self.data_type(direction, index).name
    }

    /// Cardinality of an output port
    fn port_out_connection_policy(&self, _index: PortIndex) -> ConnectionPolicy {
        ConnectionPolicy::Many
    }

    /// Current payload on an output port
    fn out_data(&self, index: PortIndex) -> Option<SharedNodeData>;

    /// Receive a payload on an input port; `None` means the input went away
    fn set_in_data(&mut self, data: Option<SharedNodeData>, index: PortIndex) -> ModelUpdate;

    /// Validation state
    fn validation_state(&self) -> NodeValidationState {
        NodeValidationState::Valid
    }

    /// Validation message (empty when valid)
    fn validation_message(&self) -> String {
        String::new()
    }

    /// Whether the node may be resized by the presentation
    fn resizable(&self) -> bool {
        false
    }

    /// Save model state; the result must contain `"name"`
    fn save(&self) -> ModelPayload {
        let mut payload = ModelPayload::new();
        payload.insert("name".to_string(), Value::String(self.name().to_string()));
        payload
    }

    /// Restore model state saved by [`NodeDataModel::save`]
    fn restore(&mut self, _payload: &ModelPayload) {}
}

/// A node instance in the graph.
///
/// Port slots hold connection ids; the connections themselves live in the
/// owning model's connection table.
pub struct Node {
    id: NodeId,
    model: Box<dyn NodeDataModel>,
    position: Pos2,
    in_connections: Vec<IndexSet<ConnectionId>>,
    out_connections: Vec<IndexSet<ConnectionId>>,
}

impl Node {
    /// Wrap a model, sizing port slots from its declared port counts
    pub(crate) fn new(id: NodeId, model: Box<dyn NodeDataModel>, position: Pos2) -> Self {
        let in_count = model.port_count(PortDirection::In);
        let out_count = model.port_count(PortDirection::Out);
        Self {
            id,
            model,
            position,
            in_connections: vec![IndexSet::new(); in_count],
            out_connections: vec![IndexSet::new(); out_count],
        }
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The processing unit
    pub fn model(&self) -> &dyn NodeDataModel {
        self.model.as_ref()
    }

    pub(crate) fn model_mut(&mut self) -> &mut dyn NodeDataModel {
        self.model.as_mut()
    }

    /// Position in scene coordinates
    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Pos2) {
        self.position = position;
    }

    /// Number of port slots in a direction
    pub fn port_count(&self, direction: PortDirection) -> usize {
        self.slots(direction).len()
    }

    /// Connections attached to a port
    pub fn connections(&self, direction: PortDirection, index: PortIndex) -> Option<&IndexSet<ConnectionId>> {
        self.slots(direction).get(index)
    }

    pub(crate) fn connections_mut(
        &mut self,
        direction: PortDirection,
        index: PortIndex,
    ) -> Option<&mut IndexSet<ConnectionId>> {
        match direction {
            PortDirection::In => self.in_connections.get_mut(index),
            PortDirection::Out => self.out_connections.get_mut(index),
        }
    }

    /// Every connection touching this node, inputs first
    pub fn all_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.in_connections
            .iter()
            .chain(self.out_connections.iter())
            .flat_map(|slot| slot.iter().copied())
    }

    /// Check if any port holds a connection
    pub fn has_connections(&self) -> bool {
        self.all_connections().next().is_some()
    }

    /// Hand a payload to the model's input port
    pub(crate) fn propagate_data(&mut self, data: Option<SharedNodeData>, in_port: PortIndex) -> ModelUpdate {
        self.model.set_in_data(data, in_port)
    }

    /// Re-read port counts from the model. Vanished ports must already be empty.
    pub(crate) fn resize_slots(&mut self) {
        let in_count = self.model.port_count(PortDirection::In);
        let out_count = self.model.port_count(PortDirection::Out);
        debug_assert!(self.in_connections.iter().skip(in_count).all(IndexSet::is_empty));
        debug_assert!(self.out_connections.iter().skip(out_count).all(IndexSet::is_empty));
        self.in_connections.resize_with(in_count, IndexSet::new);
        self.out_connections.resize_with(out_count, IndexSet::new);
    }

    fn slots(&self, direction: PortDirection) -> &[IndexSet<ConnectionId>] {
        match direction {
            PortDirection::In => &self.in_connections,
            PortDirection::Out => &self.out_connections,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("position", &self.position)
            .field("in_connections", &self.in_connections)
            .field("out_connections", &self.out_connections)
            .finish()
    }
}
