// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene documents.
//!
//! A [`SceneDocument`] is the in-memory form of a saved graph. JSON is the
//! canonical text form; RON carries the same content.

use crate::graph::{DataFlowModel, GraphError};
use crate::model::FlowSceneModel;
use crate::node::{ModelPayload, NodeDataModel, NodeId};
use crate::port::{ConnectionPolicy, PortDirection, PortIndex};
use egui::Pos2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A saved graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Nodes, in enumeration order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Connections, in creation order
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// A saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Model state; `name` holds the registered model name
    pub model: ModelPayload,
    /// Node position
    pub position: PositionRecord,
}

impl NodeRecord {
    /// Registered model name stored in the payload
    pub fn model_name(&self) -> Option<&str> {
        self.model.get("name").and_then(Value::as_str)
    }
}

/// A saved position.
///
/// Graph positions are `f32`; values that need more precision than that are
/// rounded on restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// X
    pub x: f64,
    /// Y
    pub y: f64,
}

impl From<Pos2> for PositionRecord {
    fn from(pos: Pos2) -> Self {
        Self {
            x: widen(pos.x),
            y: widen(pos.y),
        }
    }
}

/// Widen through the shortest decimal form, so `0.1_f32` saves as `0.1`
fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or_else(|_| f64::from(value))
}

impl From<PositionRecord> for Pos2 {
    fn from(record: PositionRecord) -> Self {
        Pos2::new(record.x as f32, record.y as f32)
    }
}

/// A saved connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Consumer node
    pub in_id: NodeId,
    /// Consumer input port
    pub in_index: PortIndex,
    /// Producer node
    pub out_id: NodeId,
    /// Producer output port
    pub out_index: PortIndex,
}

impl SceneDocument {
    /// Parse a JSON document
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the document as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a RON document
    pub fn from_ron(text: &str) -> Result<Self, DocumentError> {
        Ok(ron::from_str(text)?)
    }

    /// Write the document as pretty-printed RON
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

impl DataFlowModel {
    /// Snapshot the graph as a document
    pub fn save(&self) -> SceneDocument {
        let nodes = self
            .nodes()
            .map(|node| NodeRecord {
                id: node.id(),
                model: node.model().save(),
                position: node.position().into(),
            })
            .collect();

        let connections = self
            .connections()
            .map(|connection| connection.id())
            .filter(|id| self.has_node(id.out_node) && self.has_node(id.in_node))
            .map(|id| ConnectionRecord {
                in_id: id.in_node,
                in_index: id.in_port,
                out_id: id.out_node,
                out_index: id.out_port,
            })
            .collect();

        SceneDocument { nodes, connections }
    }

    /// Add the nodes and connections of a document to the graph.
    ///
    /// The whole document is checked before the graph is touched. Document
    /// ids are kept when they are free in this graph; otherwise a fresh id is
    /// used. The returned map goes from document id to graph id.
    pub fn restore(&mut self, document: &SceneDocument) -> Result<HashMap<NodeId, NodeId>, DocumentError> {
        let models = self.instantiate(document)?;
        self.insert_document(document, models)
    }

    /// Serialize the graph to JSON bytes
    pub fn save_to_memory(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec_pretty(&self.save())?)
    }

    /// Replace the graph with one read from JSON bytes.
    ///
    /// The current scene is only cleared once the new one is known to load.
    pub fn load_from_memory(&mut self, bytes: &[u8]) -> Result<HashMap<NodeId, NodeId>, DocumentError> {
        let document: SceneDocument = serde_json::from_slice(bytes)?;
        let models = self.instantiate(&document)?;
        self.clear_scene()?;
        self.insert_document(&document, models)
    }

    /// Create and restore every node model, then check the connections.
    /// Leaves the graph untouched.
    fn instantiate(&self, document: &SceneDocument) -> Result<Vec<Box<dyn NodeDataModel>>, DocumentError> {
        let mut seen: HashSet<NodeId> = HashSet::with_capacity(document.nodes.len());
        let mut models: Vec<Box<dyn NodeDataModel>> = Vec::with_capacity(document.nodes.len());

        for record in &document.nodes {
            let name = record
                .model_name()
                .ok_or(DocumentError::MissingModelName(record.id))?;
            let mut model = self
                .registry()
                .create(name)
                .ok_or_else(|| DocumentError::UnknownModel(name.to_string()))?;
            model.restore(&record.model);

            if !seen.insert(record.id) {
                return Err(DocumentError::DuplicateNode(record.id));
            }
            models.push(model);
        }

        check_connections(document, &models)?;
        Ok(models)
    }

    fn insert_document(
        &mut self,
        document: &SceneDocument,
        models: Vec<Box<dyn NodeDataModel>>,
    ) -> Result<HashMap<NodeId, NodeId>, DocumentError> {
        let ids: HashMap<NodeId, NodeId> = document
            .nodes
            .iter()
            .map(|record| {
                let id = if self.has_node(record.id) {
                    NodeId::new()
                } else {
                    record.id
                };
                (record.id, id)
            })
            .collect();

        for (record, model) in document.nodes.iter().zip(models) {
            self.insert_node(ids[&record.id], model, record.position.into());
        }
        for record in &document.connections {
            self.add_connection(
                ids[&record.out_id],
                record.out_index,
                ids[&record.in_id],
                record.in_index,
            )?;
        }

        tracing::debug!(
            "Restored {} nodes and {} connections",
            document.nodes.len(),
            document.connections.len()
        );
        Ok(ids)
    }
}

/// Structural checks a document's connections must pass before restore
fn check_connections(
    document: &SceneDocument,
    models: &[Box<dyn NodeDataModel>],
) -> Result<(), DocumentError> {
    let by_id: HashMap<NodeId, &dyn NodeDataModel> = document
        .nodes
        .iter()
        .zip(models)
        .map(|(record, model)| (record.id, model.as_ref()))
        .collect();

    let mut seen: HashSet<ConnectionRecord> = HashSet::new();
    let mut inputs: HashSet<(NodeId, PortIndex)> = HashSet::new();
    let mut outputs: HashMap<(NodeId, PortIndex), usize> = HashMap::new();

    for record in &document.connections {
        let invalid = |reason: &str| DocumentError::InvalidConnection {
            connection: *record,
            reason: reason.to_string(),
        };

        let (Some(producer), Some(consumer)) = (by_id.get(&record.out_id), by_id.get(&record.in_id)) else {
            return Err(DocumentError::DanglingConnection(*record));
        };
        if record.out_id == record.in_id {
            return Err(invalid("self-loop"));
        }
        if record.out_index >= producer.port_count(PortDirection::Out) {
            return Err(invalid("output port out of range"));
        }
        if record.in_index >= consumer.port_count(PortDirection::In) {
            return Err(invalid("input port out of range"));
        }
        if !seen.insert(*record) {
            return Err(invalid("duplicate connection"));
        }
        if !inputs.insert((record.in_id, record.in_index)) {
            return Err(invalid("input port already connected"));
        }

        let fan_out = outputs.entry((record.out_id, record.out_index)).or_default();
        if producer.port_out_connection_policy(record.out_index) == ConnectionPolicy::One && *fan_out > 0 {
            return Err(invalid("output port takes a single connection"));
        }
        *fan_out += 1;
    }
    Ok(())
}

/// Error reading, writing or restoring a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON parse error
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON write error
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    /// Node record without a model name
    #[error("Node {0} has no model name")]
    MissingModelName(NodeId),

    /// Model name not in the registry
    #[error("No registered model with name {0}")]
    UnknownModel(String),

    /// Two node records share an id
    #[error("Node {0} appears more than once")]
    DuplicateNode(NodeId),

    /// Connection to a node not in the document
    #[error("Connection {}:{} -> {}:{} references a missing node", .0.out_id, .0.out_index, .0.in_id, .0.in_index)]
    DanglingConnection(ConnectionRecord),

    /// Connection breaking a graph rule
    #[error("Connection {}:{} -> {}:{} is invalid: {reason}", .connection.out_id, .connection.out_index, .connection.in_id, .connection.in_index)]
    InvalidConnection {
        /// Offending record
        connection: ConnectionRecord,
        /// Rule it breaks
        reason: String,
    },

    /// The graph rejected a change
    #[error(transparent)]
    Graph(#[from] GraphError),
}
