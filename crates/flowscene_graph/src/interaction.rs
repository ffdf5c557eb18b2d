// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive connection editing.
//!
//! A [`DraggedConnection`] is a wire with at most one loose end. When it is
//! dropped on a node, [`NodeConnectionInteraction`] decides whether the drop
//! is legal and performs it, inserting a converter node when the two port
//! types differ but the registry knows how to adapt them.

use crate::connection::ConnectionId;
use crate::geometry::PortLocator;
use crate::graph::GraphError;
use crate::model::FlowSceneModel;
use crate::node::NodeId;
use crate::port::{ConnectionPolicy, NodeDataType, PortAddress, PortDirection, PortIndex};
use egui::Pos2;

/// A connection being edited by the user
#[derive(Debug, Clone, PartialEq)]
pub struct DraggedConnection {
    out_end: Option<(NodeId, PortIndex)>,
    in_end: Option<(NodeId, PortIndex)>,
    /// Scene position of the loose end
    end_point: Pos2,
}

impl DraggedConnection {
    /// Start dragging a new wire out of a port
    pub fn from_port(node: NodeId, direction: PortDirection, index: PortIndex, end_point: Pos2) -> Self {
        let end = Some((node, index));
        let (out_end, in_end) = match direction {
            PortDirection::Out => (end, None),
            PortDirection::In => (None, end),
        };
        Self {
            out_end,
            in_end,
            end_point,
        }
    }

    /// Pick up an existing connection; detach one end with [`Self::disconnect`]
    pub fn from_connection(id: ConnectionId, end_point: Pos2) -> Self {
        Self {
            out_end: Some((id.out_node, id.out_port)),
            in_end: Some((id.in_node, id.in_port)),
            end_point,
        }
    }

    /// Attached endpoint in a direction
    pub fn end(&self, direction: PortDirection) -> Option<(NodeId, PortIndex)> {
        match direction {
            PortDirection::Out => self.out_end,
            PortDirection::In => self.in_end,
        }
    }

    /// Direction of the loose end, if exactly one end is loose
    pub fn required_port(&self) -> Option<PortDirection> {
        match (self.out_end, self.in_end) {
            (Some(_), None) => Some(PortDirection::In),
            (None, Some(_)) => Some(PortDirection::Out),
            _ => None,
        }
    }

    /// The end that stays put while the other one is dragged
    pub fn fixed_end(&self) -> Option<(NodeId, PortAddress)> {
        let direction = self.required_port()?.opposite();
        self.end(direction)
            .map(|(node, index)| (node, PortAddress { direction, index }))
    }

    /// Scene position of the loose end
    pub fn end_point(&self) -> Pos2 {
        self.end_point
    }

    /// Move the loose end
    pub fn set_end_point(&mut self, point: Pos2) {
        self.end_point = point;
    }

    /// Data type carried by the attached end
    pub fn data_type(&self, model: &dyn FlowSceneModel) -> Option<NodeDataType> {
        let (node, port) = self.fixed_end()?;
        model.node_port_data_type(node, port.direction, port.index)
    }

    /// Detach one end of a fully attached connection.
    ///
    /// The whole edge is removed from the model; the wire then dangles from
    /// the end that stayed attached.
    pub fn disconnect(&mut self, model: &mut dyn FlowSceneModel, end: PortDirection) -> Result<(), GraphError> {
        let (Some((out_node, out_port)), Some((in_node, in_port))) = (self.out_end, self.in_end) else {
            return Err(GraphError::Inconsistent("disconnect needs both ends attached".to_string()));
        };

        model.remove_connection(out_node, out_port, in_node, in_port)?;
        match end {
            PortDirection::Out => self.out_end = None,
            PortDirection::In => self.in_end = None,
        }
        Ok(())
    }
}

/// Port a dragged connection can be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCandidate {
    /// Port on the candidate node, in the dragged connection's required direction
    pub port_index: PortIndex,
    /// Converter model to insert, if the port types differ
    pub converter: Option<String>,
}

/// What a successful drop created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The two ports were wired together
    Direct(ConnectionId),
    /// A converter node was inserted in between.
    ///
    /// Rewiring is best effort: a side that could not be wired is `None`
    /// and the converter node stays in the graph.
    Converted {
        /// The new converter node
        converter: NodeId,
        /// Producer to converter
        upstream: Option<ConnectionId>,
        /// Converter to consumer
        downstream: Option<ConnectionId>,
    },
}

/// Drop of a dragged connection onto a candidate node
pub struct NodeConnectionInteraction<'a> {
    node: NodeId,
    connection: &'a DraggedConnection,
    locator: &'a dyn PortLocator,
}

impl<'a> NodeConnectionInteraction<'a> {
    /// Create an interaction between a dragged connection and a node
    pub fn new(node: NodeId, connection: &'a DraggedConnection, locator: &'a dyn PortLocator) -> Self {
        Self {
            node,
            connection,
            locator,
        }
    }

    /// Check whether the connection can be attached at `point`.
    ///
    /// Nothing is mutated.
    pub fn can_connect(&self, model: &dyn FlowSceneModel, point: Pos2) -> Result<ConnectCandidate, InteractionError> {
        let required = self
            .connection
            .required_port()
            .ok_or(InteractionError::NoDanglingEnd)?;
        if !model.has_node(self.node) {
            return Err(InteractionError::NodeNotFound(self.node));
        }

        let port_index = self
            .locator
            .port_under_point(model, self.node, required, point)
            .ok_or(InteractionError::NoPortUnderPoint)?;

        let occupied = !model
            .node_port_connections(self.node, required, port_index)
            .is_empty();
        let policy = model
            .node_port_connection_policy(self.node, required, port_index)
            .unwrap_or(ConnectionPolicy::One);
        if occupied && policy == ConnectionPolicy::One {
            return Err(InteractionError::PortOccupied {
                node: self.node,
                index: port_index,
            });
        }

        let dragged = self
            .connection
            .data_type(model)
            .ok_or(InteractionError::NoDanglingEnd)?;
        let candidate = model
            .node_port_data_type(self.node, required, port_index)
            .ok_or(InteractionError::NoPortUnderPoint)?;

        if dragged.is_compatible(&candidate) {
            return Ok(ConnectCandidate {
                port_index,
                converter: None,
            });
        }

        // converters are looked up producer to consumer
        let (from, to) = match required {
            PortDirection::In => (dragged, candidate),
            PortDirection::Out => (candidate, dragged),
        };
        match model.converter_node(&from, &to) {
            Some(converter) => Ok(ConnectCandidate {
                port_index,
                converter: Some(converter),
            }),
            None => Err(InteractionError::IncompatibleTypes { from, to }),
        }
    }

    /// Attach the connection at `point`, inserting a converter node if needed
    pub fn try_connect(&self, model: &mut dyn FlowSceneModel, point: Pos2) -> Result<ConnectOutcome, InteractionError> {
        let candidate = self.can_connect(&*model, point)?;
        let (fixed_node, fixed) = self
            .connection
            .fixed_end()
            .ok_or(InteractionError::NoDanglingEnd)?;

        let (producer, consumer) = match fixed.direction {
            PortDirection::Out => ((fixed_node, fixed.index), (self.node, candidate.port_index)),
            PortDirection::In => ((self.node, candidate.port_index), (fixed_node, fixed.index)),
        };

        let Some(converter_model) = candidate.converter else {
            let id = model.add_connection(producer.0, producer.1, consumer.0, consumer.1)?;
            return Ok(ConnectOutcome::Direct(id));
        };

        let position = self.midpoint(&*model, producer, consumer).unwrap_or(point);
        let converter = model.add_node(&converter_model, position)?;
        tracing::debug!("Inserted converter {converter_model} ({converter}) between {producer:?} and {consumer:?}");

        // the converter feeds the consumer first, then gets fed
        let downstream = connect_tolerant(model, (converter, 0), consumer);
        let upstream = connect_tolerant(model, producer, (converter, 0));

        Ok(ConnectOutcome::Converted {
            converter,
            upstream,
            downstream,
        })
    }

    fn midpoint(
        &self,
        model: &dyn FlowSceneModel,
        producer: (NodeId, PortIndex),
        consumer: (NodeId, PortIndex),
    ) -> Option<Pos2> {
        let from = self
            .locator
            .port_scene_position(model, producer.0, PortDirection::Out, producer.1)?;
        let to = self
            .locator
            .port_scene_position(model, consumer.0, PortDirection::In, consumer.1)?;
        Some(from.lerp(to, 0.5))
    }
}

fn connect_tolerant(
    model: &mut dyn FlowSceneModel,
    producer: (NodeId, PortIndex),
    consumer: (NodeId, PortIndex),
) -> Option<ConnectionId> {
    match model.add_connection(producer.0, producer.1, consumer.0, consumer.1) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(
                "Converter rewire {}:{} -> {}:{} failed: {err}",
                producer.0,
                producer.1,
                consumer.0,
                consumer.1
            );
            None
        }
    }
}

/// Why a dragged connection cannot be attached
#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    /// Both ends are attached, or neither is
    #[error("Connection has no dangling end")]
    NoDanglingEnd,

    /// No port of the required direction under the pointer
    #[error("No port under the pointer")]
    NoPortUnderPoint,

    /// Port takes a single connection and already has one
    #[error("Port {index} on node {node} is already connected")]
    PortOccupied {
        /// Node
        node: NodeId,
        /// Port index
        index: PortIndex,
    },

    /// Types differ and no converter is registered
    #[error("Cannot connect {from} to {to}: no converter registered")]
    IncompatibleTypes {
        /// Producer side type
        from: NodeDataType,
        /// Consumer side type
        to: NodeDataType,
    },

    /// Candidate node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The model rejected the edit
    #[error(transparent)]
    Graph(#[from] GraphError),
}
