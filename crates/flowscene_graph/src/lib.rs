// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow graph core for visual node editors.
//!
//! Nodes hold pluggable processing units with typed input and output ports;
//! connections carry payload handles from producers to consumers.
//!
//! ## Architecture
//!
//! - [`FlowSceneModel`] is the read/write contract a presentation layer
//!   talks to, with [`GraphEvent`] notifications after every committed write
//! - [`DataFlowModel`] is the reference container, built around an injected
//!   [`DataModelRegistry`]
//! - [`interaction`] implements drag-and-drop connection editing, including
//!   automatic converter insertion
//! - [`evaluation`] orders nodes producers first
//! - [`document`] saves and restores graphs as JSON or RON

pub mod port;
pub mod data;
pub mod node;
pub mod connection;
pub mod registry;
pub mod model;
pub mod graph;
pub mod geometry;
pub mod interaction;
pub mod evaluation;
pub mod document;
pub mod graphs;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ConnectionId};
pub use data::{NodeData, SharedNodeData};
pub use document::{DocumentError, SceneDocument};
pub use evaluation::{dependency_order, CycleError};
pub use geometry::{GeometryConfig, NodeGeometry, PortLocator};
pub use graph::{DataFlowModel, GraphError};
pub use interaction::{ConnectOutcome, DraggedConnection, InteractionError, NodeConnectionInteraction};
pub use model::{FlowSceneModel, GraphEvent, GraphListener};
pub use node::{ModelUpdate, Node, NodeDataModel, NodeId, NodeValidationState};
pub use port::{ConnectionPolicy, NodeDataType, PortAddress, PortDirection, PortIndex};
pub use registry::DataModelRegistry;
