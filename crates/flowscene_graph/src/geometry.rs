// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node layout used to hit-test ports in scene coordinates.

use crate::model::FlowSceneModel;
use crate::node::NodeId;
use crate::port::{PortDirection, PortIndex};
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Node layout dimensions, in scene units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Node width
    pub node_width: f32,
    /// Height of the caption header
    pub header_height: f32,
    /// Height of one port row
    pub port_height: f32,
    /// Distance from a port center that still counts as a hit
    pub port_hit_radius: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            header_height: 24.0,
            port_height: 22.0,
            port_hit_radius: 8.0,
        }
    }
}

impl GeometryConfig {
    /// Parse a layout from RON; missing fields keep their defaults
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

/// Answers where ports are in scene coordinates.
///
/// The connection-editing protocol only needs these two queries, so any
/// presentation layer can supply its own layout.
pub trait PortLocator {
    /// Port of `node` in `direction` whose hit area contains `point`
    fn port_under_point(
        &self,
        model: &dyn FlowSceneModel,
        node: NodeId,
        direction: PortDirection,
        point: Pos2,
    ) -> Option<PortIndex>;

    /// Scene position of a port's center
    fn port_scene_position(
        &self,
        model: &dyn FlowSceneModel,
        node: NodeId,
        direction: PortDirection,
        index: PortIndex,
    ) -> Option<Pos2>;
}

/// Fixed-width node layout: inputs on the left edge, outputs on the right
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeGeometry {
    config: GeometryConfig,
}

impl NodeGeometry {
    /// Create a layout from dimensions
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    /// Layout dimensions
    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Bounding box of a node
    pub fn node_rect(&self, model: &dyn FlowSceneModel, node: NodeId) -> Option<Rect> {
        let origin = model.node_location(node)?;
        let rows = model
            .node_port_count(node, PortDirection::In)?
            .max(model.node_port_count(node, PortDirection::Out)?);
        let height = self.config.header_height + rows as f32 * self.config.port_height;
        Some(Rect::from_min_size(origin, Vec2::new(self.config.node_width, height)))
    }

    fn port_position(&self, origin: Pos2, direction: PortDirection, index: PortIndex) -> Pos2 {
        let x = match direction {
            PortDirection::In => origin.x,
            PortDirection::Out => origin.x + self.config.node_width,
        };
        let y = origin.y
            + self.config.header_height
            + index as f32 * self.config.port_height
            + self.config.port_height / 2.0;
        Pos2::new(x, y)
    }
}

impl PortLocator for NodeGeometry {
    fn port_under_point(
        &self,
        model: &dyn FlowSceneModel,
        node: NodeId,
        direction: PortDirection,
        point: Pos2,
    ) -> Option<PortIndex> {
        let origin = model.node_location(node)?;
        let count = model.node_port_count(node, direction)?;
        let radius = self.config.port_hit_radius;

        (0..count)
            .map(|index| (index, self.port_position(origin, direction, index).distance(point)))
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    fn port_scene_position(
        &self,
        model: &dyn FlowSceneModel,
        node: NodeId,
        direction: PortDirection,
        index: PortIndex,
    ) -> Option<Pos2> {
        let origin = model.node_location(node)?;
        if index >= model.node_port_count(node, direction)? {
            return None;
        }
        Some(self.port_position(origin, direction, index))
    }
}
