// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port addressing, data type descriptors and cardinality rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a port within one direction of a node
pub type PortIndex = usize;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port (consumer side of a connection)
    In,
    /// Output port (producer side of a connection)
    Out,
}

impl PortDirection {
    /// The direction on the other end of a connection
    pub fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("in"),
            Self::Out => f.write_str("out"),
        }
    }
}

/// A port on some node, addressed by direction and index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    /// Port direction
    pub direction: PortDirection,
    /// Port index within that direction
    pub index: PortIndex,
}

impl PortAddress {
    /// Address an input port
    pub fn input(index: PortIndex) -> Self {
        Self {
            direction: PortDirection::In,
            index,
        }
    }

    /// Address an output port
    pub fn output(index: PortIndex) -> Self {
        Self {
            direction: PortDirection::Out,
            index,
        }
    }
}

/// Data type carried by a port.
///
/// Two ports are compatible when their identifiers are equal; the display
/// name is only for captions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDataType {
    /// Type identifier used for compatibility checks
    pub id: String,
    /// Human readable name
    pub name: String,
}

impl NodeDataType {
    /// Create a new data type descriptor
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Check if data of this type can flow into a port of `other` type
    pub fn is_compatible(&self, other: &NodeDataType) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for NodeDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// How many connections a port accepts.
///
/// Output ports declare their own policy; input ports are always `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// At most one connection
    One,
    /// Any number of connections (fan-out)
    #[default]
    Many,
}

impl ConnectionPolicy {
    /// Whether a port with this policy accepts another connection
    /// given how many it already holds
    pub fn accepts(self, existing: usize) -> bool {
        match self {
            Self::One => existing == 0,
            Self::Many => true,
        }
    }
}
