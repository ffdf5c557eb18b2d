// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payloads that flow along connections.
//!
//! The graph never inspects payloads; it only hands shared handles from a
//! producer's output port to every consumer wired to it.

use crate::port::NodeDataType;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A payload produced by a node's output port
pub trait NodeData: Any + Debug + Send + Sync {
    /// Type descriptor of this payload
    fn data_type(&self) -> NodeDataType;

    /// Access as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Shared payload handle passed between ports
pub type SharedNodeData = Arc<dyn NodeData>;

impl dyn NodeData {
    /// Downcast to a concrete payload type
    pub fn downcast_ref<T: NodeData>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
