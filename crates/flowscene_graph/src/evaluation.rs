// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency-ordered traversal.

use crate::graph::DataFlowModel;
use crate::model::FlowSceneModel;
use crate::node::{Node, NodeDataModel, NodeId};
use crate::port::PortDirection;
use indexmap::IndexSet;

/// Order nodes so every node comes after all nodes feeding its inputs.
///
/// Nodes without input connections come first, in enumeration order. The
/// remaining nodes are scanned repeatedly until each has been placed, or a
/// scan places nothing, which means the rest sit on a cycle.
pub fn dependency_order(model: &dyn FlowSceneModel) -> Result<Vec<NodeId>, CycleError> {
    let feeders = |id: NodeId| -> Vec<NodeId> {
        let count = model.node_port_count(id, PortDirection::In).unwrap_or(0);
        (0..count)
            .flat_map(|port| model.node_port_connections(id, PortDirection::In, port))
            .map(|(peer, _)| peer)
            .collect()
    };

    let mut visited: IndexSet<NodeId> = IndexSet::new();
    let mut pending: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    for id in model.node_ids() {
        let inputs = feeders(id);
        if inputs.is_empty() {
            visited.insert(id);
        } else {
            pending.push((id, inputs));
        }
    }

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|(id, inputs)| {
            if inputs.iter().all(|feeder| visited.contains(feeder)) {
                visited.insert(*id);
                false
            } else {
                true
            }
        });

        if pending.len() == before {
            let unresolved: Vec<NodeId> = pending.into_iter().map(|(id, _)| id).collect();
            tracing::warn!("Dependency order stopped: {} nodes sit on a cycle", unresolved.len());
            return Err(CycleError { unresolved });
        }
    }

    Ok(visited.into_iter().collect())
}

impl DataFlowModel {
    /// Visit every node in enumeration order
    pub fn iterate_over_nodes(&self, mut visitor: impl FnMut(&Node)) {
        for node in self.nodes() {
            visitor(node);
        }
    }

    /// Visit every node model in enumeration order
    pub fn iterate_over_node_data(&self, mut visitor: impl FnMut(&dyn NodeDataModel)) {
        for node in self.nodes() {
            visitor(node.model());
        }
    }

    /// Visit every node model, producers before consumers.
    ///
    /// Nothing is visited if the graph has a cycle.
    pub fn iterate_over_node_data_dependent_order(
        &self,
        mut visitor: impl FnMut(&dyn NodeDataModel),
    ) -> Result<(), CycleError> {
        for id in dependency_order(self)? {
            if let Some(node) = self.node(id) {
                visitor(node.model());
            }
        }
        Ok(())
    }
}

/// Nodes that could not be ordered because they depend on each other
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle through {} nodes", unresolved.len())]
pub struct CycleError {
    /// Nodes left unvisited, in enumeration order
    pub unresolved: Vec<NodeId>,
}
