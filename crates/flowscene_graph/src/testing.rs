// SPDX-License-Identifier: MIT OR Apache-2.0
//! Test doubles shared by the unit tests.

use crate::data::SharedNodeData;
use crate::graphs::calculator::DecimalData;
use crate::model::{FlowSceneModel, GraphEvent, GraphListener};
use crate::node::{ModelUpdate, ModelPayload, NodeDataModel, NodeValidationState};
use crate::port::{ConnectionPolicy, NodeDataType, PortDirection, PortIndex};
use crate::registry::DataModelRegistry;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Records every payload a stub receives
#[derive(Debug, Clone, Default)]
pub(crate) struct Inbox(Rc<RefCell<Vec<Option<SharedNodeData>>>>);

impl Inbox {
    pub(crate) fn take(&self) -> Vec<Option<SharedNodeData>> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Records graph notifications
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Rc<RefCell<Vec<GraphEvent>>>);

impl EventLog {
    pub(crate) fn listener(&self) -> impl GraphListener + 'static {
        let log = Rc::clone(&self.0);
        move |event: &GraphEvent, _model: &dyn FlowSceneModel| log.borrow_mut().push(*event)
    }

    pub(crate) fn events(&self) -> Vec<GraphEvent> {
        self.0.borrow().clone()
    }
}

/// Configurable node model
#[derive(Debug, Clone)]
pub(crate) struct StubModel {
    name: String,
    inputs: Vec<NodeDataType>,
    outputs: Vec<NodeDataType>,
    policies: Vec<ConnectionPolicy>,
    values: Vec<Option<SharedNodeData>>,
    relay: bool,
    validating: bool,
    has_input: bool,
    tag: Option<String>,
    inbox: Option<Inbox>,
}

fn data_type(id: &str) -> NodeDataType {
    NodeDataType::new(id, id)
}

impl StubModel {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            policies: Vec::new(),
            values: Vec::new(),
            relay: false,
            validating: false,
            has_input: false,
            tag: None,
            inbox: None,
        }
    }

    pub(crate) fn with_inputs<'a>(mut self, types: impl IntoIterator<Item = &'a str>) -> Self {
        self.inputs = types.into_iter().map(data_type).collect();
        self
    }

    pub(crate) fn with_outputs<'a>(mut self, types: impl IntoIterator<Item = &'a str>) -> Self {
        self.outputs = types.into_iter().map(data_type).collect();
        self.policies = vec![ConnectionPolicy::Many; self.outputs.len()];
        self.values = vec![None; self.outputs.len()];
        self
    }

    pub(crate) fn with_policy(mut self, port: PortIndex, policy: ConnectionPolicy) -> Self {
        self.policies[port] = policy;
        self
    }

    pub(crate) fn with_output_value(mut self, port: PortIndex, value: f64) -> Self {
        self.values[port] = Some(DecimalData::shared(value));
        self
    }

    /// Forward input 0 to output 0
    pub(crate) fn relaying(mut self) -> Self {
        self.relay = true;
        self
    }

    /// Warn while input 0 is empty
    pub(crate) fn validating(mut self) -> Self {
        self.validating = true;
        self
    }

    /// Extra state carried through save/restore
    pub(crate) fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub(crate) fn with_inbox(mut self, inbox: Inbox) -> Self {
        self.inbox = Some(inbox);
        self
    }
}

impl NodeDataModel for StubModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => self.inputs.len(),
            PortDirection::Out => self.outputs.len(),
        }
    }

    fn data_type(&self, direction: PortDirection, index: PortIndex) -> NodeDataType {
        match direction {
            PortDirection::In => self.inputs[index].clone(),
            PortDirection::Out => self.outputs[index].clone(),
        }
    }

    fn port_out_connection_policy(&self, index: PortIndex) -> ConnectionPolicy {
        self.policies[index]
    }

    fn out_data(&self, index: PortIndex) -> Option<SharedNodeData> {
        self.values.get(index).cloned().flatten()
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, index: PortIndex) -> ModelUpdate {
        if let Some(inbox) = &self.inbox {
            inbox.0.borrow_mut().push(data.clone());
        }

        let mut update = ModelUpdate::none();
        if self.validating && index == 0 && self.has_input != data.is_some() {
            update = update.with_validation_changed();
        }
        if index == 0 {
            self.has_input = data.is_some();
        }
        if self.relay && index == 0 && !self.values.is_empty() {
            self.values[0] = data;
            update.merge(ModelUpdate::data(0));
        }
        update
    }

    fn validation_state(&self) -> NodeValidationState {
        if self.validating && !self.has_input {
            NodeValidationState::Warning
        } else {
            NodeValidationState::Valid
        }
    }

    fn save(&self) -> ModelPayload {
        let mut payload = ModelPayload::new();
        payload.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(tag) = &self.tag {
            payload.insert("tag".to_string(), Value::String(tag.clone()));
        }
        payload
    }

    fn restore(&mut self, payload: &ModelPayload) {
        self.tag = payload.get("tag").and_then(Value::as_str).map(str::to_string);
    }
}

/// Registry with the stub node set used across tests.
///
/// - `source`: one decimal output (`Many`) holding 1.0
/// - `single`: one decimal output (`One`) holding 1.0
/// - `sink`: one decimal input
/// - `pair`: two decimal inputs
/// - `relay`: decimal in, decimal out, forwards its input
/// - `int_source`, `int_sink`: integer counterparts
/// - `to_int`, `to_decimal`: converters between the two types
pub(crate) fn stub_registry() -> DataModelRegistry {
    let mut registry = DataModelRegistry::new();
    registry.register_model("Sources", || {
        Box::new(StubModel::new("source").with_outputs(["decimal"]).with_output_value(0, 1.0))
    });
    registry.register_model("Sources", || {
        Box::new(
            StubModel::new("single")
                .with_outputs(["decimal"])
                .with_policy(0, ConnectionPolicy::One)
                .with_output_value(0, 1.0),
        )
    });
    registry.register_model("Sources", || Box::new(StubModel::new("int_source").with_outputs(["integer"])));
    registry.register_model("Sinks", || Box::new(StubModel::new("sink").with_inputs(["decimal"])));
    registry.register_model("Sinks", || Box::new(StubModel::new("pair").with_inputs(["decimal", "decimal"])));
    registry.register_model("Sinks", || Box::new(StubModel::new("int_sink").with_inputs(["integer"])));
    registry.register_model("Operators", || {
        Box::new(StubModel::new("relay").with_inputs(["decimal"]).with_outputs(["decimal"]).relaying())
    });
    registry.register_model("Converters", || {
        Box::new(StubModel::new("to_int").with_inputs(["decimal"]).with_outputs(["integer"]))
    });
    registry.register_model("Converters", || {
        Box::new(StubModel::new("to_decimal").with_inputs(["integer"]).with_outputs(["decimal"]))
    });
    registry.register_type_converter(&data_type("decimal"), &data_type("integer"), "to_int");
    registry.register_type_converter(&data_type("integer"), &data_type("decimal"), "to_decimal");
    registry
}
