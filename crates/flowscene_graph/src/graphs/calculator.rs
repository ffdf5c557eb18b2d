// SPDX-License-Identifier: MIT OR Apache-2.0
//! Calculator node set.
//!
//! A small set of decimal and integer nodes, with converters registered in
//! both directions so mismatched wires get a converter node inserted.

use crate::data::{NodeData, SharedNodeData};
use crate::node::{ModelPayload, ModelUpdate, NodeDataModel, NodeValidationState};
use crate::port::{ConnectionPolicy, NodeDataType, PortDirection, PortIndex};
use crate::registry::DataModelRegistry;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Decimal payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimalData(f64);

impl DecimalData {
    /// Type descriptor for decimal ports
    pub fn node_data_type() -> NodeDataType {
        NodeDataType::new("decimal", "Decimal")
    }

    /// Wrap a number as a shared payload
    pub fn shared(number: f64) -> SharedNodeData {
        Arc::new(Self(number))
    }

    /// The number
    pub fn number(&self) -> f64 {
        self.0
    }
}

impl NodeData for DecimalData {
    fn data_type(&self) -> NodeDataType {
        Self::node_data_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Integer payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerData(i64);

impl IntegerData {
    /// Type descriptor for integer ports
    pub fn node_data_type() -> NodeDataType {
        NodeDataType::new("integer", "Integer")
    }

    /// Wrap a number as a shared payload
    pub fn shared(number: i64) -> SharedNodeData {
        Arc::new(Self(number))
    }

    /// The number
    pub fn number(&self) -> i64 {
        self.0
    }
}

impl NodeData for IntegerData {
    fn data_type(&self) -> NodeDataType {
        Self::node_data_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decimal_input(data: &Option<SharedNodeData>) -> Option<f64> {
    data.as_deref()
        .and_then(|d| d.downcast_ref::<DecimalData>())
        .map(DecimalData::number)
}

fn integer_input(data: &Option<SharedNodeData>) -> Option<i64> {
    data.as_deref()
        .and_then(|d| d.downcast_ref::<IntegerData>())
        .map(IntegerData::number)
}

/// Constant decimal source
#[derive(Debug, Clone, Default)]
pub struct NumberSourceModel {
    number: Option<f64>,
}

impl NumberSourceModel {
    /// Model name
    pub const NAME: &'static str = "NumberSource";

    /// Set the number; the graph must be told through the returned update
    pub fn set_number(&mut self, number: f64) -> ModelUpdate {
        self.number = Some(number);
        ModelUpdate::data(0)
    }
}

impl NodeDataModel for NumberSourceModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> String {
        "Number Source".to_string()
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => 0,
            PortDirection::Out => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
        DecimalData::node_data_type()
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        self.number.map(DecimalData::shared)
    }

    fn set_in_data(&mut self, _data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        ModelUpdate::none()
    }

    fn save(&self) -> ModelPayload {
        let mut payload = ModelPayload::new();
        payload.insert("name".to_string(), Value::from(Self::NAME));
        if let Some(number) = self.number {
            payload.insert("number".to_string(), Value::from(number.to_string()));
        }
        payload
    }

    fn restore(&mut self, payload: &ModelPayload) {
        self.number = payload
            .get("number")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
    }
}

/// Constant integer source
#[derive(Debug, Clone, Default)]
pub struct IntegerSourceModel {
    number: Option<i64>,
}

impl IntegerSourceModel {
    /// Model name
    pub const NAME: &'static str = "IntegerSource";

    /// Set the number; the graph must be told through the returned update
    pub fn set_number(&mut self, number: i64) -> ModelUpdate {
        self.number = Some(number);
        ModelUpdate::data(0)
    }
}

impl NodeDataModel for IntegerSourceModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> String {
        "Integer Source".to_string()
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => 0,
            PortDirection::Out => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
        IntegerData::node_data_type()
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        self.number.map(IntegerData::shared)
    }

    fn set_in_data(&mut self, _data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        ModelUpdate::none()
    }

    fn save(&self) -> ModelPayload {
        let mut payload = ModelPayload::new();
        payload.insert("name".to_string(), Value::from(Self::NAME));
        if let Some(number) = self.number {
            payload.insert("number".to_string(), Value::from(number));
        }
        payload
    }

    fn restore(&mut self, payload: &ModelPayload) {
        self.number = payload.get("number").and_then(Value::as_i64);
    }
}

/// Shows the decimal it receives
#[derive(Debug, Clone, Default)]
pub struct NumberDisplayModel {
    number: Option<f64>,
}

impl NumberDisplayModel {
    /// Model name
    pub const NAME: &'static str = "NumberDisplay";

    /// Last received number
    pub fn number(&self) -> Option<f64> {
        self.number
    }
}

impl NodeDataModel for NumberDisplayModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> String {
        match self.number {
            Some(number) => format!("Result: {number}"),
            None => "Result".to_string(),
        }
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => 1,
            PortDirection::Out => 0,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
        DecimalData::node_data_type()
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        None
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        let was_valid = self.number.is_some();
        self.number = decimal_input(&data);
        if was_valid == self.number.is_some() {
            ModelUpdate::none()
        } else {
            ModelUpdate::none().with_validation_changed()
        }
    }

    fn validation_state(&self) -> NodeValidationState {
        if self.number.is_some() {
            NodeValidationState::Valid
        } else {
            NodeValidationState::Warning
        }
    }

    fn validation_message(&self) -> String {
        if self.number.is_some() {
            String::new()
        } else {
            "Missing or incorrect input".to_string()
        }
    }
}

/// Shows the integer it receives
#[derive(Debug, Clone, Default)]
pub struct IntegerDisplayModel {
    number: Option<i64>,
}

impl IntegerDisplayModel {
    /// Model name
    pub const NAME: &'static str = "IntegerDisplay";
}

impl NodeDataModel for IntegerDisplayModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> String {
        match self.number {
            Some(number) => format!("Result: {number}"),
            None => "Result".to_string(),
        }
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => 1,
            PortDirection::Out => 0,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
        IntegerData::node_data_type()
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        None
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        self.number = integer_input(&data);
        ModelUpdate::none()
    }
}

/// Adds two decimals
#[derive(Debug, Clone, Default)]
pub struct AdditionModel {
    lhs: Option<f64>,
    rhs: Option<f64>,
}

impl AdditionModel {
    /// Model name
    pub const NAME: &'static str = "Addition";
}

impl NodeDataModel for AdditionModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::In => 2,
            PortDirection::Out => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> NodeDataType {
        DecimalData::node_data_type()
    }

    fn port_caption(&self, direction: PortDirection, index: PortIndex) -> String {
        match (direction, index) {
            (PortDirection::In, 0) => "A".to_string(),
            (PortDirection::In, _) => "B".to_string(),
            (PortDirection::Out, _) => "Result".to_string(),
        }
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        Some(DecimalData::shared(self.lhs? + self.rhs?))
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, index: PortIndex) -> ModelUpdate {
        let number = decimal_input(&data);
        if index == 0 {
            self.lhs = number;
        } else {
            self.rhs = number;
        }
        ModelUpdate::data(0).with_validation_changed()
    }

    fn validation_state(&self) -> NodeValidationState {
        if self.lhs.is_some() && self.rhs.is_some() {
            NodeValidationState::Valid
        } else {
            NodeValidationState::Warning
        }
    }

    fn validation_message(&self) -> String {
        match self.validation_state() {
            NodeValidationState::Valid => String::new(),
            _ => "Missing or incorrect inputs".to_string(),
        }
    }
}

/// Truncates decimals to integers
#[derive(Debug, Clone, Default)]
pub struct DecimalToIntegerModel {
    number: Option<i64>,
}

impl DecimalToIntegerModel {
    /// Model name
    pub const NAME: &'static str = "DecimalToInteger";
}

impl NodeDataModel for DecimalToIntegerModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption_visible(&self) -> bool {
        false
    }

    fn port_count(&self, _direction: PortDirection) -> usize {
        1
    }

    fn data_type(&self, direction: PortDirection, _index: PortIndex) -> NodeDataType {
        match direction {
            PortDirection::In => DecimalData::node_data_type(),
            PortDirection::Out => IntegerData::node_data_type(),
        }
    }

    fn port_out_connection_policy(&self, _index: PortIndex) -> ConnectionPolicy {
        ConnectionPolicy::One
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        self.number.map(IntegerData::shared)
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        // saturating float-to-int cast
        self.number = decimal_input(&data).map(|n| n.trunc() as i64);
        ModelUpdate::data(0)
    }
}

/// Widens integers to decimals
#[derive(Debug, Clone, Default)]
pub struct IntegerToDecimalModel {
    number: Option<f64>,
}

impl IntegerToDecimalModel {
    /// Model name
    pub const NAME: &'static str = "IntegerToDecimal";
}

impl NodeDataModel for IntegerToDecimalModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption_visible(&self) -> bool {
        false
    }

    fn port_count(&self, _direction: PortDirection) -> usize {
        1
    }

    fn data_type(&self, direction: PortDirection, _index: PortIndex) -> NodeDataType {
        match direction {
            PortDirection::In => IntegerData::node_data_type(),
            PortDirection::Out => DecimalData::node_data_type(),
        }
    }

    fn port_out_connection_policy(&self, _index: PortIndex) -> ConnectionPolicy {
        ConnectionPolicy::One
    }

    fn out_data(&self, _index: PortIndex) -> Option<SharedNodeData> {
        self.number.map(DecimalData::shared)
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, _index: PortIndex) -> ModelUpdate {
        self.number = integer_input(&data).map(|n| n as f64);
        ModelUpdate::data(0)
    }
}

/// Create the calculator registry with all node types and converters
pub fn create_calculator_registry() -> DataModelRegistry {
    let mut registry = DataModelRegistry::new();

    registry.register::<NumberSourceModel>("Sources");
    registry.register::<IntegerSourceModel>("Sources");
    registry.register::<NumberDisplayModel>("Displays");
    registry.register::<IntegerDisplayModel>("Displays");
    registry.register::<AdditionModel>("Operators");
    registry.register::<DecimalToIntegerModel>("Type converters");
    registry.register::<IntegerToDecimalModel>("Type converters");

    registry.register_type_converter(
        &DecimalData::node_data_type(),
        &IntegerData::node_data_type(),
        DecimalToIntegerModel::NAME,
    );
    registry.register_type_converter(
        &IntegerData::node_data_type(),
        &DecimalData::node_data_type(),
        IntegerToDecimalModel::NAME,
    );

    registry
}
