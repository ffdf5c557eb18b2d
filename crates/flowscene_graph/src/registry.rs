// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node model factories and type converters.
//!
//! A registry is handed to each graph model at construction, so several
//! graphs with different node sets can live side by side.

use crate::node::NodeDataModel;
use crate::port::NodeDataType;
use indexmap::IndexMap;
use std::fmt;

/// Creates a fresh node model instance
pub type ModelFactory = Box<dyn Fn() -> Box<dyn NodeDataModel> + Send + Sync>;

/// Registry of available node models
pub struct DataModelRegistry {
    /// Factories by model name
    models: IndexMap<String, ModelFactory>,
    /// Category by model name
    categories: IndexMap<String, String>,
    /// Converter model name by (source type id, destination type id)
    converters: IndexMap<(String, String), String>,
}

impl DataModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            models: IndexMap::new(),
            categories: IndexMap::new(),
            converters: IndexMap::new(),
        }
    }

    /// Register a model factory under the name its models report.
    ///
    /// Returns `false` and keeps the earlier factory if the name is taken.
    pub fn register_model<F>(&mut self, category: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Box<dyn NodeDataModel> + Send + Sync + 'static,
    {
        let name = factory().name().to_string();
        if self.models.contains_key(&name) {
            tracing::warn!("Model {name} is already registered, ignoring");
            return false;
        }
        self.categories.insert(name.clone(), category.into());
        self.models.insert(name, Box::new(factory));
        true
    }

    /// Register a default-constructible model type
    pub fn register<T>(&mut self, category: impl Into<String>) -> bool
    where
        T: NodeDataModel + Default + 'static,
    {
        self.register_model(category, || Box::new(T::default()))
    }

    /// Register a converter model for data flowing from `from` into `to`
    pub fn register_type_converter(
        &mut self,
        from: &NodeDataType,
        to: &NodeDataType,
        converter_model: impl Into<String>,
    ) {
        let converter_model = converter_model.into();
        if !self.contains(&converter_model) {
            tracing::warn!("Converter {converter_model} registered before its model");
        }
        self.converters
            .insert((from.id.clone(), to.id.clone()), converter_model);
    }

    /// Create a model by name
    pub fn create(&self, name: &str) -> Option<Box<dyn NodeDataModel>> {
        self.models.get(name).map(|factory| factory())
    }

    /// Check if a model name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Registered model names, in registration order
    pub fn registered_model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Category a model was registered under
    pub fn category(&self, name: &str) -> Option<&str> {
        self.categories.get(name).map(String::as_str)
    }

    /// Distinct categories, in first-registration order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for category in self.categories.values() {
            if !seen.contains(&category.as_str()) {
                seen.push(category);
            }
        }
        seen
    }

    /// Model names in a category
    pub fn models_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> {
        self.categories
            .iter()
            .filter(move |(_, c)| c.as_str() == category)
            .map(|(name, _)| name.as_str())
    }

    /// Converter model for data flowing from `from` into `to`
    pub fn type_converter(&self, from: &NodeDataType, to: &NodeDataType) -> Option<&str> {
        self.converters
            .get(&(from.id.clone(), to.id.clone()))
            .map(String::as_str)
    }
}

impl Default for DataModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("categories", &self.categories)
            .field("converters", &self.converters)
            .finish()
    }
}
