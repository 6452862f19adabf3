use crate::runtime::{TimeStep, Value};
use crate::slot::{DataSlotType, ObjectId, SlotSpec};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod loader;

pub use loader::{load_models_from_file, load_models_from_str};

/// Declaration of one model input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: DataSlotType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub obj_type: Option<String>,
    #[serde(default)]
    pub obj_id: ObjectId,
}

impl SlotDescriptor {
    pub fn new(name: impl Into<String>, slot_type: DataSlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            optional: false,
            description: String::new(),
            obj_type: None,
            obj_id: ObjectId::default(),
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn obj_type(mut self, obj_type: impl Into<String>) -> Self {
        self.obj_type = Some(obj_type.into());
        self
    }

    pub fn obj_id(mut self, obj_id: impl Into<ObjectId>) -> Self {
        self.obj_id = obj_id.into();
        self
    }

    fn to_spec(&self, input: bool) -> SlotSpec {
        let spec = if input {
            SlotSpec::input(&self.name, self.slot_type)
        } else {
            SlotSpec::output(&self.name, self.slot_type)
        };
        let spec = spec.optional(self.optional).obj_id(self.obj_id.clone());
        match &self.obj_type {
            Some(obj_type) => spec.obj_type(obj_type),
            None => spec,
        }
    }
}

/// The metadata a model class declares: the capability contract checked by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub inputs: Vec<SlotDescriptor>,
    pub outputs: Vec<SlotDescriptor>,
    #[serde(default)]
    pub description: String,
}

impl ModelMetadata {
    /// The first slot name declared twice across inputs and outputs.
    pub fn duplicate_slot_name(&self) -> Option<&str> {
        let mut seen = AHashSet::new();
        self.inputs
            .iter()
            .chain(&self.outputs)
            .map(|d| d.name.as_str())
            .find(|name| !seen.insert(*name))
    }

    pub(crate) fn slot_specs(&self) -> Vec<SlotSpec> {
        self.inputs
            .iter()
            .map(|d| d.to_spec(true))
            .chain(self.outputs.iter().map(|d| d.to_spec(false)))
            .collect()
    }
}

/// A discovered model class together with the statement that imports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelClass {
    pub class_name: String,
    pub import_statement: String,
    pub metadata: ModelMetadata,
}

/// The runtime capability surface of a simulation model.
///
/// Generated code calls the equivalent methods on the target-language objects; the
/// [`runtime`](crate::runtime) backend calls these directly.
pub trait Model {
    fn metadata(&self) -> &ModelMetadata;

    /// The largest stable step the model accepts from its current state.
    fn critical_time_step(&self) -> f64;

    fn solve_step(&mut self, step: &TimeStep) -> Result<(), ModelError>;

    fn set(&mut self, value: Value, obj_id: &ObjectId) -> Result<(), ModelError>;

    fn get(&self, obj_type: Option<&str>, time: f64, obj_id: &ObjectId)
    -> Result<Value, ModelError>;

    fn terminate(&mut self) {}
}

pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// Creates fresh native model instances for the runtime backend.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// Registry of model classes available to a workflow.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    classes: Vec<ModelClass>,
    factories: AHashMap<String, ModelFactory>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("classes", &self.classes)
            .field("native", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class; returns `false` if a class with the same name already exists.
    pub fn register(&mut self, class: ModelClass) -> bool {
        if self.contains(&class.class_name) {
            return false;
        }
        tracing::debug!("registered model class '{}'", class.class_name);
        self.classes.push(class);
        true
    }

    /// Registers a Rust implementation, reading its metadata from a fresh instance.
    pub fn register_native<F>(
        &mut self,
        class_name: &str,
        import_statement: &str,
        factory: F,
    ) -> bool
    where
        F: Fn() -> Box<dyn Model> + Send + Sync + 'static,
    {
        let metadata = factory().metadata().clone();
        let registered = self.register(ModelClass {
            class_name: class_name.to_string(),
            import_statement: import_statement.to_string(),
            metadata,
        });
        if registered {
            self.factories
                .insert(class_name.to_string(), Arc::new(factory));
        }
        registered
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.get(class_name).is_some()
    }

    pub fn get(&self, class_name: &str) -> Option<&ModelClass> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }

    pub fn factory(&self, class_name: &str) -> Option<&ModelFactory> {
        self.factories.get(class_name)
    }

    pub fn classes(&self) -> &[ModelClass] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.factories.clear();
    }
}
