//! Common test utilities for building model registries and workflows.
use simflow::model::ModelError;
use simflow::prelude::*;
use std::sync::{Arc, Mutex};

pub const THERMAL: &str = "thermal_nonstat";
pub const MECHANICAL: &str = "mechanical";

/// A thermal model: one required `Property` input, one `Field` output.
#[allow(dead_code)]
pub fn thermal_metadata() -> ModelMetadata {
    ModelMetadata {
        name: "Non-stationary thermal problem".to_string(),
        inputs: vec![
            SlotDescriptor::new("top_temperature", DataSlotType::Property)
                .obj_type("mupif.PropertyID.PID_Temperature")
                .obj_id(3i64),
        ],
        outputs: vec![
            SlotDescriptor::new("temperature", DataSlotType::Field)
                .obj_type("mupif.FieldID.FID_Temperature"),
        ],
        description: String::new(),
    }
}

/// A mechanical model consuming a temperature field.
#[allow(dead_code)]
pub fn mechanical_metadata() -> ModelMetadata {
    ModelMetadata {
        name: "Mechanical problem".to_string(),
        inputs: vec![SlotDescriptor::new("temperature", DataSlotType::Field)],
        outputs: vec![
            SlotDescriptor::new("displacement", DataSlotType::Field)
                .obj_type("mupif.FieldID.FID_Displacement"),
        ],
        description: String::new(),
    }
}

/// A registry holding the thermal and mechanical classes of module `models`.
#[allow(dead_code)]
pub fn create_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register(ModelClass {
        class_name: THERMAL.to_string(),
        import_statement: format!("from models import {}", THERMAL),
        metadata: thermal_metadata(),
    });
    registry.register(ModelClass {
        class_name: MECHANICAL.to_string(),
        import_statement: format!("from models import {}", MECHANICAL),
        metadata: mechanical_metadata(),
    });
    registry
}

/// Everything a native test model observed.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct ModelLog {
    pub steps: Vec<TimeStep>,
    pub received: Vec<(Value, ObjectId)>,
    pub terminated: usize,
}

/// A native thermal model with a constant critical time step.
#[allow(dead_code)]
pub struct FixedStepModel {
    metadata: ModelMetadata,
    critical_step: f64,
    log: Arc<Mutex<ModelLog>>,
}

impl Model for FixedStepModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn critical_time_step(&self) -> f64 {
        self.critical_step
    }

    fn solve_step(&mut self, step: &TimeStep) -> std::result::Result<(), ModelError> {
        self.log.lock().unwrap().steps.push(*step);
        Ok(())
    }

    fn set(&mut self, value: Value, obj_id: &ObjectId) -> std::result::Result<(), ModelError> {
        self.log.lock().unwrap().received.push((value, obj_id.clone()));
        Ok(())
    }

    fn get(
        &self,
        _obj_type: Option<&str>,
        time: f64,
        _obj_id: &ObjectId,
    ) -> std::result::Result<Value, ModelError> {
        Ok(Value::Scalar(time * 2.0))
    }

    fn terminate(&mut self) {
        self.log.lock().unwrap().terminated += 1;
    }
}

/// A registry whose thermal class is backed by [`FixedStepModel`], plus the shared log.
#[allow(dead_code)]
pub fn create_native_registry(critical_step: f64) -> (ModelRegistry, Arc<Mutex<ModelLog>>) {
    let log = Arc::new(Mutex::new(ModelLog::default()));
    let shared = Arc::clone(&log);
    let mut registry = ModelRegistry::new();
    registry.register_native(
        THERMAL,
        "from models import thermal_nonstat",
        move || -> Box<dyn Model> {
            Box::new(FixedStepModel {
                metadata: thermal_metadata(),
                critical_step,
                log: Arc::clone(&shared),
            })
        },
    );
    (registry, log)
}

#[allow(dead_code)]
pub fn quantity_block(workflow: &mut Workflow, parent: BlockId, value: f64) -> BlockId {
    workflow
        .add_block(
            parent,
            BlockKind::Variable(VariableKind::ConstantPhysicalQuantity {
                value,
                units: "s".to_string(),
            }),
        )
        .expect("Failed to add quantity block")
}

#[allow(dead_code)]
pub fn property_block(workflow: &mut Workflow, parent: BlockId) -> BlockId {
    workflow
        .add_block(
            parent,
            BlockKind::Variable(VariableKind::ConstantProperty {
                value: vec![0.0],
                property_id: "mupif.PropertyID.PID_Temperature".to_string(),
                value_type: "mupif.ValueType.Scalar".to_string(),
                units: "degC".to_string(),
            }),
        )
        .expect("Failed to add property block")
}

#[allow(dead_code)]
pub fn slot(workflow: &Workflow, block: BlockId, name: &str) -> SlotId {
    workflow
        .slot_by_name(block, name)
        .unwrap_or_else(|| panic!("block has no slot named '{}'", name))
}

/// Ids of the blocks in [`create_time_loop_workflow`].
#[allow(dead_code)]
pub struct TimeLoopFixture {
    pub workflow: Workflow,
    pub start: BlockId,
    pub target: BlockId,
    pub property: BlockId,
    pub time_loop: BlockId,
    pub thermal: BlockId,
}

/// `0 s -> 10 s` time loop around one thermal model fed by a constant property.
#[allow(dead_code)]
pub fn create_time_loop_workflow(registry: ModelRegistry) -> TimeLoopFixture {
    let mut workflow = Workflow::with_registry("MyWorkflow", registry);
    let root = workflow.root();

    let start = quantity_block(&mut workflow, root, 0.0);
    let target = quantity_block(&mut workflow, root, 10.0);
    let property = property_block(&mut workflow, root);
    let time_loop = workflow.add_block(root, BlockKind::TimeLoop).unwrap();
    let thermal = workflow.add_model_block(time_loop, THERMAL).unwrap();

    let connections = [
        ((start, "value"), (time_loop, "start_time")),
        ((target, "value"), (time_loop, "target_time")),
        ((property, "value"), (thermal, "top_temperature")),
    ];
    for ((from, from_slot), (to, to_slot)) in connections {
        let a = slot(&workflow, from, from_slot);
        let b = slot(&workflow, to, to_slot);
        workflow.connect(a, b).expect("Failed to connect fixture slots");
    }

    TimeLoopFixture {
        workflow,
        start,
        target,
        property,
        time_loop,
        thermal,
    }
}
