//! In-process execution of a workflow against native [`Model`] implementations.
//!
//! The simulation follows the generated program step for step: variables publish their
//! literal, models pull every connected input before solving, and time loops step with
//! the same clamping and termination rule.

use crate::block::{
    BlockId, BlockKind, MAX_DT_SLOT, START_TIME_SLOT, TARGET_TIME_SLOT, VALUE_SLOT, VariableKind,
};
use crate::error::{CodegenError, RuntimeError};
use crate::model::{Model, ModelRegistry};
use crate::slot::{ObjectId, SlotDirection, SlotId, SlotKind};
use crate::workflow::Workflow;
use ahash::AHashMap;

mod time_loop;
mod value;

pub use time_loop::{TimeLoopState, TimeStep};
pub use value::Value;

/// What a completed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Iterations over all time loops.
    pub time_steps: usize,
}

/// Time context of the block currently executing.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    time: Option<f64>,
    step: Option<TimeStep>,
}

/// A workflow bound to live model instances.
pub struct Simulation<'w> {
    workflow: &'w Workflow,
    models: AHashMap<BlockId, Box<dyn Model>>,
    bound: AHashMap<BlockId, Value>,
    inputs: AHashMap<SlotId, Value>,
    tolerance: f64,
    summary: RunSummary,
    terminated: bool,
}

impl<'w> Simulation<'w> {
    /// Instantiates every model block of `workflow` through the factories of `registry`.
    pub fn new(workflow: &'w Workflow, registry: &ModelRegistry) -> Result<Self, RuntimeError> {
        let mut models = AHashMap::new();
        for id in workflow.models_within(workflow.root()) {
            let Some(model) = workflow.block(id).and_then(|b| b.as_model()) else {
                continue;
            };
            let factory = registry
                .factory(&model.class_name)
                .ok_or_else(|| RuntimeError::MissingFactory(model.class_name.clone()))?;
            models.insert(id, factory());
        }
        tracing::debug!("instantiated {} models", models.len());

        Ok(Self {
            workflow,
            models,
            bound: AHashMap::new(),
            inputs: AHashMap::new(),
            tolerance: 1e-6,
            summary: RunSummary::default(),
            terminated: false,
        })
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The live instance behind a model block.
    pub fn model(&self, block: BlockId) -> Option<&dyn Model> {
        self.models.get(&block).map(|m| m.as_ref())
    }

    /// Binds a workflow input by its object id.
    pub fn set_input(&mut self, obj_id: &str, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .find_external(SlotKind::ExternalOutput, obj_id)
            .ok_or_else(|| RuntimeError::UnknownInput(obj_id.to_string()))?;
        self.inputs.insert(slot, value);
        Ok(())
    }

    /// Reads a workflow output by its object id.
    pub fn output(&self, obj_id: &str, time: f64) -> Result<Value, RuntimeError> {
        let slot = self
            .find_external(SlotKind::ExternalInput, obj_id)
            .ok_or_else(|| RuntimeError::UnknownOutput(obj_id.to_string()))?;
        self.linked_value(slot, Scope {
            time: Some(time),
            step: None,
        })
    }

    fn find_external(&self, kind: SlotKind, obj_id: &str) -> Option<SlotId> {
        let wanted = ObjectId::from(obj_id);
        self.workflow
            .external_slots(kind.direction())
            .into_iter()
            .find(|id| {
                self.workflow
                    .slot(*id)
                    .is_some_and(|s| s.kind == kind && s.obj_id == wanted)
            })
    }

    /// Minimum critical step over the models placed directly in the workflow.
    pub fn critical_time_step(&self) -> Option<f64> {
        self.workflow
            .children(self.workflow.root())
            .iter()
            .filter_map(|id| self.models.get(id))
            .map(|m| m.critical_time_step())
            .reduce(f64::min)
    }

    /// Runs the whole tree once, as the standalone program does.
    pub fn run(&mut self) -> Result<RunSummary, RuntimeError> {
        self.summary = RunSummary::default();
        let root = self.workflow.root();
        self.execute(root, Scope::default())?;
        tracing::info!("simulation finished after {} time steps", self.summary.time_steps);
        Ok(self.summary)
    }

    /// Runs the tree for a single externally driven step, as the class form does.
    pub fn solve_step(&mut self, step: &TimeStep) -> Result<(), RuntimeError> {
        let root = self.workflow.root();
        self.execute(root, Scope {
            time: Some(step.time),
            step: Some(*step),
        })
    }

    /// Terminates every model once, in tree order.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        for id in self.workflow.models_within(self.workflow.root()) {
            if let Some(model) = self.models.get_mut(&id) {
                model.terminate();
            }
        }
        self.terminated = true;
    }

    fn execute(&mut self, id: BlockId, scope: Scope) -> Result<(), RuntimeError> {
        let workflow = self.workflow;
        let Some(block) = workflow.block(id) else {
            return Ok(());
        };

        match &block.kind {
            BlockKind::IfElse => Err(CodegenError::UnsupportedBlock {
                block: block.name.clone(),
                kind: block.kind.class_name().to_string(),
            }
            .into()),
            BlockKind::Workflow | BlockKind::Sequential => {
                for child in block.children() {
                    self.execute(*child, scope)?;
                }
                Ok(())
            }
            BlockKind::TimeLoop => self.time_loop(id, scope),
            BlockKind::Model(model) => {
                for slot_id in block.slots() {
                    let Some(slot) = workflow.slot(*slot_id) else {
                        continue;
                    };
                    if slot.direction() != SlotDirection::Input || !slot.is_connected() {
                        continue;
                    }
                    let value = self.linked_value(*slot_id, scope)?;
                    if let Some(instance) = self.models.get_mut(&id) {
                        instance
                            .set(value, &slot.obj_id)
                            .map_err(|e| model_error(&model.class_name, e))?;
                    }
                }
                let step = scope.step.unwrap_or_default();
                if let Some(instance) = self.models.get_mut(&id) {
                    instance
                        .solve_step(&step)
                        .map_err(|e| model_error(&model.class_name, e))?;
                }
                Ok(())
            }
            BlockKind::Variable(VariableKind::CustomName { .. }) => {
                if let Some(slot) = workflow.slot_by_name(id, VALUE_SLOT) {
                    let value = self.linked_value(slot, scope)?;
                    self.bound.insert(id, value);
                }
                Ok(())
            }
            BlockKind::Variable(_) => Ok(()),
            BlockKind::CustomCode { .. } => {
                tracing::warn!("custom code of '{}' is not executed in-process", block.name);
                Ok(())
            }
        }
    }

    fn time_loop(&mut self, id: BlockId, scope: Scope) -> Result<(), RuntimeError> {
        let workflow = self.workflow;
        let name = workflow
            .block(id)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        let children = workflow.children(id).to_vec();
        let contained = workflow.models_within(id);
        let max_dt = workflow
            .slot_by_name(id, MAX_DT_SLOT)
            .filter(|s| workflow.slot(*s).is_some_and(|s| s.is_connected()));
        if max_dt.is_none() && contained.is_empty() {
            return Err(CodegenError::MissingTimeStepSource(name).into());
        }

        let start = self.time_input(id, START_TIME_SLOT, scope)?;
        let target = self.time_input(id, TARGET_TIME_SLOT, scope)?;
        let mut state = TimeLoopState::new(start, target, self.tolerance);

        while state.is_running() {
            let mut candidates = Vec::with_capacity(contained.len() + 1);
            if let Some(slot) = max_dt {
                candidates.push(self.numeric(slot, MAX_DT_SLOT, scope)?);
            }
            candidates.extend(
                contained
                    .iter()
                    .filter_map(|m| self.models.get(m))
                    .map(|m| m.critical_time_step()),
            );
            let dt = candidates.into_iter().fold(f64::INFINITY, f64::min);
            if dt.is_nan() || dt <= 0.0 || dt.is_infinite() {
                return Err(RuntimeError::NonPositiveTimeStep {
                    block: name.clone(),
                    dt,
                });
            }

            let step = state.advance(dt);
            tracing::debug!("time loop '{}' step {} at t={}", name, step.number, step.time);
            self.summary.time_steps += 1;
            let inner = Scope {
                time: Some(step.time),
                step: Some(step),
            };
            for child in &children {
                self.execute(*child, inner)?;
            }
        }
        Ok(())
    }

    fn time_input(&self, block: BlockId, slot: &str, scope: Scope) -> Result<f64, RuntimeError> {
        match self.workflow.slot_by_name(block, slot) {
            Some(id) => self.numeric(id, slot, scope),
            None => Err(RuntimeError::TypeMismatch {
                slot: slot.to_string(),
                found: "None".to_string(),
            }),
        }
    }

    fn numeric(&self, slot: SlotId, label: &str, scope: Scope) -> Result<f64, RuntimeError> {
        let value = self.linked_value(slot, scope)?;
        value.as_f64().ok_or_else(|| RuntimeError::TypeMismatch {
            slot: label.to_string(),
            found: value.type_name().to_string(),
        })
    }

    /// The value on the other end of an input-direction slot.
    fn linked_value(&self, slot: SlotId, scope: Scope) -> Result<Value, RuntimeError> {
        match self.workflow.linked_slot(slot) {
            Some(source) => self.read_output(source, scope),
            None => Ok(Value::None),
        }
    }

    fn read_output(&self, slot: SlotId, scope: Scope) -> Result<Value, RuntimeError> {
        let Some(data_slot) = self.workflow.slot(slot) else {
            return Ok(Value::None);
        };
        let Some(owner) = self.workflow.block(data_slot.owner) else {
            return Ok(Value::None);
        };

        match &owner.kind {
            BlockKind::Model(model) => match self.models.get(&data_slot.owner) {
                Some(instance) => instance
                    .get(
                        data_slot.obj_type.as_deref(),
                        scope.time.unwrap_or_default(),
                        &data_slot.obj_id,
                    )
                    .map_err(|e| model_error(&model.class_name, e)),
                None => Ok(Value::None),
            },
            BlockKind::Variable(variable) => Ok(match variable {
                VariableKind::ConstantProperty {
                    value,
                    property_id,
                    units,
                    ..
                } => Value::Property {
                    values: value.clone(),
                    property_id: property_id.clone(),
                    units: units.clone(),
                },
                VariableKind::ConstantPhysicalQuantity { value, units } => {
                    Value::quantity(*value, units.clone())
                }
                VariableKind::Float { value } => Value::Scalar(*value),
                VariableKind::CustomName { .. } => self
                    .bound
                    .get(&data_slot.owner)
                    .cloned()
                    .unwrap_or_default(),
            }),
            BlockKind::Workflow if data_slot.is_external() => {
                Ok(self.inputs.get(&slot).cloned().unwrap_or_default())
            }
            _ => Ok(Value::None),
        }
    }
}

impl Drop for Simulation<'_> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn model_error(class_name: &str, error: crate::model::ModelError) -> RuntimeError {
    RuntimeError::Model {
        model: class_name.to_string(),
        message: error.to_string(),
    }
}
