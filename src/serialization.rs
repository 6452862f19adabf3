//! JSON persistence of a workflow as a flat list of typed records.
//!
//! Blocks reference their parent and slots their owner by uuid; links reference both
//! endpoint slots by uuid. Loading is forgiving: records that cannot be resolved are
//! logged and skipped.

use crate::block::{BlockId, BlockKind, ModelBlock, VariableKind};
use crate::error::SerializationError;
use crate::model::ModelRegistry;
use crate::slot::{DataSlotType, ObjectId, SlotKind, SlotSpec};
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fields shared by every block record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    pub model_classname: String,
    #[serde(default)]
    pub model_input_file_name: Option<String>,
    #[serde(default)]
    pub model_input_file_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantPropertyRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    #[serde(default)]
    pub value: Vec<f64>,
    #[serde(default)]
    pub property_id: String,
    #[serde(default)]
    pub value_type: String,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalQuantityRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatVariableRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomNameRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    #[serde(default)]
    pub variable_name: String,
    #[serde(rename = "type", default)]
    pub slot_type: DataSlotType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCodeRecord {
    #[serde(flatten)]
    pub block: BlockRecord,
    #[serde(default)]
    pub code_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub slot_type: DataSlotType,
    #[serde(default)]
    pub obj_type: Option<String>,
    #[serde(default)]
    pub obj_id: ObjectId,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub uuid: String,
    pub ds1_uuid: String,
    pub ds2_uuid: String,
}

/// One entry of the `elements` list, tagged by its `classname`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classname")]
pub enum Element {
    WorkflowBlock(BlockRecord),
    SequentialBlock(BlockRecord),
    TimeLoopBlock(BlockRecord),
    IfElseBlock(BlockRecord),
    ModelBlock(ModelRecord),
    ConstantPropertyBlock(ConstantPropertyRecord),
    ConstantPhysicalQuantityBlock(PhysicalQuantityRecord),
    FloatVariableBlock(FloatVariableRecord),
    CustomNameVariableBlock(CustomNameRecord),
    CustomPythonCodeBlock(CustomCodeRecord),
    InputDataSlot(SlotRecord),
    OutputDataSlot(SlotRecord),
    ExternalInputDataSlot(SlotRecord),
    ExternalOutputDataSlot(SlotRecord),
    DataLink(LinkRecord),
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    elements: &'a [Element],
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    elements: Vec<serde_json::Value>,
}

impl Element {
    fn block_record(&self) -> Option<&BlockRecord> {
        match self {
            Element::WorkflowBlock(b)
            | Element::SequentialBlock(b)
            | Element::TimeLoopBlock(b)
            | Element::IfElseBlock(b) => Some(b),
            Element::ModelBlock(r) => Some(&r.block),
            Element::ConstantPropertyBlock(r) => Some(&r.block),
            Element::ConstantPhysicalQuantityBlock(r) => Some(&r.block),
            Element::FloatVariableBlock(r) => Some(&r.block),
            Element::CustomNameVariableBlock(r) => Some(&r.block),
            Element::CustomPythonCodeBlock(r) => Some(&r.block),
            _ => None,
        }
    }

    fn slot_record(&self) -> Option<(SlotKind, &SlotRecord)> {
        match self {
            Element::InputDataSlot(s) => Some((SlotKind::Input, s)),
            Element::OutputDataSlot(s) => Some((SlotKind::Output, s)),
            Element::ExternalInputDataSlot(s) => Some((SlotKind::ExternalInput, s)),
            Element::ExternalOutputDataSlot(s) => Some((SlotKind::ExternalOutput, s)),
            _ => None,
        }
    }
}

/// Flattens the workflow into records: blocks, then slots, then links.
pub fn to_elements(workflow: &Workflow) -> Vec<Element> {
    let mut elements = Vec::new();

    for id in workflow.blocks_in_tree_order() {
        let Some(block) = workflow.block(id) else {
            continue;
        };
        let record = BlockRecord {
            uuid: block.uid.clone(),
            parent_uuid: block
                .parent()
                .and_then(|p| workflow.block(p))
                .map(|p| p.uid.clone()),
            name: Some(block.name.clone()),
        };
        elements.push(match &block.kind {
            BlockKind::Workflow => Element::WorkflowBlock(record),
            BlockKind::Sequential => Element::SequentialBlock(record),
            BlockKind::TimeLoop => Element::TimeLoopBlock(record),
            BlockKind::IfElse => Element::IfElseBlock(record),
            BlockKind::Model(model) => Element::ModelBlock(ModelRecord {
                block: record,
                model_classname: model.class_name.clone(),
                model_input_file_name: model.input_file.clone(),
                model_input_file_directory: model.input_directory.clone(),
            }),
            BlockKind::Variable(VariableKind::ConstantProperty {
                value,
                property_id,
                value_type,
                units,
            }) => Element::ConstantPropertyBlock(ConstantPropertyRecord {
                block: record,
                value: value.clone(),
                property_id: property_id.clone(),
                value_type: value_type.clone(),
                units: units.clone(),
            }),
            BlockKind::Variable(VariableKind::ConstantPhysicalQuantity { value, units }) => {
                Element::ConstantPhysicalQuantityBlock(PhysicalQuantityRecord {
                    block: record,
                    value: *value,
                    units: units.clone(),
                })
            }
            BlockKind::Variable(VariableKind::Float { value }) => {
                Element::FloatVariableBlock(FloatVariableRecord {
                    block: record,
                    value: *value,
                })
            }
            BlockKind::Variable(VariableKind::CustomName { name, slot_type }) => {
                Element::CustomNameVariableBlock(CustomNameRecord {
                    block: record,
                    variable_name: name.clone(),
                    slot_type: *slot_type,
                })
            }
            BlockKind::CustomCode { lines } => Element::CustomPythonCodeBlock(CustomCodeRecord {
                block: record,
                code_lines: lines.clone(),
            }),
        });
    }

    for id in workflow.slots_in_tree_order() {
        let Some(slot) = workflow.slot(id) else {
            continue;
        };
        let record = SlotRecord {
            uuid: slot.uid.clone(),
            parent_uuid: workflow.block(slot.owner).map(|b| b.uid.clone()),
            name: slot.name.clone(),
            slot_type: slot.slot_type,
            obj_type: slot.obj_type.clone(),
            obj_id: slot.obj_id.clone(),
            optional: slot.optional,
        };
        elements.push(match slot.kind {
            SlotKind::Input => Element::InputDataSlot(record),
            SlotKind::Output => Element::OutputDataSlot(record),
            SlotKind::ExternalInput => Element::ExternalInputDataSlot(record),
            SlotKind::ExternalOutput => Element::ExternalOutputDataSlot(record),
        });
    }

    for id in workflow.links() {
        let Some(link) = workflow.link(id) else {
            continue;
        };
        let uid_of = |slot| workflow.slot(slot).map(|s| s.uid.clone()).unwrap_or_default();
        elements.push(Element::DataLink(LinkRecord {
            uuid: link.uid.clone(),
            ds1_uuid: uid_of(link.source),
            ds2_uuid: uid_of(link.target),
        }));
    }

    elements
}

pub fn to_json(workflow: &Workflow) -> Result<String, SerializationError> {
    let elements = to_elements(workflow);
    serde_json::to_string_pretty(&Document {
        elements: &elements,
    })
    .map_err(|e| SerializationError::JsonWriteError(e.to_string()))
}

/// Rebuilds a workflow from a JSON document, resolving model blocks against `registry`.
pub fn from_json(json: &str, registry: ModelRegistry) -> Result<Workflow, SerializationError> {
    let raw: RawDocument = serde_json::from_str(json)
        .map_err(|e| SerializationError::JsonParseError(e.to_string()))?;

    let elements: Vec<Element> = raw
        .elements
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Element>(value) {
            Ok(element) => Some(element),
            Err(e) => {
                tracing::warn!("skipping unrecognized element: {}", e);
                None
            }
        })
        .collect();
    from_elements(&elements, registry)
}

pub fn from_elements(
    elements: &[Element],
    registry: ModelRegistry,
) -> Result<Workflow, SerializationError> {
    let root = elements
        .iter()
        .find_map(|e| match e {
            Element::WorkflowBlock(record) => Some(record),
            _ => None,
        })
        .ok_or(SerializationError::MissingWorkflow)?;
    let mut workflow = Workflow::with_root_uid(
        root.name.clone().unwrap_or_else(|| "MyWorkflow".to_string()),
        registry,
        Some(root.uuid.clone()),
    );

    restore_blocks(&mut workflow, elements);
    restore_slots(&mut workflow, elements);
    restore_links(&mut workflow, elements);

    tracing::info!(
        "loaded workflow '{}' with {} blocks",
        workflow.name(),
        workflow.blocks_in_tree_order().len()
    );
    Ok(workflow)
}

/// Attaches blocks pass by pass, so a child listed before its parent still resolves.
fn restore_blocks(workflow: &mut Workflow, elements: &[Element]) {
    let mut pending: Vec<&Element> = elements
        .iter()
        .filter(|e| e.block_record().is_some() && !matches!(e, Element::WorkflowBlock(_)))
        .collect();

    loop {
        let before = pending.len();
        pending.retain(|element| {
            let Some(record) = element.block_record() else {
                return false;
            };
            let parent = match &record.parent_uuid {
                Some(uid) => match workflow.block_by_uid(uid) {
                    Some(parent) => parent,
                    None => return true,
                },
                None => workflow.root(),
            };
            if let Err(e) = restore_block(workflow, parent, element, record) {
                tracing::warn!("skipping block '{}': {}", record.uuid, e);
            }
            false
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for element in pending {
        if let Some(record) = element.block_record() {
            tracing::warn!("skipping block '{}': parent not found", record.uuid);
        }
    }
}

fn restore_block(
    workflow: &mut Workflow,
    parent: BlockId,
    element: &Element,
    record: &BlockRecord,
) -> Result<BlockId, crate::error::GraphError> {
    let uid = Some(record.uuid.clone());
    let id = match element {
        Element::ModelBlock(model) => workflow.insert_model_block(
            parent,
            ModelBlock {
                class_name: model.model_classname.clone(),
                input_file: model.model_input_file_name.clone(),
                input_directory: model.model_input_file_directory.clone(),
            },
            uid,
        )?,
        other => {
            let kind = match other {
                Element::SequentialBlock(_) => BlockKind::Sequential,
                Element::TimeLoopBlock(_) => BlockKind::TimeLoop,
                Element::IfElseBlock(_) => BlockKind::IfElse,
                Element::ConstantPropertyBlock(r) => {
                    BlockKind::Variable(VariableKind::ConstantProperty {
                        value: r.value.clone(),
                        property_id: r.property_id.clone(),
                        value_type: r.value_type.clone(),
                        units: r.units.clone(),
                    })
                }
                Element::ConstantPhysicalQuantityBlock(r) => {
                    BlockKind::Variable(VariableKind::ConstantPhysicalQuantity {
                        value: r.value,
                        units: r.units.clone(),
                    })
                }
                Element::FloatVariableBlock(r) => {
                    BlockKind::Variable(VariableKind::Float { value: r.value })
                }
                Element::CustomNameVariableBlock(r) => {
                    BlockKind::Variable(VariableKind::CustomName {
                        name: r.variable_name.clone(),
                        slot_type: r.slot_type,
                    })
                }
                Element::CustomPythonCodeBlock(r) => BlockKind::CustomCode {
                    lines: r.code_lines.clone(),
                },
                _ => BlockKind::Sequential,
            };
            workflow.insert_block(parent, kind, uid)?
        }
    };
    if let (Some(name), Some(block)) = (&record.name, workflow.block_mut(id)) {
        block.name = name.clone();
    }
    Ok(id)
}

/// Matches slot records to the slots blocks already created, by owner and name, and
/// creates the rest.
fn restore_slots(workflow: &mut Workflow, elements: &[Element]) {
    for (kind, record) in elements.iter().filter_map(Element::slot_record) {
        let owner = record
            .parent_uuid
            .as_deref()
            .and_then(|uid| workflow.block_by_uid(uid));
        let Some(owner) = owner else {
            tracing::warn!("skipping slot '{}': owner not found", record.name);
            continue;
        };
        let obj_type = record
            .obj_type
            .clone()
            .filter(|t| !t.is_empty() && t != "None");

        if let Some(existing) = workflow.slot_by_name(owner, &record.name) {
            if let Some(slot) = workflow.slot_mut(existing) {
                slot.uid = record.uuid.clone();
                if record.slot_type != DataSlotType::Unknown {
                    slot.slot_type = record.slot_type;
                }
                if obj_type.is_some() {
                    slot.obj_type = obj_type;
                }
            }
            continue;
        }

        let mut spec = SlotSpec::new(&record.name, record.slot_type, kind)
            .optional(record.optional)
            .obj_id(record.obj_id.clone())
            .uid(&record.uuid);
        spec.obj_type = obj_type;
        if let Err(e) = workflow.add_slot(owner, spec) {
            tracing::warn!("skipping slot '{}': {}", record.name, e);
        }
    }
}

fn restore_links(workflow: &mut Workflow, elements: &[Element]) {
    for element in elements {
        let Element::DataLink(record) = element else {
            continue;
        };
        let ends = (
            workflow.slot_by_uid(&record.ds1_uuid),
            workflow.slot_by_uid(&record.ds2_uuid),
        );
        let (Some(a), Some(b)) = ends else {
            tracing::warn!("skipping link '{}': endpoint not found", record.uuid);
            continue;
        };
        // Rejections are logged by the workflow itself.
        let _ = workflow.connect_with_uid(a, b, Some(record.uuid.clone()));
    }
}

impl Workflow {
    pub fn to_json(&self) -> Result<String, SerializationError> {
        to_json(self)
    }

    pub fn from_json(json: &str, registry: ModelRegistry) -> Result<Self, SerializationError> {
        from_json(json, registry)
    }

    /// Writes the JSON document to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializationError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| SerializationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(
        path: impl AsRef<Path>,
        registry: ModelRegistry,
    ) -> Result<Self, SerializationError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| SerializationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json, registry)
    }
}
