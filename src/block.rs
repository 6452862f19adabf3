use crate::slot::{DataSlotType, SlotId, SlotSpec};

/// Index of a block inside its [`Workflow`](crate::workflow::Workflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

pub const START_TIME_SLOT: &str = "start_time";
pub const TARGET_TIME_SLOT: &str = "target_time";
pub const MAX_DT_SLOT: &str = "max_dt";
pub const VALUE_SLOT: &str = "value";

/// Settings of a block wrapping an externally supplied model class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelBlock {
    pub class_name: String,
    pub input_file: Option<String>,
    pub input_directory: Option<String>,
}

impl ModelBlock {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            input_file: None,
            input_directory: None,
        }
    }
}

/// Leaf blocks that materialize a literal into a named slot.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    ConstantProperty {
        value: Vec<f64>,
        property_id: String,
        value_type: String,
        units: String,
    },
    ConstantPhysicalQuantity {
        value: f64,
        units: String,
    },
    Float {
        value: f64,
    },
    /// Binds whatever is connected to its input to a user-chosen name.
    CustomName {
        name: String,
        slot_type: DataSlotType,
    },
}

impl VariableKind {
    fn value_slot(&self) -> SlotSpec {
        match self {
            VariableKind::ConstantProperty { .. } => {
                SlotSpec::output(VALUE_SLOT, DataSlotType::Property)
            }
            VariableKind::ConstantPhysicalQuantity { .. } => {
                SlotSpec::output(VALUE_SLOT, DataSlotType::PhysicalQuantity)
            }
            VariableKind::Float { .. } => SlotSpec::output(VALUE_SLOT, DataSlotType::Double),
            VariableKind::CustomName { slot_type, .. } => {
                SlotSpec::input(VALUE_SLOT, *slot_type).optional(true)
            }
        }
    }
}

/// The closed set of block variants making up a workflow tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// The root of every workflow.
    Workflow,
    Sequential,
    TimeLoop,
    Model(ModelBlock),
    Variable(VariableKind),
    /// Verbatim user code, emitted without checking.
    CustomCode { lines: Vec<String> },
    /// Placeholder for conditional execution; it cannot be lowered.
    IfElse,
}

impl BlockKind {
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BlockKind::Workflow | BlockKind::Sequential | BlockKind::TimeLoop | BlockKind::IfElse
        )
    }

    /// The record name used in persisted documents.
    pub fn class_name(&self) -> &'static str {
        match self {
            BlockKind::Workflow => "WorkflowBlock",
            BlockKind::Sequential => "SequentialBlock",
            BlockKind::TimeLoop => "TimeLoopBlock",
            BlockKind::Model(_) => "ModelBlock",
            BlockKind::Variable(VariableKind::ConstantProperty { .. }) => "ConstantPropertyBlock",
            BlockKind::Variable(VariableKind::ConstantPhysicalQuantity { .. }) => {
                "ConstantPhysicalQuantityBlock"
            }
            BlockKind::Variable(VariableKind::Float { .. }) => "FloatVariableBlock",
            BlockKind::Variable(VariableKind::CustomName { .. }) => "CustomNameVariableBlock",
            BlockKind::CustomCode { .. } => "CustomPythonCodeBlock",
            BlockKind::IfElse => "IfElseBlock",
        }
    }

    /// Prefix of the counter-generated code identifier.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            BlockKind::Workflow => "workflow_",
            BlockKind::Sequential => "sequential_",
            BlockKind::TimeLoop => "timeloop_",
            BlockKind::Model(_) => "model_",
            BlockKind::Variable(VariableKind::ConstantProperty { .. }) => "constant_property_",
            BlockKind::Variable(VariableKind::ConstantPhysicalQuantity { .. }) => {
                "constant_physical_quantity_"
            }
            BlockKind::Variable(VariableKind::Float { .. }) => "float_variable_",
            BlockKind::Variable(VariableKind::CustomName { .. }) => "variable_",
            BlockKind::CustomCode { .. } => "custom_code_",
            BlockKind::IfElse => "if_else_",
        }
    }

    /// Slots every block of this kind is created with. Model slots come from the registry.
    pub fn default_slots(&self) -> Vec<SlotSpec> {
        match self {
            BlockKind::TimeLoop => vec![
                SlotSpec::input(START_TIME_SLOT, DataSlotType::PhysicalQuantity),
                SlotSpec::input(TARGET_TIME_SLOT, DataSlotType::PhysicalQuantity),
                SlotSpec::input(MAX_DT_SLOT, DataSlotType::PhysicalQuantity).optional(true),
            ],
            BlockKind::Variable(variable) => vec![variable.value_slot()],
            _ => Vec::new(),
        }
    }
}

/// A node of the execution tree.
#[derive(Debug, Clone)]
pub struct Block {
    pub uid: String,
    pub name: String,
    pub kind: BlockKind,
    pub(crate) parent: Option<BlockId>,
    pub(crate) children: Vec<BlockId>,
    pub(crate) slots: Vec<SlotId>,
    pub(crate) code_name: Option<String>,
}

impl Block {
    pub(crate) fn new(kind: BlockKind, parent: Option<BlockId>, uid: Option<String>) -> Self {
        Self {
            uid: uid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: kind.class_name().to_string(),
            kind,
            parent,
            children: Vec::new(),
            slots: Vec::new(),
            code_name: None,
        }
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn code_name(&self) -> Option<&str> {
        self.code_name.as_deref()
    }

    pub fn as_model(&self) -> Option<&ModelBlock> {
        match &self.kind {
            BlockKind::Model(model) => Some(model),
            _ => None,
        }
    }
}
