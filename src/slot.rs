use crate::block::BlockId;
use crate::codegen::quote;
use crate::link::LinkId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Index of a data slot inside its [`Workflow`](crate::workflow::Workflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

/// The kind of value a slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSlotType {
    #[default]
    Unknown,
    Property,
    Field,
    Function,
    PhysicalQuantity,
    Int,
    Double,
    String,
    Scalar,
}

impl DataSlotType {
    pub const ALL: [DataSlotType; 9] = [
        DataSlotType::Unknown,
        DataSlotType::Property,
        DataSlotType::Field,
        DataSlotType::Function,
        DataSlotType::PhysicalQuantity,
        DataSlotType::Int,
        DataSlotType::Double,
        DataSlotType::String,
        DataSlotType::Scalar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSlotType::Unknown => "Unknown",
            DataSlotType::Property => "Property",
            DataSlotType::Field => "Field",
            DataSlotType::Function => "Function",
            DataSlotType::PhysicalQuantity => "PhysicalQuantity",
            DataSlotType::Int => "Int",
            DataSlotType::Double => "Double",
            DataSlotType::String => "String",
            DataSlotType::Scalar => "Scalar",
        }
    }
}

impl fmt::Display for DataSlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSlotType {
    type Err = String;

    /// Accepts `Field`, `field` and the qualified `DataSlotType.Field` spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.rsplit('.').next().unwrap_or(s).trim();
        DataSlotType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(bare))
            .ok_or_else(|| format!("unknown data slot type '{}'", s))
    }
}

impl TryFrom<String> for DataSlotType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataSlotType> for String {
    fn from(value: DataSlotType) -> Self {
        value.as_str().to_string()
    }
}

/// Direction of a slot as seen from inside the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotDirection {
    Input,
    Output,
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDirection::Input => write!(f, "input"),
            SlotDirection::Output => write!(f, "output"),
        }
    }
}

/// The four concrete slot variants, named as they appear in persisted documents.
///
/// An external input slot receives a value from inside the workflow and publishes it
/// as a workflow output; an external output slot feeds a workflow input to the blocks
/// inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Input,
    Output,
    ExternalInput,
    ExternalOutput,
}

impl SlotKind {
    pub fn new(direction: SlotDirection, external: bool) -> Self {
        match (direction, external) {
            (SlotDirection::Input, false) => SlotKind::Input,
            (SlotDirection::Output, false) => SlotKind::Output,
            (SlotDirection::Input, true) => SlotKind::ExternalInput,
            (SlotDirection::Output, true) => SlotKind::ExternalOutput,
        }
    }

    pub fn direction(&self) -> SlotDirection {
        match self {
            SlotKind::Input | SlotKind::ExternalInput => SlotDirection::Input,
            SlotKind::Output | SlotKind::ExternalOutput => SlotDirection::Output,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, SlotKind::ExternalInput | SlotKind::ExternalOutput)
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            SlotKind::Input => "InputDataSlot",
            SlotKind::Output => "OutputDataSlot",
            SlotKind::ExternalInput => "ExternalInputDataSlot",
            SlotKind::ExternalOutput => "ExternalOutputDataSlot",
        }
    }
}

/// Identifies a quantity on the model side, either by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Index(i64),
    Name(String),
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::Index(0)
    }
}

impl ObjectId {
    /// Renders the id as a target-language literal.
    pub fn to_code(&self) -> String {
        match self {
            ObjectId::Index(i) => i.to_string(),
            ObjectId::Name(name) => quote(name),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Index(i) => write!(f, "{}", i),
            ObjectId::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        ObjectId::Name(value.to_string())
    }
}

impl From<i64> for ObjectId {
    fn from(value: i64) -> Self {
        ObjectId::Index(value)
    }
}

/// A typed, named connection point owned by exactly one block.
#[derive(Debug, Clone)]
pub struct DataSlot {
    pub uid: String,
    pub owner: BlockId,
    pub name: String,
    pub slot_type: DataSlotType,
    pub optional: bool,
    pub kind: SlotKind,
    pub obj_type: Option<String>,
    pub obj_id: ObjectId,
    pub(crate) links: Vec<LinkId>,
    pub(crate) code_name: Option<String>,
}

impl DataSlot {
    pub(crate) fn from_spec(owner: BlockId, spec: SlotSpec) -> Self {
        let external = spec.kind.is_external();
        let obj_id = if external {
            ObjectId::Name(spec.name.clone())
        } else {
            spec.obj_id
        };
        Self {
            uid: spec.uid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            owner,
            optional: spec.optional
                || external
                || spec.kind.direction() == SlotDirection::Output,
            name: spec.name,
            slot_type: spec.slot_type,
            kind: spec.kind,
            obj_type: spec.obj_type,
            obj_id,
            links: Vec::new(),
            code_name: None,
        }
    }

    pub fn direction(&self) -> SlotDirection {
        self.kind.direction()
    }

    pub fn is_external(&self) -> bool {
        self.kind.is_external()
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn is_connected(&self) -> bool {
        !self.links.is_empty()
    }

    /// The maximum number of links, `None` meaning unlimited.
    pub fn max_connections(&self) -> Option<usize> {
        match self.direction() {
            SlotDirection::Input => Some(1),
            SlotDirection::Output => None,
        }
    }

    pub fn code_name(&self) -> Option<&str> {
        self.code_name.as_deref()
    }
}

/// Construction parameters for a new [`DataSlot`].
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub slot_type: DataSlotType,
    pub kind: SlotKind,
    pub optional: bool,
    pub obj_type: Option<String>,
    pub obj_id: ObjectId,
    pub uid: Option<String>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, slot_type: DataSlotType, kind: SlotKind) -> Self {
        Self {
            name: name.into(),
            slot_type,
            kind,
            optional: false,
            obj_type: None,
            obj_id: ObjectId::default(),
            uid: None,
        }
    }

    pub fn input(name: impl Into<String>, slot_type: DataSlotType) -> Self {
        Self::new(name, slot_type, SlotKind::Input)
    }

    pub fn output(name: impl Into<String>, slot_type: DataSlotType) -> Self {
        Self::new(name, slot_type, SlotKind::Output)
    }

    /// A workflow output: collects a value from inside the workflow.
    pub fn external_input(name: impl Into<String>, slot_type: DataSlotType) -> Self {
        Self::new(name, slot_type, SlotKind::ExternalInput)
    }

    /// A workflow input: feeds a value set from outside into the workflow.
    pub fn external_output(name: impl Into<String>, slot_type: DataSlotType) -> Self {
        Self::new(name, slot_type, SlotKind::ExternalOutput)
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

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_names_loosely() {
        assert_eq!("field".parse::<DataSlotType>(), Ok(DataSlotType::Field));
        assert_eq!(
            "DataSlotType.PhysicalQuantity".parse::<DataSlotType>(),
            Ok(DataSlotType::PhysicalQuantity)
        );
        assert!("tensor".parse::<DataSlotType>().is_err());
    }

    #[test]
    fn object_id_renders_as_literal() {
        assert_eq!(ObjectId::Index(3).to_code(), "3");
        assert_eq!(ObjectId::from("top").to_code(), "'top'");
    }
}
