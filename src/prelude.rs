//! Prelude module for convenient imports
//!
//! Re-exports the types needed to build, check, generate and run a workflow.

// Graph
pub use crate::block::{Block, BlockId, BlockKind, ModelBlock, VariableKind};
pub use crate::link::{DataLink, LinkId};
pub use crate::slot::{DataSlot, DataSlotType, ObjectId, SlotDirection, SlotId, SlotKind, SlotSpec};
pub use crate::workflow::{ConsistencyIssue, Workflow};

// Models
pub use crate::model::{
    Model, ModelClass, ModelMetadata, ModelRegistry, SlotDescriptor, load_models_from_file,
    load_models_from_str,
};

// Code generation and execution
pub use crate::codegen::{CodeForm, CodeGenerator, GeneratorOptions, render};
pub use crate::runtime::{RunSummary, Simulation, TimeStep, Value};

// Error types
pub use crate::error::{CodegenError, GraphError, LoadError, RuntimeError, SerializationError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
