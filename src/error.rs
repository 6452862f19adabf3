use thiserror::Error;

/// Errors raised while constructing or editing a workflow graph.
///
/// Every operation that returns one of these leaves the graph unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Slot '{0}' cannot be connected to itself")]
    SelfConnection(String),

    #[error("Slots '{first}' and '{second}' are both {direction} slots")]
    IncompatibleDirection {
        first: String,
        second: String,
        direction: String,
    },

    #[error("Slot '{first}' of type {first_type} cannot be connected to slot '{second}' of type {second_type}")]
    IncompatibleType {
        first: String,
        first_type: String,
        second: String,
        second_type: String,
    },

    #[error("Slots '{first}' and '{second}' are already connected")]
    DuplicateConnection { first: String, second: String },

    #[error("Input slot '{0}' already has a connection")]
    CapacityExceeded(String),

    #[error("Slot names must be unique, but '{name}' already exists on block '{block}'")]
    DuplicateSlotName { block: String, name: String },

    #[error("Block '{0}' not found in the workflow")]
    BlockNotFound(String),

    #[error("Slot '{0}' not found in the workflow")]
    SlotNotFound(String),

    #[error("Block '{parent}' cannot contain child blocks")]
    NotAContainer { parent: String },

    #[error("The workflow root block cannot be {0}")]
    RootBlock(&'static str),

    #[error("Block '{block}' cannot be moved into its own subtree")]
    CyclicMove { block: String },

    #[error("External slot '{slot}' can only belong to the workflow, not to block '{block}'")]
    ExternalSlotOutsideWorkflow { block: String, slot: String },

    #[error("Model class '{0}' is not registered")]
    UnknownModel(String),
}

/// Errors that can occur while lowering a workflow to source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("Block '{block}' of kind {kind} has no code generation support")]
    UnsupportedBlock { block: String, kind: String },

    #[error("'{0}' is not a valid class name")]
    InvalidClassName(String),

    #[error(
        "Time loop '{0}' has neither a connected max_dt slot nor a contained model to query for a time step"
    )]
    MissingTimeStepSource(String),
}

/// Errors that can occur while loading model definition files.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("Could not read model file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse model file '{path}': {message}")]
    Parse { path: String, message: String },
}

/// Errors that can occur while converting a workflow to or from JSON.
#[derive(Error, Debug, Clone)]
pub enum SerializationError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Failed to write workflow JSON: {0}")]
    JsonWriteError(String),

    #[error("The document does not contain a WorkflowBlock record")]
    MissingWorkflow,

    #[error("Could not access workflow file '{path}': {message}")]
    Io { path: String, message: String },
}

/// Errors raised by the in-process runtime backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("No native implementation registered for model class '{0}'")]
    MissingFactory(String),

    #[error("Time loop '{block}' computed a non-positive time step ({dt})")]
    NonPositiveTimeStep { block: String, dt: f64 },

    #[error("Expected a numeric value for '{slot}', but found {found}")]
    TypeMismatch { slot: String, found: String },

    #[error("Model '{model}' failed: {message}")]
    Model { model: String, message: String },

    #[error("Workflow has no input named '{0}'")]
    UnknownInput(String),

    #[error("Workflow has no output named '{0}'")]
    UnknownOutput(String),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
