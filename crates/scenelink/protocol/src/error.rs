//! Error types for the envelope protocol

use crate::envelope::OperationKind;
use scenelink_registry::RegistryError;
use thiserror::Error;

/// Errors reported by a viewer facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    #[error("Nothing is selected")]
    EmptySelection,

    #[error("Selection spans {0} structures, exactly one is required")]
    MultipleStructuresSelected(usize),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("Failed to load structure: {0}")]
    Load(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

/// Errors decoding or encoding an envelope
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Envelope names {name} but its data is tagged {class_name}")]
    KindMismatch {
        name: OperationKind,
        class_name: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while an operation executes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type OperationResult<T> = Result<T, OperationError>;
