//! Error types for the identity registry

use crate::keys::{ExternalKey, InternalKey, NodeKind};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A binding would map one side of the bijection to two keys
    #[error("Ambiguous reference: {internal} cannot be bound to {external}: {reason}")]
    AmbiguousReference {
        internal: InternalKey,
        external: ExternalKey,
        reason: String,
    },

    /// A brand-new reference appeared without a caller-supplied name
    #[error("Reference {internal} is new and no external id was supplied to name it")]
    UnnamedReference { internal: InternalKey },

    /// An internal key is bound to a node of a different kind
    #[error("Kind mismatch for {internal}: expected {expected}, found {found}")]
    KindMismatch {
        internal: InternalKey,
        expected: NodeKind,
        found: NodeKind,
    },

    /// Lookup by external key failed
    #[error("Unknown node: {0}")]
    UnknownNode(ExternalKey),

    /// A reference was expected to own exactly one structure
    #[error("Expected reference {reference} to own exactly one structure, found {count}")]
    StructureCount {
        reference: ExternalKey,
        count: usize,
    },
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
