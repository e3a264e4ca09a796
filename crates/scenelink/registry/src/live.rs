//! The viewer's live hierarchy, as handed to reconciliation
//!
//! These are plain views built by a viewer facade on demand. They carry internal
//! keys and object handles only; the registry decides which external keys they get.

use crate::keys::{InternalKey, ObjectHandle};
use serde::{Deserialize, Serialize};

/// A loaded structure and the reference that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStructure {
    /// Internal key of the owning reference
    pub reference_key: InternalKey,
    pub key: InternalKey,
    /// Identifies the underlying loaded dataset
    pub data_id: Option<String>,
    pub object: ObjectHandle,
    pub components: Vec<LiveComponent>,
}

/// A logical grouping inside a structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveComponent {
    pub key: InternalKey,
    /// Engine-assigned grouping label, may be empty
    pub group_key: String,
    pub object: ObjectHandle,
    pub representations: Vec<LiveRepresentation>,
}

/// A rendered view of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRepresentation {
    pub key: InternalKey,
    /// Display-style label such as `cartoon`
    pub name: String,
    pub object: ObjectHandle,
}
