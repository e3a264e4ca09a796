//! Scenelink identity registry
//!
//! Keeps a stable, externally addressable key for every node of the viewer's
//! four-level scene hierarchy:
//! - `Reference` (named by the caller)
//! - `Structure`
//! - `Component`
//! - `Representation`
//!
//! The viewer owns the internal keys and may recreate the objects behind them at
//! any time. Reconciliation walks the viewer's live hierarchy and binds every
//! internal key to exactly one external key.

#![deny(unsafe_code)]

pub mod error;
pub mod keys;
pub mod live;
pub mod nodes;
pub mod reconcile;
pub mod registry;
pub mod snapshot;

pub use error::{RegistryError, RegistryResult};
pub use keys::{ExternalKey, InternalKey, NodeKind, ObjectHandle, EXTERNAL_KEY_LENGTH};
pub use live::{LiveComponent, LiveRepresentation, LiveStructure};
pub use nodes::{Component, Node, Reference, Representation, Structure};
pub use reconcile::ReconcileReport;
pub use registry::IdentityRegistry;
pub use snapshot::{
    ComponentState, ReferenceState, RepresentationState, StructureState, SyncedState,
};
