//! Scenelink envelope protocol
//!
//! The external process names an operation and its fields in a JSON envelope;
//! the dispatcher decodes it into a typed [`Operation`], runs it against a
//! [`ViewerSession`] and hands back the same envelope with its result fields
//! filled in, or an `{"error": ...}` object.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod operations;
pub mod session;
pub mod types;
pub mod viewer;

pub use dispatcher::{dispatch, dispatch_text, dispatch_value, execute, ErrorReply, Reply};
pub use envelope::{Message, OperationKind, CLASS_NAME};
pub use error::{
    OperationError, OperationResult, ProtocolError, ProtocolResult, ViewerError, ViewerResult,
};
pub use memory::{Camera, InMemoryViewer};
pub use operations::{
    AddRepresentation, ClearViewer, Execute, FocusSelection, GetState, LoadStructure,
    MakeSelection, Operation, PollSelection, Reconcile, ResetView, RunScript, RunScriptAsync,
    SetColor, SetPickingGranularity, ToggleSelectionMode,
};
pub use session::ViewerSession;
pub use types::{AtomRecord, ColorParseError, Granularity, Rgb, StructureFormat};
pub use viewer::ViewerFacade;
