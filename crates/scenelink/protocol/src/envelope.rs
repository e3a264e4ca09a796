//! Message envelope and the operation name registry
//!
//! On the wire an envelope is `{"name": <kind>, "data": {"className": <kind>, ...}}`.
//! The payload carries its own tag, so it can also travel without the envelope.

use crate::error::{ProtocolError, ProtocolResult};
use crate::operations::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Key of the self-describing tag inside every payload
pub const CLASS_NAME: &str = "className";

/// Every operation the protocol knows about, by wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    RunScript,
    RunScriptAsync,
    GetState,
    PollSelection,
    MakeSelection,
    LoadStructure,
    ClearViewer,
    ResetView,
    FocusSelection,
    ToggleSelectionMode,
    SetPickingGranularity,
    AddRepresentation,
    SetColor,
    Reconcile,
}

impl OperationKind {
    pub const ALL: [OperationKind; 14] = [
        OperationKind::RunScript,
        OperationKind::RunScriptAsync,
        OperationKind::GetState,
        OperationKind::PollSelection,
        OperationKind::MakeSelection,
        OperationKind::LoadStructure,
        OperationKind::ClearViewer,
        OperationKind::ResetView,
        OperationKind::FocusSelection,
        OperationKind::ToggleSelectionMode,
        OperationKind::SetPickingGranularity,
        OperationKind::AddRepresentation,
        OperationKind::SetColor,
        OperationKind::Reconcile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::RunScript => "RunScript",
            OperationKind::RunScriptAsync => "RunScriptAsync",
            OperationKind::GetState => "GetState",
            OperationKind::PollSelection => "PollSelection",
            OperationKind::MakeSelection => "MakeSelection",
            OperationKind::LoadStructure => "LoadStructure",
            OperationKind::ClearViewer => "ClearViewer",
            OperationKind::ResetView => "ResetView",
            OperationKind::FocusSelection => "FocusSelection",
            OperationKind::ToggleSelectionMode => "ToggleSelectionMode",
            OperationKind::SetPickingGranularity => "SetPickingGranularity",
            OperationKind::AddRepresentation => "AddRepresentation",
            OperationKind::SetColor => "SetColor",
            OperationKind::Reconcile => "Reconcile",
        }
    }

    /// Resolve a wire name
    pub fn from_name(name: &str) -> ProtocolResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ProtocolError::UnknownOperation(name.to_string()))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    operation: Operation,
}

#[derive(Serialize, Deserialize)]
struct Wire<T> {
    name: String,
    data: T,
}

impl Message {
    pub fn new(operation: impl Into<Operation>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    /// Parse an envelope from JSON text
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse an envelope from an already parsed JSON value
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let Wire { name, data } = serde_json::from_value::<Wire<Value>>(value)
            .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
        let kind = OperationKind::from_name(&name)?;

        let Value::Object(mut data) = data else {
            return Err(ProtocolError::MalformedEnvelope(
                "data must be an object".to_string(),
            ));
        };
        match data.get(CLASS_NAME) {
            None => {
                data.insert(CLASS_NAME.to_string(), Value::from(kind.name()));
            }
            Some(Value::String(class_name)) if class_name == kind.name() => {}
            Some(other) => {
                return Err(ProtocolError::KindMismatch {
                    name: kind,
                    class_name: other.as_str().map_or_else(|| other.to_string(), str::to_string),
                });
            }
        }

        let operation = serde_json::from_value::<Operation>(Value::Object(data))
            .map_err(|e| ProtocolError::MalformedEnvelope(format!("{kind}: {e}")))?;
        Ok(Self { operation })
    }

    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(Wire {
            name: self.kind().name().to_string(),
            data: &self.operation,
        })?)
    }

    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(&Wire {
            name: self.kind().name().to_string(),
            data: &self.operation,
        })?)
    }
}

impl From<Operation> for Message {
    fn from(operation: Operation) -> Self {
        Self { operation }
    }
}
