//! Decode, execute, re-encode
//!
//! Failures never escape the dispatcher: they come back as `{"error": "..."}`.
//! That error object is not an envelope and does not decode as one.

use crate::envelope::Message;
use crate::error::{OperationResult, ProtocolResult};
use crate::session::ViewerSession;
use crate::viewer::ViewerFacade;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The untyped failure reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }

    fn into_value(self) -> Value {
        serde_json::json!({ "error": self.error })
    }
}

/// Either side of a dispatch outcome, as read back by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Message),
    Failure(ErrorReply),
}

impl Reply {
    /// Interpret a reply value: an object with an `error` string is a failure,
    /// anything else must decode as an envelope.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        if let Some(Value::String(error)) = value.get("error") {
            return Ok(Reply::Failure(ErrorReply::new(error)));
        }
        Message::from_value(value).map(Reply::Success)
    }

    pub fn into_result(self) -> Result<Message, ErrorReply> {
        match self {
            Reply::Success(message) => Ok(message),
            Reply::Failure(error) => Err(error),
        }
    }
}

/// Run one message against the session
pub async fn execute<V: ViewerFacade>(
    message: Message,
    session: &mut ViewerSession<V>,
) -> OperationResult<Message> {
    let kind = message.kind();
    tracing::debug!(operation = %kind, "Dispatching operation");
    let response = message.into_operation().run(session).await?;
    Ok(Message::new(response))
}

/// Run one message and encode the outcome
pub async fn dispatch<V: ViewerFacade>(message: Message, session: &mut ViewerSession<V>) -> Value {
    let kind = message.kind();
    let encoded = match execute(message, session).await {
        Ok(response) => response.to_value().map_err(ErrorReply::new),
        Err(e) => Err(ErrorReply::new(e)),
    };
    match encoded {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(operation = %kind, error = %error.error, "Operation failed");
            error.into_value()
        }
    }
}

/// Decode a JSON envelope, run it, and encode the outcome
pub async fn dispatch_value<V: ViewerFacade>(envelope: Value, session: &mut ViewerSession<V>) -> Value {
    match Message::from_value(envelope) {
        Ok(message) => dispatch(message, session).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected envelope");
            ErrorReply::new(e).into_value()
        }
    }
}

/// Text-in, text-out form of [`dispatch_value`]
pub async fn dispatch_text<V: ViewerFacade>(envelope: &str, session: &mut ViewerSession<V>) -> String {
    let reply = match serde_json::from_str::<Value>(envelope) {
        Ok(value) => dispatch_value(value, session).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected envelope");
            ErrorReply::new(crate::error::ProtocolError::Json(e)).into_value()
        }
    };
    reply.to_string()
}
