//! Frames exchanged with viewers
//!
//! Response channels speak JSON text frames tagged by `type`. The publish leg
//! carries raw payloads; the SSE event name tells passive observers which
//! route produced them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identifier assigned to a connection when it attaches
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates the replies of one broadcast-and-collect call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broker → viewer over the response channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Downstream {
    /// Sent once, right after the socket is accepted
    Welcome {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    /// One per collect call
    Request {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        payload: Value,
    },
}

/// Viewer → broker over the response channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Upstream {
    Reply {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        output: Value,
    },
}

/// Which route put a payload on the publish leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishKind {
    /// Fire-and-forget broadcast
    Action,
    /// Mirror of a broadcast-and-collect payload
    Run,
}

impl PublishKind {
    /// SSE event name
    pub fn name(self) -> &'static str {
        match self {
            PublishKind::Action => "action",
            PublishKind::Run => "run",
        }
    }
}

/// A payload on the publish leg, encoded once for every subscriber
#[derive(Debug, Clone)]
pub struct Published {
    pub kind: PublishKind,
    pub data: Arc<str>,
}
