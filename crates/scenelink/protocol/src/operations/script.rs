//! Escape-hatch scripting operations

use super::Execute;
use crate::error::OperationResult;
use crate::session::ViewerSession;
use crate::viewer::ViewerFacade;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strings pass through; anything else is stored as its JSON text
fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Evaluate a script synchronously against the viewer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScript {
    pub script: String,
    #[serde(default)]
    pub result: Option<String>,
}

impl RunScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            result: None,
        }
    }
}

#[async_trait]
impl Execute for RunScript {
    type Output = String;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<String> {
        let value = session.viewer_mut().run_script(&self.script)?;
        Ok(stringify(value))
    }

    fn respond(self, output: String) -> Self {
        Self {
            result: Some(output),
            ..self
        }
    }
}

/// Evaluate a script that the viewer may run off the caller's thread
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScriptAsync {
    pub script: String,
    #[serde(default)]
    pub result: Option<String>,
}

impl RunScriptAsync {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            result: None,
        }
    }
}

#[async_trait]
impl Execute for RunScriptAsync {
    type Output = String;

    async fn execute<V: ViewerFacade>(
        &self,
        session: &mut ViewerSession<V>,
    ) -> OperationResult<String> {
        let value = session.viewer_mut().run_script_async(&self.script).await?;
        Ok(stringify(value))
    }

    fn respond(self, output: String) -> Self {
        Self {
            result: Some(output),
            ..self
        }
    }
}
