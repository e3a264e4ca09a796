//! Rhai script evaluation for the in-memory viewer
//!
//! Scripts see a `viewer` map describing the scene at the start of the call and
//! may call `log`. Facade actions (`select`, `clear_selection`, `focus`,
//! `reset_view`, `set_granularity`) are queued while the script runs and applied
//! in order once it returns without error.

use crate::error::{ViewerError, ViewerResult};
use crate::types::Granularity;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Scope};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// A facade action requested by a script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Select(String),
    ClearSelection,
    Focus,
    ResetView,
    SetGranularity(Granularity),
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub value: Value,
    pub commands: Vec<ScriptCommand>,
}

type Queue = Arc<Mutex<Vec<ScriptCommand>>>;

fn enqueue(queue: &Queue, command: ScriptCommand) {
    if let Ok(mut commands) = queue.lock() {
        commands.push(command);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptHost;

impl ScriptHost {
    pub fn new() -> Self {
        Self
    }

    pub fn eval(&self, script: &str, view: rhai::Map) -> ViewerResult<ScriptOutcome> {
        evaluate(script, view)
    }

    /// Evaluate on the blocking pool
    pub async fn eval_async(&self, script: String, view: rhai::Map) -> ViewerResult<ScriptOutcome> {
        tokio::task::spawn_blocking(move || evaluate(&script, view))
            .await
            .map_err(|e| ViewerError::Engine(format!("script task failed: {e}")))?
    }
}

/// Sandboxed engine whose facade functions push into `queue`
fn engine(queue: &Queue) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(64);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(100_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(10_000);

    engine.register_fn("log", |value: Dynamic| {
        tracing::info!(target: "scenelink::script", "{value}");
    });

    let q = Arc::clone(queue);
    engine.register_fn("select", move |expression: ImmutableString| {
        enqueue(&q, ScriptCommand::Select(expression.to_string()));
    });
    let q = Arc::clone(queue);
    engine.register_fn("clear_selection", move || {
        enqueue(&q, ScriptCommand::ClearSelection);
    });
    let q = Arc::clone(queue);
    engine.register_fn("focus", move || enqueue(&q, ScriptCommand::Focus));
    let q = Arc::clone(queue);
    engine.register_fn("reset_view", move || enqueue(&q, ScriptCommand::ResetView));
    let q = Arc::clone(queue);
    engine.register_fn(
        "set_granularity",
        move |name: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            let granularity = match name.as_str() {
                "element" => Granularity::Element,
                "residue" => Granularity::Residue,
                other => return Err(format!("unknown granularity '{other}'").into()),
            };
            enqueue(&q, ScriptCommand::SetGranularity(granularity));
            Ok(())
        },
    );

    engine
}

fn evaluate(script: &str, view: rhai::Map) -> ViewerResult<ScriptOutcome> {
    let queue: Queue = Arc::default();
    let engine = engine(&queue);

    // Writable per-call copy; nothing written here reaches the viewer.
    let mut scope = Scope::new();
    scope.push("viewer", view);

    let result = engine
        .eval_with_scope::<Dynamic>(&mut scope, script)
        .map_err(|e| ViewerError::Script(e.to_string()))?;
    let value = rhai::serde::from_dynamic(&result).map_err(|e| ViewerError::Script(e.to_string()))?;

    let commands = queue
        .lock()
        .map(|mut commands| std::mem::take(&mut *commands))
        .map_err(|_| ViewerError::Engine("script command queue poisoned".to_string()))?;
    Ok(ScriptOutcome { value, commands })
}
