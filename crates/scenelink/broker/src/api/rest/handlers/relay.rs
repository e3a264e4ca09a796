//! Broadcast routes

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::relay::{CollectOutcome, PublishKind};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Acknowledgement for a fire-and-forget broadcast
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionAck {
    pub success: bool,
    pub message: String,
    pub subscribers: usize,
}

/// Fire-and-forget: publish and return immediately
pub async fn post_action(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ActionAck>> {
    let payload = payload(body)?;
    let subscribers = state.relay.publish(PublishKind::Action, &payload);

    Ok(Json(ActionAck {
        success: true,
        message: "Request forwarded to all clients".to_string(),
        subscribers,
    }))
}

/// Broadcast-and-collect: publish, send on every response channel and wait
/// for the replies
pub async fn post_run(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<CollectOutcome>> {
    let payload = payload(body)?;
    Ok(Json(state.relay.collect(payload).await))
}

fn payload(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}
