//! Internal trigger endpoints
//!
//! The API layer reports committed writes here. Every route only queues a
//! trigger and answers `202 Accepted`; delivery happens on the dispatcher.

use crate::broadcast::TriggerError;
use crate::server::HubState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chat_common::{AppError, ErrorResponse};
use chat_core::{ChatMessage, ConversationId, UserId};
use serde::Deserialize;

/// Error returned by the internal endpoints
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        Self(AppError::Unavailable(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = ?self.0, "Internal endpoint failed");
        }

        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRequest {
    pub message: ChatMessage,
    pub sender_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub blocker_id: UserId,
    pub blocked_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockRequest {
    pub blocker_id: UserId,
    pub unblocked_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberRequest {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    #[serde(default)]
    pub group_name: Option<String>,
}

/// Create the internal router, guarded by the shared service token
pub fn internal_router(state: &HubState) -> Router<HubState> {
    Router::new()
        .route("/messages", post(new_message))
        .route("/blocks", post(block))
        .route("/unblocks", post(unblock))
        .route("/groups/members/added", post(group_member_added))
        .route("/groups/members/removed", post(group_member_removed))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_internal_token,
        ))
}

/// Reject requests that do not carry the configured bearer token
async fn require_internal_token(
    State(state): State<HubState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config().internal_token.as_deref() else {
        return Err(AppError::Unavailable("internal endpoints disabled".into()).into());
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::MissingAuth)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidToken)?;

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::warn!("Rejected internal request with wrong token");
        return Err(AppError::InvalidToken.into());
    }

    Ok(next.run(request).await)
}

/// Compare two secrets without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// POST /internal/messages
async fn new_message(
    State(state): State<HubState>,
    Json(body): Json<NewMessageRequest>,
) -> ApiResult<StatusCode> {
    tracing::debug!(
        message_id = %body.message.id,
        conversation_id = %body.message.conversation_id,
        "New message trigger"
    );
    state.triggers().on_new_message(body.message, body.sender_id)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /internal/blocks
async fn block(
    State(state): State<HubState>,
    Json(body): Json<BlockRequest>,
) -> ApiResult<StatusCode> {
    state.triggers().on_block(body.blocker_id, body.blocked_id)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /internal/unblocks
async fn unblock(
    State(state): State<HubState>,
    Json(body): Json<UnblockRequest>,
) -> ApiResult<StatusCode> {
    state.triggers().on_unblock(body.blocker_id, body.unblocked_id)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /internal/groups/members/added
async fn group_member_added(
    State(state): State<HubState>,
    Json(body): Json<GroupMemberRequest>,
) -> ApiResult<StatusCode> {
    state
        .triggers()
        .on_group_member_added(body.conversation_id, body.user_id, body.group_name)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /internal/groups/members/removed
async fn group_member_removed(
    State(state): State<HubState>,
    Json(body): Json<GroupMemberRequest>,
) -> ApiResult<StatusCode> {
    state
        .triggers()
        .on_group_member_removed(body.conversation_id, body.user_id, body.group_name)?;
    Ok(StatusCode::ACCEPTED)
}
