//! HTTP control surface for the messaging overlay
//!
//! Thin axum router that forwards every request to an [`OverlayHandle`].

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::overlay::{OverlayError, OverlayHandle};

#[derive(Clone)]
pub struct ApiState {
    pub overlay: OverlayHandle,
}

#[derive(Debug, Deserialize)]
pub struct SendQuery {
    #[serde(alias = "mid")]
    pub identifier: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub mid: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn build_router(overlay: OverlayHandle) -> Router {
    Router::new()
        .route("/peers", get(list_peers))
        .route("/inbox", get(list_inbox))
        .route("/send", get(send).post(send))
        .route("/message", delete(delete_message))
        .route("/identity", get(identity))
        .with_state(ApiState { overlay })
}

async fn list_peers(State(state): State<ApiState>) -> Response {
    match state.overlay.list_peers().await {
        Ok(peers) => (StatusCode::OK, Json(peers)).into_response(),
        Err(err) => unavailable(err),
    }
}

async fn list_inbox(State(state): State<ApiState>) -> Response {
    match state.overlay.list_inbox().await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => unavailable(err),
    }
}

async fn send(
    State(state): State<ApiState>,
    query: Result<Query<SendQuery>, QueryRejection>,
) -> Response {
    let Query(SendQuery {
        identifier,
        message,
    }) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection),
    };

    debug!("send request target={identifier}");
    match state.overlay.send(identifier, message).await {
        Ok(success) => (StatusCode::OK, Json(SuccessResponse { success })).into_response(),
        Err(err) => unavailable(err),
    }
}

async fn delete_message(
    State(state): State<ApiState>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Response {
    let Query(DeleteQuery { id }) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection),
    };

    match state.overlay.delete(id).await {
        Ok(success) => (StatusCode::OK, Json(SuccessResponse { success })).into_response(),
        Err(err) => unavailable(err),
    }
}

async fn identity(State(state): State<ApiState>) -> Response {
    match state.overlay.local_identifier().await {
        Ok(mid) => (StatusCode::OK, Json(IdentityResponse { mid })).into_response(),
        Err(err) => unavailable(err),
    }
}

fn bad_request(rejection: QueryRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
        .into_response()
}

fn unavailable(err: OverlayError) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
