use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use concierge_booking::{CartView, CheckoutOutcome, ConversationTurn, ItemId, ScriptedContactSource, TurnReply};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

/// Contact answers for checkout, consumed in order while contact details
/// are still missing.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub contact_inputs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub result: CheckoutOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClosed {
    pub session_id: Uuid,
    pub abandoned_items: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/{id}", delete(close_session))
        .route("/v1/sessions/{id}/input", post(submit_input))
        .route("/v1/sessions/{id}/cart", get(show_cart))
        .route("/v1/sessions/{id}/history", get(history))
        .route("/v1/sessions/{id}/checkout", post(checkout))
        .route("/v1/sessions/{id}/items/{item_id}", delete(cancel_item))
}

/// POST /v1/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.create_session().await;
    info!(session_id = %session_id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

/// POST /v1/sessions/{id}/input
pub async fn submit_input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<InputRequest>,
) -> Result<Json<TurnReply>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }
    let session = state.session(&id).await.ok_or_else(|| AppError::session_not_found(id))?;
    let mut session = session.lock().await;
    Ok(Json(session.submit_input(&req.text).await))
}

/// GET /v1/sessions/{id}/cart
pub async fn show_cart(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CartView>, AppError> {
    let session = state.session(&id).await.ok_or_else(|| AppError::session_not_found(id))?;
    let session = session.lock().await;
    Ok(Json(session.show_cart()))
}

/// GET /v1/sessions/{id}/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ConversationTurn>>, AppError> {
    let session = state.session(&id).await.ok_or_else(|| AppError::session_not_found(id))?;
    let session = session.lock().await;
    Ok(Json(session.history().to_vec()))
}

/// POST /v1/sessions/{id}/checkout
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let session = state.session(&id).await.ok_or_else(|| AppError::session_not_found(id))?;
    let mut session = session.lock().await;

    let mut source = ScriptedContactSource::new(req.contact_inputs);
    let result = session.checkout(&mut source).await;
    Ok(Json(CheckoutResponse {
        message: result.message(),
        result,
    }))
}

/// DELETE /v1/sessions/{id}/items/{item_id}
pub async fn cancel_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let session = state.session(&id).await.ok_or_else(|| AppError::session_not_found(id))?;
    let mut session = session.lock().await;
    session.cancel_item(&ItemId(item_id)).map_err(AppError::from_cart)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/sessions/{id}
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionClosed>, AppError> {
    let session = state
        .remove_session(&id)
        .await
        .ok_or_else(|| AppError::session_not_found(id))?;
    let abandoned_items = session.lock().await.exit();
    Ok(Json(SessionClosed {
        session_id: id,
        abandoned_items,
    }))
}
