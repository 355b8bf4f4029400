//! HTTP surface — the messaging webhook and the authenticated admin routes.
//!
//! The webhook always acknowledges 200 with "OK", whatever happened inside;
//! the reply text travels out-of-band over the messaging channel, exactly
//! like the upstream collaborator expects. Admin responses distinguish
//! unauthorized (401), not found (404) and success (200).

use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::admin::AdminGate;
use crate::channels::Channel;
use crate::gateway::Gateway;
use crate::ledger::CostLedger;
use crate::store::UserRepository;
use crate::users::SenderStatus;

/// Actor recorded for approvals made through the HTTP surface.
const WEB_ADMIN_ACTOR: &str = "web_admin";

/// Shared state behind the routes.
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub channel: Arc<dyn Channel>,
    pub repo: Arc<dyn UserRepository>,
    pub gate: Arc<AdminGate>,
    pub admin_secret: SecretString,
    pub ledger: Arc<CostLedger>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/admin/approve", post(admin_approve))
        .route("/admin/reject", post(admin_reject))
        .route("/admin/pending", get(admin_pending))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .merge(admin)
        .with_state(state)
}

/// Twilio-style inbound message form.
#[derive(Debug, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    Form(inbound): Form<InboundForm>,
) -> impl IntoResponse {
    tracing::debug!(from = %inbound.from, "Inbound message");

    let reply = state.gateway.handle_message(&inbound.from, &inbound.body).await;
    if let Err(e) = state.channel.send_text(&inbound.from, &reply).await {
        tracing::error!(to = %inbound.from, error = %e, "Failed to send reply");
    }

    // Always 200, or the collaborator redelivers.
    (StatusCode::OK, "OK")
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.repo.aggregate_statistics().await.unwrap_or_default();
    let ledger = state.ledger.snapshot();
    Json(json!({
        "status": "ok",
        "pending": stats.pending,
        "approved": stats.approved,
        "daily_total": ledger.daily_total,
        "reset_date": ledger.reset_date,
    }))
}

#[derive(Debug, Deserialize)]
struct AdminAction {
    sender_id: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct AdminQuery {
    secret: String,
}

fn authorized(state: &AppState, secret: &str) -> bool {
    state.admin_secret.expose_secret() == secret
}

async fn admin_approve(
    State(state): State<Arc<AppState>>,
    Json(action): Json<AdminAction>,
) -> impl IntoResponse {
    if !authorized(&state, &action.secret) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "wrong secret" })));
    }
    match state.gate.approve(&action.sender_id, WEB_ADMIN_ACTOR).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "sender not awaiting approval" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Approve failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
        }
    }
}

async fn admin_reject(
    State(state): State<Arc<AppState>>,
    Json(action): Json<AdminAction>,
) -> impl IntoResponse {
    if !authorized(&state, &action.secret) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "wrong secret" })));
    }
    match state.gate.reject(&action.sender_id, WEB_ADMIN_ACTOR).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "sender not awaiting approval" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Reject failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
        }
    }
}

async fn admin_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> impl IntoResponse {
    if !authorized(&state, &query.secret) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "wrong secret" })));
    }
    match state.repo.list_by_status(SenderStatus::Pending).await {
        Ok(records) => {
            let pending: Vec<_> = records
                .iter()
                .filter(|r| r.profile.is_complete())
                .map(|r| {
                    json!({
                        "sender_id": r.sender_id,
                        "name": r.profile.name,
                        "country": r.profile.country,
                        "spoken_languages": r.profile.spoken_languages,
                        "goal": r.profile.goal,
                        "preferred_language": r.preferred_language,
                        "registered_at": r.registered_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "pending": pending })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Listing pending senders failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
        }
    }
}
