//! HTTP routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use sluice_action::{ActionDefinition, Org};
use sluice_sandbox::{BuiltinFunctionCall, Execution};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /execute`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub actions_plus_api: Vec<ActionDefinition>,
    pub org: Org,
    pub code: String,
    #[serde(default)]
    pub user_api_key: Option<SecretString>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Admission runs in a fixed order: shared secret, then the caller's rate
/// limit, then body validation. The execution outcome, failures included,
/// is always a `200` carrying the trace.
async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<BuiltinFunctionCall>>> {
    let token = auth::bearer_token(&headers)
        .filter(|token| auth::verify(token, &state.secret))
        .ok_or_else(|| {
            warn!("rejected request without a valid service secret");
            ApiError::Unauthorized
        })?;

    let caller = auth::caller_key(token);
    state.limiter.acquire(&caller).await.map_err(|err| {
        warn!(%caller, %err, "rate limit hit");
        ApiError::RateLimited(err)
    })?;

    let Json(request) = body.map_err(|rejection| {
        warn!(%caller, %rejection, "invalid execute body");
        ApiError::InvalidBody
    })?;

    info!(
        %caller,
        org_id = %request.org.id,
        actions = request.actions_plus_api.len(),
        "execute"
    );
    let report = state
        .sandbox
        .run(Execution {
            code: request.code,
            actions: request.actions_plus_api,
            org: request.org,
            user_api_key: request.user_api_key,
        })
        .await;
    Ok(Json(report.events))
}
