//! The daemon's HTTP surface.
//!
//! `/send` and `/posthook` are guarded by separate shared keys, compared in
//! constant time. A posthook whose body cannot be parsed is acknowledged
//! with 200 anyway: providers retry on non-2xx, and a permanently
//! malformed body would otherwise be redelivered forever.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailgate_core::{Email, Facade, Response};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use crate::config::Config;

pub struct AppState {
    pub facade: Facade,
    pub config: Config,
    forward: reqwest::Client,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn new(facade: Facade, config: Config, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            facade,
            config,
            forward: reqwest::Client::new(),
            metrics,
        }
    }
}

#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/send", post(send))
        .route("/posthook", post(posthook))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Deserialize)]
struct SendQuery {
    #[serde(default)]
    key: String,
}

#[derive(Deserialize)]
struct PosthookQuery {
    #[serde(default)]
    key: String,
    #[serde(default)]
    service: String,
}

async fn ping() -> &'static str {
    "mailgate pong"
}

async fn send(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SendQuery>,
    headers: HeaderMap,
    Json(mut email): Json<Email>,
) -> Result<Json<Vec<Response>>, (StatusCode, &'static str)> {
    if !constant_time_eq(&query.key, &state.config.api_key) {
        return Err((StatusCode::UNAUTHORIZED, "not authorized"));
    }

    let domain_override = state.config.from_domain_override.trim();
    if !domain_override.is_empty() {
        let Some((local, _)) = email.from.email.split_once('@') else {
            tracing::warn!(from = %email.from.email, "could not parse from address");
            return Err((StatusCode::BAD_REQUEST, "could not parse from address"));
        };
        email.from.email = format!("{local}@{domain_override}");
    }

    let preferred = headers
        .get("X-Service")
        .and_then(|value| value.to_str().ok());

    match state.facade.send(&email, preferred).await {
        Ok(responses) => Ok(Json(responses)),
        Err(err) => {
            tracing::error!(%err, "could not send email");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "could not send email"))
        }
    }
}

async fn posthook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PosthookQuery>,
    body: Bytes,
) -> Result<&'static str, (StatusCode, &'static str)> {
    if !constant_time_eq(&query.key, &state.config.posthook_key) {
        return Err((StatusCode::UNAUTHORIZED, "not authorized"));
    }

    let hooks = match state.facade.unmarshal_posthook(&query.service, &body) {
        Ok(hooks) => hooks,
        Err(err) => {
            // Acknowledge anyway so the provider stops redelivering it.
            tracing::warn!(%err, service = %query.service, "could not unmarshal posthook");
            return Ok("ok");
        }
    };
    tracing::info!(service = %query.service, count = hooks.len(), "posthook received");

    if state.config.posthook_forward.is_empty() {
        tracing::debug!("no posthook forward configured, ignoring");
        return Ok("ok");
    }

    state
        .forward
        .post(&state.config.posthook_forward)
        .json(&hooks)
        .send()
        .await
        .map_err(|err| {
            tracing::error!(%err, "could not forward posthook");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        })?;

    Ok("ok")
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Compare two keys without leaking the mismatch position through timing.
fn constant_time_eq(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
