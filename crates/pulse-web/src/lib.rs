//! Axum JSON API: site registration, listing, deletion, on-demand checks.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pulse_core::{Requester, RunOutcome, SiteRecord, Trigger};
use pulse_engine::Engine;
use pulse_store::RecordStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "pulse-web";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, engine: Arc<Engine>) -> Self {
        Self { store, engine }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sites", get(list_sites_handler).post(create_site_handler).delete(delete_site_handler))
        .route("/check", post(check_site_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "web api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Claims arrive as headers set by the upstream gateway authorizer.
/// No user id means the request never passed authentication.
fn requester_from_headers(headers: &HeaderMap) -> Option<Requester> {
    let user_id = headers.get("x-user-id")?.to_str().ok()?.trim();
    if user_id.is_empty() {
        return None;
    }
    let email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Some(Requester {
        user_id: user_id.to_string(),
        email,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn unauthorized() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "Unauthorized: no user claims found",
    )
}

fn server_error(err: anyhow::Error) -> Response {
    error!(error = %err, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_sites_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.scan().await {
        Ok(sites) => Json(sites).into_response(),
        Err(err) => server_error(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct CreateSiteRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
}

async fn create_site_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSiteRequest>,
) -> Response {
    let Some(requester) = requester_from_headers(&headers) else {
        return unauthorized();
    };
    let url = req.url.as_deref().map(str::trim).unwrap_or_default();
    let keyword = req.keyword.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() || keyword.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "url and keyword are required");
    }

    match state.store.get(url).await {
        Ok(Some(_)) => error_response(StatusCode::CONFLICT, "url is already registered"),
        Ok(None) => {
            let record = SiteRecord::new(url, keyword, &requester, Utc::now());
            match state.store.put(&record).await {
                Ok(()) => (
                    StatusCode::CREATED,
                    Json(serde_json::json!({ "message": "Website added successfully" })),
                )
                    .into_response(),
                Err(err) => server_error(err.into()),
            }
        }
        Err(err) => server_error(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteSiteRequest {
    url: String,
}

async fn delete_site_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DeleteSiteRequest>,
) -> Response {
    let Some(requester) = requester_from_headers(&headers) else {
        return unauthorized();
    };
    match state.store.get(&req.url).await {
        Ok(None) => error_response(StatusCode::NOT_FOUND, "url is not registered"),
        Ok(Some(record)) => {
            if record.owner_id != requester.user_id {
                return error_response(StatusCode::FORBIDDEN, "only the owner can delete a site");
            }
            match state.store.delete(&req.url).await {
                Ok(_) => StatusCode::NO_CONTENT.into_response(),
                Err(err) => server_error(err.into()),
            }
        }
        Err(err) => server_error(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    url: String,
}

async fn check_site_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Response {
    let Some(requester) = requester_from_headers(&headers) else {
        return unauthorized();
    };
    let trigger = Trigger::OnDemand {
        url: req.url,
        requester,
    };
    match state.engine.run(trigger).await {
        // The admin notification has already gone out by this point.
        Ok(RunOutcome::RecordNotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, "url is not registered")
        }
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => server_error(err),
    }
}
