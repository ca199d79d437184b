//! HTTP service: the chat platform webhook, the mini-app API and a health
//! check, served with warp.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use warp::http::{HeaderValue, Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::api::{cors_headers, Api, ApiRequest, INIT_DATA_HEADER};
use crate::bot::Bot;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telegram::Update;

/// Header the chat platform sets when the webhook was registered with a secret.
pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Everything the HTTP handlers need.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    bot: Bot,
    api: Api,
}

impl AppState {
    /// Bundle the handlers.
    #[must_use]
    pub fn new(config: Arc<Config>, bot: Bot, api: Api) -> Self {
        Self { config, bot, api }
    }
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// All routes of the service.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })));

    let webhook = warp::path!("webhook")
        .and(warp::post())
        .and(warp::header::optional::<String>(SECRET_TOKEN_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handle_webhook);

    let api = warp::path::full()
        .and(warp::method())
        .and(warp::header::optional::<String>(INIT_DATA_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state))
        .and_then(handle_api);

    health.or(webhook).or(api)
}

/// POST /webhook. Every authenticated call gets a 200; `ok` reports whether
/// the update was handled.
async fn handle_webhook(
    secret: Option<String>,
    body: Bytes,
    state: AppState,
) -> std::result::Result<Response, Infallible> {
    if let Some(expected) = state.config.telegram.webhook_secret.as_deref() {
        if secret.as_deref() != Some(expected) {
            warn!("Rejected webhook call with a wrong secret token");
            return Ok(json_response(
                StatusCode::UNAUTHORIZED,
                &json!({ "ok": false }),
            ));
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Ignoring malformed update: {}", e);
            return Ok(json_response(StatusCode::OK, &json!({ "ok": false })));
        }
    };

    let ok = match state.bot.handle_update(&update, Utc::now()).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to handle update {}: {}", update.update_id, e);
            false
        }
    };
    Ok(json_response(StatusCode::OK, &json!({ "ok": ok })))
}

/// Any method on a path containing `/api/`.
async fn handle_api(
    path: FullPath,
    method: Method,
    init_data: Option<String>,
    body: Bytes,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    if !path.as_str().contains("/api/") {
        return Err(warp::reject::not_found());
    }

    let request = ApiRequest {
        method,
        path: path.as_str().to_string(),
        init_data,
        body: body.to_vec(),
    };
    let result = state.api.handle(&request, Utc::now()).await;

    let mut response = match result.body {
        Some(body) => json_response(result.status, &body),
        None => warp::reply::with_status(warp::reply(), result.status).into_response(),
    };
    for (name, value) in cors_headers(&state.config.server.cors_origin) {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    Ok(response)
}

/// Serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve_until(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| Error::internal(format!("failed to bind {addr}: {e}")))?;

    info!("Listening on {}", bound);
    server.await;
    info!("Server stopped");
    Ok(())
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    serve_until(state, addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested");
    })
    .await
}
