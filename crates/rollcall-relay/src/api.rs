use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, Method},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use rollcall_shared::{AttendanceEntry, ForwardReport, UploadAck};
use rollcall_store::RecordLog;

use crate::config::RelayConfig;
use crate::error::ServerError;
use crate::forward::Forwarder;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordLog>,
    pub forwarder: Arc<Forwarder>,
    pub config: Arc<RelayConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_page))
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/upload", post(upload))
        .route("/list", get(list_records))
        .route("/forward", post(forward_all))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    forwarding_configured: bool,
    stored_records: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Result<Json<ServerInfoResponse>, ServerError> {
    Ok(Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        forwarding_configured: state.forwarder.is_configured(),
        stored_records: state.records.len().await?,
    }))
}

async fn status_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>{name}</title></head><body>\
         <h1>{name}</h1><p>Relay is running.</p>\
         <p><a href=\"/list\">Stored records</a> &middot; <a href=\"/info\">Info</a></p>\
         </body></html>",
        name = escape_html(&state.config.instance_name)
    ))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Persist first, acknowledge, then try the datastore in the background.
async fn upload(
    State(state): State<AppState>,
    body: Result<Json<AttendanceEntry>, JsonRejection>,
) -> Result<Json<UploadAck>, ServerError> {
    let Json(entry) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    entry
        .validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let record = state.records.append(entry).await?;
    info!(id = %record.id, name = record.entry.name(), "Attendance received");

    state.forwarder.spawn_forward(record);
    Ok(Json(UploadAck { ok: true }))
}

async fn list_records(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let raw = state.records.raw().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], raw))
}

async fn forward_all(State(state): State<AppState>) -> Result<Json<ForwardReport>, ServerError> {
    let report = state.forwarder.reconcile(&state.records).await?;
    Ok(Json(report))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting HTTP API server");
    serve_on(state, listener).await
}

/// Serve on an already bound listener.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
