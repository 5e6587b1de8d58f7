//! HTTP surface of the executor plugin.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::{ExecuteTemplateArgs, ExecuteTemplateReply, Executor, WorkflowSource};

pub const EXECUTE_PATH: &str = "/api/v1/template.execute";

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub workflows: Arc<dyn WorkflowSource>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(EXECUTE_PATH, post(execute_template))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

async fn execute_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_json(&headers) {
        return (
            StatusCode::BAD_REQUEST,
            "Content-Type header is not set to 'application/json'",
        )
            .into_response();
    }

    let args: ExecuteTemplateArgs = match serde_json::from_slice(&body) {
        Ok(args) => args,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed plugin request");
            return (StatusCode::BAD_REQUEST, "Couldn't unmarshal request body").into_response();
        }
    };

    let meta = &args.workflow.metadata;
    tracing::debug!(workflow = %meta.name, namespace = %meta.namespace, "template.execute");

    let reply = match state.workflows.get_workflow(&meta.namespace, &meta.name).await {
        Ok(workflow) => state.executor.execute(&args, workflow).await,
        Err(e) => {
            tracing::error!(
                workflow = %meta.name,
                namespace = %meta.namespace,
                error = %format!("{:#}", e),
                "failed to find workflow"
            );
            ExecuteTemplateReply::failed(format!("{:#}", e))
        }
    };
    (StatusCode::OK, Json(reply)).into_response()
}

/// Serve the plugin on all interfaces until Ctrl+C.
pub async fn start_server(port: u16, state: AppState) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!(addr = %listener.local_addr()?, "executor plugin listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    tracing::info!("executor plugin stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
