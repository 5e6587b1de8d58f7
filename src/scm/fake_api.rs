//! Local HTTP server standing in for a provider REST API in tests.

use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{Value, json};

/// One request as the server saw it. `path` is the raw, still percent-encoded path.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Value>,
}

impl Received {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub(crate) type Log = Arc<Mutex<Vec<Received>>>;

struct Route {
    method: Method,
    path: String,
    status: StatusCode,
    body: Value,
}

/// Canned responses keyed by method and exact path; anything else is a 404.
#[derive(Default)]
pub(crate) struct FakeApi {
    routes: Vec<Route>,
}

impl FakeApi {
    pub(crate) fn route(
        mut self,
        method: Method,
        path: &str,
        status: StatusCode,
        body: Value,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            status,
            body,
        });
        self
    }

    /// Bind to an ephemeral local port; returns the base URL and the request log.
    pub(crate) async fn serve(self) -> (String, Log) {
        let routes = Arc::new(self.routes);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let seen = log.clone();
        let app = Router::new().fallback(move |req: Request| {
            let routes = routes.clone();
            let seen = seen.clone();
            async move { respond(&routes, &seen, req).await }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), log)
    }
}

async fn respond(routes: &[Route], seen: &Log, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let path = parts.uri.path().to_string();
    seen.lock().unwrap().push(Received {
        method: parts.method.clone(),
        path: path.clone(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        headers: parts.headers,
        body: serde_json::from_slice(&bytes).ok(),
    });
    match routes.iter().find(|r| r.method == parts.method && r.path == path) {
        Some(route) => (route.status, Json(route.body.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
    }
}
