#![allow(dead_code)]

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use oxmon_agent::executor::DeliveryExecutor;
use oxmon_agent::registry::BufferRegistry;
use oxmon_agent::reporter::Reporter;
use oxmon_agent::retry::{NoRetry, RetryExecutor};
use oxmon_agent::sender::HttpSender;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: &'static str,
    pub status: u16,
    pub body: Value,
}

#[derive(Default)]
struct Recorded {
    scripted: VecDeque<u16>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone, Default)]
struct ServerState(Arc<Mutex<Recorded>>);

impl ServerState {
    /// Records the request and answers with the next scripted status, or 200
    /// once the script runs out.
    fn respond(&self, path: &'static str, body: Value) -> StatusCode {
        let Ok(mut recorded) = self.0.lock() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        let status = recorded.scripted.pop_front().unwrap_or(200);
        recorded.requests.push(RecordedRequest { path, status, body });
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

async fn update(State(state): State<ServerState>, Json(body): Json<Value>) -> StatusCode {
    state.respond("/update/", body)
}

async fn updates(State(state): State<ServerState>, Json(body): Json<Value>) -> StatusCode {
    state.respond("/updates/", body)
}

/// In-process aggregation endpoint serving `/update/` and `/updates/`.
pub struct MockServer {
    pub url: String,
    state: ServerState,
}

impl MockServer {
    pub async fn start(statuses: impl IntoIterator<Item = u16>) -> Result<Self> {
        let state = ServerState::default();
        if let Ok(mut recorded) = state.0.lock() {
            recorded.scripted = statuses.into_iter().collect();
        }

        let app = Router::new()
            .route("/update/", post(update))
            .route("/updates/", post(updates))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock server stopped: {e}");
            }
        });

        Ok(Self { url, state })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .0
            .lock()
            .map(|r| r.requests.clone())
            .unwrap_or_default()
    }

    /// Bodies of requests that were answered with 2xx.
    pub fn accepted_bodies(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| (200..300).contains(&r.status))
            .map(|r| r.body)
            .collect()
    }
}

pub fn http_sender(server: &MockServer) -> Result<Arc<HttpSender>> {
    Ok(Arc::new(HttpSender::new(&server.url, Duration::from_secs(2))?))
}

pub fn no_retry() -> RetryExecutor {
    RetryExecutor::new(Arc::new(NoRetry))
}

pub fn reporter(
    registry: &Arc<BufferRegistry>,
    executor: Arc<dyn DeliveryExecutor>,
    interval: Duration,
) -> Arc<Reporter> {
    Arc::new(Reporter::new(Arc::clone(registry), executor, interval))
}

/// Sum of every accepted counter delta for `id`, across single and batch
/// payloads.
pub fn delivered_counter(server: &MockServer, id: &str) -> i64 {
    server
        .accepted_bodies()
        .iter()
        .flat_map(|body| match body {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .filter(|m| m["id"] == id && m["type"] == "counter")
        .filter_map(|m| m["delta"].as_i64())
        .sum()
}
