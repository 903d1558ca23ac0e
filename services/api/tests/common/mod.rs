#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use api_lib::adapters::{memory::load_question_bank, MemoryStore};
use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use progression_core::domain::Verdict;
use progression_core::ports::{CorrectnessOracle, PortResult, SystemClock};
use progression_core::{AdaptiveController, ChallengeService};
use serde_json::Value;
use tower::ServiceExt;

/// Labels `"right"` as correct and everything else as incorrect.
pub struct StubOracle;

#[async_trait]
impl CorrectnessOracle for StubOracle {
    async fn classify(&self, _prompt: &str, answer: &str) -> PortResult<Verdict> {
        Ok(Verdict::new(if answer == "right" {
            "correct"
        } else {
            "incorrect"
        }))
    }
}

pub fn seed_store() -> Arc<MemoryStore> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("seed/questions.json");
    Arc::new(MemoryStore::new(load_question_bank(&path).unwrap()))
}

pub fn create_test_app() -> Router {
    let store = seed_store();
    let oracle = Arc::new(StubOracle);
    let config = Arc::new(Config::from_lookup(|_| None).unwrap());

    let adaptive = Arc::new(AdaptiveController::new(
        store.clone(),
        store.clone(),
        oracle.clone(),
        Duration::from_secs(2),
    ));
    let challenges = Arc::new(ChallengeService::new(
        store.clone(),
        store,
        oracle,
        Arc::new(SystemClock),
        Duration::from_secs(2),
    ));
    router(Arc::new(AppState {
        config,
        adaptive,
        challenges,
    }))
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("non-JSON body with status {}: {}", status, String::from_utf8_lossy(&bytes))
        })
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}
