//! Router harness shared by the handler tests

use super::{router, AppState};
use crate::clock::ManualClock;
use crate::config::{test_config, Config};
use crate::email::EmailClient;
use crate::github::GitHubClient;
use crate::store::{MemoryKvStore, MemoryObjectStore, ObjectStore, StoreResult, StoredObject};
use crate::templates::Templates;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::Response,
    Router,
};
use httpmock::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// 2025-06-15T14:40:00Z
pub const T0: i64 = 1_749_998_400_000;

const BOUNDARY: &str = "journal-edge-test-boundary";

pub struct TestApp {
    pub config: Config,
    pub kv: MemoryKvStore,
    pub objects: MemoryObjectStore,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            kv: MemoryKvStore::default(),
            objects: MemoryObjectStore::default(),
            clock: Arc::new(ManualClock::at_millis(T0)),
        }
    }

    /// Point both GitHub endpoints at a mock server
    pub fn with_github(mut self, server: &MockServer) -> Self {
        self.config.github.api_base = server.base_url();
        self.config.github.oauth_base = server.base_url();
        self
    }

    pub fn with_resend(mut self, server: &MockServer) -> Self {
        self.config.email.api_base = server.base_url();
        self
    }

    pub fn state(&self) -> AppState {
        self.state_with_objects(Arc::new(self.objects.clone()))
    }

    fn state_with_objects(&self, objects: Arc<dyn ObjectStore>) -> AppState {
        let http = reqwest::Client::new();
        AppState {
            config: Arc::new(self.config.clone()),
            kv: Arc::new(self.kv.clone()),
            objects,
            github: GitHubClient::new(http.clone(), self.config.github.clone()),
            email: EmailClient::new(http, &self.config.email),
            templates: Arc::new(Templates::new().unwrap()),
            clock: self.clock.clone(),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state())
    }

    pub fn router_with_objects(&self, objects: Arc<dyn ObjectStore>) -> Router {
        router(self.state_with_objects(objects))
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a multipart POST from `(name, filename, bytes)` parts
pub fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/pdf\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Answer `GET /user` for one token with a fixed profile
pub async fn mock_github_user(server: &MockServer, token: &str) {
    let authorization = format!("token {}", token);
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user").header("authorization", authorization);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"login":"ada","avatar_url":null,"name":"Ada Lovelace"}"#);
        })
        .await;
}

/// Object store that fails the test if anything reaches it
pub struct PanickingObjectStore;

#[async_trait]
impl ObjectStore for PanickingObjectStore {
    async fn put(&self, key: &str, _object: StoredObject) -> StoreResult<()> {
        panic!("object store write for {}", key);
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        panic!("object store read for {}", key);
    }
}
