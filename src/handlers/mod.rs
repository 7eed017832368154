//! HTTP request handlers
//!
//! Each service has its own router and CORS policy; [`router`] mounts the
//! services enabled in the configuration.

pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod oauth;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

use crate::clock::Clock;
use crate::config::{Config, Service};
use crate::email::EmailClient;
use crate::error::AppError;
use crate::github::GitHubClient;
use crate::store::{KvStore, ObjectStore};
use crate::templates::Templates;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: Arc<dyn KvStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub github: GitHubClient,
    pub email: EmailClient,
    pub templates: Arc<Templates>,
    pub clock: Arc<dyn Clock>,
}

/// CORS for the services that only talk to the submission portal
fn portal_cors(origin: &str, methods: Vec<Method>) -> CorsLayer {
    let allow_origin = match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            tracing::error!("ALLOWED_ORIGIN '{}' is not a valid header value", origin);
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the application router for the enabled services
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();
    let mut app = Router::new().route("/health", get(health));

    if config.serves(Service::Notify) {
        app = app.merge(
            notify::routes().layer(portal_cors(&config.allowed_origin, vec![Method::POST])),
        );
    }

    if config.serves(Service::Metrics) {
        app = app.merge(
            metrics::routes().layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([header::CONTENT_TYPE]),
            ),
        );
    }

    if config.serves(Service::OAuth) {
        app = app.merge(
            oauth::routes().layer(portal_cors(&config.allowed_origin, vec![Method::POST])),
        );
    }

    if config.serves(Service::Upload) {
        app = app.merge(
            upload::routes(config.max_upload_size).layer(portal_cors(
                &config.allowed_origin,
                vec![Method::GET, Method::POST],
            )),
        );
    }

    app.fallback(not_found)
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
