//! GitHub OAuth code exchange for the submission portal

use crate::error::AppError;
use crate::handlers::AppState;
use crate::models::{OAuthRequest, OAuthResponse};
use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new().route("/oauth", post(exchange))
}

/// Trade an authorization code for an access token and the user's profile
pub async fn exchange(
    State(state): State<AppState>,
    payload: Result<Json<OAuthRequest>, JsonRejection>,
) -> Result<Json<OAuthResponse>, AppError> {
    let Json(request) = payload?;
    let code = request
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("No code provided".to_string()))?;

    let access_token = state.github.exchange_code(code).await?;
    let user = state.github.fetch_user(&access_token).await?;
    tracing::info!("OAuth login completed for {}", user.login);

    Ok(Json(OAuthResponse { access_token, user }))
}
