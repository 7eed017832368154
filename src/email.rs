//! Transactional email delivery through the Resend API

use crate::config::EmailSettings;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to send email: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Provider acknowledgement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentEmail {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Clone)]
pub struct EmailClient {
    http: Client,
    api_base: String,
    api_key: String,
    from: String,
}

impl EmailClient {
    pub fn new(http: Client, settings: &EmailSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.clone(),
            api_key: settings.api_key.clone(),
            from: settings.from.clone(),
        }
    }

    /// Send one HTML email. No retry: a failure goes straight back to the caller.
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<SentEmail, EmailError> {
        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&SendEmailRequest {
                from: &self.from,
                to: [to],
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected { status, body });
        }

        let sent = response.json::<SentEmail>().await.unwrap_or_default();
        tracing::info!(
            "Email '{}' accepted by provider (id: {})",
            subject,
            sent.id.as_deref().unwrap_or("unknown")
        );
        Ok(sent)
    }
}
