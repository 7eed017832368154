//! GitHub API client: identity checks, OAuth code exchange and issue filing

use crate::config::GitHubSettings;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// GitHub rejects API calls without a user agent
pub const USER_AGENT: &str = "Agentic-Journal-Worker";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The OAuth endpoint refused the authorization code
    #[error("{description}")]
    OAuth { description: String },

    #[error("Failed to create issue: {body}")]
    IssueRejected { status: StatusCode, body: String },

    #[error("GitHub returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Profile returned by `GET /user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Issue to be filed in the review repository
#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
    pub number: u64,
    pub html_url: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    settings: GitHubSettings,
}

impl GitHubClient {
    pub fn new(http: Client, settings: GitHubSettings) -> Self {
        Self { http, settings }
    }

    /// Fetch the profile of the token's owner
    pub async fn fetch_user(&self, token: &str) -> Result<GitHubUser, GitHubError> {
        let response = self
            .http
            .get(format!("{}/user", self.settings.api_base))
            .header(header::AUTHORIZATION, format!("token {}", token))
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    /// Check a caller-supplied token. Any failure counts as invalid.
    pub async fn validate_token(&self, token: &str) -> Option<GitHubUser> {
        if token.trim().is_empty() {
            return None;
        }

        match self.fetch_user(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("GitHub token validation failed: {}", e);
                None
            }
        }
    }

    /// Exchange an OAuth authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<String, GitHubError> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.settings.oauth_base))
            .header(header::ACCEPT, "application/json")
            .json(&json!({
                "client_id": self.settings.client_id,
                "client_secret": self.settings.client_secret,
                "code": code,
            }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: TokenResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) => return Err(GitHubError::Status { status, body: text }),
        };

        if let Some(error) = parsed.error {
            return Err(GitHubError::OAuth {
                description: parsed.error_description.unwrap_or(error),
            });
        }

        parsed
            .access_token
            .ok_or(GitHubError::Status { status, body: text })
    }

    /// File an issue in the configured repository with the server-held token
    pub async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue, GitHubError> {
        let response = self
            .http
            .post(format!(
                "{}/repos/{}/{}/issues",
                self.settings.api_base, self.settings.repo_owner, self.settings.repo_name
            ))
            .header(header::AUTHORIZATION, format!("token {}", self.settings.token))
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .header(header::USER_AGENT, USER_AGENT)
            .json(issue)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::IssueRejected { status, body });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GitHubClient {
        let mut settings = test_config().github;
        settings.api_base = server.base_url();
        settings.oauth_base = server.base_url();
        GitHubClient::new(Client::new(), settings)
    }

    #[tokio::test]
    async fn test_validate_token_returns_user() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/user")
                    .header("authorization", "token good-token");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"login":"octocat","avatar_url":"https://a/1.png","name":"Mona"}"#);
            })
            .await;

        let user = client(&server).validate_token("good-token").await.unwrap();

        mock.assert_async().await;
        assert_eq!(user.login, "octocat");
        assert_eq!(user.name.as_deref(), Some("Mona"));
    }

    #[tokio::test]
    async fn test_validate_token_fails_closed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/user");
                then.status(401).body(r#"{"message":"Bad credentials"}"#);
            })
            .await;

        assert!(client(&server).validate_token("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_validate_token_unreachable_provider_is_invalid() {
        let mut settings = test_config().github;
        settings.api_base = "http://127.0.0.1:9".to_string();
        let github = GitHubClient::new(Client::new(), settings);

        assert!(github.validate_token("whatever").await.is_none());
    }

    #[tokio::test]
    async fn test_validate_empty_token_skips_provider() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/user");
                then.status(200).body(r#"{"login":"x"}"#);
            })
            .await;

        assert!(client(&server).validate_token("  ").await.is_none());
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_exchange_code_error_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login/oauth/access_token");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#);
            })
            .await;

        let err = client(&server).exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, GitHubError::OAuth { .. }));
        assert_eq!(err.to_string(), "The code passed is incorrect or expired.");
    }

    #[tokio::test]
    async fn test_create_issue_propagates_error_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/repos/journal/submissions/issues");
                then.status(422).body("Validation Failed");
            })
            .await;

        let issue = NewIssue {
            title: "[Submission] T".to_string(),
            body: "body".to_string(),
            labels: vec!["submission".to_string()],
        };
        let err = client(&server).create_issue(&issue).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create issue: Validation Failed");
    }
}
