//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.
//! Secrets are only required for the services that are actually mounted.

use std::env;
use std::path::PathBuf;

/// Default cap on uploaded PDFs: 50 MiB
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Environment (development/production)
    pub environment: Environment,
    /// Services mounted on this instance
    pub services: Vec<Service>,
    /// Origin allowed by CORS on the notify, oauth and upload services
    pub allowed_origin: String,
    /// Postgres URL for the metrics key-value table
    pub database_url: Option<String>,
    /// Root directory of the filesystem object store
    pub storage_dir: PathBuf,
    /// Maximum upload file size in bytes
    pub max_upload_size: usize,
    /// HMAC key for upload tickets
    pub upload_secret: String,
    /// Externally visible base URL of this service
    pub public_base_url: String,
    pub github: GitHubSettings,
    pub email: EmailSettings,
}

/// Identity provider and issue tracker settings
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_base: String,
    pub oauth_base: String,
    pub client_id: String,
    pub client_secret: String,
    /// Server-held token used to file review issues
    pub token: String,
    pub repo_owner: String,
    pub repo_name: String,
}

/// Transactional email settings
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_base: String,
    pub api_key: String,
    pub from: String,
    pub journal_name: String,
    pub journal_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Independently deployable edge service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Notify,
    Metrics,
    OAuth,
    Upload,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::Notify,
        Service::Metrics,
        Service::OAuth,
        Service::Upload,
    ];

    fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_lowercase().as_str() {
            "notify" | "email" => Ok(Service::Notify),
            "metrics" => Ok(Service::Metrics),
            "oauth" => Ok(Service::OAuth),
            "upload" | "pdf" => Ok(Service::Upload),
            other => Err(ConfigError::Invalid(format!("unknown service '{}'", other))),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let services = match env::var("SERVICES") {
            Ok(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Service::parse)
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => Service::ALL.to_vec(),
        };

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT '{}' is not a port number", p)))?,
            Err(_) => 8080,
        };

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            environment,
            services,
            allowed_origin: env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "https://akz4ol.github.io".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            storage_dir: PathBuf::from(
                env::var("STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string()),
            ),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
            upload_secret: env::var("UPLOAD_SECRET").unwrap_or_default(),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            github: GitHubSettings {
                api_base: env::var("GITHUB_API_BASE")
                    .unwrap_or_else(|_| "https://api.github.com".to_string()),
                oauth_base: env::var("GITHUB_OAUTH_BASE")
                    .unwrap_or_else(|_| "https://github.com".to_string()),
                client_id: env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
                token: env::var("GITHUB_TOKEN").unwrap_or_default(),
                repo_owner: env::var("GITHUB_REPO_OWNER").unwrap_or_else(|_| "akz4ol".to_string()),
                repo_name: env::var("GITHUB_REPO_NAME")
                    .unwrap_or_else(|_| "agentic-journal".to_string()),
            },
            email: EmailSettings {
                api_base: env::var("RESEND_API_BASE")
                    .unwrap_or_else(|_| "https://api.resend.com".to_string()),
                api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
                from: env::var("FROM_EMAIL")
                    .unwrap_or_else(|_| "notifications@agentic-journal.com".to_string()),
                journal_name: env::var("JOURNAL_NAME")
                    .unwrap_or_else(|_| "Agentic Journal".to_string()),
                journal_url: env::var("JOURNAL_URL")
                    .unwrap_or_else(|_| "https://akz4ol.github.io/agentic-journal".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that every mounted service has the secrets it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Invalid("SERVICES lists no services".to_string()));
        }

        let mut missing = Vec::new();
        if self.serves(Service::Notify) && self.email.api_key.is_empty() {
            missing.push("RESEND_API_KEY");
        }
        if self.serves(Service::OAuth) {
            if self.github.client_id.is_empty() {
                missing.push("GITHUB_CLIENT_ID");
            }
            if self.github.client_secret.is_empty() {
                missing.push("GITHUB_CLIENT_SECRET");
            }
        }
        if self.serves(Service::Upload) {
            if self.upload_secret.is_empty() {
                missing.push("UPLOAD_SECRET");
            }
            if self.github.token.is_empty() {
                missing.push("GITHUB_TOKEN");
            }
        }
        if self.serves(Service::Metrics) && self.is_production() && self.database_url.is_none() {
            missing.push("DATABASE_URL");
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(format!(
                "{} required by the enabled services",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    /// Whether this instance mounts the given service
    pub fn serves(&self, service: Service) -> bool {
        self.services.contains(&service)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: Environment::Development,
        services: Service::ALL.to_vec(),
        allowed_origin: "https://portal.example".to_string(),
        database_url: None,
        storage_dir: PathBuf::from("./storage"),
        max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        upload_secret: "test-upload-secret".to_string(),
        public_base_url: "https://edge.example".to_string(),
        github: GitHubSettings {
            api_base: "http://127.0.0.1:9".to_string(),
            oauth_base: "http://127.0.0.1:9".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            token: "server-token".to_string(),
            repo_owner: "journal".to_string(),
            repo_name: "submissions".to_string(),
        },
        email: EmailSettings {
            api_base: "http://127.0.0.1:9".to_string(),
            api_key: "resend-key".to_string(),
            from: "notifications@journal.example".to_string(),
            journal_name: "Agentic Journal".to_string(),
            journal_url: "https://journal.example".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_parse() {
        assert_eq!(Service::parse("metrics").unwrap(), Service::Metrics);
        assert_eq!(Service::parse(" Upload ").unwrap(), Service::Upload);
        assert_eq!(Service::parse("email").unwrap(), Service::Notify);
        assert!(matches!(Service::parse("cron"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_upload_secret() {
        let mut config = test_config();
        config.upload_secret.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("UPLOAD_SECRET"));
    }

    #[test]
    fn test_validate_ignores_secrets_of_disabled_services() {
        let mut config = test_config();
        config.services = vec![Service::Metrics];
        config.upload_secret.clear();
        config.email.api_key.clear();
        config.github.client_secret.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_production_metrics_needs_database() {
        let mut config = test_config();
        config.environment = Environment::Production;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        config.database_url = Some("postgres://localhost/metrics".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_service_list() {
        let mut config = test_config();
        config.services.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
