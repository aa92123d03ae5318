//! Static configuration for the hosted backend.
//!
//! Loaded once at startup, either from a deserialized structure or from the
//! environment. Endpoint URLs default to the production services and can be
//! overridden to point at emulators or test servers. A bad configuration is
//! fatal at construction time; it never surfaces as an operation envelope.

use serde::{Deserialize, Serialize};

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_storage_url() -> String {
    "https://firebasestorage.googleapis.com".to_string()
}

/// Configuration errors. These are fatal: construction fails, no envelope.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),

    /// A required field is empty or malformed
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The shared HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Connection settings for the three hosted services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key identifying this application to the identity provider
    pub api_key: String,
    /// Project id the document store lives under
    pub project_id: String,
    /// Bucket name for blob storage
    pub storage_bucket: String,
    /// Identity provider endpoint
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// Document store endpoint
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    /// Blob store endpoint
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
}

impl BackendConfig {
    /// Create a config with production endpoints.
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        storage_bucket: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            storage_bucket: storage_bucket.into(),
            identity_url: default_identity_url(),
            firestore_url: default_firestore_url(),
            storage_url: default_storage_url(),
        }
    }

    /// Override the identity provider endpoint.
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    /// Override the document store endpoint.
    pub fn with_firestore_url(mut self, url: impl Into<String>) -> Self {
        self.firestore_url = url.into();
        self
    }

    /// Override the blob store endpoint.
    pub fn with_storage_url(mut self, url: impl Into<String>) -> Self {
        self.storage_url = url.into();
        self
    }

    /// Load from `TANKOBON_API_KEY`, `TANKOBON_PROJECT_ID` and
    /// `TANKOBON_STORAGE_BUCKET`, with optional `TANKOBON_IDENTITY_URL`,
    /// `TANKOBON_FIRESTORE_URL` and `TANKOBON_STORAGE_URL` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        fn required(name: &'static str) -> Result<String, ConfigError> {
            std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
        }

        let mut config = Self::new(
            required("TANKOBON_API_KEY")?,
            required("TANKOBON_PROJECT_ID")?,
            required("TANKOBON_STORAGE_BUCKET")?,
        );
        if let Ok(url) = std::env::var("TANKOBON_IDENTITY_URL") {
            config.identity_url = url;
        }
        if let Ok(url) = std::env::var("TANKOBON_FIRESTORE_URL") {
            config.firestore_url = url;
        }
        if let Ok(url) = std::env::var("TANKOBON_STORAGE_URL") {
            config.storage_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::Invalid("api_key is empty".to_string()));
        }
        if self.project_id.is_empty() {
            return Err(ConfigError::Invalid("project_id is empty".to_string()));
        }
        if self.storage_bucket.is_empty() {
            return Err(ConfigError::Invalid("storage_bucket is empty".to_string()));
        }
        for (name, url) in [
            ("identity_url", &self.identity_url),
            ("firestore_url", &self.firestore_url),
            ("storage_url", &self.storage_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_production() {
        let config = BackendConfig::new("key", "project", "bucket");
        assert!(config.identity_url.contains("identitytoolkit"));
        assert!(config.firestore_url.contains("firestore"));
        assert!(config.storage_url.contains("firebasestorage"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply() {
        let config = BackendConfig::new("key", "project", "bucket")
            .with_identity_url("http://localhost:9099/v1")
            .with_firestore_url("http://localhost:8080/v1")
            .with_storage_url("http://localhost:9199");
        assert_eq!(config.identity_url, "http://localhost:9099/v1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_fields_rejected() {
        let config = BackendConfig::new("", "project", "bucket");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_url_rejected() {
        let config = BackendConfig::new("key", "project", "bucket").with_storage_url("gs://bucket");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_deserialize_fills_default_urls() {
        let config: BackendConfig = serde_json::from_str(
            r#"{ "api_key": "k", "project_id": "p", "storage_bucket": "b" }"#,
        )
        .unwrap();
        assert!(config.identity_url.contains("identitytoolkit"));
    }
}
