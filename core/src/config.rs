use crate::errors::{RelayError, RelayResult};
use crate::types::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SECRET_KEY: &str = "dev-secret-change-me";
/// Secret variable read by earlier Flask deployments of this relay
pub const LEGACY_SECRET_ENV: &str = "FLASK_SECRET_KEY";

/// Where per-session state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Entire session in a signed client cookie
    #[default]
    Cookie,
    /// Server-side map keyed by a cookie id
    Memory,
}

impl FromStr for SessionBackend {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(SessionBackend::Cookie),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(RelayError::ConfigError(format!(
                "Unknown session backend '{}', expected 'cookie' or 'memory'",
                other
            ))),
        }
    }
}

impl fmt::Display for SessionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionBackend::Cookie => f.write_str("cookie"),
            SessionBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Process-wide settings, built once at startup
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Cloud project hosting the model
    pub project_id: String,
    /// Region of the Vertex AI endpoint
    pub location: String,
    pub model_name: String,
    /// Path to the service-account JSON key
    pub service_account_file: PathBuf,
    /// Secret used to sign session cookies
    pub secret_key: String,
    pub system_prompt: String,
    pub host: String,
    pub port: u16,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    pub api_base_url: Option<String>,
    pub session_backend: SessionBackend,
    pub session_ttl_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            project_id: "vocal-marking-471109-k9".to_string(),
            location: "us-central1".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            service_account_file: PathBuf::from("service_account.json"),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            system_prompt: "You are a helpful, concise assistant. Answer clearly and avoid unnecessary jargon."
                .to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            temperature: 0.6,
            max_output_tokens: 1024,
            request_timeout_secs: 60,
            api_base_url: None,
            session_backend: SessionBackend::Cookie,
            session_ttl_secs: 86_400,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> RelayResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RelayError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            RelayError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Base of the REST endpoint, without a trailing slash
    pub fn api_base(&self) -> String {
        match &self.api_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.api_base(),
            self.project_id,
            self.location,
            self.model_name
        )
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Rejects values the server cannot run with
    pub fn validate(&self) -> RelayResult<()> {
        if self.secret_key.is_empty() {
            return Err(RelayError::ConfigError(
                "Session secret key must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RelayError::ConfigError(
                "Request timeout must be at least one second".to_string(),
            ));
        }
        for (name, value) in [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("model_name", &self.model_name),
        ] {
            if value.trim().is_empty() {
                return Err(RelayError::ConfigError(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

/// Values given on the command line or in the environment; each set field wins
/// over the file and the defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub model_name: Option<String>,
    pub service_account_file: Option<PathBuf>,
    pub secret_key: Option<String>,
    pub system_prompt: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub api_base_url: Option<String>,
    pub session_backend: Option<SessionBackend>,
    pub session_ttl_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Fill an unset secret from `FLASK_SECRET_KEY` so migrated deployments keep their cookies valid
    pub fn with_legacy_secret<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.secret_key.is_none() {
            self.secret_key = lookup(LEGACY_SECRET_ENV).filter(|v| !v.is_empty());
        }
        self
    }
}

impl RelayConfig {
    /// Merges overrides into this config, preferring values from the overrides if present
    pub fn merge(&self, other: &ConfigOverrides) -> Self {
        Self {
            project_id: other.project_id.clone().unwrap_or_else(|| self.project_id.clone()),
            location: other.location.clone().unwrap_or_else(|| self.location.clone()),
            model_name: other.model_name.clone().unwrap_or_else(|| self.model_name.clone()),
            service_account_file: other
                .service_account_file
                .clone()
                .unwrap_or_else(|| self.service_account_file.clone()),
            secret_key: other.secret_key.clone().unwrap_or_else(|| self.secret_key.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .unwrap_or_else(|| self.system_prompt.clone()),
            host: other.host.clone().unwrap_or_else(|| self.host.clone()),
            port: other.port.unwrap_or(self.port),
            temperature: other.temperature.unwrap_or(self.temperature),
            max_output_tokens: other.max_output_tokens.unwrap_or(self.max_output_tokens),
            request_timeout_secs: other.request_timeout_secs.unwrap_or(self.request_timeout_secs),
            api_base_url: other.api_base_url.clone().or_else(|| self.api_base_url.clone()),
            session_backend: other.session_backend.unwrap_or(self.session_backend),
            session_ttl_secs: other.session_ttl_secs.unwrap_or(self.session_ttl_secs),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> RelayResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        RelayError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> RelayResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_endpoint_url() {
        let config = RelayConfig::default();
        assert_eq!(
            config.endpoint_url(),
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/vocal-marking-471109-k9/locations/us-central1/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_base_override_strips_trailing_slash() {
        let config = RelayConfig {
            api_base_url: Some("http://127.0.0.1:9000/".to_string()),
            project_id: "p".to_string(),
            location: "l".to_string(),
            model_name: "m".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(
            config.endpoint_url(),
            "http://127.0.0.1:9000/v1beta1/projects/p/locations/l/publishers/google/models/m:generateContent"
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model_name = \"gemini-2.5-pro\"\nport = 8080\nsession_backend = \"memory\""
        )
        .unwrap();

        let config = RelayConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.model_name, "gemini-2.5-pro");
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_backend, SessionBackend::Memory);
        assert_eq!(config.location, "us-central1");
        assert_eq!(config.max_output_tokens, 1024);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result = RelayConfig::load_from_file(file.path());
        assert!(matches!(result, Err(RelayError::ConfigError(_))));
    }

    #[test]
    fn test_overrides_beat_file_beat_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "model_name = \"from-file\"\nport = 7000\nlocation = \"europe-west4\"").unwrap();
        let from_file = RelayConfig::load_from_file(file.path()).unwrap();

        let overrides = ConfigOverrides {
            port: Some(9000),
            api_base_url: Some("http://localhost:1234".to_string()),
            session_backend: Some(SessionBackend::Memory),
            ..ConfigOverrides::default()
        };
        let config = from_file.merge(&overrides);

        assert_eq!(config.port, 9000);
        assert_eq!(config.model_name, "from-file");
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.project_id, RelayConfig::default().project_id);
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(config.session_backend, SessionBackend::Memory);
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let config = RelayConfig::default();
        assert_eq!(config.merge(&ConfigOverrides::default()), config);
    }

    #[test]
    fn test_legacy_secret_fills_missing_secret() {
        let lookup = |name: &str| (name == LEGACY_SECRET_ENV).then(|| "flask-secret".to_string());

        let overrides = ConfigOverrides::default().with_legacy_secret(lookup);
        let config = RelayConfig::default().merge(&overrides);
        assert_eq!(config.secret_key, "flask-secret");
        assert!(!config.uses_default_secret());

        let explicit = ConfigOverrides {
            secret_key: Some("new-secret".to_string()),
            ..ConfigOverrides::default()
        }
        .with_legacy_secret(lookup);
        assert_eq!(explicit.secret_key.as_deref(), Some("new-secret"));

        let unset = ConfigOverrides::default().with_legacy_secret(|_| None);
        assert_eq!(RelayConfig::default().merge(&unset).secret_key, DEFAULT_SECRET_KEY);
    }

    #[test]
    fn test_session_backend_parsing() {
        assert_eq!("Cookie".parse::<SessionBackend>().unwrap(), SessionBackend::Cookie);
        assert_eq!(" memory ".parse::<SessionBackend>().unwrap(), SessionBackend::Memory);
        assert!("redis".parse::<SessionBackend>().is_err());
    }

    #[test]
    fn test_validate() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_default_secret());

        let bad = RelayConfig {
            secret_key: String::new(),
            ..RelayConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = RelayConfig {
            request_timeout_secs: 0,
            ..RelayConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
