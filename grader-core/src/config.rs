use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::GradeError;
use crate::fusion::ScoreWeights;

/// Process-wide settings, loaded once at startup and passed into the
/// pipeline's constructor. Secrets left out of the file fall back to the
/// conventional environment variables in [`GradeConfig::resolve_secrets`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GradeConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub scoring: ScoreWeights,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub transcription_model: String,
    pub embedding_model: String,
    /// Expected vector length; unchecked when absent.
    pub embedding_dimensions: Option<usize>,
    /// Language hint forwarded to the transcription service (e.g. "ru", "kk").
    pub language: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
            language: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub uploads_dir: PathBuf,
    pub transcripts_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            transcripts_dir: PathBuf::from("transcripts"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutConfig {
    pub download_secs: u64,
    pub transcription_secs: u64,
    pub embedding_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            download_secs: 30,
            transcription_secs: 300,
            embedding_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl GradeConfig {
    /// Load from an optional TOML file layered with `GRADER__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.resolve_secrets();
        Ok(config)
    }

    /// Fill empty secrets from `TELEGRAM_BOT_TOKEN`, `OPENAI_API_KEY` and
    /// `DATABASE_URL`.
    pub fn resolve_secrets(&mut self) {
        fill_from_env(&mut self.telegram.bot_token, "TELEGRAM_BOT_TOKEN");
        fill_from_env(&mut self.openai.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.database.url, "DATABASE_URL");
    }

    /// Startup validation. Any error here is fatal: the service must not start.
    pub fn validate(&self) -> Result<(), GradeError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(GradeError::Configuration(
                "TELEGRAM_BOT_TOKEN not set".to_string(),
            ));
        }
        if self.openai.api_key.trim().is_empty() {
            return Err(GradeError::Configuration("OPENAI_API_KEY not set".to_string()));
        }
        if self.database.url.trim().is_empty() {
            return Err(GradeError::Configuration("DATABASE_URL not set".to_string()));
        }
        for dir in [&self.storage.uploads_dir, &self.storage.transcripts_dir] {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

fn fill_from_env(slot: &mut String, var: &str) {
    if slot.trim().is_empty() {
        if let Ok(v) = std::env::var(var) {
            *slot = v;
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), GradeError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        GradeError::Configuration(format!(
            "cannot create storage directory {}: {}",
            dir.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &Path) -> GradeConfig {
        let mut config = GradeConfig::default();
        config.telegram.bot_token = "123:abc".to_string();
        config.openai.api_key = "sk-test".to_string();
        config.database.url = "postgresql://localhost/grader".to_string();
        config.storage.uploads_dir = dir.join("uploads");
        config.storage.transcripts_dir = dir.join("transcripts");
        config
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GradeConfig::default();
        assert_eq!(config.openai.transcription_model, "whisper-1");
        assert_eq!(config.openai.embedding_model, "text-embedding-3-small");
        assert_eq!(config.timeouts.transcription_secs, 300);
        assert!((config.scoring.sem - 0.6).abs() < f64::EPSILON);
        assert!((config.scoring.key - 0.3).abs() < f64::EPSILON);
        assert!((config.scoring.ngram - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_creates_storage_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let config = valid_config(tmp.path());

        config.validate().expect("valid config");
        assert!(tmp.path().join("uploads").is_dir());
        assert!(tmp.path().join("transcripts").is_dir());
    }

    #[test]
    fn test_validate_rejects_missing_bot_token() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = valid_config(tmp.path());
        config.telegram.bot_token = "  ".to_string();

        match config.validate() {
            Err(GradeError::Configuration(msg)) => assert!(msg.contains("TELEGRAM_BOT_TOKEN")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = valid_config(tmp.path());
        config.openai.api_key.clear();

        assert!(matches!(
            config.validate(),
            Err(GradeError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("grader.toml");
        std::fs::write(
            &path,
            r#"
[openai]
base_url = "http://localhost:9999"
transcription_model = "whisper-1"
embedding_model = "text-embedding-3-large"
language = "ru"

[scoring]
sem = 0.5
key = 0.5
ngram = 0.0
"#,
        )
        .unwrap();

        let config = GradeConfig::load(path.to_str().unwrap()).expect("load");
        assert_eq!(config.openai.embedding_model, "text-embedding-3-large");
        assert_eq!(config.openai.language.as_deref(), Some("ru"));
        assert!((config.scoring.key - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_load_fills_partial_sections_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("grader.toml");
        std::fs::write(
            &path,
            r#"
[http]
port = 9000

[openai]
language = "ru"

[timeouts]
embedding_secs = 5
"#,
        )
        .unwrap();

        let config = GradeConfig::load(path.to_str().unwrap()).expect("load");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.openai.transcription_model, "whisper-1");
        assert_eq!(config.openai.language.as_deref(), Some("ru"));
        assert_eq!(config.timeouts.embedding_secs, 5);
        assert_eq!(config.timeouts.transcription_secs, 300);
    }

    #[test]
    fn test_load_with_env_override_and_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent.toml");

        std::env::set_var("GRADER__HTTP__PORT", "9000");
        let loaded = GradeConfig::load(missing.to_str().unwrap());
        std::env::remove_var("GRADER__HTTP__PORT");

        let config = loaded.expect("load");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.storage.uploads_dir, PathBuf::from("uploads"));
    }
}
