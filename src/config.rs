// src/config.rs
use crate::utils::AppError;
use std::path::PathBuf;

pub const DEFAULT_EMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// Where and how to reach the model server.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub chat_model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub embed_base_url: String,
    pub embed_model: String,
}

/// Everything the service needs, resolved once at startup and passed down.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_root: PathBuf,
    pub index_dir: PathBuf,
    pub database_url: Option<String>,
    pub fallback_db_path: PathBuf,
    pub report_extensions: Vec<String>,
    pub transcript_extensions: Vec<String>,
    pub bind_addr: String,
    pub model: ModelConfig,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => tracing::debug!("No .env file found"),
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("LLM_BASE_URL").unwrap_or_else(|| "http://localhost:8080/v1".to_string());
        let max_tokens = match get("LLM_MAX_TOKENS") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| AppError::Config(format!("LLM_MAX_TOKENS must be a positive integer, got '{}'", raw)))?,
            ),
            None => Some(1024),
        };

        let report_extensions = split_list(&get("REPORT_EXTENSIONS").unwrap_or_else(|| "pdf".to_string()));
        if report_extensions.is_empty() {
            return Err(AppError::Config("REPORT_EXTENSIONS lists no extensions".to_string()));
        }

        Ok(Self {
            data_root: PathBuf::from(get("DATA_ROOT").unwrap_or_else(|| "./data".to_string())),
            index_dir: PathBuf::from(get("INDEX_DIR").unwrap_or_else(|| "./db/index".to_string())),
            database_url: get("DATABASE_URL"),
            fallback_db_path: PathBuf::from(
                get("FALLBACK_DB_PATH").unwrap_or_else(|| "./db/app_fallback.sqlite".to_string()),
            ),
            report_extensions,
            transcript_extensions: vec!["pdf".to_string(), "txt".to_string()],
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            model: ModelConfig {
                embed_base_url: get("EMBED_BASE_URL").unwrap_or_else(|| base_url.clone()),
                base_url,
                chat_model: get("LLM_MODEL").unwrap_or_else(|| "local-model".to_string()),
                api_key: get("LLM_API_KEY"),
                max_tokens,
                embed_model: get("EMBED_MODEL").unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            },
        })
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_root.join("financial_reports")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_root.join("transcripts")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_root, PathBuf::from("./data"));
        assert_eq!(config.reports_dir(), PathBuf::from("./data/financial_reports"));
        assert_eq!(config.transcripts_dir(), PathBuf::from("./data/transcripts"));
        assert_eq!(config.index_dir, PathBuf::from("./db/index"));
        assert_eq!(config.database_url, None);
        assert_eq!(config.report_extensions, vec!["pdf"]);
        assert_eq!(config.model.embed_model, DEFAULT_EMBED_MODEL);
        assert_eq!(config.model.embed_base_url, config.model.base_url);
        assert_eq!(config.model.max_tokens, Some(1024));
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATA_ROOT", "/srv/forecast"),
            ("DATABASE_URL", "   "),
            ("REPORT_EXTENSIONS", ".PDF, txt"),
            ("EMBED_BASE_URL", "http://embed:9000/v1"),
            ("LLM_API_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.reports_dir(), PathBuf::from("/srv/forecast/financial_reports"));
        assert_eq!(config.database_url, None);
        assert_eq!(config.report_extensions, vec!["pdf", "txt"]);
        assert_eq!(config.model.embed_base_url, "http://embed:9000/v1");
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = AppConfig::from_lookup(lookup(&[("LLM_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        let err = AppConfig::from_lookup(lookup(&[("REPORT_EXTENSIONS", " , ")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
