//! Runtime settings read from the environment.
//!
//! `main` calls `dotenv::dotenv().ok()` before `Settings::from_env()`, so a
//! local `.env` file works the same as real environment variables.

use crate::error::{Result, WardError};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    /// JSON file mapping table names to allowed column lists.
    pub schema_path: PathBuf,

    /// Optional file overriding the built-in base prompt.
    pub prompt_path: Option<PathBuf>,

    /// SQLite database holding the generation audit log.
    pub log_db_path: PathBuf,

    pub api_key: String,
    pub base_url: String,
    pub model: String,

    pub embedding_dimension: usize,
    pub seed_limit: usize,

    /// Wires the opt-in operator/function/keyword linter into the gate.
    pub enable_linter: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            schema_path: PathBuf::from(env_or("SQLWARD_SCHEMA_PATH", "config/allowed_schema.json")),
            prompt_path: std::env::var("SQLWARD_PROMPT_PATH").ok().map(PathBuf::from),
            log_db_path: PathBuf::from(env_or("SQLWARD_LOG_DB", "data/generation_log.db")),
            api_key: env_or("SQLWARD_API_KEY", "dummy-api-key"),
            base_url: env_or("SQLWARD_LLM_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("SQLWARD_LLM_MODEL", "gpt-4o-mini"),
            embedding_dimension: parse_env("SQLWARD_EMBED_DIM", 128)?,
            seed_limit: parse_env("SQLWARD_SEED_LIMIT", 50)?,
            enable_linter: parse_bool_env("SQLWARD_ENABLE_LINTER", false)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| WardError::Config(format!("invalid value for {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(WardError::Config(format!("invalid value for {}: {}", key, raw))),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.embedding_dimension, 128);
        assert_eq!(settings.seed_limit, 50);
        assert!(!settings.enable_linter);
        assert_eq!(settings.api_key, "dummy-api-key");
    }
}
