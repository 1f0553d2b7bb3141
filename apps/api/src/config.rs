use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Only the listening port and log level have hard requirements; a missing
/// API key is tolerated at startup and surfaces on every analysis call instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Size of the batch worker pool. Fixed for the lifetime of the process.
    pub batch_workers: usize,
}

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BATCH_WORKERS: usize = 10;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let batch_workers = std::env::var("BATCH_WORKERS")
            .ok()
            .map(|v| {
                v.parse::<usize>()
                    .context("BATCH_WORKERS must be a positive integer")
            })
            .transpose()?
            .unwrap_or(DEFAULT_BATCH_WORKERS);
        if batch_workers == 0 {
            bail!("BATCH_WORKERS must be at least 1");
        }

        Ok(Config {
            google_api_key: optional_env("GOOGLE_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            batch_workers,
        })
    }

    pub fn api_key_configured(&self) -> bool {
        self.google_api_key.is_some()
    }
}

/// Reads an env var, treating an empty or whitespace-only value as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_env_ignores_blank_values() {
        std::env::set_var("WORKTREE_TEST_BLANK_KEY", "   ");
        assert_eq!(optional_env("WORKTREE_TEST_BLANK_KEY"), None);
        std::env::set_var("WORKTREE_TEST_SET_KEY", " abc ");
        assert_eq!(optional_env("WORKTREE_TEST_SET_KEY").as_deref(), Some("abc"));
    }

    #[test]
    fn test_api_key_configured_reflects_option() {
        let mut config = Config {
            google_api_key: None,
            port: DEFAULT_PORT,
            rust_log: "info".to_string(),
            batch_workers: DEFAULT_BATCH_WORKERS,
        };
        assert!(!config.api_key_configured());
        config.google_api_key = Some("key".to_string());
        assert!(config.api_key_configured());
    }
}
