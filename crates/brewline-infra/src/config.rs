//! Configuration loader for Brewline.
//!
//! Reads `config.toml` from the data directory (`~/.brewline/` in production)
//! and deserializes it into [`BrewlineConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use brewline_types::config::BrewlineConfig;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "BREWLINE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `BREWLINE_DATA_DIR` environment variable
/// 2. `~/.brewline`
/// 3. `./.brewline`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".brewline");
    }

    PathBuf::from(".brewline")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`BrewlineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> BrewlineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return BrewlineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return BrewlineConfig::default();
        }
    };

    match toml::from_str::<BrewlineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            BrewlineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewline_types::config::HistoryBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config, BrewlineConfig::default());
    }

    #[tokio::test]
    async fn test_load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
listen_addr = "0.0.0.0:9000"

[retry]
max_attempts = 3

[services]
brew_failure_rate = 0.5

[history]
backend = "memory"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.task_queue, "coffee-orders");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.services.brew_failure_rate, 0.5);
        assert_eq!(config.history.backend, HistoryBackend::Memory);
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, BrewlineConfig::default());
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-brewline");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-brewline"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
