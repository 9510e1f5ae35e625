//! Agent configuration loader for Parley.
//!
//! Reads `parley.toml` from the data directory (`~/.parley/` in production)
//! and deserializes it into [`AgentConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use parley_types::config::AgentConfig;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "parley.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PARLEY_DATA_DIR` environment variable
/// 2. `~/.parley`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }

    PathBuf::from(".parley")
}

/// Load agent configuration from `{data_dir}/parley.toml`.
///
/// - If the file does not exist, returns [`AgentConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_agent_config(data_dir: &Path) -> AgentConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return AgentConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AgentConfig::default();
        }
    };

    match toml::from_str::<AgentConfig>(&content) {
        Ok(config) => {
            if config.models.is_empty() {
                tracing::warn!(
                    "{} lists no models, using the default catalog",
                    config_path.display()
                );
                return AgentConfig {
                    models: AgentConfig::default().models,
                    ..config
                };
            }
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AgentConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_agent_config(tmp.path()).await;
        assert_eq!(config.reply_limit, 256);
        assert_eq!(config.models.len(), 5);
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
model_url = "http://10.0.0.2:8960"
isolate_rooms = true
reply_limit = 120
thinking_reaction = ""
"#,
        )
        .await
        .unwrap();

        let config = load_agent_config(tmp.path()).await;
        assert_eq!(config.model_url, "http://10.0.0.2:8960");
        assert!(config.isolate_rooms);
        assert_eq!(config.reply_limit, 120);
        assert!(config.thinking_reaction.is_empty());
        assert_eq!(config.models.len(), 5);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_agent_config(tmp.path()).await;
        assert_eq!(config.reply_limit, 256);
        assert!(!config.isolate_rooms);
    }

    #[tokio::test]
    async fn empty_catalog_falls_back_to_default_models() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "models = []\nreply_limit = 64\n")
            .await
            .unwrap();

        let config = load_agent_config(tmp.path()).await;
        assert_eq!(config.models.len(), 5);
        assert_eq!(config.reply_limit, 64);
    }

    #[test]
    fn resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("PARLEY_DATA_DIR", "/tmp/test-parley");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-parley"));
        unsafe {
            std::env::remove_var("PARLEY_DATA_DIR");
        }
    }
}
