use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LINKAUDIT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/linkaudit.toml";
const ENV_PREFIX: &str = "LINKAUDIT";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    // Load secrets from environment variables
    load_secrets(&mut config);

    Ok(config)
}

/// Load secrets from environment variables into config.
/// Secrets are never stored in TOML files, only in environment.
fn load_secrets(config: &mut Config) {
    if let Ok(api_key) = env::var("SAFEBROWSING_API_KEY") {
        config.safebrowsing.api_key = Some(api_key);
    }

    // Alternative: Google-style environment variable name
    if config.safebrowsing.api_key.is_none()
        && let Ok(api_key) = env::var("GOOGLE_API_KEY")
    {
        config.safebrowsing.api_key = Some(api_key);
    }
}

/// Load configuration from a specific path and environment.
/// Useful for testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Start with defaults (handled by struct Default implementations)
    // Add TOML file if it exists (optional)
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Add environment variable overrides
    // LINKAUDIT__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[checker]
slow_threshold = "4s"
hop_limit = 10
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.checker.slow_threshold.as_millis(), 4000);
        assert_eq!(config.checker.hop_limit, 10);
    }

    #[test]
    fn test_complex_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
ledger_path = "data/ledger"
queue_path = "data/queue"

[server.api]
max_payload_bytes = 2097152
max_uris_per_batch = 500

[checker]
connect_timeout = "3s"
request_timeout = "8s"
risky_tlds = ["xxx", "zip"]
user_agent = "linkaudit-test/1.0"

[worker]
count = 4
channel_size = 50
max_attempts = 5
retry_backoff = "250ms"

[safebrowsing]
endpoint = "https://safebrowsing.example/v4/threatMatches:find"

[retention]
check_ttl_days = 14
batch_ttl_days = 7
prune_interval = "1h"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.server.api.max_uris_per_batch, 500);
        assert_eq!(config.checker.connect_timeout.as_millis(), 3000);
        assert_eq!(config.checker.risky_tlds, vec!["xxx", "zip"]);
        assert_eq!(config.checker.user_agent.as_deref(), Some("linkaudit-test/1.0"));
        assert_eq!(config.worker.count, 4);
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.retention.check_ttl_days, 14);
        assert_eq!(config.retention.prune_interval.as_millis(), 3_600_000);
    }
}
