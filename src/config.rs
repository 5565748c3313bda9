use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/vigil.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3001,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    /// Lower values reduce memory usage but decrease GPU resistance.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// HMAC secret for signing tokens. Overridden by VIGIL_JWT_SECRET when set.
    /// The default is a deliberately weak dev value for the lab.
    pub jwt_secret: String,

    /// Token lifetime in minutes (default: 120)
    pub token_ttl_minutes: i64,

    /// Failed attempts before a brute-force lock (default: 5)
    pub lockout_max_attempts: u32,

    /// Base lockout window in minutes; doubles once strikes reach the
    /// attempt threshold (default: 15)
    pub lockout_base_window_minutes: i64,

    /// Max characters of raw payload kept in audit context fields
    pub audit_snippet_chars: usize,

    /// Whether X-Forwarded-For / X-Real-IP are trusted for client IPs.
    /// When false the socket peer address is used.
    pub trust_proxy_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            jwt_secret: "vigil_insecure_dev_secret_change_me".to_string(),
            token_ttl_minutes: 120,
            lockout_max_attempts: 5,
            lockout_base_window_minutes: 15,
            audit_snippet_chars: 2000,
            trust_proxy_headers: true,
        }
    }
}

impl SecurityConfig {
    /// Effective signing secret, env override first.
    #[must_use]
    pub fn effective_jwt_secret(&self) -> String {
        std::env::var("VIGIL_JWT_SECRET").unwrap_or_else(|_| self.jwt_secret.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory the traversal-test endpoints are confined to.
    /// Created on daemon start if missing.
    pub root_path: String,

    /// Lowercase extensions (no dot) readable through the sandbox
    pub allowed_extensions: Vec<String>,

    /// Largest file the read endpoint will return (default: 1 MiB)
    pub max_file_bytes: u64,

    /// Percent-decode iterations before giving up on a stabilizing input
    pub max_decode_rounds: u32,

    /// Content-Length cap for the save-file endpoint (default: 5 MiB)
    pub max_upload_bytes: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root_path: "data/safe-files".to_string(),
            allowed_extensions: vec![
                "txt".to_string(),
                "log".to_string(),
                "json".to_string(),
                "md".to_string(),
            ],
            max_file_bytes: 1024 * 1024,
            max_decode_rounds: 5,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "vigil".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            sandbox: SandboxConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vigil").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".vigil").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.enabled && self.server.port == 0 {
            anyhow::bail!("Server port must be > 0 when the server is enabled");
        }

        if self.security.lockout_max_attempts == 0 {
            anyhow::bail!("lockout_max_attempts must be > 0");
        }

        if self.security.lockout_base_window_minutes <= 0 {
            anyhow::bail!("lockout_base_window_minutes must be > 0");
        }

        if self.security.token_ttl_minutes <= 0 {
            anyhow::bail!("token_ttl_minutes must be > 0");
        }

        if self.sandbox.allowed_extensions.is_empty() {
            anyhow::bail!("Sandbox extension allow-list cannot be empty");
        }

        if self.sandbox.max_decode_rounds == 0 {
            anyhow::bail!("max_decode_rounds must be > 0");
        }

        if self.sandbox.max_file_bytes == 0 {
            anyhow::bail!("max_file_bytes must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.security.lockout_max_attempts, 5);
        assert_eq!(config.security.lockout_base_window_minutes, 15);
        assert_eq!(config.sandbox.max_file_bytes, 1024 * 1024);
        assert!(
            config
                .sandbox
                .allowed_extensions
                .contains(&"txt".to_string())
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security]"));
        assert!(toml_str.contains("[sandbox]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security]
            lockout_base_window_minutes = 20
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.lockout_base_window_minutes, 20);

        assert_eq!(config.sandbox.max_decode_rounds, 5);
    }

    #[test]
    fn test_validate_rejects_empty_extension_list() {
        let mut config = Config::default();
        config.sandbox.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.security.lockout_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
