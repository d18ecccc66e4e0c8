//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `~/.config/shotlift/config.toml`
//! - Windows: `%APPDATA%/shotlift/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shotlift_upload::UploaderConfig;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base API URL; uploads go to `{server_endpoint}/gallery`.
    #[serde(default)]
    pub server_endpoint: String,

    /// Sent verbatim as the `Authorization` header.
    #[serde(default)]
    pub upload_token: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Seconds the transfer may go without progress before failing.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,

    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// Bytes per body chunk (0 = library default).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_transfer_timeout() -> u64 {
    10
}

fn default_shutdown_grace() -> u64 {
    3000
}

fn default_chunk_size() -> usize {
    shotlift_upload::DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_endpoint: String::new(),
            upload_token: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Loads the configuration file, or defaults if there is none.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds the upload token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn to_uploader_config(&self) -> UploaderConfig {
        UploaderConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            chunk_size: self.chunk_size,
        }
    }

    /// Copy safe to print: the token is reduced to its last four characters.
    pub fn masked(&self) -> Self {
        Self {
            upload_token: mask_token(&self.upload_token),
            ..self.clone()
        }
    }
}

fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("shotlift").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("shotlift")
            .join("config.toml")
    }
}
