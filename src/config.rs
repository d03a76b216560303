//! Configuration management for fileroot
//!
//! Settings are read once at startup from built-in defaults, an optional
//! `config.toml`, and `FILEROOT_*` environment variables, in that order.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::filter::{DEFAULT_ALLOWED_EXTENSIONS, ExtensionFilter};

/// Default configuration file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    // ═══ NETWORK ═══
    /// IP address to bind the control connection
    pub bind_address: String,

    /// Port for the control connection (0 picks a free port)
    pub control_port: u16,

    /// Maximum concurrent clients
    pub max_clients: usize,

    /// Maximum command line length in bytes
    pub max_command_length: usize,

    // ═══ SANDBOX ═══
    /// The only directory tree reachable by clients; created if absent
    pub sandbox_root: String,

    /// Comma-separated `*.ext` patterns of visible/uploadable files
    pub allowed_extensions: String,

    /// Refuse uploads, deletes and directory creation
    pub read_only: bool,

    /// Maximum upload size in MB, 0 for unlimited
    pub max_upload_size_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            max_clients: 10,
            max_command_length: 512,
            sandbox_root: "./sandbox_root".to_string(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS.to_string(),
            read_only: false,
            max_upload_size_mb: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the named file (extension optional) with
    /// environment overrides
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", defaults.control_port as i64)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("sandbox_root", defaults.sandbox_root)?
            .set_default("allowed_extensions", defaults.allowed_extensions)?
            .set_default("read_only", defaults.read_only)?
            .set_default("max_upload_size_mb", defaults.max_upload_size_mb as i64)?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("FILEROOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox_root.trim().is_empty() {
            return Err(ConfigError::Message("sandbox_root cannot be empty".into()));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        ExtensionFilter::parse(&self.allowed_extensions)
            .map_err(|e| ConfigError::Message(format!("allowed_extensions: {e}")))?;

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Get sandbox root as PathBuf
    pub fn sandbox_root_path(&self) -> PathBuf {
        PathBuf::from(&self.sandbox_root)
    }

    /// Get the parsed extension allow-list
    pub fn extension_filter(&self) -> Result<ExtensionFilter, crate::error::FilterError> {
        ExtensionFilter::parse(&self.allowed_extensions)
    }

    /// Get maximum upload size in bytes, `None` when unlimited
    pub fn max_upload_bytes(&self) -> Option<u64> {
        match self.max_upload_size_mb {
            0 => None,
            mb => Some(mb.saturating_mul(1024 * 1024)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_socket(), "127.0.0.1:2121");
        assert_eq!(config.max_upload_bytes(), Some(100 * 1024 * 1024));
        assert!(config.extension_filter().unwrap().is_allowed("a.pdf"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fileroot.toml");
        fs::write(
            &path,
            "sandbox_root = \"/srv/files\"\n\
             allowed_extensions = \"*.png, *.jpg\"\n\
             control_port = 3030\n\
             read_only = true\n\
             max_upload_size_mb = 0\n",
        )
        .unwrap();

        let config = ServerConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sandbox_root_path(), PathBuf::from("/srv/files"));
        assert_eq!(config.control_port, 3030);
        assert!(config.read_only);
        assert_eq!(config.max_upload_bytes(), None);
        assert_eq!(config.max_clients, 10);

        let filter = config.extension_filter().unwrap();
        assert!(filter.is_allowed("x.JPG"));
        assert!(!filter.is_allowed("x.pdf"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent");

        let config = ServerConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.allowed_extensions = "png".into();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.max_clients = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.sandbox_root = "  ".into();
        assert!(config.validate().is_err());
    }
}
