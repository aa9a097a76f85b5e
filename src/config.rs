//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLINFO_CONFIG` (environment variable)
//! 2. `~/.config/emlinfo/config.toml` (Linux/macOS)
//!    `%APPDATA%\emlinfo\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::message::{MAX_DEPTH, MAX_MESSAGE_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Output document settings.
    pub output: OutputConfig,
    /// Attachment extraction.
    pub attachments: AttachmentsConfig,
    /// Parser limits.
    pub parser: ParserConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Output document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the document is written to.
    pub directory: PathBuf,
    /// File name of the document.
    pub file_name: String,
    /// Add an `<emailHeaders>` block with every header to each entry.
    pub include_headers: bool,
}

/// Attachment extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Store non-text parts of every processed message.
    pub extract: bool,
    /// Where to store them (default: `attachments/` in the output directory).
    pub directory: Option<PathBuf>,
}

/// Parser limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum multipart nesting depth that is descended into.
    pub max_depth: usize,
    /// Maximum message size in bytes (default: 268435456 = 256 MB).
    pub max_message_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: "emlOutput.xml".to_string(),
            include_headers: false,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLINFO_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("emlinfo").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emlinfo")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("emlinfo.log")
}

impl Config {
    /// Full path of the output document.
    pub fn output_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.file_name)
    }

    /// Directory for stored attachments, if extraction is enabled.
    pub fn attachment_dir(&self) -> Option<PathBuf> {
        if !self.attachments.extract {
            return None;
        }
        Some(
            self.attachments
                .directory
                .clone()
                .unwrap_or_else(|| self.output.directory.join("attachments")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.output.file_name, "emlOutput.xml");
        assert!(!cfg.output.include_headers);
        assert!(!cfg.attachments.extract);
        assert_eq!(cfg.parser.max_depth, 10);
        assert_eq!(cfg.output_path(), PathBuf::from("./emlOutput.xml"));
        assert_eq!(cfg.attachment_dir(), None);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.output.file_name, cfg.output.file_name);
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.parser.max_message_size, cfg.parser.max_message_size);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[output]
directory = "/srv/out"

[attachments]
extract = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.output.directory, PathBuf::from("/srv/out"));
        assert_eq!(cfg.attachment_dir(), Some(PathBuf::from("/srv/out/attachments")));
        // Other fields use defaults
        assert_eq!(cfg.output.file_name, "emlOutput.xml");
        assert_eq!(cfg.general.log_level, "warn");
    }
}
