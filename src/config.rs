//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFORMAT_CONFIG` (environment variable)
//! 2. `~/.config/mailformat/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailformat\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::formatter::FormatOptions;
use crate::parser::{ParseOptions, DEFAULT_MAX_DEPTH};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Decomposition settings.
    pub parser: ParserConfig,
    /// Rendering settings.
    pub formatter: FormatterConfig,
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

/// Decomposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Types always expanded inline, e.g. `"image/*"`.
    pub force_inline_types: Vec<String>,
    /// Types always collapsed to an attachment bar.
    pub force_collapse_types: Vec<String>,
    /// Deepest nesting decomposed before the rest becomes an attachment.
    pub max_depth: usize,
    /// Look for uuencoded and inline PGP blocks in plain text.
    pub inline_filter: bool,
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Decode all text with this charset.
    pub charset: Option<String>,
    /// Charset for text that declares none.
    pub default_charset: String,
    /// Headers shown, in order.
    pub headers: Vec<String>,
    /// Highlight quoted lines.
    pub mark_citations: bool,
    /// Show the original date string next to the local one.
    pub show_real_date: bool,
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

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            force_inline_types: Vec::new(),
            force_collapse_types: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            inline_filter: true,
        }
    }
}

impl Default for FormatterConfig {
    fn default() -> Self {
        let options = FormatOptions::default();
        Self {
            charset: options.charset,
            default_charset: options.default_charset,
            headers: options.headers,
            mark_citations: options.mark_citations,
            show_real_date: options.show_real_date,
        }
    }
}

// ── Conversions ─────────────────────────────────────────────────

impl ParserConfig {
    pub fn to_options(&self) -> ParseOptions {
        ParseOptions {
            force_inline_types: lowercase_all(&self.force_inline_types),
            force_collapse_types: lowercase_all(&self.force_collapse_types),
            max_depth: self.max_depth.max(1),
        }
    }
}

impl FormatterConfig {
    pub fn to_options(&self) -> FormatOptions {
        FormatOptions {
            charset: self.charset.clone().filter(|c| !c.trim().is_empty()),
            default_charset: self.default_charset.clone(),
            headers: lowercase_all(&self.headers),
            mark_citations: self.mark_citations,
            show_real_date: self.show_real_date,
        }
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_ascii_lowercase()).collect()
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from `path`, falling back to defaults on any error.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILFORMAT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailformat").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailformat")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailformat.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert!(cfg.parser.inline_filter);
        assert_eq!(cfg.formatter.default_charset, "utf-8");
        assert_eq!(cfg.formatter.headers.first().map(String::as_str), Some("from"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[parser]
force_inline_types = ["Image/*"]

[formatter]
mark_citations = false
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.formatter.mark_citations);
        assert_eq!(cfg.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.parser.to_options().force_inline_types, vec!["image/*"]);
    }

    #[test]
    fn test_save_then_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.formatter.charset = Some("iso-8859-1".into());
        cfg.parser.max_depth = 8;

        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path);
        assert_eq!(loaded.formatter.charset.as_deref(), Some("iso-8859-1"));
        assert_eq!(loaded.parser.max_depth, 8);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[parser\nmax_depth = ").expect("write");
        let cfg = load_config_from(&path);
        assert_eq!(cfg.parser.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mf"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/mf/mailformat.log"));
    }
}
