//! User configuration management
//!
//! Configuration is stored in TOML format at `~/.dekpm/config.toml` and
//! controls the catalog endpoints and the library directory packages are
//! installed into. Every field has a sensible default, so a missing
//! config file is not an error.
//!
//! # Examples
//!
//! ```no_run
//! use dekpm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("Catalog: {}", config.catalog.search_url);
//! println!("Library: {}", config.library.dir.display());
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User configuration file (`~/.dekpm/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote catalog endpoints
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Local library settings
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Endpoint returning the full package catalog as JSON
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Endpoint returning per-package object info as JSON
    #[serde(default = "default_info_url")]
    pub info_url: String,
}

fn default_search_url() -> String {
    "https://deken.puredata.info/search.json".to_string()
}

fn default_info_url() -> String {
    "https://deken.puredata.info/info.json".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            info_url: default_info_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory packages are extracted into, one subdirectory each
    #[serde(default = "default_library_dir")]
    pub dir: PathBuf,
}

fn default_library_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dekpm")
        .join("Library")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: default_library_dir(),
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses DEKPM_CONFIG_DIR if set, otherwise ~/.dekpm/config.toml
    pub fn default_path() -> Result<PathBuf> {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("DEKPM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::Other("Could not find home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".dekpm").join("config.toml"))
    }

    /// Load config from file, or return the defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.catalog.search_url.ends_with("/search.json"));
        assert!(config.catalog.info_url.ends_with("/info.json"));
        assert!(config.library.dir.ends_with("Library"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [catalog]
            search_url = "http://localhost:9999/search.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.search_url, "http://localhost:9999/search.json");
        // Unspecified fields fall back to defaults
        assert_eq!(config.catalog.info_url, default_info_url());
        assert_eq!(config.library.dir, default_library_dir());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.library.dir = PathBuf::from("/tmp/dekpm-test/Library");

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.library.dir, config.library.dir);
        assert_eq!(parsed.catalog.search_url, config.catalog.search_url);
    }
}
