//! Durable registry of installed packages
//!
//! The registry is the source of truth for what is installed. It lives as
//! a `pkg_info.toml` document inside the library directory and is
//! rewritten in full on every mutation, so the on-disk state never lags
//! the in-memory state by more than one write. A missing or malformed
//! file yields a fresh empty registry rather than an error.
//!
//! Entries are keyed by the derived package id: adding an entry whose id
//! is already present replaces the old one (installs are idempotent), and
//! removing an entry also deletes its install directory from disk.

use crate::{PackageMetadata, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// The registry filename inside the library directory
pub const REGISTRY_FILE_NAME: &str = "pkg_info.toml";

/// One installed package, as persisted in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub id: String,
    pub author: String,
    pub timestamp: String,
    pub description: String,
    pub version: String,
    /// Absolute path of the extracted install directory
    pub path: PathBuf,
    pub url: String,
}

impl InstalledPackage {
    /// Build a registry entry from catalog metadata and the install path.
    pub fn new(metadata: &PackageMetadata, path: PathBuf) -> Self {
        Self {
            name: metadata.name().to_string(),
            id: metadata.id().to_string(),
            author: metadata.author().to_string(),
            timestamp: metadata.timestamp().to_string(),
            description: metadata.description().to_string(),
            version: metadata.version().to_string(),
            path,
            url: metadata.url().to_string(),
        }
    }

    /// Reconstruct catalog-shaped metadata from this entry.
    ///
    /// Object names are not persisted, so the reconstructed record has an
    /// empty object list. The derived id is identical to the stored one
    /// because it is a pure function of the identity tuple.
    pub fn metadata(&self) -> PackageMetadata {
        PackageMetadata::new(
            self.name.clone(),
            self.author.clone(),
            self.timestamp.clone(),
            self.url.clone(),
            self.description.clone(),
            self.version.clone(),
            vec![],
        )
    }
}

/// On-disk document shape: a `pkg_info` header plus one `[[package]]`
/// table per installed package.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    pkg_info: RegistryHeader,
    #[serde(default, rename = "package")]
    packages: Vec<InstalledPackage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryHeader {
    /// Version of dekpm that last wrote this file
    dekpm_version: String,

    /// Timestamp of the last rewrite (ISO 8601 format)
    updated_at: String,
}

impl RegistryHeader {
    fn now() -> Self {
        Self {
            dekpm_version: env!("CARGO_PKG_VERSION").to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Ordered store of installed packages, persisted to the library dir.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    entries: Vec<InstalledPackage>,
}

impl Registry {
    /// Load the registry from `library_dir`, creating the directory if
    /// needed. An absent or unreadable file yields an empty registry.
    pub fn load(library_dir: &Path) -> Result<Self> {
        fs::create_dir_all(library_dir)?;
        let path = library_dir.join(REGISTRY_FILE_NAME);

        let entries = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<RegistryFile>(&content) {
                    Ok(file) => file.packages,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "malformed registry file, starting empty");
                        Vec::new()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable registry file, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self { path, entries })
    }

    /// Check whether a package id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Look up an entry by package id.
    pub fn get(&self, id: &str) -> Option<&InstalledPackage> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All registered packages, in insertion order.
    pub fn entries(&self) -> &[InstalledPackage] {
        &self.entries
    }

    /// Register a package, replacing any existing entry with the same id,
    /// and rewrite the registry file.
    pub fn add(&mut self, entry: InstalledPackage) {
        self.entries.retain(|e| e.id != entry.id);
        self.entries.push(entry);
        self.save();
    }

    /// Unregister a package: delete its install directory from disk, drop
    /// the entry, and rewrite the registry file. A no-op if the id is not
    /// registered.
    pub fn remove(&mut self, id: &str) {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return;
        };
        let entry = self.entries.remove(index);

        if entry.path.exists() {
            if let Err(e) = fs::remove_dir_all(&entry.path) {
                warn!(path = %entry.path.display(), error = %e, "failed to delete install directory");
            }
        }

        self.save();
    }

    /// Rewrite the whole registry file.
    ///
    /// A write failure is logged and otherwise ignored; the in-memory
    /// registry stays authoritative for the rest of the process.
    pub fn save(&self) {
        let file = RegistryFile {
            pkg_info: RegistryHeader::now(),
            packages: self.entries.clone(),
        };

        let result = toml::to_string_pretty(&file)
            .map_err(crate::Error::from)
            .and_then(|text| fs::write(&self.path, text).map_err(crate::Error::from));

        if let Err(e) = result {
            error!(path = %self.path.display(), error = %e, "failed to persist registry");
        }
    }
}
