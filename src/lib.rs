//! dekpm - A package manager for Pure Data externals
//!
//! dekpm discovers, downloads, installs and tracks third-party external
//! libraries published to the deken package catalog. It is built to sit
//! underneath an interactive consumer (an editor UI or a CLI) without
//! ever blocking it:
//!
//! - Catalog refreshes and downloads run on background worker threads
//! - Per-download progress and completion reach the consumer through a
//!   typed event channel it drains on its own schedule
//! - Installed packages are tracked in a durable on-disk registry that
//!   is rewritten in full on every mutation
//! - Catalog entries are filtered against the host platform tag and
//!   deduplicated to the newest published build per package
//!
//! # Examples
//!
//! ```no_run
//! use dekpm::{Config, PackageEvent, PackageManager};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PackageManager::new(Config::load()?)?;
//! let events = manager.subscribe();
//!
//! manager.refresh();
//! while let Some(event) = events.recv_timeout(Duration::from_secs(30)) {
//!     if matches!(event, PackageEvent::RefreshFinished { .. }) {
//!         break;
//!     }
//! }
//!
//! for pkg in manager.available_packages() {
//!     println!("{} {} by {}", pkg.name(), pkg.version(), pkg.author());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Fetch and parse the remote package catalog
//! - [`platform`] - Match catalog platform tags against the host
//! - [`registry`] - Durable registry of installed packages
//! - [`task`] - Download/install worker tasks
//! - [`manager`] - Orchestrator and event subscriptions
//! - [`config`] - User configuration management
//! - [`error`] - Error types and result handling

pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod package;
pub mod platform;
pub mod registry;
pub mod task;

pub use catalog::CatalogClient;
pub use config::Config;
pub use error::{Error, Result};
pub use manager::{PackageEvent, PackageManager, Subscription};
pub use package::PackageMetadata;
pub use registry::{InstalledPackage, Registry, REGISTRY_FILE_NAME};
pub use task::TaskHandle;
