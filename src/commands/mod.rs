use anyhow::{anyhow, Result};
use dekpm::{PackageEvent, Subscription};
use std::time::Duration;

pub mod info;
pub mod install;
pub mod list;
pub mod search;
pub mod uninstall;

/// Drain events until the refresh the caller just started completes,
/// returning the catalog size.
pub(crate) fn wait_for_refresh(events: &Subscription) -> Result<usize> {
    loop {
        match events.recv_timeout(Duration::from_secs(60)) {
            Some(PackageEvent::RefreshFinished { packages }) => return Ok(packages),
            Some(_) => continue,
            None => return Err(anyhow!("Timed out waiting for the catalog refresh")),
        }
    }
}
