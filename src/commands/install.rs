use anyhow::{anyhow, Result};
use dekpm::{Config, PackageEvent, PackageManager};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn run(package: String) -> Result<()> {
    let manager = PackageManager::new(Config::load()?)?;
    let events = manager.subscribe();

    println!("Updating package catalog...");
    manager.refresh();
    super::wait_for_refresh(&events)?;

    let available = manager.available_packages();
    let metadata = available
        .iter()
        .find(|p| p.name().eq_ignore_ascii_case(&package))
        .ok_or_else(|| anyhow!("Package '{}' not found in the catalog", package))?;

    if manager.is_installed(metadata) {
        println!("Reinstalling {} @ {}...", metadata.name(), metadata.version());
    } else {
        println!("Installing {} @ {}...", metadata.name(), metadata.version());
    }

    let task = manager.install(metadata);
    let task_id = task.metadata().id().to_string();

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template(
        "  {bar:40.cyan/blue} {percent:>3}%",
    )?);

    loop {
        match events.recv_timeout(Duration::from_secs(120)) {
            Some(PackageEvent::DownloadProgress { id, progress }) if id == task_id => {
                bar.set_position((progress.clamp(0.0, 1.0) * 100.0) as u64);
            }
            Some(PackageEvent::InstallFinished { id, success, message }) if id == task_id => {
                bar.finish_and_clear();
                if success {
                    println!("✓ {}", message);
                    return Ok(());
                }
                return Err(anyhow!(message));
            }
            Some(_) => {}
            None => {
                bar.finish_and_clear();
                return Err(anyhow!("Timed out waiting for the download to finish"));
            }
        }
    }
}
