use anyhow::{anyhow, Result};
use dekpm::{Config, PackageManager};

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

    println!("Name:        {}", metadata.name());
    println!("Version:     {}", metadata.version());
    println!("Author:      {}", metadata.author());
    println!("Uploaded:    {}", metadata.timestamp());
    if !metadata.description().is_empty() {
        println!("Description: {}", metadata.description());
    }
    println!("URL:         {}", metadata.url());
    println!(
        "Installed:   {}",
        if manager.is_installed(metadata) { "yes" } else { "no" }
    );

    if !metadata.objects().is_empty() {
        println!("Objects:");
        for object in metadata.objects() {
            println!("  {}", object);
        }
    }

    Ok(())
}
