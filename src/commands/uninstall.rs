use anyhow::{anyhow, Result};
use dekpm::{Config, PackageManager};

pub fn run(package: String) -> Result<()> {
    let manager = PackageManager::new(Config::load()?)?;

    let installed = manager.installed_packages();
    let entry = installed
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(&package))
        .ok_or_else(|| {
            if installed.is_empty() {
                anyhow!("Package '{}' is not installed", package)
            } else {
                let names: Vec<&str> = installed.iter().map(|p| p.name.as_str()).collect();
                anyhow!(
                    "Package '{}' is not installed. Installed packages: {}",
                    package,
                    names.join(", ")
                )
            }
        })?;

    let metadata = entry.metadata();
    manager.uninstall(&metadata);
    println!("✓ Uninstalled {} @ {}", entry.name, entry.version);
    Ok(())
}
