use anyhow::Result;
use dekpm::{Config, PackageManager};

pub fn run() -> Result<()> {
    let manager = PackageManager::new(Config::load()?)?;
    let installed = manager.installed_packages();

    if installed.is_empty() {
        println!("No packages installed.");
        println!();
        println!("Install packages with: dekpm install <package>");
        return Ok(());
    }

    println!("Installed packages:");
    for entry in &installed {
        println!(
            "  {} @ {} by {} ({})",
            entry.name,
            entry.version,
            entry.author,
            entry.path.display()
        );
    }
    println!();
    println!(
        "Total: {} package{}",
        installed.len(),
        if installed.len() == 1 { "" } else { "s" }
    );

    Ok(())
}
