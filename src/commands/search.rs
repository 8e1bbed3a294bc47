use anyhow::Result;
use dekpm::{Config, PackageManager, PackageMetadata};

pub fn run(query: Option<String>) -> Result<()> {
    let query = query.unwrap_or_default();

    let manager = PackageManager::new(Config::load()?)?;
    let events = manager.subscribe();

    println!("Updating package catalog...");
    manager.refresh();
    super::wait_for_refresh(&events)?;

    let packages = manager.available_packages();
    let results = filter_packages(&packages, &query);

    if results.is_empty() {
        if query.is_empty() {
            println!("No packages available for this platform.");
        } else {
            println!("No packages found matching '{}'", query);
            println!();
            println!("Try a different search term, or search without a term to list everything.");
        }
        return Ok(());
    }

    println!(
        "Found {} package{}:",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );
    for pkg in &results {
        let installed = if manager.is_installed(pkg) { " [installed]" } else { "" };
        if pkg.description().is_empty() {
            println!("  {} @ {} by {}{}", pkg.name(), pkg.version(), pkg.author(), installed);
        } else {
            println!(
                "  {} @ {} by {}{} - {}",
                pkg.name(),
                pkg.version(),
                pkg.author(),
                installed,
                pkg.description()
            );
        }
    }
    println!();

    Ok(())
}

/// Case-insensitive tiered match: name hits first, then description,
/// object names, then author. An empty query returns everything.
fn filter_packages(packages: &[PackageMetadata], query: &str) -> Vec<PackageMetadata> {
    if query.is_empty() {
        return packages.to_vec();
    }
    let query = query.to_lowercase();
    let mut results: Vec<PackageMetadata> = Vec::new();

    for pkg in packages {
        if pkg.name().to_lowercase().contains(&query) && !results.contains(pkg) {
            results.push(pkg.clone());
        }
    }
    for pkg in packages {
        if pkg.description().to_lowercase().contains(&query) && !results.contains(pkg) {
            results.push(pkg.clone());
        }
    }
    for pkg in packages {
        if pkg.objects().iter().any(|o| o.to_lowercase().contains(&query)) && !results.contains(pkg)
        {
            results.push(pkg.clone());
        }
    }
    for pkg in packages {
        if pkg.author().to_lowercase().contains(&query) && !results.contains(pkg) {
            results.push(pkg.clone());
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, description: &str, author: &str, objects: &[&str]) -> PackageMetadata {
        PackageMetadata::new(
            name,
            author,
            "2021:01:01 00:00:00",
            "https://example.org/pkg.tar.gz",
            description,
            "1.0",
            objects.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_name_matches_rank_first() {
        let packages = vec![
            pkg("else", "lots of objects", "alex", &["knob"]),
            pkg("cyclone", "else compatibility", "carol", &["coll"]),
        ];
        let results = filter_packages(&packages, "else");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name(), "else");
    }

    #[test]
    fn test_object_name_matches() {
        let packages = vec![pkg("cyclone", "", "carol", &["coll", "prepend"])];
        assert_eq!(filter_packages(&packages, "coll").len(), 1);
        assert!(filter_packages(&packages, "zmap").is_empty());
    }

    #[test]
    fn test_empty_query_returns_all() {
        let packages = vec![pkg("a", "", "x", &[]), pkg("b", "", "y", &[])];
        assert_eq!(filter_packages(&packages, "").len(), 2);
    }
}
