use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

mod commands;

/// dekpm - A package manager for Pure Data externals
#[derive(Parser)]
#[command(name = "dekpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for packages in the catalog
    Search {
        /// Search query (omit to list every available package)
        query: Option<String>,
    },

    /// List installed packages
    List,

    /// Download and install a package
    Install {
        /// Package name
        package: String,
    },

    /// Uninstall a package
    Uninstall {
        /// Package name
        package: String,
    },

    /// Show details for a package in the catalog
    Info {
        /// Package name
        package: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search { query } => commands::search::run(query),
        Commands::List => commands::list::run(),
        Commands::Install { package } => commands::install::run(package),
        Commands::Uninstall { package } => commands::uninstall::run(package),
        Commands::Info { package } => commands::info::run(package),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dekpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
