use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stride-cli", version, about = "Stride CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus session control
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Session-type and tag catalogs
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Streak and currency statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// One-shot consumable boosts
    Boost {
        #[command(subcommand)]
        action: commands::boost::BoostAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Catalog { action } => commands::catalog::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Boost { action } => commands::boost::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
