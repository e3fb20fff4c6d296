mod commands;

use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "svcd")]
#[command(about = "In-process service lifecycle coordinator")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List unit files in the service directory
    List {
        /// Directory holding *.service files (default: $SVCD_DIR or ~/.config/svcd/services)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Parse a unit file and display its contents
    Parse {
        /// Path to the .service file
        path: PathBuf,
    },

    /// Start every service and accept console commands
    Run {
        /// Directory holding *.service files (default: $SVCD_DIR or ~/.config/svcd/services)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args = Args::parse();

    match args.command {
        Command::List { dir } => {
            commands::list(&dir.unwrap_or_else(svcd::units::default_unit_dir)).await?;
        }
        Command::Parse { path } => {
            commands::parse(&path).await?;
        }
        Command::Run { dir } => {
            commands::run(&dir.unwrap_or_else(svcd::units::default_unit_dir)).await?;
        }
    }

    Ok(())
}
