//! Arbor CLI
//!
//! Command-line tools for Arbor repositories.
//!
//! # Commands
//!
//! - `init` - Create a repository with the built-in node types
//! - `inspect` - Display archive statistics and the current head
//! - `verify` - Re-scan every archive block
//! - `import` - Register node types from a CND file
//! - `types` - List registered node types or show one
//! - `unregister` - Remove a node type

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Arbor repository tools.
#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the repository directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new repository
    Init,

    /// Display archive statistics and the current head
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Verify every block of the archive
    Verify,

    /// Register node types from a CND file
    Import {
        /// CND file to import
        file: PathBuf,

        /// Update types that are already registered
        #[arg(short, long)]
        allow_update: bool,
    },

    /// List node types, or show one in detail
    Types {
        /// Type to show
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Remove a node type
    Unregister {
        /// Type to remove
        name: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init => {
            let path = cli.path.ok_or("Repository path required for init")?;
            commands::init::run(&path)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Repository path required for inspect")?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Repository path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Import { file, allow_update } => {
            let path = cli.path.ok_or("Repository path required for import")?;
            commands::import::run(&path, &file, allow_update)?;
        }
        Commands::Types { name, format } => {
            let path = cli.path.ok_or("Repository path required for types")?;
            commands::types::run(&path, name.as_deref(), format)?;
        }
        Commands::Unregister { name } => {
            let path = cli.path.ok_or("Repository path required for unregister")?;
            commands::unregister::run(&path, &name)?;
        }
        Commands::Version => {
            println!("Arbor CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Arbor Core v{}", arbor_core::VERSION);
        }
    }

    Ok(())
}
