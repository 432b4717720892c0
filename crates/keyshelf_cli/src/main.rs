//! keyshelf CLI
//!
//! Command-line tools for keyshelf snapshot files.
//!
//! # Commands
//!
//! - `inspect` - Display databases, tables, indexes and record counts
//! - `apply` - Create or upgrade databases from a schema file
//! - `query` - Run a select or count against a table

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// keyshelf command-line tools.
#[derive(Parser)]
#[command(name = "keyshelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display databases, tables, indexes and record counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create or upgrade databases from a JSON schema file
    Apply {
        /// Schema file: one database declaration or a list of them
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Select or count records of a table
    Query {
        /// Database name
        #[arg(short, long)]
        database: String,

        /// Table name
        #[arg(short, long)]
        table: String,

        /// Condition, e.g. "age >= 25" or "20 <= age < 30"
        #[arg(short = 'w', long = "where")]
        condition: Option<String>,

        /// Order, e.g. "age desc"
        #[arg(short, long)]
        order: Option<String>,

        /// Records to skip
        #[arg(long)]
        start: Option<i64>,

        /// Maximum records to return
        #[arg(long)]
        size: Option<i64>,

        /// Print the number of matching records instead
        #[arg(long)]
        count: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Snapshot path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Apply { config } => {
            let path = cli.path.ok_or("Snapshot path required for apply")?;
            commands::apply::run(&path, &config)?;
        }
        Commands::Query {
            database,
            table,
            condition,
            order,
            start,
            size,
            count,
        } => {
            let path = cli.path.ok_or("Snapshot path required for query")?;
            let request = commands::query::QueryRequest {
                database,
                table,
                condition,
                order,
                start,
                size,
                count,
            };
            commands::query::run(&path, &request)?;
        }
        Commands::Version => {
            println!("keyshelf CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("keyshelf core v{}", keyshelf_core::VERSION);
        }
    }

    Ok(())
}
