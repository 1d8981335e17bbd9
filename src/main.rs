mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flightdb::Compression;

#[derive(Parser)]
#[command(name = "flightdb", about = "On-time flight performance data pipeline", version)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, default_value = "datasets/data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the flights, airports, carriers and plane_data
    /// tables (destroys loaded data)
    InitSchema,
    /// Load a directory of compressed flight archives and plain reference
    /// CSVs into the database
    Load {
        /// Directory to load; the lexicographically last entry is skipped
        #[arg(long, default_value = "datasets/data")]
        path: PathBuf,
        /// Rows per insert batch
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Compression codec of the flight archives
        #[arg(long, value_enum, default_value = "bz2")]
        compression: Compression,
    },
    /// Add and index the derived date column (run once, after loading)
    IndexDate,
    /// Run a SQL query and print the materialized result
    Query {
        /// SQL to execute
        sql: String,
        /// Column to treat as the row key; must be in the result
        #[arg(long)]
        index_col: Option<String>,
        /// String columns to parse as dates
        #[arg(long, value_delimiter = ',')]
        parse_dates: Vec<String>,
        /// Rows per materialization batch
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Narrow column dtypes to reduce memory use
        #[arg(long)]
        optimize: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::InitSchema => commands::handle_init_schema(&cli.database),
        Commands::Load {
            path,
            chunk_size,
            compression,
        } => commands::handle_load(&cli.database, &path, chunk_size, compression),
        Commands::IndexDate => commands::handle_index_date(&cli.database),
        Commands::Query {
            sql,
            index_col,
            parse_dates,
            chunk_size,
            optimize,
        } => commands::handle_query(
            &cli.database,
            &sql,
            index_col,
            parse_dates,
            chunk_size,
            optimize,
        ),
    }
}
