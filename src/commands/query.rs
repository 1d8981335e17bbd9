use std::path::Path;

use anyhow::Result;

use flightdb::{QueryOptions, open_database, query_to_dataframe};

/// Run a SQL query and print the materialized frame.
pub fn handle_query(
    database: &Path,
    sql: &str,
    index_col: Option<String>,
    parse_dates: Vec<String>,
    chunk_size: Option<usize>,
    optimize: bool,
) -> Result<()> {
    let mut options = QueryOptions {
        index_col,
        parse_dates,
        optimize,
        ..QueryOptions::default()
    };
    if let Some(chunk_size) = chunk_size {
        options.chunk_size = chunk_size;
    }

    let conn = open_database(database)?;
    let frame = query_to_dataframe(&conn, sql, &options)?;
    println!("{frame}");
    Ok(())
}
