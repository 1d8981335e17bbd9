use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::info;

use flightdb::{Compression, LoadOptions, load_directory, open_database};

/// Bulk-load a directory of flight archives and reference CSVs.
pub fn handle_load(
    database: &Path,
    path: &Path,
    chunk_size: Option<usize>,
    compression: Compression,
) -> Result<()> {
    let mut options = LoadOptions {
        compression,
        ..LoadOptions::default()
    };
    if let Some(chunk_size) = chunk_size {
        options.chunk_size = chunk_size;
    }

    let start = Instant::now();
    let mut conn = open_database(database)?;
    let summary = load_directory(&mut conn, path, &options)?;

    info!(
        "Loaded {} files ({} flight rows, {} reference rows) in {:.1}s",
        summary.flight_files + summary.reference_files,
        summary.flight_rows,
        summary.reference_rows,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
