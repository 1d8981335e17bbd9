use std::path::Path;

use anyhow::Result;
use tracing::info;

use flightdb::{create_tables, open_database};

/// Drop and recreate the four dataset tables. Destroys any loaded data.
pub fn handle_init_schema(database: &Path) -> Result<()> {
    let conn = open_database(database)?;
    create_tables(&conn)?;
    info!("Schema initialized in {}", database.display());
    Ok(())
}
