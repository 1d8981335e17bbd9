use std::path::Path;

use anyhow::Result;

use flightdb::{add_date_column, open_database};

/// Add and index the derived `date` column. Run once, after loading.
pub fn handle_index_date(database: &Path) -> Result<()> {
    let conn = open_database(database)?;
    add_date_column(&conn)?;
    Ok(())
}
