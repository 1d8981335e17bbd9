use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Add the derived `date` column to `flights`, backfill it from the
/// year/month/day fields, and index it.
///
/// The column holds the literal concatenation `year-month-day` with no zero
/// padding (`2008-3-9`, not `2008-03-09`). Downstream consumers match on
/// these exact strings; do not reformat them.
///
/// Runs once per schema lifetime: a second invocation fails with SQLite's
/// duplicate-column error. Run it only after all flight data is loaded, since
/// rows inserted later would have a NULL date.
pub fn add_date_column(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE flights ADD COLUMN date TEXT", [])
        .context("adding date column to flights")?;

    let updated = conn
        .execute(
            "UPDATE flights SET date = year || '-' || month || '-' || day_of_month",
            [],
        )
        .context("computing date column")?;
    info!("Computed date for {} flight rows", updated);

    conn.execute("CREATE INDEX date ON flights(date)", [])
        .context("indexing date column")?;
    info!("Created index on flights(date)");

    Ok(())
}
