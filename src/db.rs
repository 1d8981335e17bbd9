use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

/// Open (or create) the single-file database at `path`.
///
/// The caller owns the returned connection and is responsible for dropping
/// it; no library function ever closes a handle it was given.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    debug!("Opened database {}", path.display());
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_the_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data.db");

        let conn = open_database(&path).expect("Failed to open database");
        conn.execute_batch("CREATE TABLE t (x INTEGER)")
            .expect("Failed to create table");
        drop(conn);

        assert!(path.exists());
    }

    #[test]
    fn test_open_fails_on_unwritable_path() {
        open_database("/no/such/directory/data.db").expect_err("Opening should fail");
    }
}
