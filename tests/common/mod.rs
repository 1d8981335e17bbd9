//! Common test utilities for database-backed integration tests
//!
//! `TestDatabase` provides an isolated single-file SQLite database inside a
//! temp directory. The directory (and with it the database) is removed when
//! the struct goes out of scope, so tests can run in parallel without
//! touching each other's state.

use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;

pub struct TestDatabase {
    dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        TestDatabase { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("data.db")
    }

    /// Open a fresh connection to the test database. Each caller owns the
    /// returned handle and drops it itself.
    pub fn connect(&self) -> Connection {
        flightdb::open_database(self.path()).expect("Failed to open test database")
    }
}
