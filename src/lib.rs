//! flightdb - loads the US DOT on-time flight performance archives into a
//! single-file SQLite database and materializes SQL queries as polars frames.
//!
//! Every operation takes an explicit connection; the caller that opens a
//! handle owns it and drops it.

pub mod date_index;
pub mod db;
pub mod loader;
pub mod optimize;
pub mod query;
pub mod schema;

pub use date_index::add_date_column;
pub use db::open_database;
pub use loader::{Compression, LoadOptions, LoadSummary, load_directory};
pub use optimize::narrow_dataframe;
pub use query::{QueryOptions, query_to_dataframe};
pub use schema::{FLIGHT_COLUMN_NAMES, canonical_column_name, create_tables};
