use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Mapping from the on-time dataset's source CSV headers to the canonical
/// snake_case column names used by the `flights` table.
///
/// The `Civerted` entry reproduces a typo in the upstream feed; it must stay
/// spelled that way or the column would no longer be recognized on ingest.
pub const FLIGHT_COLUMN_NAMES: [(&str, &str); 29] = [
    ("Year", "year"),
    ("Month", "month"),
    ("DayofMonth", "day_of_month"),
    ("DayOfWeek", "day_of_week"),
    ("DepTime", "dep_time"),
    ("CRSDepTime", "crs_dep_time"),
    ("ArrTime", "arr_time"),
    ("CRSArrTime", "crs_arr_time"),
    ("UniqueCarrier", "unique_carrier"),
    ("FlightNum", "flight_num"),
    ("TailNum", "tail_num"),
    ("ActualElapsedTime", "actual_elapsed_time"),
    ("CRSElapsedTime", "crs_elapsed_time"),
    ("AirTime", "air_time"),
    ("ArrDelay", "arr_delay"),
    ("DepDelay", "dep_delay"),
    ("Origin", "origin"),
    ("Dest", "dest"),
    ("Distance", "distance"),
    ("TaxiIn", "taxi_in"),
    ("TaxiOut", "taxi_out"),
    ("Cancelled", "cancelled"),
    ("CancellationCode", "cancellation_code"),
    ("Civerted", "diverted"),
    ("CarrierDelay", "carrier_delay"),
    ("WeatherDelay", "weather_delay"),
    ("NASDelay", "nas_delay"),
    ("SecurityDelay", "security_delay"),
    ("LateAircraftDelay", "late_aircraft_delay"),
];

/// Translate a source CSV header to its canonical column name.
///
/// Exact-match only: headers not present in [`FLIGHT_COLUMN_NAMES`] pass
/// through unchanged and will hit SQLite's own "no such column" error if the
/// target table has no column of that name.
pub fn canonical_column_name<'a>(header: &'a str) -> &'a str {
    FLIGHT_COLUMN_NAMES
        .iter()
        .find(|(source, _)| *source == header)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(header)
}

/// Drop and recreate the `flights`, `airports`, `carriers` and `plane_data`
/// tables. Destructive: any previously loaded data in these tables is lost.
pub fn create_tables(conn: &Connection) -> Result<()> {
    info!("Recreating flights, airports, carriers and plane_data tables");

    conn.execute_batch(
        "DROP TABLE IF EXISTS flights;
         CREATE TABLE flights (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             year INTEGER,
             month INTEGER,
             day_of_month INTEGER,
             day_of_week INTEGER,
             dep_time INTEGER,
             crs_dep_time INTEGER,
             arr_time INTEGER,
             crs_arr_time INTEGER,
             unique_carrier TEXT,
             flight_num INTEGER,
             tail_num TEXT,
             actual_elapsed_time INTEGER,
             crs_elapsed_time INTEGER,
             air_time INTEGER,
             arr_delay INTEGER,
             dep_delay INTEGER,
             origin TEXT,
             dest TEXT,
             distance INTEGER,
             taxi_in INTEGER,
             taxi_out INTEGER,
             cancelled INTEGER,
             cancellation_code TEXT,
             diverted INTEGER,
             carrier_delay INTEGER,
             weather_delay INTEGER,
             nas_delay INTEGER,
             security_delay INTEGER,
             late_aircraft_delay INTEGER)",
    )
    .context("creating flights table")?;

    conn.execute_batch(
        "DROP TABLE IF EXISTS airports;
         CREATE TABLE airports (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             iata TEXT,
             airport TEXT,
             city TEXT,
             state TEXT,
             country TEXT,
             lat NUMERIC,
             long NUMERIC)",
    )
    .context("creating airports table")?;

    conn.execute_batch(
        "DROP TABLE IF EXISTS carriers;
         CREATE TABLE carriers (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             code TEXT,
             description TEXT)",
    )
    .context("creating carriers table")?;

    conn.execute_batch(
        "DROP TABLE IF EXISTS plane_data;
         CREATE TABLE plane_data (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             tailnum TEXT,
             type TEXT,
             manufacturer TEXT,
             issue_date TEXT,
             model TEXT,
             status TEXT,
             aircraft_type TEXT,
             engine_type TEXT,
             year INTEGER)",
    )
    .context("creating plane_data table")?;

    Ok(())
}
