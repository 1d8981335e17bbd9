use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use clap::ValueEnum;
use csv::StringRecord;
use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use flate2::read::MultiGzDecoder;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};

use crate::schema::canonical_column_name;

/// Compression codec for the flight-record archives. Files whose names end
/// with the codec's suffix are treated as compressed flight data; everything
/// else in the input directory is loaded as a plain reference CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    /// bzip2 archives (`.bz2`), the format the dataset ships in
    Bz2,
    /// gzip archives (`.gz`)
    Gz,
}

impl Compression {
    pub fn suffix(&self) -> &'static str {
        match self {
            Compression::Bz2 => "bz2",
            Compression::Gz => "gz",
        }
    }

    fn reader(&self, file: File) -> Box<dyn Read> {
        match self {
            Compression::Bz2 => Box::new(MultiBzDecoder::new(file)),
            Compression::Gz => Box::new(MultiGzDecoder::new(file)),
        }
    }
}

/// Parameters for a bulk load run.
pub struct LoadOptions {
    /// Rows per insert batch; each batch commits in its own transaction
    pub chunk_size: usize,
    pub compression: Compression,
    /// Text encoding of the compressed flight archives. Reference CSVs are
    /// plain UTF-8.
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            chunk_size: 5_000_000,
            compression: Compression::Bz2,
            // The dataset is published as ISO-8859-1; WHATWG resolves that
            // label to windows-1252
            encoding: encoding_rs::WINDOWS_1252,
        }
    }
}

/// Counters for one [`load_directory`] run.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub flight_files: usize,
    pub flight_rows: usize,
    pub reference_files: usize,
    pub reference_rows: usize,
    /// Name of the trailing directory entry that was not processed
    pub skipped: Option<String>,
}

/// Load every file in `dir` except the lexicographically last one, in sorted
/// filename order.
///
/// Files matching the configured compression suffix are streamed into the
/// `flights` table in `chunk_size` batches, with source headers renamed
/// through the canonical mapping. Any other file is parsed whole and appended
/// to a table named after it (`.csv` stripped, hyphens to underscores).
///
/// Each batch commits in its own transaction: a failure mid-file rolls back
/// only the batch in flight, leaving earlier batches of that file persisted.
pub fn load_directory(
    conn: &mut Connection,
    dir: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    let dir = dir.as_ref();
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_>>()?;
    names.sort();

    // The trailing entry in sort order is a manifest-style file, never data
    let mut summary = LoadSummary {
        skipped: names.pop(),
        ..LoadSummary::default()
    };
    if let Some(skipped) = &summary.skipped {
        debug!("Skipping trailing directory entry {}", skipped);
    }

    for name in &names {
        let path = dir.join(name);
        if name.ends_with(options.compression.suffix()) {
            let rows = load_flight_file(conn, &path, options)
                .with_context(|| format!("loading flight file {}", name))?;
            info!("Loaded {} flight rows from {}", rows, name);
            summary.flight_files += 1;
            summary.flight_rows += rows;
        } else {
            let table = table_name_for(name);
            let rows = load_reference_file(conn, &path, &table)
                .with_context(|| format!("loading reference file {}", name))?;
            info!("Loaded {} rows from {} into {}", rows, name, table);
            summary.reference_files += 1;
            summary.reference_rows += rows;
        }
    }

    info!(
        "Load complete: {} flight rows from {} files, {} reference rows from {} files",
        summary.flight_rows, summary.flight_files, summary.reference_rows, summary.reference_files
    );
    Ok(summary)
}

/// Derive a table name from a reference CSV filename.
fn table_name_for(file_name: &str) -> String {
    file_name.replace(".csv", "").replace('-', "_")
}

/// Stream one compressed flight archive into the `flights` table.
fn load_flight_file(conn: &mut Connection, path: &Path, options: &LoadOptions) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(options.encoding))
        .build(options.compression.reader(file));
    let mut reader = csv::Reader::from_reader(decoded);

    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(|header| canonical_column_name(header).to_string())
        .collect();
    let insert_sql = insert_statement("flights", &columns);

    let mut total = 0;
    let mut chunk: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        chunk.push(record?);
        if chunk.len() == options.chunk_size {
            insert_chunk(conn, &insert_sql, &chunk)?;
            total += chunk.len();
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        insert_chunk(conn, &insert_sql, &chunk)?;
        total += chunk.len();
    }

    Ok(total)
}

/// Load a plain CSV wholesale into the table named after it, creating the
/// table from the header row if it does not exist yet.
fn load_reference_file(conn: &mut Connection, path: &Path, table: &str) -> Result<usize> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let rows: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;

    if !table_exists(conn, table)? {
        create_table_for(conn, table, &columns, &rows)?;
    }

    let insert_sql = insert_statement(table, &columns);
    insert_chunk(conn, &insert_sql, &rows)?;
    Ok(rows.len())
}

/// Append a batch of records inside a single transaction.
fn insert_chunk(conn: &mut Connection, insert_sql: &str, rows: &[StringRecord]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(insert_sql)?;
        for row in rows {
            let values: Vec<Value> = row.iter().map(sql_value).collect();
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Convert a CSV field to a SQL value. Empty fields and the dataset's `NA`
/// marker become NULL; numeric-looking fields are stored as numbers.
fn sql_value(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "NA" {
        return Value::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Integer(integer);
    }
    if let Ok(real) = trimmed.parse::<f64>() {
        return Value::Real(real);
    }
    Value::Text(field.to_string())
}

fn insert_statement(table: &str, columns: &[String]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        column_list.join(", "),
        placeholders.join(", ")
    )
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    Ok(stmt.exists([table])?)
}

/// Create a table for a reference CSV, with column affinity sniffed from the
/// data: INTEGER if every non-null field parses as an integer, REAL if every
/// non-null field parses as a number, TEXT otherwise.
fn create_table_for(
    conn: &Connection,
    table: &str,
    columns: &[String],
    rows: &[StringRecord],
) -> Result<()> {
    let definitions: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            format!("{} {}", quote_identifier(column), column_affinity(rows, index))
        })
        .collect();
    let create_sql = format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table),
        definitions.join(", ")
    );
    conn.execute(&create_sql, [])
        .with_context(|| format!("creating table {}", table))?;
    Ok(())
}

fn column_affinity(rows: &[StringRecord], index: usize) -> &'static str {
    let mut any_value = false;
    let mut all_integer = true;
    let mut all_real = true;
    for row in rows {
        let Some(field) = row.get(index) else { continue };
        let trimmed = field.trim();
        if trimmed.is_empty() || trimmed == "NA" {
            continue;
        }
        any_value = true;
        if trimmed.parse::<i64>().is_err() {
            all_integer = false;
        }
        if trimmed.parse::<f64>().is_err() {
            all_real = false;
        }
    }
    if any_value && all_integer {
        "INTEGER"
    } else if any_value && all_real {
        "REAL"
    } else {
        "TEXT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_for() {
        assert_eq!(table_name_for("airports.csv"), "airports");
        assert_eq!(table_name_for("plane-data.csv"), "plane_data");
        assert_eq!(table_name_for("carriers"), "carriers");
    }

    #[test]
    fn test_sql_value_sniffing() {
        assert_eq!(sql_value(""), Value::Null);
        assert_eq!(sql_value("NA"), Value::Null);
        assert_eq!(sql_value("2008"), Value::Integer(2008));
        assert_eq!(sql_value("-15"), Value::Integer(-15));
        assert_eq!(sql_value("35.04"), Value::Real(35.04));
        assert_eq!(sql_value("WN"), Value::Text("WN".to_string()));
        assert_eq!(sql_value("N712SW"), Value::Text("N712SW".to_string()));
    }

    #[test]
    fn test_insert_statement() {
        assert_eq!(
            insert_statement("flights", &["year".to_string(), "month".to_string()]),
            "INSERT INTO \"flights\" (\"year\", \"month\") VALUES (?1, ?2)"
        );
    }

    #[test]
    fn test_column_affinity() {
        let rows = vec![
            StringRecord::from(vec!["1", "1.5", "WN", "NA"]),
            StringRecord::from(vec!["2", "2", "7", ""]),
        ];
        assert_eq!(column_affinity(&rows, 0), "INTEGER");
        assert_eq!(column_affinity(&rows, 1), "REAL");
        assert_eq!(column_affinity(&rows, 2), "TEXT");
        // All-null column defaults to TEXT
        assert_eq!(column_affinity(&rows, 3), "TEXT");
    }

    #[test]
    fn test_compression_suffix() {
        assert_eq!(Compression::Bz2.suffix(), "bz2");
        assert_eq!(Compression::Gz.suffix(), "gz");
    }
}
