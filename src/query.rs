use std::time::Instant;

use anyhow::{Context, Result};
use polars::prelude::*;
use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::info;

use crate::optimize::narrow_dataframe;

/// Parameters for [`query_to_dataframe`].
pub struct QueryOptions {
    /// Column the caller treats as the row key. Must be present in the
    /// result set; the frame itself keeps it as an ordinary column.
    pub index_col: Option<String>,
    /// String columns to parse into the `Date` dtype (`%Y-%m-%d`, unpadded
    /// month and day accepted)
    pub parse_dates: Vec<String>,
    /// Rows per materialization batch; not observable in the output
    pub chunk_size: usize,
    /// Narrow column dtypes before returning, see [`narrow_dataframe`]
    pub optimize: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            index_col: None,
            parse_dates: Vec::new(),
            chunk_size: 5_000_000,
            optimize: false,
        }
    }
}

/// Execute `sql` and materialize the full result set as a [`DataFrame`].
///
/// Rows are read in `chunk_size` batches and stacked vertically, preserving
/// row and column order as returned by the query. Column dtypes are inferred
/// from the stored values (Int64, Float64 or String); when batches disagree,
/// numeric dtypes widen to Float64 and anything else unifies through String.
pub fn query_to_dataframe(
    conn: &Connection,
    sql: &str,
    options: &QueryOptions,
) -> Result<DataFrame> {
    let start = Instant::now();

    let mut stmt = conn.prepare(sql).context("preparing query")?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    let mut assembled: Option<DataFrame> = None;
    let mut buffered = 0;

    let mut rows = stmt.query([]).context("executing query")?;
    while let Some(row) = rows.next()? {
        for (index, column) in columns.iter_mut().enumerate() {
            column.push(row.get::<_, Value>(index)?);
        }
        buffered += 1;
        if buffered == options.chunk_size {
            stack_chunk(&mut assembled, &names, &mut columns)?;
            buffered = 0;
        }
    }
    if buffered > 0 || assembled.is_none() {
        stack_chunk(&mut assembled, &names, &mut columns)?;
    }

    let mut frame = match assembled {
        Some(frame) => frame,
        // stack_chunk above guarantees at least one (possibly empty) chunk
        None => DataFrame::empty(),
    };

    if let Some(index_col) = &options.index_col {
        frame
            .column(index_col)
            .with_context(|| format!("index column {index_col} not in query result"))?;
    }

    for column in &options.parse_dates {
        let series = frame
            .column(column)
            .with_context(|| format!("parse_dates column {column} not in query result"))?
            .as_materialized_series()
            .clone();
        if series.dtype() != &DataType::String {
            continue;
        }
        let parsed = series
            .str()?
            .as_date(Some("%Y-%m-%d"), false)
            .with_context(|| format!("parsing column {column} as dates"))?
            .into_series();
        frame.with_column(parsed)?;
    }

    if options.optimize {
        frame = narrow_dataframe(frame)?;
    }

    info!(
        "Total run time: {:.2} minutes",
        start.elapsed().as_secs_f64() / 60.0
    );

    Ok(frame)
}

/// Turn the buffered column values into a DataFrame and stack it onto the
/// frame assembled so far, draining the buffers.
fn stack_chunk(
    assembled: &mut Option<DataFrame>,
    names: &[String],
    columns: &mut [Vec<Value>],
) -> Result<()> {
    let mut chunk_columns = Vec::with_capacity(names.len());
    for (name, values) in names.iter().zip(columns.iter_mut()) {
        chunk_columns.push(series_from_values(name, values).into_column());
        values.clear();
    }
    let chunk = DataFrame::new(chunk_columns).context("assembling result chunk")?;

    match assembled {
        None => *assembled = Some(chunk),
        Some(frame) => {
            let chunk = unify_schemas(frame, chunk)?;
            frame.vstack_mut(&chunk).context("stacking result chunk")?;
        }
    }
    Ok(())
}

/// Reconcile dtype differences between the assembled frame and a new chunk,
/// widening whichever side needs it.
fn unify_schemas(frame: &mut DataFrame, mut chunk: DataFrame) -> Result<DataFrame> {
    for name in frame.get_column_names_owned() {
        let left = frame.column(name.as_str())?.dtype().clone();
        let right = chunk.column(name.as_str())?.dtype().clone();
        if left == right {
            continue;
        }
        let unified = unified_dtype(&left, &right);
        if left != unified {
            let widened = frame
                .column(name.as_str())?
                .as_materialized_series()
                .cast(&unified)?;
            frame.with_column(widened)?;
        }
        if right != unified {
            let widened = chunk
                .column(name.as_str())?
                .as_materialized_series()
                .cast(&unified)?;
            chunk.with_column(widened)?;
        }
    }
    Ok(chunk)
}

fn unified_dtype(left: &DataType, right: &DataType) -> DataType {
    match (left, right) {
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::String,
    }
}

/// Build a series from one column of SQLite values. All-integer columns stay
/// Int64, columns with any real become Float64, anything containing text
/// becomes String. NULLs are nulls in every case.
fn series_from_values(name: &str, values: &[Value]) -> Series {
    let mut has_real = false;
    let mut has_text = false;
    for value in values {
        match value {
            Value::Real(_) => has_real = true,
            Value::Text(_) | Value::Blob(_) => has_text = true,
            Value::Null | Value::Integer(_) => {}
        }
    }

    if has_text {
        let strings: Vec<Option<String>> = values
            .iter()
            .map(|value| match value {
                Value::Null => None,
                Value::Integer(integer) => Some(integer.to_string()),
                Value::Real(real) => Some(real.to_string()),
                Value::Text(text) => Some(text.clone()),
                Value::Blob(blob) => Some(String::from_utf8_lossy(blob).into_owned()),
            })
            .collect();
        Series::new(name.into(), strings)
    } else if has_real {
        let reals: Vec<Option<f64>> = values
            .iter()
            .map(|value| match value {
                Value::Integer(integer) => Some(*integer as f64),
                Value::Real(real) => Some(*real),
                _ => None,
            })
            .collect();
        Series::new(name.into(), reals)
    } else {
        let integers: Vec<Option<i64>> = values
            .iter()
            .map(|value| match value {
                Value::Integer(integer) => Some(*integer),
                _ => None,
            })
            .collect();
        Series::new(name.into(), integers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_database() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open database");
        conn.execute_batch(
            "CREATE TABLE samples (id INTEGER PRIMARY KEY, carrier TEXT, delay INTEGER, distance REAL);
             INSERT INTO samples (carrier, delay, distance) VALUES
                 ('WN', -14, 810.0),
                 ('AA', 2, 303.5),
                 ('UA', NULL, 1846.0),
                 ('WN', 34, 810.0),
                 ('DL', 0, 740.25)",
        )
        .expect("Failed to seed samples");
        conn
    }

    #[test]
    fn test_materializes_all_rows_in_order() {
        let conn = sample_database();
        let frame = query_to_dataframe(
            &conn,
            "SELECT carrier, delay, distance FROM samples ORDER BY id",
            &QueryOptions::default(),
        )
        .expect("Failed to materialize query");

        assert_eq!(frame.shape(), (5, 3));
        let carriers: Vec<Option<&str>> = frame
            .column("carrier")
            .expect("missing carrier column")
            .as_materialized_series()
            .str()
            .expect("carrier should be a string column")
            .into_iter()
            .collect();
        assert_eq!(
            carriers,
            vec![Some("WN"), Some("AA"), Some("UA"), Some("WN"), Some("DL")]
        );
    }

    #[test]
    fn test_chunk_size_is_not_observable() {
        let conn = sample_database();
        let sql = "SELECT id, carrier, delay FROM samples ORDER BY id";

        let whole = query_to_dataframe(&conn, sql, &QueryOptions::default())
            .expect("Failed to materialize query");
        for chunk_size in [1, 2, 3, 5, 100] {
            let options = QueryOptions {
                chunk_size,
                ..QueryOptions::default()
            };
            let chunked =
                query_to_dataframe(&conn, sql, &options).expect("Failed to materialize query");
            assert!(
                whole.equals_missing(&chunked),
                "chunk_size {chunk_size} changed the result"
            );
        }
    }

    #[test]
    fn test_dtype_inference() {
        let conn = sample_database();
        let frame = query_to_dataframe(
            &conn,
            "SELECT carrier, delay, distance FROM samples",
            &QueryOptions::default(),
        )
        .expect("Failed to materialize query");

        assert_eq!(frame.column("carrier").unwrap().dtype(), &DataType::String);
        assert_eq!(frame.column("delay").unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            frame.column("distance").unwrap().dtype(),
            &DataType::Float64
        );
    }

    #[test]
    fn test_mixed_numeric_chunks_widen_to_float() {
        let conn = Connection::open_in_memory().expect("Failed to open database");
        conn.execute_batch(
            "CREATE TABLE mixed (value NUMERIC);
             INSERT INTO mixed VALUES (1), (2.5), (3)",
        )
        .expect("Failed to seed mixed");

        // chunk_size 1 forces the integer and real rows into separate chunks
        let options = QueryOptions {
            chunk_size: 1,
            ..QueryOptions::default()
        };
        let frame = query_to_dataframe(&conn, "SELECT value FROM mixed", &options)
            .expect("Failed to materialize query");

        assert_eq!(frame.column("value").unwrap().dtype(), &DataType::Float64);
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn test_empty_result() {
        let conn = sample_database();
        let frame = query_to_dataframe(
            &conn,
            "SELECT carrier, delay FROM samples WHERE delay > 10000",
            &QueryOptions::default(),
        )
        .expect("Failed to materialize query");
        assert_eq!(frame.shape(), (0, 2));
    }

    #[test]
    fn test_parse_dates() {
        let conn = Connection::open_in_memory().expect("Failed to open database");
        conn.execute_batch(
            "CREATE TABLE dated (date TEXT);
             INSERT INTO dated VALUES ('2008-3-9'), ('1999-1-5'), (NULL)",
        )
        .expect("Failed to seed dated");

        let options = QueryOptions {
            parse_dates: vec!["date".to_string()],
            ..QueryOptions::default()
        };
        let frame = query_to_dataframe(&conn, "SELECT date FROM dated", &options)
            .expect("Failed to materialize query");

        let column = frame.column("date").expect("missing date column");
        assert_eq!(column.dtype(), &DataType::Date);

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid date");
        let expected = NaiveDate::from_ymd_opt(2008, 3, 9).expect("valid date");
        let days = (expected - epoch).num_days() as i32;
        assert_eq!(
            column.get(0).expect("row 0 present"),
            AnyValue::Date(days)
        );
        assert_eq!(column.get(2).expect("row 2 present"), AnyValue::Null);
    }

    #[test]
    fn test_missing_index_col_is_an_error() {
        let conn = sample_database();
        let options = QueryOptions {
            index_col: Some("no_such_column".to_string()),
            ..QueryOptions::default()
        };
        let err = query_to_dataframe(&conn, "SELECT carrier FROM samples", &options)
            .expect_err("Missing index column should fail");
        assert!(format!("{:#}", err).contains("no_such_column"));
    }

    #[test]
    fn test_sql_errors_propagate() {
        let conn = sample_database();
        query_to_dataframe(&conn, "SELECT * FROM missing_table", &QueryOptions::default())
            .expect_err("Querying a missing table should fail");
    }
}
