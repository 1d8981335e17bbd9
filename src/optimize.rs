use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

/// Target dtype for columns the narrower knows about. Date parts and delay
/// minutes fit small integers, the code-like columns become categoricals,
/// and the two flag columns become booleans.
///
/// `tailnum` (no underscore) is the `plane_data` spelling; the `flights`
/// table spells it `tail_num`, which is deliberately not narrowed.
fn narrowed_dtype(column: &str) -> Option<DataType> {
    match column {
        "year" => Some(DataType::Int16),
        "month" | "day_of_month" | "day_of_week" => Some(DataType::Int8),
        "arr_delay" | "dep_delay" => Some(DataType::Int16),
        "unique_carrier" | "origin" | "dest" | "tailnum" => {
            Some(DataType::Categorical(None, Default::default()))
        }
        "cancelled" | "diverted" => Some(DataType::Boolean),
        _ => None,
    }
}

/// Narrow the storage dtype of every known column in `frame`, leaving
/// unknown and absent columns untouched. Values must fit the narrower type;
/// an out-of-range value is a cast error, never a silent truncation.
///
/// Logs the estimated deep memory footprint before and after.
pub fn narrow_dataframe(mut frame: DataFrame) -> Result<DataFrame> {
    info!(
        "Memory usage before optimization {:.2} GiB",
        gibibytes(frame.estimated_size())
    );

    for name in frame.get_column_names_owned() {
        let Some(dtype) = narrowed_dtype(name.as_str()) else {
            continue;
        };
        let narrowed = frame
            .column(name.as_str())?
            .as_materialized_series()
            .strict_cast(&dtype)
            .with_context(|| format!("narrowing column {name} to {dtype}"))?;
        frame.with_column(narrowed)?;
    }

    info!(
        "Memory usage after optimization {:.2} GiB",
        gibibytes(frame.estimated_size())
    );
    Ok(frame)
}

fn gibibytes(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
