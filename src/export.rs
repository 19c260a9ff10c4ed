//! CSV pass-through of filtered rows and sampled map points.

use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::ingest::{CAUSE_COLUMN, DATE_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN};
use crate::record::AccidentTable;
use crate::summary::MapPoint;

/// Rows as a DataFrame with the source column names, so an export can be loaded again.
/// Dates are written as `YYYY-MM-DD`; missing dates and causes are null.
pub fn table_to_dataframe(table: &AccidentTable) -> PolarsResult<DataFrame> {
    let dates: Vec<Option<String>> = table
        .iter()
        .map(|r| r.date.map(|d| d.format("%Y-%m-%d").to_string()))
        .collect();
    let latitudes: Vec<f32> = table.iter().map(|r| r.latitude).collect();
    let longitudes: Vec<f32> = table.iter().map(|r| r.longitude).collect();
    let causes: Vec<Option<&str>> = table.iter().map(|r| table.cause_label(r)).collect();

    df!(
        DATE_COLUMN => dates,
        LATITUDE_COLUMN => latitudes,
        LONGITUDE_COLUMN => longitudes,
        CAUSE_COLUMN => causes
    )
}

pub fn points_to_dataframe(points: &[MapPoint]) -> PolarsResult<DataFrame> {
    df!(
        LATITUDE_COLUMN => points.iter().map(|p| p.latitude).collect::<Vec<f64>>(),
        LONGITUDE_COLUMN => points.iter().map(|p| p.longitude).collect::<Vec<f64>>()
    )
}

/// Write the rows of `table` to `path`.
pub fn write_rows_csv(path: &Path, table: &AccidentTable, delimiter: u8) -> Result<()> {
    let mut df = table_to_dataframe(table)?;
    write_csv(path, &mut df, delimiter)
}

/// Write map points to `path` as `latitude,longitude`.
pub fn write_points_csv(path: &Path, points: &[MapPoint]) -> Result<()> {
    let mut df = points_to_dataframe(points)?;
    write_csv(path, &mut df, b',')
}

fn write_csv(path: &Path, df: &mut DataFrame, delimiter: u8) -> Result<()> {
    let file = File::create(path)?;
    CsvWriter::new(file)
        .with_separator(delimiter)
        .include_header(true)
        .finish(df)?;
    Ok(())
}
