//! Chunked CSV ingestion.
//!
//! The source is opened once and streamed through a single `csv::Reader`, `chunk_size`
//! records at a time, so every byte is scanned exactly once and at most one chunk of raw
//! records is held in memory. Only the four columns the pipeline uses are decoded. Every
//! value is typed here, so a bad cell never fails a chunk: unparsable dates become
//! `None`, and rows whose coordinates are missing, unparsable or outside the bounding
//! box are dropped before they reach the table.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::record::{AccidentTable, TableBuilder};

pub const DATE_COLUMN: &str = "data_inversa";
pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const CAUSE_COLUMN: &str = "causa_acidente";

/// Columns decoded from the source. Everything else is skipped.
pub const REQUIRED_COLUMNS: [&str; 4] = [DATE_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN, CAUSE_COLUMN];

/// Rows parsed per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Date layouts tried in order. Datetime strings are reduced to their date part.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Inclusive latitude/longitude rectangle used as a cheap territorial check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f32,
    pub max_latitude: f32,
    pub min_longitude: f32,
    pub max_longitude: f32,
}

impl BoundingBox {
    /// Rough rectangle around Brazilian territory.
    pub const BRAZIL: Self = Self {
        min_latitude: -34.0,
        max_latitude: 5.0,
        min_longitude: -74.0,
        max_longitude: -29.0,
    };

    pub fn contains(&self, latitude: f32, longitude: f32) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::BRAZIL
    }
}

/// Options for [`load_with_options`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub delimiter: u8,
    pub bounds: BoundingBox,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter: b',',
            bounds: BoundingBox::BRAZIL,
        }
    }
}

impl IngestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    DataFormat { path: PathBuf, missing: Vec<String> },
    #[error("{} has no header row", .path.display())]
    EmptySource { path: PathBuf },
    #[error("invalid ingest options: {0}")]
    InvalidOptions(String),
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    /// True for failures caused by the shape of the source rather than access to it.
    pub fn is_data_format(&self) -> bool {
        matches!(self, Self::DataFormat { .. } | Self::EmptySource { .. })
    }
}

/// Counters gathered while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows dropped for missing, unparsable or out-of-bounds coordinates.
    pub rows_dropped: usize,
    /// Kept rows whose date could not be parsed.
    pub null_dates: usize,
    pub chunks: usize,
    /// Bytes consumed from the source, header included. Equals the file length after a
    /// complete load, whatever the chunk size.
    pub bytes_scanned: u64,
}

/// Load `path` with the default options (50,000-row chunks, comma separator, Brazil box).
pub fn load(path: &Path) -> Result<AccidentTable, LoadError> {
    load_with_options(path, &IngestOptions::default())
}

pub fn load_with_options(path: &Path, options: &IngestOptions) -> Result<AccidentTable, LoadError> {
    load_with_report(path, options).map(|(table, _)| table)
}

/// Load `path` and return the table together with the row counters.
pub fn load_with_report(
    path: &Path,
    options: &IngestOptions,
) -> Result<(AccidentTable, LoadReport), LoadError> {
    if options.chunk_size == 0 {
        return Err(LoadError::InvalidOptions(
            "chunk_size must be greater than 0".to_string(),
        ));
    }

    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(b'"')
        .double_quote(true)
        .flexible(true)
        .from_reader(open_source(path)?);
    let columns = locate_columns(path, reader.byte_headers().map_err(csv_err)?)?;

    let mut builder = TableBuilder::new();
    let mut report = LoadReport::default();
    let mut chunk: Vec<ByteRecord> = Vec::new();

    loop {
        let height = fill_chunk(&mut reader, &mut chunk, options.chunk_size).map_err(csv_err)?;
        if height == 0 {
            break;
        }
        report.chunks += 1;

        let kept_before = builder.len();
        append_chunk(&mut builder, &chunk[..height], &columns, &options.bounds, &mut report);
        debug!(
            chunk = report.chunks,
            rows = height,
            kept = builder.len() - kept_before,
            "ingested chunk"
        );

        if height < options.chunk_size {
            break;
        }
    }

    report.rows_kept = builder.len();
    report.rows_dropped = report.rows_read - report.rows_kept;
    report.bytes_scanned = reader.position().byte();
    info!(
        path = %path.display(),
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        rows_dropped = report.rows_dropped,
        null_dates = report.null_dates,
        chunks = report.chunks,
        bytes = report.bytes_scanned,
        "loaded accident table"
    );

    Ok((builder.finish(), report))
}

fn open_source(path: &Path) -> Result<File, LoadError> {
    let io_err = |source: io::Error| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(io_err)?;
    if metadata.is_dir() {
        return Err(io_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path is a directory, not a file",
        )));
    }
    File::open(path).map_err(io_err)
}

/// Field positions of the required columns in the source header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    date: usize,
    latitude: usize,
    longitude: usize,
    cause: usize,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn locate_columns(path: &Path, header: &ByteRecord) -> Result<ColumnIndex, LoadError> {
    if header.is_empty() {
        return Err(LoadError::EmptySource {
            path: path.to_path_buf(),
        });
    }

    let position = |name: &str| {
        header.iter().enumerate().position(|(i, field)| {
            let field = if i == 0 {
                field.strip_prefix(UTF8_BOM).unwrap_or(field)
            } else {
                field
            };
            field == name.as_bytes()
        })
    };
    let found: Vec<Option<usize>> = REQUIRED_COLUMNS.iter().map(|name| position(name)).collect();

    match found[..] {
        [Some(date), Some(latitude), Some(longitude), Some(cause)] => Ok(ColumnIndex {
            date,
            latitude,
            longitude,
            cause,
        }),
        _ => Err(LoadError::DataFormat {
            path: path.to_path_buf(),
            missing: REQUIRED_COLUMNS
                .iter()
                .zip(&found)
                .filter(|(_, index)| index.is_none())
                .map(|(name, _)| name.to_string())
                .collect(),
        }),
    }
}

/// Read up to `size` records into `chunk`, reusing its buffers. Returns how many were read.
fn fill_chunk<R: io::Read>(
    reader: &mut csv::Reader<R>,
    chunk: &mut Vec<ByteRecord>,
    size: usize,
) -> csv::Result<usize> {
    let mut height = 0;
    while height < size {
        if height == chunk.len() {
            chunk.push(ByteRecord::new());
        }
        if !reader.read_byte_record(&mut chunk[height])? {
            break;
        }
        height += 1;
    }
    Ok(height)
}

fn text_field(record: &ByteRecord, index: usize) -> Option<&str> {
    record
        .get(index)
        .and_then(|raw| std::str::from_utf8(raw).ok())
}

fn append_chunk(
    builder: &mut TableBuilder,
    chunk: &[ByteRecord],
    columns: &ColumnIndex,
    bounds: &BoundingBox,
    report: &mut LoadReport,
) {
    for record in chunk {
        report.rows_read += 1;

        let (Some(latitude), Some(longitude)) = (
            text_field(record, columns.latitude).and_then(parse_coordinate),
            text_field(record, columns.longitude).and_then(parse_coordinate),
        ) else {
            continue;
        };
        if !bounds.contains(latitude, longitude) {
            continue;
        }

        let date = text_field(record, columns.date).and_then(parse_date);
        if date.is_none() {
            report.null_dates += 1;
        }
        let cause = record
            .get(columns.cause)
            .map(String::from_utf8_lossy);
        builder.push(date, latitude, longitude, cause.as_deref());
    }
}

/// Parse a coordinate cell. A decimal comma is accepted; non-finite values count as missing.
pub fn parse_coordinate(raw: &str) -> Option<f32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".").parse::<f32>().ok()?
    } else {
        trimmed.parse::<f32>().ok()?
    };
    value.is_finite().then_some(value)
}

/// Parse a date cell, returning `None` for anything that is not a recognizable date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}
