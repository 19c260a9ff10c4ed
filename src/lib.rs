//! Loading, cleaning and sampling pipeline for Brazilian federal-highway accident records.
//!
//! `load` reads a CSV in chunks and keeps rows located inside Brazil, `TableFilter`
//! narrows them by date and cause, `sample` caps the rows drawn on a map, and the
//! `summary` functions produce the aggregates a front end renders.

pub mod cache;
pub mod chart_export;
pub mod config;
pub mod error_display;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod record;
pub mod report;
pub mod sample;
pub mod summary;

pub use acidentes_cli::Args;
pub use cache::{LoadCache, SourceFingerprint};
pub use config::{AppConfig, ConfigManager};
pub use filter::{CauseSelection, DateRange, FilterError, TableFilter};
pub use ingest::{
    load, load_with_options, load_with_report, BoundingBox, IngestOptions, LoadError, LoadReport,
};
pub use record::{AccidentRecord, AccidentTable, CauseCatalog, CauseId, TableBuilder};
pub use report::{Dashboard, DashboardOptions};
pub use sample::{sample, sample_with_seed, DEFAULT_MAP_CAP, DEFAULT_SEED};
pub use summary::{
    cause_counts, date_bounds, map_points, monthly_counts, CauseCount, MapPoint, MonthlyCount,
    Summary, YearMonth,
};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "acidentes";
