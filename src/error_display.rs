//! User-facing error message formatting.
//!
//! Uses typed error matching (LoadError, csv and PolarsError kinds, io::ErrorKind) rather
//! than string parsing to produce short, actionable messages.

use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

use crate::ingest::LoadError;

/// Format a LoadError as the single message shown when a load fails.
pub fn user_message(err: &LoadError) -> String {
    match err {
        LoadError::Io { path, source } => format!(
            "Failed to load {}: {}",
            path.display(),
            user_message_from_io(source, None)
        ),
        LoadError::DataFormat { path, missing } => format!(
            "Failed to load {}: missing required column(s) {}. Expected data_inversa, latitude, longitude and causa_acidente.",
            path.display(),
            missing.join(", ")
        ),
        LoadError::EmptySource { path } => {
            format!("Failed to load {}: the file is empty (no header row).", path.display())
        }
        LoadError::InvalidOptions(msg) => format!("Invalid load options: {}", msg),
        LoadError::Csv { path, source } => format!(
            "Failed to load {}: {}",
            path.display(),
            user_message_from_csv(source)
        ),
    }
}

/// Format a csv::Error by matching on its kind. Line numbers are 1-based, header included.
pub fn user_message_from_csv(err: &csv::Error) -> String {
    let line = err.position().map(|p| p.line());
    let at = |msg: &str| match line {
        Some(line) => format!("{} at line {}.", msg, line),
        None => format!("{}.", msg),
    };

    match err.kind() {
        csv::ErrorKind::Io(io_err) => user_message_from_io(io_err, None),
        csv::ErrorKind::Utf8 { .. } => at("Invalid UTF-8 data (is the file UTF-8?)"),
        _ => err.to_string(),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData => "Invalid or corrupted data (is the file UTF-8?).".to_string(),
        ErrorKind::InvalidInput => {
            let msg = err.to_string();
            if msg.contains("directory") {
                "Path is a directory, not a file.".to_string()
            } else {
                "Invalid input.".to_string()
            }
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find LoadError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    for cause in report.chain() {
        if let Some(le) = cause.downcast_ref::<LoadError>() {
            return user_message(le);
        }
        if let Some(ce) = cause.downcast_ref::<csv::Error>() {
            let msg = user_message_from_csv(ce);
            return match path {
                Some(p) => format!("{}: {}", p.display(), msg),
                None => msg,
            };
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            let msg = user_message_from_polars(pe);
            return match path {
                Some(p) => format!("{}: {}", p.display(), msg),
                None => msg,
            };
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            let msg = user_message_from_io(io_err, None);
            return match path {
                Some(p) => format!("{}: {}", p.display(), msg),
                None => msg,
            };
        }
    }

    // First line only; the full chain is for logs.
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred").trim();
    match path {
        Some(p) => format!("{}: {}", p.display(), first_line),
        None => first_line.to_string(),
    }
}

/// Keep the first sentence of a ComputeError and drop polars' hint lines.
fn simplify_compute_message(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or(msg).trim();
    if first.is_empty() {
        "Computation failed.".to_string()
    } else {
        first.to_string()
    }
}
