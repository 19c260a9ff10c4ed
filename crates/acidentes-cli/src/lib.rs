//! Shared CLI definitions for acidentes.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use chrono::NaiveDate;
use clap::{ArgAction, CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments for acidentes
#[derive(Clone, Parser, Debug)]
#[command(
    name = "acidentes",
    version,
    about = "Brazilian road-accident data pipeline",
    long_about = "Loads a CSV of federal-highway accident records, keeps rows whose coordinates fall \
inside Brazil, filters them by date and cause, and reports the cause ranking and the monthly \
series. Map points are capped with a reproducible random sample."
)]
pub struct Args {
    /// CSV file with data_inversa, latitude, longitude and causa_acidente columns.
    /// Defaults to `source.path` from the config file
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Keep accidents on or after this date (YYYY-MM-DD)
    #[arg(long = "from", value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Keep accidents on or before this date (YYYY-MM-DD)
    #[arg(long = "to", value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Keep only this cause (repeat for several). Matches the label exactly
    #[arg(long = "cause", value_name = "LABEL", action = ArgAction::Append)]
    pub causes: Vec<String>,

    /// Ignore `filters.default_causes` from the config and keep every cause
    #[arg(long = "all-causes", action, conflicts_with = "causes")]
    pub all_causes: bool,

    /// Maximum number of map points (larger tables are sampled)
    #[arg(long = "sample-cap", value_name = "N")]
    pub sample_cap: Option<usize>,

    /// Seed for map sampling
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,

    /// Rows parsed per chunk while loading
    #[arg(long = "chunk-size", value_name = "N", value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// Field delimiter: a single character (e.g. ';') or its ASCII code (e.g. 59)
    #[arg(long = "delimiter", value_name = "CHAR", value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Show only the N most frequent causes in the ranking
    #[arg(long = "top", value_name = "N")]
    pub top: Option<usize>,

    /// Write the filtered rows to this CSV file
    #[arg(long = "export-csv", value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// Write the sampled map points (latitude, longitude) to this CSV file
    #[arg(long = "points-csv", value_name = "PATH")]
    pub points_csv: Option<PathBuf>,

    /// Write the cause ranking chart (.png or .eps)
    #[arg(long = "cause-chart", value_name = "PATH")]
    pub cause_chart: Option<PathBuf>,

    /// Write the monthly accident chart (.png or .eps)
    #[arg(long = "monthly-chart", value_name = "PATH")]
    pub monthly_chart: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write a commented default configuration file and exit
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Overwrite an existing config file (with --generate-config)
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("chunk size must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !c.is_ascii_digit() => Ok(c as u8),
        _ => s
            .parse::<u8>()
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| format!("invalid delimiter '{}': expected one ASCII character or code", s)),
    }
}

fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if arg.get_action().takes_values() && !placeholder.is_empty() {
                format!("{op} {placeholder}")
            } else {
                op
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
