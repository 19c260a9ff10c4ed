//! The text report: one pass from a loaded table to the numbers a user sees.

use chrono::NaiveDate;
use std::io::{self, Write};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::filter::{CauseSelection, DateRange, FilterError, TableFilter};
use crate::record::AccidentTable;
use crate::sample::sample_with_seed;
use crate::summary::{
    cause_counts, date_bounds, group_thousands, map_points, monthly_counts, CauseCount, MapPoint,
    MonthlyCount, Summary,
};
use crate::Args;

pub const NO_DATA_MESSAGE: &str = "No data available.";

/// Filter and sampling choices for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub filter: TableFilter,
    pub sample_cap: usize,
    pub seed: u64,
}

impl DashboardOptions {
    /// Combine command-line choices with the config. CLI wins; a single date bound is
    /// completed from the table's own date bounds.
    pub fn resolve(
        args: &Args,
        config: &AppConfig,
        table: &AccidentTable,
    ) -> Result<Self, FilterError> {
        let mut filter = TableFilter::new();
        if let Some(range) = resolve_date_range(args.from, args.to, date_bounds(table))? {
            filter = filter.with_date_range(range);
        }
        filter = filter.with_causes(resolve_causes(args, config, table));

        Ok(Self {
            filter,
            sample_cap: args.sample_cap.unwrap_or(config.map.sample_cap),
            seed: args.seed.unwrap_or(config.map.seed),
        })
    }
}

fn resolve_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    bounds: Option<(NaiveDate, NaiveDate)>,
) -> Result<Option<DateRange>, FilterError> {
    let (start, end) = match (from, to, bounds) {
        (None, None, _) => return Ok(None),
        (Some(start), Some(end), _) => (start, end),
        (Some(start), None, Some((_, hi))) => (start, hi.max(start)),
        (None, Some(end), Some((lo, _))) => (lo.min(end), end),
        // No dated rows to borrow the open side from.
        (Some(d), None, None) | (None, Some(d), None) => (d, d),
    };
    DateRange::new(start, end).map(Some)
}

fn resolve_causes(args: &Args, config: &AppConfig, table: &AccidentTable) -> CauseSelection {
    if !args.causes.is_empty() {
        for label in &args.causes {
            if table.causes().lookup(label).is_none() {
                warn!(cause = %label, "cause not present in the data; it matches no rows");
            }
        }
        return CauseSelection::only(args.causes.iter().cloned());
    }
    if args.all_causes || config.filters.default_causes.is_empty() {
        return CauseSelection::All;
    }

    // Config defaults only preselect causes the data actually has.
    let present: Vec<&String> = config
        .filters
        .default_causes
        .iter()
        .filter(|label| table.causes().lookup(label).is_some())
        .collect();
    if present.is_empty() {
        debug!("none of filters.default_causes occur in the data; keeping all causes");
        CauseSelection::All
    } else {
        CauseSelection::only(present.into_iter().cloned())
    }
}

/// Everything the report renders, computed once. Aggregates come from the full
/// filtered table; only `map` is sampled.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub filtered: AccidentTable,
    pub map: AccidentTable,
    pub summary: Summary,
    pub causes: Vec<CauseCount>,
    pub monthly: Vec<MonthlyCount>,
}

impl Dashboard {
    pub fn build(table: &AccidentTable, options: &DashboardOptions) -> Self {
        let filtered = options.filter.apply(table);
        let map = sample_with_seed(&filtered, options.sample_cap, options.seed);
        debug!(
            loaded = table.len(),
            filtered = filtered.len(),
            shown = map.len(),
            "dashboard built"
        );
        Self {
            summary: Summary::new(&filtered, &map, options.sample_cap),
            causes: cause_counts(&filtered),
            monthly: monthly_counts(&filtered),
            filtered,
            map,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn map_points(&self) -> Vec<MapPoint> {
        map_points(&self.map)
    }

    /// Render the report. `top` limits the cause ranking.
    pub fn write_text<W: Write>(&self, out: &mut W, top: Option<usize>) -> io::Result<()> {
        if self.is_empty() {
            return writeln!(out, "{}", NO_DATA_MESSAGE);
        }

        writeln!(out, "{}", self.summary)?;
        if let Some((lo, hi)) = date_bounds(&self.filtered) {
            writeln!(out, "Period: {} to {}", lo, hi)?;
        }

        let shown = top.unwrap_or(self.causes.len()).min(self.causes.len());
        writeln!(out)?;
        if shown < self.causes.len() {
            writeln!(out, "Accidents by cause (top {} of {}):", shown, self.causes.len())?;
        } else {
            writeln!(out, "Accidents by cause:")?;
        }
        let count_width = self
            .causes
            .first()
            .map(|c| group_thousands(c.count).len())
            .unwrap_or(1);
        for cause in &self.causes[..shown] {
            writeln!(
                out,
                "  {:>width$}  {}",
                group_thousands(cause.count),
                cause.cause,
                width = count_width
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Accidents by month:")?;
        for month in &self.monthly {
            writeln!(out, "  {}  {}", month.month, group_thousands(month.count))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TableBuilder;
    use clap::Parser;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn table() -> AccidentTable {
        let mut b = TableBuilder::new();
        b.push(date(2020, 1, 15), -23.5, -46.6, Some("Velocidade Incompatível"));
        b.push(date(2020, 1, 20), -22.9, -43.2, Some("Velocidade Incompatível"));
        b.push(date(2020, 3, 2), -15.8, -47.9, Some("Ingestão de álcool"));
        b.push(None, -3.1, -60.0, Some("Ingestão de álcool"));
        b.push(date(2021, 6, 1), -8.0, -34.9, Some("Falta de atenção"));
        b.finish()
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["acidentes", "acidentes.csv"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_keep_everything() {
        let options = DashboardOptions::resolve(&args(&[]), &AppConfig::default(), &table()).unwrap();
        assert!(options.filter.is_noop());
        assert_eq!(options.sample_cap, 50_000);
        assert_eq!(options.seed, 42);
    }

    #[test]
    fn test_single_bound_is_completed_from_data() {
        let t = table();
        let options =
            DashboardOptions::resolve(&args(&["--from", "2020-02-01"]), &AppConfig::default(), &t)
                .unwrap();
        let range = options.filter.date_range.unwrap();
        assert_eq!(Some(range.start()), date(2020, 2, 1));
        assert_eq!(Some(range.end()), date(2021, 6, 1));

        let options =
            DashboardOptions::resolve(&args(&["--to", "2020-01-31"]), &AppConfig::default(), &t)
                .unwrap();
        let range = options.filter.date_range.unwrap();
        assert_eq!(Some(range.start()), date(2020, 1, 15));
    }

    #[test]
    fn test_inverted_cli_range_is_an_error() {
        let result = DashboardOptions::resolve(
            &args(&["--from", "2021-01-01", "--to", "2020-01-01"]),
            &AppConfig::default(),
            &table(),
        );
        assert!(matches!(result, Err(FilterError::InvertedRange { .. })));
    }

    #[test]
    fn test_config_default_causes_only_preselect_known_labels() {
        let mut config = AppConfig::default();
        config.filters.default_causes = vec!["Ingestão de álcool".into(), "Chuva".into()];
        let options = DashboardOptions::resolve(&args(&[]), &config, &table()).unwrap();
        assert_eq!(options.filter.causes, CauseSelection::only(["Ingestão de álcool"]));

        config.filters.default_causes = vec!["Chuva".into()];
        let options = DashboardOptions::resolve(&args(&[]), &config, &table()).unwrap();
        assert!(options.filter.causes.is_all());

        config.filters.default_causes = vec!["Ingestão de álcool".into()];
        let options = DashboardOptions::resolve(&args(&["--all-causes"]), &config, &table()).unwrap();
        assert!(options.filter.causes.is_all());
    }

    #[test]
    fn test_cli_cause_overrides_config() {
        let mut config = AppConfig::default();
        config.filters.default_causes = vec!["Ingestão de álcool".into()];
        let options =
            DashboardOptions::resolve(&args(&["--cause", "Falta de atenção"]), &config, &table())
                .unwrap();
        assert_eq!(options.filter.causes, CauseSelection::only(["Falta de atenção"]));
    }

    #[test]
    fn test_dashboard_aggregates_full_table_not_sample() {
        let options = DashboardOptions {
            filter: TableFilter::new(),
            sample_cap: 2,
            seed: 42,
        };
        let dashboard = Dashboard::build(&table(), &options);
        assert_eq!(dashboard.map.len(), 2);
        assert_eq!(dashboard.summary.total, 5);
        assert_eq!(dashboard.causes.iter().map(|c| c.count).sum::<usize>(), 5);
        assert_eq!(dashboard.monthly.iter().map(|m| m.count).sum::<usize>(), 4);
        assert_eq!(dashboard.map_points().len(), 2);
    }

    #[test]
    fn test_write_text_report() {
        let options = DashboardOptions {
            filter: TableFilter::new(),
            sample_cap: 50_000,
            seed: 42,
        };
        let dashboard = Dashboard::build(&table(), &options);
        let mut out = Vec::new();
        dashboard.write_text(&mut out, Some(2)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("5 accidents.\n"), "got: {}", text);
        assert!(text.contains("Period: 2020-01-15 to 2021-06-01"));
        assert!(text.contains("Accidents by cause (top 2 of 3):"));
        assert!(text.contains("  2  Ingestão de álcool"));
        assert!(!text.contains("Falta de atenção"));
        assert!(text.contains("  2020-01  2"));
        assert!(text.contains("  2021-06  1"));
    }

    #[test]
    fn test_empty_table_renders_no_data_state() {
        let dashboard = Dashboard::build(
            &AccidentTable::empty(),
            &DashboardOptions {
                filter: TableFilter::new(),
                sample_cap: 10,
                seed: 42,
            },
        );
        let mut out = Vec::new();
        dashboard.write_text(&mut out, None).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No data available.\n");
    }
}
