//! Aggregations handed to the rendering layer: cause ranking, monthly series, date bounds
//! and map points. These always run on the full (filtered) table, never on a sample.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;

use crate::record::AccidentTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CauseCount {
    pub cause: String,
    pub count: usize,
}

/// Calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Months elapsed since January of year 0; used as a continuous chart axis.
    pub fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: YearMonth,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Cause frequencies, most frequent first; ties ordered by label. Rows without a cause
/// are not counted.
pub fn cause_counts(table: &AccidentTable) -> Vec<CauseCount> {
    let mut counts = vec![0usize; table.causes().len()];
    for record in table {
        if let Some(id) = record.cause {
            counts[id.index()] += 1;
        }
    }

    let mut ranked: Vec<CauseCount> = table
        .causes()
        .labels()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| CauseCount {
            cause: label.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.cause.cmp(&b.cause)));
    ranked
}

/// Accident counts per calendar month in chronological order. Months with no accidents
/// are omitted; rows without a date are skipped.
pub fn monthly_counts(table: &AccidentTable) -> Vec<MonthlyCount> {
    let mut by_month: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for date in table.iter().filter_map(|r| r.date) {
        *by_month.entry(YearMonth::of(date)).or_default() += 1;
    }
    by_month
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect()
}

/// Earliest and latest known date.
pub fn date_bounds(table: &AccidentTable) -> Option<(NaiveDate, NaiveDate)> {
    table.iter().filter_map(|r| r.date).fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}

pub fn map_points(table: &AccidentTable) -> Vec<MapPoint> {
    table
        .iter()
        .map(|r| MapPoint {
            latitude: f64::from(r.latitude),
            longitude: f64::from(r.longitude),
        })
        .collect()
}

/// Headline numbers for one rendering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Accidents left after filtering.
    pub total: usize,
    /// Points drawn on the map (at most `cap`).
    pub shown: usize,
    pub cap: usize,
}

impl Summary {
    pub fn new(filtered: &AccidentTable, sampled: &AccidentTable, cap: usize) -> Self {
        Self {
            total: filtered.len(),
            shown: sampled.len(),
            cap,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.shown < self.total
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sampled() {
            write!(
                f,
                "Showing a sample of {} points of {} accidents.",
                group_thousands(self.shown),
                group_thousands(self.total)
            )
        } else {
            write!(f, "{} accidents.", group_thousands(self.total))
        }
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TableBuilder;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn fixture() -> AccidentTable {
        let mut b = TableBuilder::new();
        b.push(d(2020, 1, 15), -23.5, -46.6, Some("Velocidade"));
        b.push(d(2020, 1, 20), -22.9, -43.2, Some("Álcool"));
        b.push(d(2020, 3, 2), -15.8, -47.9, Some("Velocidade"));
        b.push(None, -3.1, -60.0, Some("Álcool"));
        b.push(d(2019, 12, 31), -30.0, -51.2, Some("Sono"));
        b.push(d(2020, 3, 9), -30.0, -51.2, None);
        b.finish()
    }

    #[test]
    fn test_cause_counts_ranked_with_label_tiebreak() {
        let counts = cause_counts(&fixture());
        let pairs: Vec<(&str, usize)> = counts.iter().map(|c| (c.cause.as_str(), c.count)).collect();
        assert_eq!(pairs, vec![("Velocidade", 2), ("Álcool", 2), ("Sono", 1)]);
    }

    #[test]
    fn test_cause_counts_skip_causes_absent_after_filtering() {
        let table = fixture();
        let only_first = table.derive(table.rows()[..1].iter().copied());
        let counts = cause_counts(&only_first);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].cause, "Velocidade");
    }

    #[test]
    fn test_monthly_counts_are_chronological() {
        let months = monthly_counts(&fixture());
        let rendered: Vec<(String, usize)> =
            months.iter().map(|m| (m.month.to_string(), m.count)).collect();
        assert_eq!(
            rendered,
            vec![
                ("2019-12".to_string(), 1),
                ("2020-01".to_string(), 2),
                ("2020-03".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_year_month_ordinal_round_trips_across_years() {
        let dec = YearMonth { year: 2019, month: 12 };
        let jan = YearMonth { year: 2020, month: 1 };
        assert_eq!(jan.ordinal() - dec.ordinal(), 1);
        assert_eq!(YearMonth::from_ordinal(jan.ordinal()), jan);
        assert_eq!(jan.first_day(), d(2020, 1, 1));
    }

    #[test]
    fn test_date_bounds() {
        assert_eq!(date_bounds(&fixture()), Some((d(2019, 12, 31).unwrap(), d(2020, 3, 9).unwrap())));
        assert_eq!(date_bounds(&AccidentTable::empty()), None);
    }

    #[test]
    fn test_summary_display() {
        let s = Summary { total: 1_234_567, shown: 50_000, cap: 50_000 };
        assert_eq!(s.to_string(), "Showing a sample of 50,000 points of 1,234,567 accidents.");
        let s = Summary { total: 12, shown: 12, cap: 50_000 };
        assert_eq!(s.to_string(), "12 accidents.");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(100_000), "100,000");
    }
}
