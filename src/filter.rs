//! Row selection applied between loading and sampling.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::record::{AccidentRecord, AccidentTable, CauseId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("date range start {start} is after end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Inclusive date range. Rows without a date never fall inside a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| (self.start..=self.end).contains(&d))
    }
}

/// Which causes to keep. `Only` with an empty set means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CauseSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CauseSelection {
    pub fn only<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(labels.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Only(labels) => labels.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub date_range: Option<DateRange>,
    pub causes: CauseSelection,
}

impl TableFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_causes(mut self, causes: CauseSelection) -> Self {
        self.causes = causes;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.date_range.is_none() && self.causes.is_all()
    }

    /// Keep the rows matching every active predicate. A no-op filter hands back the
    /// input table itself.
    pub fn apply(&self, table: &AccidentTable) -> AccidentTable {
        if self.is_noop() {
            return table.clone();
        }

        let wanted: Option<HashSet<CauseId>> = match &self.causes {
            CauseSelection::Only(labels) if !labels.is_empty() => Some(
                labels
                    .iter()
                    .filter_map(|label| table.causes().lookup(label))
                    .collect(),
            ),
            _ => None,
        };

        let keep = |record: &AccidentRecord| {
            let date_ok = self
                .date_range
                .map_or(true, |range| range.contains(record.date));
            let cause_ok = wanted
                .as_ref()
                .map_or(true, |ids| record.cause.is_some_and(|id| ids.contains(&id)));
            date_ok && cause_ok
        };

        table.derive(table.iter().filter(|r| keep(r)).copied())
    }
}
