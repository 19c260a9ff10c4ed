//! Accident rows, the cause dictionary, and the immutable table that carries them.
//!
//! Tables share their row storage and their cause catalog through `Arc`, so cloning a
//! table is cheap and every derivation (filter, sample) builds a new row slice while
//! reusing the catalog of its parent.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Compact code for a cause label inside a [`CauseCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CauseId(u32);

impl CauseId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Distinct cause labels in first-seen order. Labels are stored verbatim (case and
/// accents preserved).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CauseCatalog {
    labels: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, CauseId>,
}

impl CauseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the code for `label`, adding it to the catalog when unseen.
    pub fn intern(&mut self, label: &str) -> CauseId {
        if let Some(id) = self.lookup.get(label) {
            return *id;
        }
        let id = CauseId(self.labels.len() as u32);
        let label: Arc<str> = Arc::from(label);
        self.labels.push(label.clone());
        self.lookup.insert(label, id);
        id
    }

    pub fn lookup(&self, label: &str) -> Option<CauseId> {
        self.lookup.get(label).copied()
    }

    pub fn label(&self, id: CauseId) -> Option<&str> {
        self.labels.get(id.index()).map(|l| l.as_ref())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in first-seen order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|l| l.as_ref())
    }
}

/// One accident. Coordinates are always present and inside the bounding box once a
/// record is part of a table built by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccidentRecord {
    pub date: Option<NaiveDate>,
    pub latitude: f32,
    pub longitude: f32,
    pub cause: Option<CauseId>,
}

/// Ordered, immutable sequence of accidents plus the catalog their causes point into.
#[derive(Debug, Clone)]
pub struct AccidentTable {
    rows: Arc<[AccidentRecord]>,
    causes: Arc<CauseCatalog>,
}

impl Default for AccidentTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for AccidentTable {
    /// Tables are equal when they hold the same rows with the same cause labels.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.rows.iter().zip(other.rows.iter()).all(|(a, b)| {
                a.date == b.date
                    && a.latitude.to_bits() == b.latitude.to_bits()
                    && a.longitude.to_bits() == b.longitude.to_bits()
                    && self.cause_label(a) == other.cause_label(b)
            })
    }
}

impl AccidentTable {
    pub fn empty() -> Self {
        Self {
            rows: Arc::from(Vec::new()),
            causes: Arc::new(CauseCatalog::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AccidentRecord] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&AccidentRecord> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccidentRecord> {
        self.rows.iter()
    }

    pub fn causes(&self) -> &CauseCatalog {
        &self.causes
    }

    pub fn cause_label(&self, record: &AccidentRecord) -> Option<&str> {
        record.cause.and_then(|id| self.causes.label(id))
    }

    /// True when both tables are backed by the same row storage.
    pub fn shares_rows_with(&self, other: &AccidentTable) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    /// Build a new table from rows of this one, keeping the catalog.
    pub fn derive<I>(&self, rows: I) -> AccidentTable
    where
        I: IntoIterator<Item = AccidentRecord>,
    {
        AccidentTable {
            rows: rows.into_iter().collect(),
            causes: Arc::clone(&self.causes),
        }
    }

    /// Build a new table from row positions of this one, in the given order.
    pub(crate) fn take(&self, indices: impl IntoIterator<Item = usize>) -> AccidentTable {
        self.derive(indices.into_iter().map(|i| self.rows[i]))
    }
}

impl<'a> IntoIterator for &'a AccidentTable {
    type Item = &'a AccidentRecord;
    type IntoIter = std::slice::Iter<'a, AccidentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Accumulates validated rows (and interns their causes) until `finish` freezes them
/// into an [`AccidentTable`].
#[derive(Debug, Default)]
pub struct TableBuilder {
    rows: Vec<AccidentRecord>,
    causes: CauseCatalog,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            causes: CauseCatalog::new(),
        }
    }

    /// Append a row. An empty cause label is stored as no cause.
    pub fn push(
        &mut self,
        date: Option<NaiveDate>,
        latitude: f32,
        longitude: f32,
        cause: Option<&str>,
    ) {
        let cause = cause
            .filter(|label| !label.is_empty())
            .map(|label| self.causes.intern(label));
        self.rows.push(AccidentRecord {
            date,
            latitude,
            longitude,
            cause,
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> AccidentTable {
        AccidentTable {
            rows: Arc::from(self.rows),
            causes: Arc::new(self.causes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_catalog_interns_each_label_once() {
        let mut catalog = CauseCatalog::new();
        let a = catalog.intern("Velocidade Incompatível");
        let b = catalog.intern("Ingestão de álcool");
        let c = catalog.intern("Velocidade Incompatível");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.label(b), Some("Ingestão de álcool"));
        assert_eq!(catalog.lookup("velocidade incompatível"), None);
    }

    #[test]
    fn test_builder_treats_empty_cause_as_missing() {
        let mut builder = TableBuilder::new();
        builder.push(date(2020, 1, 15), -23.5, -46.6, Some("Speeding"));
        builder.push(None, -23.5, -46.6, Some(""));
        builder.push(None, -23.5, -46.6, None);
        let table = builder.finish();
        assert_eq!(table.len(), 3);
        assert_eq!(table.cause_label(&table.rows()[0]), Some("Speeding"));
        assert_eq!(table.rows()[1].cause, None);
        assert_eq!(table.causes().len(), 1);
    }

    #[test]
    fn test_derive_shares_catalog_and_compares_by_label() {
        let mut builder = TableBuilder::new();
        builder.push(date(2021, 3, 1), -10.0, -50.0, Some("A"));
        builder.push(date(2021, 3, 2), -11.0, -51.0, Some("B"));
        let table = builder.finish();

        let derived = table.take([1]);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived.cause_label(&derived.rows()[0]), Some("B"));
        assert!(!derived.shares_rows_with(&table));

        let mut other = TableBuilder::new();
        other.push(date(2021, 3, 2), -11.0, -51.0, Some("B"));
        assert_eq!(derived, other.finish());
    }

    #[test]
    fn test_clone_shares_rows() {
        let mut builder = TableBuilder::new();
        builder.push(None, 0.0, -40.0, None);
        let table = builder.finish();
        let copy = table.clone();
        assert!(copy.shares_rows_with(&table));
        assert_eq!(copy, table);
    }
}
