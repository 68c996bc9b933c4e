use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::DataError;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the provider table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a dataframe reader produces.
/// Filters keep `CellValue`s in `BTreeSet`s, so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Null,
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{}", format_float(*v)),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            // Missing values render blank and match text filters as "".
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64` for sums, ranges and radii.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

/// Floats always show a fractional part (`150.0`, `0.25`).
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Bool,
    Date,
    /// Declared categorical by the source (e.g. a dictionary-encoded column).
    Category,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float | ColumnType::Bool)
    }
}

/// One named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: ColumnType, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct non-missing values.
    pub fn n_unique(&self) -> usize {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Distinct values (missing included) in order of first appearance.
    pub fn unique(&self) -> Vec<CellValue> {
        let mut seen = HashSet::new();
        self.values
            .iter()
            .filter(|v| seen.insert(*v))
            .cloned()
            .collect()
    }

    /// Numeric minimum and maximum, skipping missing values.
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter_map(CellValue::as_f64)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn date_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut dates = self.values.iter().filter_map(CellValue::as_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// Sum of numeric values, skipping missing ones.
    pub fn sum(&self) -> f64 {
        self.values.iter().filter_map(CellValue::as_f64).sum()
    }

    /// Count of non-missing values.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_null()).count()
    }
}

// ---------------------------------------------------------------------------
// ProviderTable – the loaded claims table
// ---------------------------------------------------------------------------

/// Column-oriented table of provider records, one row per
/// provider-site-and-claim-category combination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderTable {
    columns: Vec<Column>,
}

impl ProviderTable {
    /// Build a table; every column must have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        debug_assert!(columns.windows(2).all(|w| w[0].len() == w[1].len()));
        ProviderTable { columns }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Like [`column`](Self::column) but a missing column is an error.
    pub fn require(&self, name: &str) -> Result<&Column, DataError> {
        self.column(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    /// Append a column, replacing any existing column of the same name.
    pub fn push_column(&mut self, column: Column) {
        match self.column_mut(&column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn filter_rows(&self, mask: &[bool]) -> ProviderTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                dtype: c.dtype,
                values: c
                    .values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect(),
            })
            .collect();
        ProviderTable { columns }
    }

    /// Project onto `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<ProviderTable, DataError> {
        let columns = names
            .iter()
            .map(|n| self.require(n).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProviderTable { columns })
    }

    /// Rename columns; names not present are ignored.
    pub fn rename(&mut self, renames: &[(&str, &str)]) {
        for (from, to) in renames {
            if let Some(col) = self.column_mut(from) {
                col.name = to.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProviderTable {
        ProviderTable::from_columns(vec![
            Column::new(
                "a",
                ColumnType::Integer,
                vec![CellValue::Integer(3), CellValue::Integer(1), CellValue::Integer(3)],
            ),
            Column::new(
                "b",
                ColumnType::Text,
                vec![
                    CellValue::Text("x".into()),
                    CellValue::Null,
                    CellValue::Text("y".into()),
                ],
            ),
        ])
    }

    #[test]
    fn unique_keeps_first_appearance_order() {
        let t = table();
        let a = t.column("a").unwrap();
        assert_eq!(a.unique(), vec![CellValue::Integer(3), CellValue::Integer(1)]);
        assert_eq!(a.n_unique(), 2);
    }

    #[test]
    fn n_unique_and_count_skip_missing() {
        let t = table();
        let b = t.column("b").unwrap();
        assert_eq!(b.n_unique(), 2);
        assert_eq!(b.count(), 2);
        assert_eq!(b.unique().len(), 3);
    }

    #[test]
    fn filter_select_and_rename() {
        let mut t = table().filter_rows(&[true, false, true]);
        assert_eq!(t.len(), 2);
        t.rename(&[("b", "label")]);
        let projected = t.select(&["label", "a"]).unwrap();
        assert_eq!(projected.column_names(), vec!["label", "a"]);
        assert!(matches!(
            t.select(&["b"]),
            Err(DataError::MissingColumn(name)) if name == "b"
        ));
    }

    #[test]
    fn floats_display_with_fraction() {
        assert_eq!(CellValue::Float(150.0).to_string(), "150.0");
        assert_eq!(CellValue::Float(0.25).to_string(), "0.25");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn nan_counts_as_missing() {
        let col = Column::new(
            "c",
            ColumnType::Float,
            vec![CellValue::Float(f64::NAN), CellValue::Float(2.0)],
        );
        assert_eq!(col.count(), 1);
        assert_eq!(col.sum(), 2.0);
        assert_eq!(col.numeric_bounds(), Some((2.0, 2.0)));
    }
}
