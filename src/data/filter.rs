use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use super::columns;
use super::model::{CellValue, Column, ColumnType, ProviderTable};
use crate::error::FilterError;

/// Records with fewer claims than this are dropped once filters are enabled.
pub const CLAIM_THRESHOLD: f64 = 100.0;

/// Columns with fewer distinct values than this get a multi-select.
pub const CATEGORICAL_MAX_UNIQUE: usize = 10;

/// Resolution of the numeric range slider.
pub const SLIDER_STEPS: f64 = 100.0;

// ---------------------------------------------------------------------------
// Control kinds and controls
// ---------------------------------------------------------------------------

/// Which filter widget a column gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Categorical,
    Numeric,
    Date,
    Text,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Categorical => "categorical",
            ControlKind::Numeric => "numeric range",
            ControlKind::Date => "date range",
            ControlKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Pick the control for a column.  Checked in order; the first rule that
/// matches wins, so a low-cardinality numeric column is categorical.
pub fn classify(column: &Column) -> ControlKind {
    if column.dtype == ColumnType::Category || column.n_unique() < CATEGORICAL_MAX_UNIQUE {
        ControlKind::Categorical
    } else if column.dtype.is_numeric() {
        ControlKind::Numeric
    } else if column.dtype == ColumnType::Date {
        ControlKind::Date
    } else {
        ControlKind::Text
    }
}

/// A filter widget with the domain it was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterControl {
    /// Multi-select over the values currently present.
    Categorical { options: Vec<CellValue> },
    /// Inclusive range slider over `[min, max]`.
    Numeric { min: f64, max: f64, step: f64 },
    /// Date range picker over `[min, max]`.
    Date { min: NaiveDate, max: NaiveDate },
    /// Substring or regular expression.
    Text,
}

impl FilterControl {
    pub fn for_column(column: &Column) -> FilterControl {
        match classify(column) {
            ControlKind::Categorical => FilterControl::Categorical {
                options: column.unique(),
            },
            ControlKind::Numeric => {
                // n_unique >= CATEGORICAL_MAX_UNIQUE here, so bounds exist.
                let (min, max) = column.numeric_bounds().unwrap_or((0.0, 0.0));
                FilterControl::Numeric {
                    min,
                    max,
                    step: (max - min) / SLIDER_STEPS,
                }
            }
            ControlKind::Date => {
                let (min, max) = column
                    .date_bounds()
                    .map(|(lo, hi)| (lo.date(), hi.date()))
                    .unwrap_or_default();
                FilterControl::Date { min, max }
            }
            ControlKind::Text => FilterControl::Text,
        }
    }

    pub fn kind(&self) -> ControlKind {
        match self {
            FilterControl::Categorical { .. } => ControlKind::Categorical,
            FilterControl::Numeric { .. } => ControlKind::Numeric,
            FilterControl::Date { .. } => ControlKind::Date,
            FilterControl::Text => ControlKind::Text,
        }
    }

    /// What the widget shows before the viewer touches it: everything.
    pub fn default_selection(&self) -> Selection {
        match self {
            FilterControl::Categorical { options } => {
                Selection::Values(options.iter().cloned().collect())
            }
            FilterControl::Numeric { min, max, .. } => Selection::Range(*min, *max),
            FilterControl::Date { min, max } => Selection::Dates(vec![*min, *max]),
            FilterControl::Text => Selection::Pattern(String::new()),
        }
    }

    /// Rows of `column` that pass `selection`.
    pub fn mask(&self, column: &Column, selection: &Selection) -> Result<Vec<bool>, FilterError> {
        if selection.kind() != self.kind() {
            return Err(FilterError::IncompatibleSelection {
                column: column.name.clone(),
                expected: self.kind(),
                found: selection.kind(),
            });
        }

        let mask: Vec<bool> = match selection {
            Selection::Values(selected) => {
                column.values.iter().map(|v| selected.contains(v)).collect()
            }
            Selection::Range(lo, hi) => column
                .values
                .iter()
                .map(|v| v.as_f64().is_some_and(|x| *lo <= x && x <= *hi))
                .collect(),
            Selection::Dates(dates) => match dates.as_slice() {
                [start, end] => {
                    let start = start.and_time(NaiveTime::MIN);
                    let end = end.and_time(NaiveTime::MIN);
                    column
                        .values
                        .iter()
                        .map(|v| v.as_date().is_some_and(|d| start <= d && d <= end))
                        .collect()
                }
                // A half-picked range filters nothing.
                _ => vec![true; column.len()],
            },
            Selection::Pattern(pattern) if pattern.is_empty() => vec![true; column.len()],
            Selection::Pattern(pattern) => {
                let re = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
                    column: column.name.clone(),
                    source,
                })?;
                // Missing cells are matched as the empty string, so a
                // pattern like "nan" never selects them.
                column
                    .values
                    .iter()
                    .map(|v| re.is_match(&v.to_string()))
                    .collect()
            }
        };
        Ok(mask)
    }
}

/// The viewer's input for one column's control.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Values(BTreeSet<CellValue>),
    Range(f64, f64),
    /// Zero, one or two endpoints.
    Dates(Vec<NaiveDate>),
    Pattern(String),
}

impl Selection {
    pub fn kind(&self) -> ControlKind {
        match self {
            Selection::Values(_) => ControlKind::Categorical,
            Selection::Range(..) => ControlKind::Numeric,
            Selection::Dates(_) => ControlKind::Date,
            Selection::Pattern(_) => ControlKind::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter state: what the viewer has picked
// ---------------------------------------------------------------------------

/// Widget state owned by the UI and fed into every render pass.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    /// The "Add filters" toggle.
    pub enabled: bool,
    /// Columns picked for filtering, in the order they were picked.
    pub columns: Vec<String>,
    /// Selections the viewer changed; absent means the control's default.
    pub selections: BTreeMap<String, Selection>,
}

impl FilterState {
    pub fn is_column_selected(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Pick or unpick a column.  Unpicking forgets its selection.
    pub fn toggle_column(&mut self, column: &str) {
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.columns.remove(pos);
            self.selections.remove(column);
        } else {
            self.columns.push(column.to_string());
        }
    }

    pub fn set_selection(&mut self, column: &str, selection: Selection) {
        self.selections.insert(column.to_string(), selection);
    }

    /// The stored selection for `column`, or the control's default when none
    /// is stored or the stored one was made for a different kind of control.
    /// A column changes kind when earlier filters leave it with fewer
    /// distinct values; the rebuilt control then starts from its default.
    pub fn selection_for(&self, column: &str, control: &FilterControl) -> Selection {
        match self.selections.get(column) {
            Some(stored) if stored.kind() == control.kind() => stored.clone(),
            Some(stored) => {
                log::debug!(
                    "Column '{column}' is now {}, dropping its {} selection",
                    control.kind(),
                    stored.kind()
                );
                control.default_selection()
            }
            None => control.default_selection(),
        }
    }
}

/// A control as it was built during a pass, for the UI to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnControl {
    pub column: String,
    pub control: FilterControl,
    pub selection: Selection,
}

/// Result of one filter pass.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub table: ProviderTable,
    /// Columns offered in the "filter on" picker.
    pub available_columns: Vec<String>,
    pub controls: Vec<ColumnControl>,
}

// ---------------------------------------------------------------------------
// Filter pass
// ---------------------------------------------------------------------------

/// Narrow `table` according to `state`.
///
/// Disabled: the input is returned unchanged.  Enabled: drop records below
/// [`CLAIM_THRESHOLD`], convert date-like text columns, then apply each picked
/// column's control in order.  Each control is built from the rows left by
/// the controls before it.
pub fn apply_filters(
    table: &ProviderTable,
    state: &FilterState,
) -> Result<FilterOutcome, FilterError> {
    if !state.enabled {
        return Ok(FilterOutcome {
            table: table.clone(),
            available_columns: Vec::new(),
            controls: Vec::new(),
        });
    }

    let mut filtered = drop_below_threshold(table)?;
    convert_dates(&mut filtered);
    let available_columns = filtered.column_names();

    let mut controls = Vec::with_capacity(state.columns.len());
    for name in &state.columns {
        let column = filtered.require(name)?;
        let control = FilterControl::for_column(column);
        let selection = state.selection_for(name, &control);
        let mask = control.mask(column, &selection)?;
        filtered = filtered.filter_rows(&mask);
        controls.push(ColumnControl {
            column: name.clone(),
            control,
            selection,
        });
    }

    log::debug!(
        "Filter pass kept {} of {} records ({} column filters)",
        filtered.len(),
        table.len(),
        controls.len()
    );

    Ok(FilterOutcome {
        table: filtered,
        available_columns,
        controls,
    })
}

/// Keep records with at least [`CLAIM_THRESHOLD`] claims.  Missing claim
/// counts never pass.
pub fn drop_below_threshold(table: &ProviderTable) -> Result<ProviderTable, FilterError> {
    let claims = table.require(columns::CLAIMS)?;
    let mask: Vec<bool> = claims
        .values
        .iter()
        .map(|v| v.as_f64().is_some_and(|c| c >= CLAIM_THRESHOLD))
        .collect();
    Ok(table.filter_rows(&mask))
}

/// Turn text columns whose every present value parses as a date into date
/// columns.  Columns that do not fully parse are left as they are.
pub fn convert_dates(table: &mut ProviderTable) {
    let names: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.dtype == ColumnType::Text)
        .map(|c| c.name.clone())
        .collect();

    for name in names {
        let Some(column) = table.column_mut(&name) else {
            continue;
        };
        let parsed: Option<Vec<CellValue>> = column
            .values
            .iter()
            .map(|v| match v {
                CellValue::Null => Some(CellValue::Null),
                CellValue::Text(s) => parse_datetime(s).map(CellValue::Date),
                _ => None,
            })
            .collect();
        match parsed {
            Some(values) if values.iter().any(|v| !v.is_null()) => {
                log::debug!("Column '{name}' parsed as dates");
                column.values = values;
                column.dtype = ColumnType::Date;
            }
            _ => {}
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];

/// Parse a timestamp, dropping any zone offset and keeping wall-clock time.
/// Bare digit strings (identifiers, ZIP codes) are never dates.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() || s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}
