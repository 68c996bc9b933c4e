use thiserror::Error;

use crate::data::filter::ControlKind;

/// Failures while shaping the provider table itself.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}', row {row}: cannot convert '{value}' to {target}")]
    Coercion {
        column: String,
        row: usize,
        value: String,
        target: &'static str,
    },

    #[error("row {row}: claim count {value} is negative")]
    NegativeClaims { row: usize, value: f64 },
}

/// Failures raised while applying the viewer's filter selections.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("column '{column}' uses a {expected} filter but received a {found} selection")]
    IncompatibleSelection {
        column: String,
        expected: ControlKind,
        found: ControlKind,
    },

    #[error("column '{column}': invalid pattern")]
    InvalidPattern {
        column: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures raised while placing map features.
#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("row {row}: missing coordinate in '{column}'")]
    MissingCoordinate { row: usize, column: String },
}
