use std::fmt;

use crate::repository::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Value rejected at blur time (out of bounds or not a number).
    /// The stored record is untouched.
    Range { field: String, input: String, max: f64 },
    /// The editing context points at no parcel (stale or missing index).
    NoCurrentParcel { project: String },
    /// Parcel index out of range for the record set.
    IndexOutOfRange { index: usize, len: usize },
    /// Row index out of range for a parcel table.
    RowOutOfRange { table: String, index: usize, len: usize },
    /// Field path could not be parsed.
    UnknownField(String),
    /// Derived fields are recomputed, never set directly.
    DerivedField(String),
    /// A table is already at its row limit.
    RowLimit { table: String, max: usize },
    /// Required value missing (project creation).
    MissingValue(&'static str),
    /// Referenced project does not exist.
    UnknownProject(String),
    /// Backend failure.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { field, input, max } => {
                write!(f, "{field}: '{input}' is not a number between 0 and {max}")
            }
            Self::NoCurrentParcel { project } => {
                write!(f, "no parcel is being edited in project '{project}'")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "parcel index {index} out of range (project has {len} parcel(s))")
            }
            Self::RowOutOfRange { table, index, len } => {
                write!(f, "{table}: row {index} out of range ({len} row(s))")
            }
            Self::UnknownField(path) => write!(f, "unknown field: {path}"),
            Self::DerivedField(path) => {
                write!(f, "{path} is computed automatically and cannot be edited")
            }
            Self::RowLimit { table, max } => write!(f, "{table}: at most {max} rows allowed"),
            Self::MissingValue(name) => write!(f, "missing required value: {name}"),
            Self::UnknownProject(id) => write!(f, "unknown project: {id}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
