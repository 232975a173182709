//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | store            | Data directory and backend codes         |
//! | 10-19   | edit             | Rejected edits and blocking validation   |
//! | 20-29   | context          | No project / parcel selected, bad index  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `engine_exit_code` or the relevant command

use dbforestale_engine::{EngineError, StoreError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Store (3-9)
// =============================================================================

/// Filesystem error reading or writing the data directory.
pub const EXIT_STORE_IO: u8 = 3;

/// A stored document or row could not be decoded.
pub const EXIT_STORE_CORRUPT: u8 = 4;

/// Database error from the SQLite backend.
pub const EXIT_STORE_BACKEND: u8 = 5;

// =============================================================================
// Edit (10-19)
// =============================================================================

/// Area value not a number in [0, 999.9999]. Nothing was changed.
pub const EXIT_EDIT_RANGE: u8 = 10;

/// Species percentages exceed 100%. The edit was computed but not saved.
pub const EXIT_EDIT_BLOCKED: u8 = 11;

/// Unknown field path, or a derived field that cannot be set.
pub const EXIT_EDIT_FIELD: u8 = 12;

/// Table already at its row limit (infrastructure: 6).
pub const EXIT_EDIT_ROW_LIMIT: u8 = 13;

/// A required value is missing (project fields, infrastructure kind).
pub const EXIT_EDIT_MISSING: u8 = 14;

// =============================================================================
// Context (20-29)
// =============================================================================

/// No project selected in the session.
pub const EXIT_NO_PROJECT: u8 = 20;

/// No parcel selected, or the selected index no longer exists.
pub const EXIT_NO_PARCEL: u8 = 21;

/// The referenced project does not exist.
pub const EXIT_UNKNOWN_PROJECT: u8 = 22;

/// Parcel or row index out of range.
pub const EXIT_INDEX: u8 = 23;

/// Map a StoreError to its exit code.
pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Io(_) => EXIT_STORE_IO,
        StoreError::Serialize(_) => EXIT_STORE_CORRUPT,
        StoreError::Backend(_) => EXIT_STORE_BACKEND,
    }
}

/// Map an EngineError to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Range { .. } => EXIT_EDIT_RANGE,
        EngineError::UnknownField(_) | EngineError::DerivedField(_) => EXIT_EDIT_FIELD,
        EngineError::RowLimit { .. } => EXIT_EDIT_ROW_LIMIT,
        EngineError::MissingValue(_) => EXIT_EDIT_MISSING,
        EngineError::NoCurrentParcel { .. } => EXIT_NO_PARCEL,
        EngineError::UnknownProject(_) => EXIT_UNKNOWN_PROJECT,
        EngineError::IndexOutOfRange { .. } | EngineError::RowOutOfRange { .. } => EXIT_INDEX,
        EngineError::Store(e) => store_exit_code(e),
    }
}
