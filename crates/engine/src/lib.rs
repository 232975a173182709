pub mod aggregate;
pub mod autosave;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod field;
pub mod model;
pub mod numeric;
pub mod recalc;
pub mod recompute;
pub mod repository;
pub mod rules;
pub mod summary;
pub mod validation;

#[cfg(test)]
pub mod harness;

pub use context::EditingContext;
pub use engine::{EditOutcome, Engine};
pub use error::EngineError;
pub use field::{FieldId, Table};
pub use model::{Parcel, ParcelForm, Project, RecordSet};
pub use repository::{MemoryStore, ParcelRepository, ProjectRepository, Store, StoreError};
