//! Event types for parcel change notifications.
//!
//! The engine emits these through an optional callback so an interactive
//! surface can refresh the affected fields and the project table without
//! re-reading the store. Tests use [`EventCollector`] to check ordering.

use crate::field::FieldId;
use crate::validation::Severity;

/// Events emitted by the engine while handling an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum ParcelEvent {
    /// Derived fields of the edited parcel changed.
    DerivedChanged(DerivedChangedEvent),

    /// Stored parcels had their aggregate area rewritten.
    AggregatesUpdated(AggregatesUpdatedEvent),

    /// The record set was written to the store.
    Saved(SavedEvent),

    /// A validation check flagged the form.
    ValidationFlagged(ValidationFlaggedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedChangedEvent {
    /// Index of the parcel, when it is stored.
    pub index: Option<usize>,
    pub fields: Vec<FieldId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatesUpdatedEvent {
    /// Indices of the stored parcels that changed.
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedEvent {
    pub project_id: String,
    pub parcels: usize,
    /// True when written by the periodic timer.
    pub autosave: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFlaggedEvent {
    /// Which check: `percentages`, `cadastral` or `fields`.
    pub check: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Callback type for receiving parcel events.
pub type EventCallback = Box<dyn FnMut(ParcelEvent) + Send>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<ParcelEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: ParcelEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ParcelEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only Saved events.
    pub fn saved(&self) -> Vec<&SavedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ParcelEvent::Saved(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Filter to only AggregatesUpdated events.
    pub fn aggregates_updated(&self) -> Vec<&AggregatesUpdatedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ParcelEvent::AggregatesUpdated(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Filter to only ValidationFlagged events.
    pub fn flagged(&self) -> Vec<&ValidationFlaggedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ParcelEvent::ValidationFlagged(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}
