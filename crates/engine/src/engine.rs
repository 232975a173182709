//! The recomputation engine.
//!
//! [`Engine`] owns a [`Store`] and applies edits to an in-memory form (the
//! "live" form an interactive surface holds). Every call takes an
//! [`EditingContext`] naming the project and the stored parcel the form
//! belongs to.
//!
//! An edit runs the rule groups it triggers, validates the form and, unless
//! the species percentages exceed the hard limit, writes the form back into
//! the record set, refreshes the aggregate area of every parcel and persists
//! the set. A context whose index no longer resolves still recomputes, but
//! nothing is written.

use chrono::Utc;

use crate::aggregate::{refresh_parcel_areas, AggregateScope};
use crate::context::EditingContext;
use crate::error::EngineError;
use crate::events::{
    AggregatesUpdatedEvent, DerivedChangedEvent, EventCallback, ParcelEvent, SavedEvent,
    ValidationFlaggedEvent,
};
use crate::field::{FieldId, Table};
use crate::model::{InfrastructureKind, Parcel, ParcelForm, Project, RecordSet};
use crate::recalc::{
    full_plan, groups_for, groups_for_table, run_groups, ProjectRecalcReport, RecalcReport, RuleGroup,
};
use crate::recompute::recompute_all;
use crate::repository::Store;
use crate::summary::{project_table, ParcelSummary};
use crate::validation::{normalize_decimal, validate_form, Severity, ValidationLimits, ValidationReport};

/// Result of an edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub report: RecalcReport,
    pub validation: ValidationReport,
    /// True when the record set was written.
    pub saved: bool,
}

impl EditOutcome {
    pub fn blocks_save(&self) -> bool {
        self.validation.blocks_save()
    }
}

pub struct Engine<S: Store> {
    store: S,
    limits: ValidationLimits,
    callback: Option<EventCallback>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            limits: ValidationLimits::default(),
            callback: None,
        }
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_callback(mut self, callback: EventCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn set_callback(&mut self, callback: Option<EventCallback>) {
        self.callback = callback;
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn emit(&mut self, event: ParcelEvent) {
        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub fn create_project(
        &mut self,
        name: &str,
        location: &str,
        client: &str,
        authority: &str,
    ) -> Result<Project, EngineError> {
        let project = Project::new(name, location, client, authority)?;
        self.store.put_project(&project)?;
        log::info!("created project '{}' ({})", project.name, project.id);
        Ok(project)
    }

    pub fn projects(&self) -> Result<Vec<Project>, EngineError> {
        Ok(self.store.list_projects()?)
    }

    pub fn project(&self, id: &str) -> Result<Project, EngineError> {
        self.store
            .get_project(id)?
            .ok_or_else(|| EngineError::UnknownProject(id.to_string()))
    }

    /// The record set of the context's project.
    pub fn records(&self, ctx: &EditingContext) -> Result<RecordSet, EngineError> {
        self.project(&ctx.record_set_id)?;
        Ok(self.store.get(&ctx.record_set_id)?)
    }

    pub fn project_table(&self, ctx: &EditingContext) -> Result<Vec<ParcelSummary>, EngineError> {
        Ok(project_table(&self.records(ctx)?))
    }

    // ------------------------------------------------------------------
    // Parcels
    // ------------------------------------------------------------------

    /// Append an empty parcel and point the context at it.
    pub fn create_parcel(&mut self, ctx: &mut EditingContext) -> Result<usize, EngineError> {
        let mut records = self.records(ctx)?;
        let index = records.push(Parcel::new());
        self.persist(&ctx.record_set_id, &records, false)?;
        ctx.index = Some(index);
        Ok(index)
    }

    /// Point the context at an existing parcel.
    pub fn select_parcel(&self, ctx: &mut EditingContext, index: usize) -> Result<(), EngineError> {
        let len = self.records(ctx)?.len();
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        ctx.index = Some(index);
        Ok(())
    }

    /// Load the current parcel's form with every derived field recomputed.
    pub fn open_parcel(&self, ctx: &EditingContext) -> Result<ParcelForm, EngineError> {
        let records = self.records(ctx)?;
        let index = self.current(ctx, &records)?;
        let mut form = records.parcels[index].form.clone();
        recompute_all(&mut form, &AggregateScope::new(&records, Some(index)));
        Ok(form)
    }

    /// Copy a parcel under a new identity. Returns the copy's index.
    pub fn duplicate_parcel(&mut self, ctx: &EditingContext, index: usize) -> Result<usize, EngineError> {
        let mut records = self.records(ctx)?;
        let source = records
            .get(index)
            .ok_or(EngineError::IndexOutOfRange { index, len: records.len() })?;

        let mut copy = source.duplicate();
        recompute_all(&mut copy.form, &AggregateScope::stored(&records));
        let new_index = records.push(copy);

        let updated = refresh_parcel_areas(&mut records);
        self.persist(&ctx.record_set_id, &records, false)?;
        self.emit_aggregates(updated);
        log::info!("duplicated parcel {} as {}", index, new_index);
        Ok(new_index)
    }

    /// Delete a parcel, keeping the context pointed at the same record.
    pub fn delete_parcel(&mut self, ctx: &mut EditingContext, index: usize) -> Result<Parcel, EngineError> {
        let mut records = self.records(ctx)?;
        let removed = records.remove(index)?;

        let updated = refresh_parcel_areas(&mut records);
        self.persist(&ctx.record_set_id, &records, false)?;
        self.emit_aggregates(updated);
        ctx.after_removal(index);
        log::info!("deleted parcel {} ({})", index, removed.form.composite_key);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Set a raw field on the live form and run everything it triggers.
    ///
    /// Area fields are normalized first. Text that does not read as a number
    /// in range is refused and the form is left untouched; blank clears.
    pub fn apply_edit(
        &mut self,
        ctx: &EditingContext,
        live: &mut ParcelForm,
        field: &FieldId,
        value: &str,
    ) -> Result<EditOutcome, EngineError> {
        if field.is_derived() {
            return Err(EngineError::DerivedField(field.to_string()));
        }

        let value = if field.is_area() {
            normalize_decimal(&field.to_string(), value)?.unwrap_or_default()
        } else {
            value.to_string()
        };

        let records = self.records(ctx)?;
        live.set(field, value)?;
        self.recalculate(ctx, records, live, &groups_for(field))
    }

    /// Append a row. `value` seeds the row's first column (species name,
    /// intervention kind, municipality) and is required for infrastructure.
    pub fn add_row(
        &mut self,
        ctx: &EditingContext,
        live: &mut ParcelForm,
        table: Table,
        value: Option<&str>,
    ) -> Result<(usize, EditOutcome), EngineError> {
        let records = self.records(ctx)?;

        let row = match table {
            Table::Infrastructure => {
                let kind: InfrastructureKind = value
                    .ok_or(EngineError::MissingValue("infrastructure kind"))?
                    .parse()?;
                live.add_infrastructure(kind)?
            }
            _ => {
                let row = live.add_row(table)?;
                if let Some(value) = value {
                    let first = match table {
                        Table::Species => &mut live.species[row].species,
                        Table::Interventions => &mut live.interventions[row].kind,
                        _ => &mut live.cadastral[row].municipality,
                    };
                    *first = value.to_string();
                }
                row
            }
        };

        let outcome = self.recalculate(ctx, records, live, &groups_for_table(table))?;
        Ok((row, outcome))
    }

    pub fn remove_row(
        &mut self,
        ctx: &EditingContext,
        live: &mut ParcelForm,
        table: Table,
        index: usize,
    ) -> Result<EditOutcome, EngineError> {
        let records = self.records(ctx)?;
        live.remove_row(table, index)?;
        self.recalculate(ctx, records, live, &groups_for_table(table))
    }

    /// Recompute every derived field of the live form and save it.
    pub fn recompute(
        &mut self,
        ctx: &EditingContext,
        live: &mut ParcelForm,
    ) -> Result<EditOutcome, EngineError> {
        let records = self.records(ctx)?;
        self.recalculate(ctx, records, live, &full_plan())
    }

    /// Recompute every stored parcel of the project.
    pub fn recompute_project(&mut self, ctx: &EditingContext) -> Result<ProjectRecalcReport, EngineError> {
        let start = std::time::Instant::now();
        let mut records = self.records(ctx)?;

        let mut changed = Vec::new();
        for index in 0..records.len() {
            let mut form = records.parcels[index].form.clone();
            let fields = recompute_all(&mut form, &AggregateScope::new(&records, Some(index)));
            changed.extend(fields.into_iter().map(|field| (index, field)));
            records.parcels[index].form = form;
        }

        let updated = refresh_parcel_areas(&mut records);
        let report = ProjectRecalcReport {
            changed,
            aggregates_updated: updated.clone(),
            duration_us: start.elapsed().as_micros() as u64,
        };
        log::debug!("[recalc/project] {}", report.summary());

        self.persist(&ctx.record_set_id, &records, false)?;
        self.emit_aggregates(updated);
        Ok(report)
    }

    pub fn validate(&self, live: &ParcelForm) -> ValidationReport {
        validate_form(live, &self.limits)
    }

    /// Explicit save. Refused (not an error) when validation blocks it.
    pub fn save(&mut self, ctx: &EditingContext, live: &mut ParcelForm) -> Result<EditOutcome, EngineError> {
        let records = self.records(ctx)?;
        self.recalculate(ctx, records, live, &[])
    }

    /// Periodic save of the live form, regardless of validation.
    ///
    /// Returns false when the context points at no stored parcel.
    pub fn autosave(&mut self, ctx: &EditingContext, live: &mut ParcelForm) -> Result<bool, EngineError> {
        let mut records = self.records(ctx)?;
        let Some(index) = ctx.resolve(records.len()) else {
            return Ok(false);
        };

        let updated = self.write_back(&mut records, index, live);
        self.persist(&ctx.record_set_id, &records, true)?;
        self.emit_aggregates(updated);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn current(&self, ctx: &EditingContext, records: &RecordSet) -> Result<usize, EngineError> {
        ctx.resolve(records.len()).ok_or_else(|| EngineError::NoCurrentParcel {
            project: ctx.record_set_id.clone(),
        })
    }

    /// Run groups on the live form, validate, and save unless blocked.
    fn recalculate(
        &mut self,
        ctx: &EditingContext,
        mut records: RecordSet,
        live: &mut ParcelForm,
        groups: &[RuleGroup],
    ) -> Result<EditOutcome, EngineError> {
        let current = ctx.resolve(records.len());
        let mut report = run_groups(live, &AggregateScope::new(&records, current), groups);
        if !report.changed.is_empty() {
            self.emit(ParcelEvent::DerivedChanged(DerivedChangedEvent {
                index: current,
                fields: report.changed.clone(),
            }));
        }

        let validation = validate_form(live, &self.limits);
        self.emit_validation(&validation);

        let saved = match current {
            Some(index) if !validation.blocks_save() => {
                let updated = self.write_back(&mut records, index, live);
                report.aggregates_updated = updated.len();
                self.persist(&ctx.record_set_id, &records, false)?;
                self.emit_aggregates(updated);
                true
            }
            Some(_) => {
                log::warn!("save blocked: species percentages add up to {}%", validation.percentages.total);
                false
            }
            None => false,
        };

        Ok(EditOutcome { report, validation, saved })
    }

    /// Store the live form at `index` and refresh every aggregate.
    fn write_back(&mut self, records: &mut RecordSet, index: usize, live: &mut ParcelForm) -> Vec<usize> {
        let updated = match records.get_mut(index) {
            Some(parcel) => {
                parcel.form = live.clone();
                parcel.last_modified = Some(Utc::now());
                refresh_parcel_areas(records)
            }
            None => Vec::new(),
        };
        if let Some(parcel) = records.get(index) {
            live.parcel_area = parcel.form.parcel_area.clone();
        }
        updated
    }

    fn persist(&mut self, project_id: &str, records: &RecordSet, autosave: bool) -> Result<(), EngineError> {
        self.store.put(project_id, records)?;
        log::info!(
            "{} project '{}' ({} parcel(s))",
            if autosave { "autosaved" } else { "saved" },
            project_id,
            records.len()
        );
        self.emit(ParcelEvent::Saved(SavedEvent {
            project_id: project_id.to_string(),
            parcels: records.len(),
            autosave,
        }));
        Ok(())
    }

    fn emit_aggregates(&mut self, indices: Vec<usize>) {
        if !indices.is_empty() {
            self.emit(ParcelEvent::AggregatesUpdated(AggregatesUpdatedEvent { indices }));
        }
    }

    fn emit_validation(&mut self, validation: &ValidationReport) {
        if let (Some(severity), Some(message)) =
            (validation.percentages.severity, validation.percentages.message())
        {
            self.emit(ParcelEvent::ValidationFlagged(ValidationFlaggedEvent {
                check: "percentages",
                severity,
                message,
            }));
        }
        if let Some(message) = validation.cadastral.message() {
            self.emit(ParcelEvent::ValidationFlagged(ValidationFlaggedEvent {
                check: "cadastral",
                severity: Severity::Error,
                message,
            }));
        }
        for warning in &validation.fields {
            self.emit(ParcelEvent::ValidationFlagged(ValidationFlaggedEvent {
                check: "fields",
                severity: Severity::Warning,
                message: format!("{}: {}", warning.field, warning.reason),
            }));
        }
    }
}
