//! Rule-group entry points.
//!
//! Each function recomputes one group of derived fields on a form in place
//! and returns the fields whose value changed. Groups must run in
//! dependency order (key, lookup, areas, volumes, indices, interventions);
//! [`recompute_all`] does that for every group except the lookup, which only
//! fires on identity edits.

use crate::aggregate::{lookup_sub_unit_area, total_sub_unit_area, AggregateScope};
use crate::field::{FieldId, InterventionColumn, SpeciesColumn};
use crate::model::ParcelForm;
use crate::numeric::{parse_number, value_or_zero};
use crate::rules::{self, StandFigures};

/// Assign a derived value, recording the field when it changes.
fn assign(slot: &mut String, value: String, field: FieldId, changed: &mut Vec<FieldId>) {
    if *slot != value {
        *slot = value;
        changed.push(field);
    }
}

/// Rule 1: composite key.
pub fn recompute_key(form: &mut ParcelForm) -> Vec<FieldId> {
    let mut changed = Vec::new();
    let key = rules::composite_key(&form.main_unit, &form.sub_unit);
    assign(&mut form.composite_key, key, FieldId::CompositeKey, &mut changed);
    changed
}

/// Rule 2: fill an empty sub-unit area from the first stored parcel with the
/// same identity pair. Never overwrites a value.
pub fn recompute_lookup(form: &mut ParcelForm, scope: &AggregateScope<'_>) -> Vec<FieldId> {
    let mut changed = Vec::new();
    if !form.sub_unit_area.trim().is_empty() {
        return changed;
    }
    if let Some(area) = lookup_sub_unit_area(scope.records, &form.main_unit, &form.sub_unit) {
        let area = area.to_string();
        assign(&mut form.sub_unit_area, area, FieldId::SubUnitArea, &mut changed);
    }
    changed
}

/// Rule 3: parcel area of the form's main unit.
pub fn recompute_areas(form: &mut ParcelForm, scope: &AggregateScope<'_>) -> Vec<FieldId> {
    let mut changed = Vec::new();
    let value = if form.main_unit.trim().is_empty() {
        String::new()
    } else {
        rules::parcel_area(total_sub_unit_area(scope, &form.main_unit, Some(&*form)))
    };
    assign(&mut form.parcel_area, value, FieldId::ParcelArea, &mut changed);
    changed
}

/// Rules 4 and 5: per-species volumes and their total.
pub fn recompute_volumes(form: &mut ParcelForm) -> Vec<FieldId> {
    let mut changed = Vec::new();
    let trees = value_or_zero(&form.trees_per_hectare);
    let area = value_or_zero(&form.sub_unit_area);

    for (i, row) in form.species.iter_mut().enumerate() {
        let volumes = rules::species_volumes(row, trees, area);
        assign(
            &mut row.volume_per_hectare,
            volumes.volume_per_hectare,
            FieldId::Species(i, SpeciesColumn::VolumePerHectare),
            &mut changed,
        );
        assign(
            &mut row.volume,
            volumes.volume,
            FieldId::Species(i, SpeciesColumn::Volume),
            &mut changed,
        );
    }

    let total = rules::total_volume(&form.species);
    assign(&mut form.total_volume, total, FieldId::TotalVolume, &mut changed);
    changed
}

/// Rule 6: growth indices.
pub fn recompute_indices(form: &mut ParcelForm) -> Vec<FieldId> {
    let mut changed = Vec::new();
    let stand_age = value_or_zero(&form.stand_age);
    let idx = rules::growth_indices(&form.species, stand_age, &form.total_volume);
    assign(&mut form.imd, idx.imd, FieldId::Imd, &mut changed);
    assign(&mut form.imh, idx.imh, FieldId::Imh, &mut changed);
    assign(&mut form.imv, idx.imv, FieldId::Imv, &mut changed);
    changed
}

/// Rules 7 to 9: intervention age, standing volume and yield per row.
pub fn recompute_interventions(form: &mut ParcelForm) -> Vec<FieldId> {
    let mut changed = Vec::new();
    let survey_year = value_or_zero(&form.survey_year);
    let stand = StandFigures {
        area: value_or_zero(&form.sub_unit_area),
        stand_age: value_or_zero(&form.stand_age),
        imv: value_or_zero(&form.imv),
        total_volume: value_or_zero(&form.total_volume),
        intensity: value_or_zero(&form.intervention_intensity),
    };

    for (i, row) in form.interventions.iter_mut().enumerate() {
        let age = rules::intervention_age(value_or_zero(&row.year), survey_year, stand.stand_age);
        let standing = rules::standing_volume(parse_number(&age), &stand);
        let yielded = rules::yield_volume(value_or_zero(&row.area), stand.imv);

        assign(&mut row.age, age, FieldId::Intervention(i, InterventionColumn::Age), &mut changed);
        assign(
            &mut row.standing_volume,
            standing,
            FieldId::Intervention(i, InterventionColumn::StandingVolume),
            &mut changed,
        );
        assign(
            &mut row.yield_volume,
            yielded,
            FieldId::Intervention(i, InterventionColumn::YieldVolume),
            &mut changed,
        );
    }
    changed
}

/// Every group except the lookup, in dependency order.
pub fn recompute_all(form: &mut ParcelForm, scope: &AggregateScope<'_>) -> Vec<FieldId> {
    let mut changed = recompute_key(form);
    changed.extend(recompute_areas(form, scope));
    changed.extend(recompute_volumes(form));
    changed.extend(recompute_indices(form));
    changed.extend(recompute_interventions(form));
    changed
}
