//! Cross-record aggregation of sub-unit areas.
//!
//! The parcel area of a main unit is the sum of the sub-unit areas of every
//! parcel sharing it. The parcel being edited is special: its stored copy is
//! skipped by index and its in-memory form is counted instead. An index that
//! no longer points into the record set (after a deletion, say) skips
//! nothing.

use rustc_hash::FxHashMap;

use crate::model::{ParcelForm, RecordSet};
use crate::numeric::value_or_zero;
use crate::rules;

/// The stored records an edit is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct AggregateScope<'a> {
    pub records: &'a RecordSet,
    /// Index of the stored copy of the form being edited, if any.
    pub current: Option<usize>,
}

impl<'a> AggregateScope<'a> {
    pub fn new(records: &'a RecordSet, current: Option<usize>) -> Self {
        Self { records, current }
    }

    /// Scope with no edited parcel: every stored record counts.
    pub fn stored(records: &'a RecordSet) -> Self {
        Self { records, current: None }
    }

    /// Index to skip, only when it is in range.
    fn excluded(&self) -> Option<usize> {
        self.current.filter(|i| *i < self.records.len())
    }
}

fn positive_area(form: &ParcelForm) -> Option<f64> {
    Some(value_or_zero(&form.sub_unit_area)).filter(|a| *a > 0.0)
}

/// Total sub-unit area of `main_unit`, counting `live` in place of the
/// stored copy at the scope's current index.
pub fn total_sub_unit_area(
    scope: &AggregateScope<'_>,
    main_unit: &str,
    live: Option<&ParcelForm>,
) -> f64 {
    let target = main_unit.trim();
    let excluded = scope.excluded();

    let stored: f64 = scope
        .records
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != excluded)
        .filter(|(_, p)| p.form.main_unit.trim() == target)
        .filter_map(|(_, p)| positive_area(&p.form))
        .sum();

    let live_area = live
        .filter(|f| f.main_unit.trim() == target)
        .and_then(positive_area)
        .unwrap_or(0.0);

    stored + live_area
}

/// Totals for every main unit in one pass.
pub fn totals_by_main_unit(
    scope: &AggregateScope<'_>,
    live: Option<&ParcelForm>,
) -> FxHashMap<String, f64> {
    let excluded = scope.excluded();
    let mut totals: FxHashMap<String, f64> = FxHashMap::default();

    let stored = scope
        .records
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != excluded)
        .map(|(_, p)| &p.form);

    for form in stored.chain(live) {
        let key = form.main_unit.trim();
        if key.is_empty() {
            continue;
        }
        let entry = totals.entry(key.to_string()).or_insert(0.0);
        if let Some(area) = positive_area(form) {
            *entry += area;
        }
    }

    totals
}

/// Stored sub-unit area of the first parcel with the same identity pair and
/// a non-empty area.
pub fn lookup_sub_unit_area<'a>(
    records: &'a RecordSet,
    main_unit: &str,
    sub_unit: &str,
) -> Option<&'a str> {
    let (main_unit, sub_unit) = (main_unit.trim(), sub_unit.trim());
    if main_unit.is_empty() || sub_unit.is_empty() {
        return None;
    }

    records
        .iter()
        .filter(|p| p.form.main_unit.trim() == main_unit && p.form.sub_unit.trim() == sub_unit)
        .map(|p| p.form.sub_unit_area.as_str())
        .find(|area| !area.trim().is_empty())
}

/// Recompute the stored `parcel_area` of every parcel with a main unit.
///
/// Returns the indices whose value changed. Never touches identity fields or
/// sub-unit areas, so it cannot retrigger the area lookup.
pub fn refresh_parcel_areas(records: &mut RecordSet) -> Vec<usize> {
    let totals = totals_by_main_unit(&AggregateScope::stored(records), None);

    let mut changed = Vec::new();
    for (i, parcel) in records.parcels.iter_mut().enumerate() {
        let key = parcel.form.main_unit.trim();
        if key.is_empty() {
            continue;
        }
        let value = rules::parcel_area(totals.get(key).copied().unwrap_or(0.0));
        if parcel.form.parcel_area != value {
            parcel.form.parcel_area = value;
            changed.push(i);
        }
    }

    if !changed.is_empty() {
        log::debug!("parcel areas refreshed on {} record(s)", changed.len());
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parcel;

    fn parcel(main: &str, sub: &str, area: &str) -> Parcel {
        let mut p = Parcel::new();
        p.form.main_unit = main.into();
        p.form.sub_unit = sub.into();
        p.form.sub_unit_area = area.into();
        p
    }

    fn set(parcels: Vec<Parcel>) -> RecordSet {
        RecordSet::from(parcels)
    }

    #[test]
    fn test_total_for_main_unit() {
        let records = set(vec![parcel("12", "a", "1.5"), parcel("12", "b", "2.25")]);
        let scope = AggregateScope::stored(&records);
        assert_eq!(total_sub_unit_area(&scope, "12", None), 3.75);
        assert_eq!(rules::parcel_area(total_sub_unit_area(&scope, "12", None)), "3.7500");
        assert_eq!(total_sub_unit_area(&scope, "13", None), 0.0);
    }

    #[test]
    fn test_live_form_replaces_stored_copy() {
        let records = set(vec![parcel("12", "a", "1.5"), parcel("12", "b", "2.25")]);
        let live = parcel("12", "b", "4").form;

        let scope = AggregateScope::new(&records, Some(1));
        assert_eq!(total_sub_unit_area(&scope, "12", Some(&live)), 5.5);
    }

    #[test]
    fn test_stale_index_excludes_nothing() {
        let records = set(vec![parcel("12", "a", "1.5"), parcel("12", "b", "2.25")]);
        let live = parcel("12", "c", "1").form;

        let scope = AggregateScope::new(&records, Some(7));
        assert_eq!(total_sub_unit_area(&scope, "12", Some(&live)), 4.75);
    }

    #[test]
    fn test_only_positive_areas_count() {
        let records = set(vec![
            parcel("12", "a", "1.5"),
            parcel("12", "b", "-3"),
            parcel("12", "c", "n/a"),
        ]);
        let scope = AggregateScope::stored(&records);
        assert_eq!(total_sub_unit_area(&scope, "12", None), 1.5);
    }

    #[test]
    fn test_totals_by_main_unit() {
        let records = set(vec![
            parcel("12", "a", "1.5"),
            parcel("13", "a", "1"),
            parcel("12", "b", "2.25"),
            parcel("", "x", "9"),
        ]);
        let totals = totals_by_main_unit(&AggregateScope::stored(&records), None);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["12"], 3.75);
        assert_eq!(totals["13"], 1.0);
    }

    #[test]
    fn test_lookup_first_match_with_area() {
        let records = set(vec![
            parcel("12", "a", ""),
            parcel("12", "a", "1.2500"),
            parcel("12", "a", "9.0000"),
        ]);
        assert_eq!(lookup_sub_unit_area(&records, "12", "a"), Some("1.2500"));
        assert_eq!(lookup_sub_unit_area(&records, "12", "b"), None);
        assert_eq!(lookup_sub_unit_area(&records, "12", ""), None);
    }

    #[test]
    fn test_refresh_parcel_areas_fan_out() {
        let mut records = set(vec![
            parcel("12", "a", "1.5"),
            parcel("12", "b", "2.25"),
            parcel("13", "a", ""),
        ]);
        let changed = refresh_parcel_areas(&mut records);
        assert_eq!(changed, vec![0, 1]);
        assert_eq!(records.parcels[0].form.parcel_area, "3.7500");
        assert_eq!(records.parcels[1].form.parcel_area, "3.7500");
        assert_eq!(records.parcels[2].form.parcel_area, "");

        // Second pass is a no-op
        assert!(refresh_parcel_areas(&mut records).is_empty());
    }
}
