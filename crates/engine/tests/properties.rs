// Property-based tests for derivation and aggregation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use dbforestale_engine::aggregate::{refresh_parcel_areas, AggregateScope};
use dbforestale_engine::model::{InterventionRow, SpeciesRow};
use dbforestale_engine::numeric::{parse_number, MAX_AREA};
use dbforestale_engine::recompute::recompute_all;
use dbforestale_engine::rules::{intervention_age, species_volumes};
use dbforestale_engine::validation::normalize_decimal;
use dbforestale_engine::{
    EditingContext, Engine, EngineError, FieldId, MemoryStore, Parcel, ParcelForm, RecordSet,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn config_64() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Raw numeric input: mostly numbers, sometimes blank or junk.
fn arb_number() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => r"[0-9]{1,3}(\.[0-9]{1,2})?",
        1 => r"[0-9]{1,2},[0-9]{1,2}",
        1 => Just(String::new()),
        1 => r"[a-z]{1,4}",
    ]
}

fn arb_area() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => r"[0-9]{1,2}\.[0-9]{4}",
        1 => Just(String::new()),
    ]
}

fn arb_main_unit() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("1".to_string()),
        Just("2".to_string()),
        Just(" 2 ".to_string()),
        Just("3".to_string()),
        Just(String::new()),
    ]
}

fn arb_species() -> impl Strategy<Value = SpeciesRow> {
    (arb_number(), arb_number(), arb_number()).prop_map(|(percentage, diameter, height)| {
        SpeciesRow {
            species: "Abete".into(),
            percentage,
            diameter,
            height,
            ..Default::default()
        }
    })
}

fn arb_intervention() -> impl Strategy<Value = InterventionRow> {
    (arb_area(), prop_oneof![Just(String::new()), r"20[0-4][0-9]"]).prop_map(|(area, year)| {
        InterventionRow {
            kind: "taglio".into(),
            area,
            year,
            ..Default::default()
        }
    })
}

fn arb_form() -> impl Strategy<Value = ParcelForm> {
    (
        arb_main_unit(),
        arb_area(),
        arb_number(),
        arb_number(),
        prop_oneof![Just(String::new()), r"20[0-2][0-9]"],
        arb_number(),
        prop::collection::vec(arb_species(), 0..4),
        prop::collection::vec(arb_intervention(), 0..3),
    )
        .prop_map(
            |(main_unit, area, trees, age, survey, intensity, species, interventions)| ParcelForm {
                main_unit,
                sub_unit: "a".into(),
                sub_unit_area: area,
                trees_per_hectare: trees,
                stand_age: age,
                survey_year: survey,
                intervention_intensity: intensity,
                species,
                interventions,
                ..Default::default()
            },
        )
}

fn arb_records() -> impl Strategy<Value = RecordSet> {
    prop::collection::vec((arb_main_unit(), arb_area()), 0..8).prop_map(|rows| {
        let parcels = rows
            .into_iter()
            .map(|(main_unit, area)| {
                let mut p = Parcel::new();
                p.form.main_unit = main_unit;
                p.form.sub_unit_area = area;
                p
            })
            .collect::<Vec<_>>();
        RecordSet::from(parcels)
    })
}

/// Independent sum of positive sub-unit areas for a main unit, in record order.
fn expected_total(records: &RecordSet, main_unit: &str) -> f64 {
    records
        .iter()
        .filter(|p| p.form.main_unit.trim() == main_unit.trim())
        .filter_map(|p| parse_number(&p.form.sub_unit_area))
        .filter(|a| *a > 0.0)
        .sum()
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn prop_recompute_is_idempotent(form in arb_form(), records in arb_records()) {
        let scope = AggregateScope::stored(&records);
        let mut form = form;
        recompute_all(&mut form, &scope);
        let snapshot = form.clone();
        prop_assert!(recompute_all(&mut form, &scope).is_empty());
        prop_assert_eq!(form, snapshot);
    }

    #[test]
    fn prop_species_volumes_gated(row in arb_species(), trees in 0.0..2000.0f64, area in 0.0..50.0f64) {
        let v = species_volumes(&row, trees, area);
        let positive = |s: &str| parse_number(s).map_or(false, |n| n > 0.0);
        let gated = positive(&row.percentage)
            && positive(&row.diameter)
            && positive(&row.height)
            && trees > 0.0;

        if !gated {
            prop_assert_eq!(v.volume_per_hectare.as_str(), "");
            prop_assert_eq!(v.volume.as_str(), "");
        } else {
            prop_assert!(parse_number(&v.volume_per_hectare).is_some());
            prop_assert_eq!(v.volume.is_empty(), area <= 0.0);
        }
        for value in [&v.volume_per_hectare, &v.volume] {
            prop_assert!(!value.starts_with('-'));
        }
    }

    #[test]
    fn prop_intervention_age_never_negative(
        year in 1900.0..2100.0f64,
        survey in 1900.0..2100.0f64,
        stand_age in 0.0..200.0f64,
    ) {
        let age = intervention_age(year, survey, stand_age);
        if let Some(n) = parse_number(&age) {
            prop_assert!(n >= 0.0);
            prop_assert!((n - ((year - survey) + stand_age)).abs() < 1e-9);
        } else {
            prop_assert!(age.is_empty());
            prop_assert!((year - survey) + stand_age < 0.0);
        }
    }

    #[test]
    fn prop_normalize_decimal_range(n in 0.0..1200.0f64) {
        let input = format!("{n}");
        match normalize_decimal("sub_unit_area", &input) {
            Ok(Some(s)) => {
                prop_assert!(n <= MAX_AREA);
                let (_, decimals) = s.split_once('.').unwrap_or(("", ""));
                prop_assert_eq!(decimals.len(), 4);
                prop_assert!((parse_number(&s).unwrap() - n).abs() <= 0.00005 + 1e-9);
            }
            Ok(None) => prop_assert!(false, "non-blank input treated as blank"),
            Err(EngineError::Range { .. }) => prop_assert!(n > MAX_AREA),
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn prop_refresh_matches_independent_sum(records in arb_records()) {
        let mut records = records;
        refresh_parcel_areas(&mut records);
        let snapshot = records.clone();

        for parcel in snapshot.iter() {
            if parcel.form.main_unit.trim().is_empty() {
                continue;
            }
            let total = expected_total(&snapshot, &parcel.form.main_unit);
            let expected = if total > 0.0 { format!("{:.4}", total) } else { String::new() };
            prop_assert_eq!(&parcel.form.parcel_area, &expected);
        }

        // Second pass changes nothing
        prop_assert!(refresh_parcel_areas(&mut records).is_empty());
    }
}

proptest! {
    #![proptest_config(config_64())]

    #[test]
    fn prop_engine_edits_keep_aggregates_consistent(
        edits in prop::collection::vec((0usize..4, arb_main_unit(), arb_area()), 1..12),
    ) {
        let mut engine = Engine::new(MemoryStore::new());
        let project = engine.create_project("P", "L", "C", "A").unwrap();
        let mut ctx = EditingContext::project(project.id);
        for _ in 0..4 {
            engine.create_parcel(&mut ctx).unwrap();
        }

        for (index, main_unit, area) in edits {
            engine.select_parcel(&mut ctx, index).unwrap();
            let mut live = engine.open_parcel(&ctx).unwrap();
            engine.apply_edit(&ctx, &mut live, &FieldId::MainUnit, &main_unit).unwrap();
            engine.apply_edit(&ctx, &mut live, &FieldId::SubUnitArea, &area).unwrap();
        }

        let records = engine.records(&ctx).unwrap();
        for parcel in records.iter() {
            if parcel.form.main_unit.trim().is_empty() {
                continue;
            }
            let total = expected_total(&records, &parcel.form.main_unit);
            let expected = if total > 0.0 { format!("{:.4}", total) } else { String::new() };
            prop_assert_eq!(&parcel.form.parcel_area, &expected);
        }
    }
}

// ---------------------------------------------------------------------------
// Worked examples
// ---------------------------------------------------------------------------

#[test]
fn test_worked_example_full_parcel() {
    let mut engine = Engine::new(MemoryStore::new());
    let project = engine.create_project("Bosco", "Valle", "Comune", "Ente").unwrap();
    let mut ctx = EditingContext::project(project.id);
    engine.create_parcel(&mut ctx).unwrap();
    let mut live = engine.open_parcel(&ctx).unwrap();

    let edits = [
        ("main_unit", "12"),
        ("sub_unit", "a"),
        ("sub_unit_area", "2"),
        ("trees_per_hectare", "400"),
        ("survey_year", "2020"),
        ("stand_age", "40"),
        ("intervention_intensity", "50"),
    ];
    for (path, value) in edits {
        let field = FieldId::parse(path).unwrap();
        engine.apply_edit(&ctx, &mut live, &field, value).unwrap();
    }
    engine
        .add_row(&ctx, &mut live, dbforestale_engine::Table::Species, Some("Abete"))
        .unwrap();
    for (path, value) in [
        ("species.0.percentage", "50"),
        ("species.0.diameter", "30"),
        ("species.0.height", "20"),
    ] {
        engine.apply_edit(&ctx, &mut live, &FieldId::parse(path).unwrap(), value).unwrap();
    }

    assert_eq!(live.composite_key, "12a");
    assert_eq!(live.parcel_area, "2.0000");
    assert_eq!(live.species[0].volume_per_hectare, "141.37");
    assert_eq!(live.species[0].volume, "282.74");
    assert_eq!(live.total_volume, "282.74");
    assert_eq!(live.imd, "0.75");
    assert_eq!(live.imh, "0.50");
    assert_eq!(live.imv, "7.07");

    let stored = engine.records(&ctx).unwrap();
    assert_eq!(stored.parcels[0].form.total_volume, "282.74");
}
