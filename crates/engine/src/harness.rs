//! Test harness for forms and engines.
//!
//! `FormBuilder` assembles parcel forms without going through the engine;
//! `engine_with_project` and `collecting_engine` set up an [`Engine`] over a
//! [`MemoryStore`] holding one project.

use std::sync::{Arc, Mutex};

use crate::context::EditingContext;
use crate::engine::Engine;
use crate::events::EventCollector;
use crate::model::{InterventionRow, Parcel, ParcelForm, SpeciesRow};
use crate::repository::MemoryStore;

/// Builder for raw parcel forms. Derived fields are left empty.
#[derive(Debug, Default)]
pub struct FormBuilder {
    form: ParcelForm,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(mut self, main_unit: &str, sub_unit: &str) -> Self {
        self.form.main_unit = main_unit.into();
        self.form.sub_unit = sub_unit.into();
        self
    }

    pub fn area(mut self, area: &str) -> Self {
        self.form.sub_unit_area = area.into();
        self
    }

    pub fn trees_per_hectare(mut self, trees: &str) -> Self {
        self.form.trees_per_hectare = trees.into();
        self
    }

    pub fn stand_age(mut self, age: &str) -> Self {
        self.form.stand_age = age.into();
        self
    }

    pub fn survey_year(mut self, year: &str) -> Self {
        self.form.survey_year = year.into();
        self
    }

    pub fn intensity(mut self, intensity: &str) -> Self {
        self.form.intervention_intensity = intensity.into();
        self
    }

    pub fn species(mut self, row: SpeciesRow) -> Self {
        self.form.species.push(row);
        self
    }

    pub fn intervention(mut self, row: InterventionRow) -> Self {
        self.form.interventions.push(row);
        self
    }

    pub fn build(self) -> ParcelForm {
        self.form
    }
}

pub fn species(name: &str, percentage: &str, diameter: &str, height: &str) -> SpeciesRow {
    SpeciesRow {
        species: name.into(),
        percentage: percentage.into(),
        diameter: diameter.into(),
        height: height.into(),
        ..Default::default()
    }
}

pub fn intervention(kind: &str, area: &str, year: &str) -> InterventionRow {
    InterventionRow {
        kind: kind.into(),
        area: area.into(),
        year: year.into(),
        ..Default::default()
    }
}

pub fn parcel_with_area(main_unit: &str, sub_unit: &str, area: &str) -> Parcel {
    let mut parcel = Parcel::new();
    parcel.form = FormBuilder::new().identity(main_unit, sub_unit).area(area).build();
    parcel
}

/// An engine over a fresh memory store with one project, and a context
/// pointing at that project with no parcel selected.
pub fn engine_with_project() -> (Engine<MemoryStore>, EditingContext) {
    let mut engine = Engine::new(MemoryStore::new());
    let project = engine
        .create_project("Bosco Alto", "Valle Stura", "Comune di Demonte", "Regione Piemonte")
        .expect("create project");
    (engine, EditingContext::project(project.id))
}

/// Like [`engine_with_project`], with every event recorded.
pub fn collecting_engine() -> (Engine<MemoryStore>, EditingContext, Arc<Mutex<EventCollector>>) {
    let (mut engine, ctx) = engine_with_project();
    let events = Arc::new(Mutex::new(EventCollector::new()));
    let sink = Arc::clone(&events);
    engine.set_callback(Some(Box::new(move |event| {
        if let Ok(mut collector) = sink.lock() {
            collector.push(event);
        }
    })));
    (engine, ctx, events)
}
