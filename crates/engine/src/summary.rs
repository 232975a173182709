//! Rows of the project table.

use serde::Serialize;

use crate::model::{Parcel, RecordSet};
use crate::numeric::{format_fixed, parse_number, AREA_DECIMALS};

/// Placeholder for a missing value in the project table.
pub const NOT_SPECIFIED: &str = "not specified";

/// One line of the project table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelSummary {
    pub index: usize,
    pub main_unit: String,
    pub sub_unit: String,
    pub parcel_area: String,
    pub species: String,
    pub last_intervention: String,
    pub last_intervention_year: String,
}

fn or_placeholder(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        value.to_string()
    }
}

impl ParcelSummary {
    pub fn from_parcel(index: usize, parcel: &Parcel) -> Self {
        let form = &parcel.form;

        let parcel_area = match parse_number(&form.parcel_area) {
            Some(n) => format_fixed(n, AREA_DECIMALS),
            None => or_placeholder(&form.parcel_area),
        };
        let species = form
            .species
            .iter()
            .map(|r| r.species.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("");

        Self {
            index,
            main_unit: or_placeholder(&form.main_unit),
            sub_unit: or_placeholder(&form.sub_unit),
            parcel_area,
            species: or_placeholder(species),
            last_intervention: or_placeholder(&form.last_intervention),
            last_intervention_year: or_placeholder(&form.last_intervention_year),
        }
    }

    /// Column headers, in the order of [`ParcelSummary::columns`].
    pub const HEADERS: [&'static str; 6] = [
        "main_unit",
        "sub_unit",
        "parcel_area",
        "species",
        "last_intervention",
        "year",
    ];

    pub fn columns(&self) -> [&str; 6] {
        [
            self.main_unit.as_str(),
            self.sub_unit.as_str(),
            self.parcel_area.as_str(),
            self.species.as_str(),
            self.last_intervention.as_str(),
            self.last_intervention_year.as_str(),
        ]
    }
}

/// The project table, one row per stored parcel.
pub fn project_table(records: &RecordSet) -> Vec<ParcelSummary> {
    records
        .iter()
        .enumerate()
        .map(|(i, p)| ParcelSummary::from_parcel(i, p))
        .collect()
}
