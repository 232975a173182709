//! Addressing of form fields by path.
//!
//! Scalar fields use their name (`stand_age`), row fields use
//! `<table>.<row>.<column>` (`species.0.percentage`), and free-form fields
//! use `extra.<name>`.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::model::{
    CadastralRow, InfrastructureKind, InterventionRow, ParcelForm, SpeciesRow, MAX_INFRASTRUCTURE,
};
use crate::validation::{FieldRule, NumericConstraint};

/// The row-based tables of the parcel form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Species,
    Interventions,
    Cadastral,
    Infrastructure,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Species => "species",
            Table::Interventions => "interventions",
            Table::Cadastral => "cadastral",
            Table::Infrastructure => "infrastructure",
        }
    }

    /// Row limit, if the table has one.
    pub fn max_rows(&self) -> Option<usize> {
        match self {
            Table::Infrastructure => Some(MAX_INFRASTRUCTURE),
            _ => None,
        }
    }

    pub fn len(&self, form: &ParcelForm) -> usize {
        match self {
            Table::Species => form.species.len(),
            Table::Interventions => form.interventions.len(),
            Table::Cadastral => form.cadastral.len(),
            Table::Infrastructure => form.infrastructure.len(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "species" => Ok(Table::Species),
            "interventions" | "intervention" => Ok(Table::Interventions),
            "cadastral" => Ok(Table::Cadastral),
            "infrastructure" => Ok(Table::Infrastructure),
            _ => Err(EngineError::UnknownField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeciesColumn {
    Species,
    Percentage,
    Diameter,
    Height,
    Volume,
    VolumePerHectare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterventionColumn {
    Kind,
    Area,
    Year,
    Age,
    StandingVolume,
    YieldVolume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CadastralColumn {
    Municipality,
    Sheet,
    Lot,
    Area,
}

impl SpeciesColumn {
    const NAMES: [(&'static str, SpeciesColumn); 6] = [
        ("species", SpeciesColumn::Species),
        ("percentage", SpeciesColumn::Percentage),
        ("diameter", SpeciesColumn::Diameter),
        ("height", SpeciesColumn::Height),
        ("volume", SpeciesColumn::Volume),
        ("volume_per_hectare", SpeciesColumn::VolumePerHectare),
    ];
}

impl InterventionColumn {
    const NAMES: [(&'static str, InterventionColumn); 6] = [
        ("kind", InterventionColumn::Kind),
        ("area", InterventionColumn::Area),
        ("year", InterventionColumn::Year),
        ("age", InterventionColumn::Age),
        ("standing_volume", InterventionColumn::StandingVolume),
        ("yield_volume", InterventionColumn::YieldVolume),
    ];
}

impl CadastralColumn {
    const NAMES: [(&'static str, CadastralColumn); 4] = [
        ("municipality", CadastralColumn::Municipality),
        ("sheet", CadastralColumn::Sheet),
        ("lot", CadastralColumn::Lot),
        ("area", CadastralColumn::Area),
    ];
}

fn column_name<C: PartialEq + Copy>(names: &[(&'static str, C)], col: C) -> &'static str {
    names
        .iter()
        .find(|(_, c)| *c == col)
        .map(|(n, _)| *n)
        .unwrap_or("?")
}

fn column_by_name<C: Copy>(names: &[(&'static str, C)], name: &str) -> Option<C> {
    names.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
}

/// A single addressable form value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldId {
    MainUnit,
    SubUnit,
    CompositeKey,
    Locality,
    SubUnitArea,
    ParcelArea,
    SurveyYear,
    StandAge,
    TreesPerHectare,
    InterventionIntensity,
    LastIntervention,
    LastInterventionYear,
    TotalVolume,
    Imd,
    Imh,
    Imv,
    Species(usize, SpeciesColumn),
    Intervention(usize, InterventionColumn),
    Cadastral(usize, CadastralColumn),
    Extra(String),
}

static SCALARS: [(&str, FieldId); 16] = [
    ("main_unit", FieldId::MainUnit),
    ("sub_unit", FieldId::SubUnit),
    ("composite_key", FieldId::CompositeKey),
    ("locality", FieldId::Locality),
    ("sub_unit_area", FieldId::SubUnitArea),
    ("parcel_area", FieldId::ParcelArea),
    ("survey_year", FieldId::SurveyYear),
    ("stand_age", FieldId::StandAge),
    ("trees_per_hectare", FieldId::TreesPerHectare),
    ("intervention_intensity", FieldId::InterventionIntensity),
    ("last_intervention", FieldId::LastIntervention),
    ("last_intervention_year", FieldId::LastInterventionYear),
    ("total_volume", FieldId::TotalVolume),
    ("imd", FieldId::Imd),
    ("imh", FieldId::Imh),
    ("imv", FieldId::Imv),
];

impl FieldId {
    /// Parse a field path such as `stand_age` or `species.1.height`.
    pub fn parse(path: &str) -> Result<FieldId, EngineError> {
        let path = path.trim();
        let unknown = || EngineError::UnknownField(path.to_string());

        if let Some(name) = path.strip_prefix("extra.") {
            if name.is_empty() {
                return Err(unknown());
            }
            return Ok(FieldId::Extra(name.to_string()));
        }

        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            [name] => SCALARS
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| f.clone())
                .ok_or_else(unknown),
            [table, row, column] => {
                let row: usize = row.parse().map_err(|_| unknown())?;
                let field = match table.parse::<Table>().map_err(|_| unknown())? {
                    Table::Species => column_by_name(&SpeciesColumn::NAMES, column)
                        .map(|c| FieldId::Species(row, c)),
                    Table::Interventions => column_by_name(&InterventionColumn::NAMES, column)
                        .map(|c| FieldId::Intervention(row, c)),
                    Table::Cadastral => column_by_name(&CadastralColumn::NAMES, column)
                        .map(|c| FieldId::Cadastral(row, c)),
                    Table::Infrastructure => None,
                };
                field.ok_or_else(unknown)
            }
            _ => Err(unknown()),
        }
    }

    /// Every scalar field, in form order.
    pub fn scalars() -> impl Iterator<Item = FieldId> {
        SCALARS.iter().map(|(_, f)| f.clone())
    }

    /// Fields the engine computes. These are never edited directly.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            FieldId::CompositeKey
                | FieldId::ParcelArea
                | FieldId::TotalVolume
                | FieldId::Imd
                | FieldId::Imh
                | FieldId::Imv
                | FieldId::Species(_, SpeciesColumn::Volume)
                | FieldId::Species(_, SpeciesColumn::VolumePerHectare)
                | FieldId::Intervention(_, InterventionColumn::Age)
                | FieldId::Intervention(_, InterventionColumn::StandingVolume)
                | FieldId::Intervention(_, InterventionColumn::YieldVolume)
        )
    }

    /// Area-like fields: 4-decimal normalized on blur.
    pub fn is_area(&self) -> bool {
        matches!(
            self,
            FieldId::SubUnitArea
                | FieldId::Intervention(_, InterventionColumn::Area)
                | FieldId::Cadastral(_, CadastralColumn::Area)
        )
    }

    /// Input constraint carried by the form for this field, if any.
    pub fn rule(&self) -> Option<FieldRule> {
        match self {
            FieldId::Species(_, SpeciesColumn::Percentage) => {
                Some(FieldRule::whole_number(NumericConstraint::between(0.0, 99.0)))
            }
            FieldId::Species(_, SpeciesColumn::Diameter | SpeciesColumn::Height) => {
                Some(FieldRule::whole_number(NumericConstraint::between(0.0, 999.0)))
            }
            FieldId::Intervention(_, InterventionColumn::Year) => {
                Some(FieldRule::whole_number(NumericConstraint::between(1900.0, 2050.0)))
            }
            _ => None,
        }
    }

    /// Table this field lives in, for row fields.
    pub fn table(&self) -> Option<(Table, usize)> {
        match self {
            FieldId::Species(row, _) => Some((Table::Species, *row)),
            FieldId::Intervention(row, _) => Some((Table::Interventions, *row)),
            FieldId::Cadastral(row, _) => Some((Table::Cadastral, *row)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Species(row, col) => {
                write!(f, "species.{row}.{}", column_name(&SpeciesColumn::NAMES, *col))
            }
            FieldId::Intervention(row, col) => write!(
                f,
                "interventions.{row}.{}",
                column_name(&InterventionColumn::NAMES, *col)
            ),
            FieldId::Cadastral(row, col) => {
                write!(f, "cadastral.{row}.{}", column_name(&CadastralColumn::NAMES, *col))
            }
            FieldId::Extra(name) => write!(f, "extra.{name}"),
            scalar => {
                let name = SCALARS
                    .iter()
                    .find(|(_, s)| s == scalar)
                    .map(|(n, _)| *n)
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}

impl FromStr for FieldId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::parse(s)
    }
}

fn row_error(table: Table, index: usize, len: usize) -> EngineError {
    EngineError::RowOutOfRange { table: table.to_string(), index, len }
}

impl ParcelForm {
    /// Read a field. Missing `extra` entries read as empty.
    pub fn get(&self, field: &FieldId) -> Result<&str, EngineError> {
        let value = match field {
            FieldId::MainUnit => &self.main_unit,
            FieldId::SubUnit => &self.sub_unit,
            FieldId::CompositeKey => &self.composite_key,
            FieldId::Locality => &self.locality,
            FieldId::SubUnitArea => &self.sub_unit_area,
            FieldId::ParcelArea => &self.parcel_area,
            FieldId::SurveyYear => &self.survey_year,
            FieldId::StandAge => &self.stand_age,
            FieldId::TreesPerHectare => &self.trees_per_hectare,
            FieldId::InterventionIntensity => &self.intervention_intensity,
            FieldId::LastIntervention => &self.last_intervention,
            FieldId::LastInterventionYear => &self.last_intervention_year,
            FieldId::TotalVolume => &self.total_volume,
            FieldId::Imd => &self.imd,
            FieldId::Imh => &self.imh,
            FieldId::Imv => &self.imv,
            FieldId::Species(i, col) => {
                let row = self
                    .species
                    .get(*i)
                    .ok_or_else(|| row_error(Table::Species, *i, self.species.len()))?;
                match col {
                    SpeciesColumn::Species => &row.species,
                    SpeciesColumn::Percentage => &row.percentage,
                    SpeciesColumn::Diameter => &row.diameter,
                    SpeciesColumn::Height => &row.height,
                    SpeciesColumn::Volume => &row.volume,
                    SpeciesColumn::VolumePerHectare => &row.volume_per_hectare,
                }
            }
            FieldId::Intervention(i, col) => {
                let row = self.interventions.get(*i).ok_or_else(|| {
                    row_error(Table::Interventions, *i, self.interventions.len())
                })?;
                match col {
                    InterventionColumn::Kind => &row.kind,
                    InterventionColumn::Area => &row.area,
                    InterventionColumn::Year => &row.year,
                    InterventionColumn::Age => &row.age,
                    InterventionColumn::StandingVolume => &row.standing_volume,
                    InterventionColumn::YieldVolume => &row.yield_volume,
                }
            }
            FieldId::Cadastral(i, col) => {
                let row = self
                    .cadastral
                    .get(*i)
                    .ok_or_else(|| row_error(Table::Cadastral, *i, self.cadastral.len()))?;
                match col {
                    CadastralColumn::Municipality => &row.municipality,
                    CadastralColumn::Sheet => &row.sheet,
                    CadastralColumn::Lot => &row.lot,
                    CadastralColumn::Area => &row.area,
                }
            }
            FieldId::Extra(name) => return Ok(self.extra.get(name).map(|s| s.as_str()).unwrap_or("")),
        };
        Ok(value.as_str())
    }

    /// Mutable slot for a field. `extra` entries are created on demand.
    pub fn slot_mut(&mut self, field: &FieldId) -> Result<&mut String, EngineError> {
        let slot = match field {
            FieldId::MainUnit => &mut self.main_unit,
            FieldId::SubUnit => &mut self.sub_unit,
            FieldId::CompositeKey => &mut self.composite_key,
            FieldId::Locality => &mut self.locality,
            FieldId::SubUnitArea => &mut self.sub_unit_area,
            FieldId::ParcelArea => &mut self.parcel_area,
            FieldId::SurveyYear => &mut self.survey_year,
            FieldId::StandAge => &mut self.stand_age,
            FieldId::TreesPerHectare => &mut self.trees_per_hectare,
            FieldId::InterventionIntensity => &mut self.intervention_intensity,
            FieldId::LastIntervention => &mut self.last_intervention,
            FieldId::LastInterventionYear => &mut self.last_intervention_year,
            FieldId::TotalVolume => &mut self.total_volume,
            FieldId::Imd => &mut self.imd,
            FieldId::Imh => &mut self.imh,
            FieldId::Imv => &mut self.imv,
            FieldId::Species(i, col) => {
                let len = self.species.len();
                let row = self
                    .species
                    .get_mut(*i)
                    .ok_or_else(|| row_error(Table::Species, *i, len))?;
                match col {
                    SpeciesColumn::Species => &mut row.species,
                    SpeciesColumn::Percentage => &mut row.percentage,
                    SpeciesColumn::Diameter => &mut row.diameter,
                    SpeciesColumn::Height => &mut row.height,
                    SpeciesColumn::Volume => &mut row.volume,
                    SpeciesColumn::VolumePerHectare => &mut row.volume_per_hectare,
                }
            }
            FieldId::Intervention(i, col) => {
                let len = self.interventions.len();
                let row = self
                    .interventions
                    .get_mut(*i)
                    .ok_or_else(|| row_error(Table::Interventions, *i, len))?;
                match col {
                    InterventionColumn::Kind => &mut row.kind,
                    InterventionColumn::Area => &mut row.area,
                    InterventionColumn::Year => &mut row.year,
                    InterventionColumn::Age => &mut row.age,
                    InterventionColumn::StandingVolume => &mut row.standing_volume,
                    InterventionColumn::YieldVolume => &mut row.yield_volume,
                }
            }
            FieldId::Cadastral(i, col) => {
                let len = self.cadastral.len();
                let row = self
                    .cadastral
                    .get_mut(*i)
                    .ok_or_else(|| row_error(Table::Cadastral, *i, len))?;
                match col {
                    CadastralColumn::Municipality => &mut row.municipality,
                    CadastralColumn::Sheet => &mut row.sheet,
                    CadastralColumn::Lot => &mut row.lot,
                    CadastralColumn::Area => &mut row.area,
                }
            }
            FieldId::Extra(name) => self.extra.entry(name.clone()).or_default(),
        };
        Ok(slot)
    }

    /// Overwrite a field, returning whether its value changed.
    pub fn set(&mut self, field: &FieldId, value: impl Into<String>) -> Result<bool, EngineError> {
        let value = value.into();
        let slot = self.slot_mut(field)?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        Ok(true)
    }

    /// Append an empty row. Infrastructure rows need a kind; use
    /// [`ParcelForm::add_infrastructure`] for those.
    pub fn add_row(&mut self, table: Table) -> Result<usize, EngineError> {
        match table {
            Table::Species => self.species.push(SpeciesRow::default()),
            Table::Interventions => self.interventions.push(InterventionRow::default()),
            Table::Cadastral => self.cadastral.push(CadastralRow::default()),
            Table::Infrastructure => {
                return Err(EngineError::MissingValue("infrastructure kind"));
            }
        }
        Ok(table.len(self) - 1)
    }

    /// Add an infrastructure entry, refusing past the limit.
    pub fn add_infrastructure(&mut self, kind: InfrastructureKind) -> Result<usize, EngineError> {
        if self.infrastructure.len() >= MAX_INFRASTRUCTURE {
            return Err(EngineError::RowLimit {
                table: Table::Infrastructure.to_string(),
                max: MAX_INFRASTRUCTURE,
            });
        }
        self.infrastructure.push(kind);
        Ok(self.infrastructure.len() - 1)
    }

    pub fn remove_row(&mut self, table: Table, index: usize) -> Result<(), EngineError> {
        let len = table.len(self);
        if index >= len {
            return Err(row_error(table, index, len));
        }
        match table {
            Table::Species => {
                self.species.remove(index);
            }
            Table::Interventions => {
                self.interventions.remove(index);
            }
            Table::Cadastral => {
                self.cadastral.remove(index);
            }
            Table::Infrastructure => {
                self.infrastructure.remove(index);
            }
        }
        Ok(())
    }
}
