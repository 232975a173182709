use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A survey project. Owns one record set of parcels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub location: String,
    pub client: String,
    pub authority: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a project. All descriptive fields are required.
    pub fn new(
        name: &str,
        location: &str,
        client: &str,
        authority: &str,
    ) -> Result<Self, EngineError> {
        let required = [
            ("name", name),
            ("location", location),
            ("client", client),
            ("authority", authority),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::MissingValue(label));
            }
        }

        let created_at = Utc::now();
        Ok(Self {
            id: format!("project-{}", Uuid::new_v4()),
            name: name.trim().to_string(),
            location: location.trim().to_string(),
            client: client.trim().to_string(),
            authority: authority.trim().to_string(),
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Parcel
// ---------------------------------------------------------------------------

/// A stored parcel ("particella"): identity envelope plus its form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub form: ParcelForm,
}

impl Parcel {
    /// A new parcel with an empty form.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            last_modified: None,
            form: ParcelForm::default(),
        }
    }

    /// Deep copy under a new identity. Fields recomputed from scratch are
    /// cleared; the caller runs recomputation afterwards.
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        let mut form = self.form.clone();
        form.composite_key.clear();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_modified: Some(now),
            form,
        }
    }
}

impl Default for Parcel {
    fn default() -> Self {
        Self::new()
    }
}

/// Every value of the parcel form, as text.
///
/// Derived fields (`composite_key`, `parcel_area`, `total_volume`, `imd`,
/// `imh`, `imv` and the derived row columns) are owned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelForm {
    pub main_unit: String,
    pub sub_unit: String,
    /// Never loaded from storage; always recomputed.
    #[serde(skip_deserializing)]
    pub composite_key: String,
    pub locality: String,
    pub sub_unit_area: String,
    pub parcel_area: String,
    pub survey_year: String,
    pub stand_age: String,
    pub trees_per_hectare: String,
    pub intervention_intensity: String,
    pub last_intervention: String,
    pub last_intervention_year: String,
    pub total_volume: String,
    pub imd: String,
    pub imh: String,
    pub imv: String,
    pub species: Vec<SpeciesRow>,
    pub interventions: Vec<InterventionRow>,
    pub cadastral: Vec<CadastralRow>,
    pub infrastructure: Vec<InfrastructureKind>,
    /// Any other form field, stored verbatim.
    pub extra: BTreeMap<String, String>,
}

/// One tree species in the stand composition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesRow {
    pub species: String,
    /// Share of the composition, whole percent.
    pub percentage: String,
    /// Diameter in cm.
    pub diameter: String,
    /// Height in m.
    pub height: String,
    pub volume: String,
    pub volume_per_hectare: String,
}

/// One planned silvicultural intervention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionRow {
    pub kind: String,
    /// Target area in ha.
    pub area: String,
    pub year: String,
    pub age: String,
    /// "Provvigione".
    pub standing_volume: String,
    /// "Ripresa".
    pub yield_volume: String,
}

/// One cadastral sub-unit covered by the parcel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadastralRow {
    pub municipality: String,
    pub sheet: String,
    pub lot: String,
    /// Area in ha.
    pub area: String,
}

/// Maximum number of infrastructure entries per parcel.
pub const MAX_INFRASTRUCTURE: usize = 6;

/// Roads, tracks and landings serving the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfrastructureKind {
    MainTruckRoad,
    SecondaryTruckRoad,
    TractorRoad,
    TruckTrack,
    MainTractorTrack,
    SecondaryTractorTrack,
    SkiddingLines,
    PermanentLanding,
    TemporaryLanding,
}

impl InfrastructureKind {
    pub const ALL: [InfrastructureKind; 9] = [
        Self::MainTruckRoad,
        Self::SecondaryTruckRoad,
        Self::TractorRoad,
        Self::TruckTrack,
        Self::MainTractorTrack,
        Self::SecondaryTractorTrack,
        Self::SkiddingLines,
        Self::PermanentLanding,
        Self::TemporaryLanding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainTruckRoad => "main_truck_road",
            Self::SecondaryTruckRoad => "secondary_truck_road",
            Self::TractorRoad => "tractor_road",
            Self::TruckTrack => "truck_track",
            Self::MainTractorTrack => "main_tractor_track",
            Self::SecondaryTractorTrack => "secondary_tractor_track",
            Self::SkiddingLines => "skidding_lines",
            Self::PermanentLanding => "permanent_landing",
            Self::TemporaryLanding => "temporary_landing",
        }
    }
}

impl fmt::Display for InfrastructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfrastructureKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| EngineError::UnknownField(format!("infrastructure kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Record set
// ---------------------------------------------------------------------------

/// All parcels of one project, in insertion order.
///
/// Order is significant: the sub-unit area lookup takes the first match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    pub parcels: Vec<Parcel>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parcel> {
        self.parcels.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Parcel> {
        self.parcels.get_mut(index)
    }

    /// Append a parcel, returning its index.
    pub fn push(&mut self, parcel: Parcel) -> usize {
        self.parcels.push(parcel);
        self.parcels.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<Parcel, EngineError> {
        if index >= self.parcels.len() {
            return Err(EngineError::IndexOutOfRange { index, len: self.parcels.len() });
        }
        Ok(self.parcels.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.iter()
    }
}

impl From<Vec<Parcel>> for RecordSet {
    fn from(parcels: Vec<Parcel>) -> Self {
        Self { parcels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_requires_fields() {
        assert!(Project::new("Bosco", "Vallombrosa", "Comune", "Regione").is_ok());
        let err = Project::new("Bosco", " ", "Comune", "Regione").unwrap_err();
        assert!(matches!(err, EngineError::MissingValue("location")));
    }

    #[test]
    fn test_duplicate_is_new_identity() {
        let mut original = Parcel::new();
        original.form.main_unit = "12".into();
        original.form.sub_unit = "a".into();
        original.form.composite_key = "12a".into();
        original.form.species.push(SpeciesRow { species: "Faggio".into(), ..Default::default() });

        let copy = original.duplicate();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.form.main_unit, "12");
        assert_eq!(copy.form.species, original.form.species);
        assert!(copy.form.composite_key.is_empty());
    }

    #[test]
    fn test_composite_key_not_loaded() {
        let json = r#"{"main_unit":"12","sub_unit":"a","composite_key":"stale"}"#;
        let form: ParcelForm = serde_json::from_str(json).unwrap();
        assert_eq!(form.main_unit, "12");
        assert!(form.composite_key.is_empty());
    }

    #[test]
    fn test_infrastructure_parse() {
        assert_eq!(
            "tractor-road".parse::<InfrastructureKind>().unwrap(),
            InfrastructureKind::TractorRoad
        );
        assert!("motorway".parse::<InfrastructureKind>().is_err());
    }

    #[test]
    fn test_record_set_remove_out_of_range() {
        let mut set = RecordSet::new();
        set.push(Parcel::new());
        assert!(matches!(
            set.remove(3),
            Err(EngineError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(set.remove(0).is_ok());
        assert!(set.is_empty());
    }

    #[test]
    fn test_record_set_serializes_as_array() {
        let mut set = RecordSet::new();
        set.push(Parcel::new());
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
    }
}
