//! Derivation formulas.
//!
//! Each function here computes one derived value from already-parsed inputs
//! and returns it formatted for the form. An empty string means "absent":
//! the gating conditions were not met.

use std::f64::consts::PI;

use crate::model::SpeciesRow;
use crate::numeric::{
    format_fixed, format_plain, format_positive, parse_number, value_or_zero, AREA_DECIMALS,
    VOLUME_DECIMALS,
};

/// Form factor applied to the cylinder volume of a mean tree.
pub const FORM_FACTOR: f64 = 0.5;

/// `trim(main) + trim(sub)`.
pub fn composite_key(main_unit: &str, sub_unit: &str) -> String {
    format!("{}{}", main_unit.trim(), sub_unit.trim())
}

/// Volume in m³ of a mean tree with diameter `d` (cm) and height `h` (m).
pub fn tree_volume(diameter_cm: f64, height_m: f64) -> f64 {
    let d = diameter_cm / 100.0;
    (PI / 4.0) * d * d * height_m * FORM_FACTOR
}

/// Derived columns of one species row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesVolumes {
    pub volume_per_hectare: String,
    pub volume: String,
}

/// Per-hectare and total volume for one species.
///
/// Both are empty unless diameter, height, percentage and trees per hectare
/// are all positive. The total is also empty when the area is not positive.
pub fn species_volumes(row: &SpeciesRow, trees_per_hectare: f64, area: f64) -> SpeciesVolumes {
    let d = value_or_zero(&row.diameter);
    let h = value_or_zero(&row.height);
    let p = value_or_zero(&row.percentage);

    if !(d > 0.0 && h > 0.0 && p > 0.0 && trees_per_hectare > 0.0) {
        return SpeciesVolumes::default();
    }

    let per_hectare = tree_volume(d, h) * trees_per_hectare * (p / 100.0);
    let volume = if area > 0.0 {
        format_fixed(per_hectare * area, VOLUME_DECIMALS)
    } else {
        String::new()
    };

    SpeciesVolumes {
        volume_per_hectare: format_fixed(per_hectare, VOLUME_DECIMALS),
        volume,
    }
}

/// Sum of the formatted per-species volumes.
pub fn total_volume(rows: &[SpeciesRow]) -> String {
    let total: f64 = rows.iter().filter_map(|r| parse_number(&r.volume)).sum();
    format_positive(total, VOLUME_DECIMALS)
}

/// Mean annual increments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowthIndices {
    pub imd: String,
    pub imh: String,
    pub imv: String,
}

/// `max(d)/age`, `max(h)/age` and `total_volume/age`, each empty when the
/// stand age or its numerator is not positive.
pub fn growth_indices(rows: &[SpeciesRow], stand_age: f64, total_volume: &str) -> GrowthIndices {
    if stand_age <= 0.0 {
        return GrowthIndices::default();
    }

    let max_diameter = max_value(rows, |r| value_or_zero(&r.diameter));
    let max_height = max_value(rows, |r| value_or_zero(&r.height));
    let volume = value_or_zero(total_volume);

    GrowthIndices {
        imd: format_positive(max_diameter / stand_age, VOLUME_DECIMALS),
        imh: format_positive(max_height / stand_age, VOLUME_DECIMALS),
        imv: format_positive(volume / stand_age, VOLUME_DECIMALS),
    }
}

fn max_value(rows: &[SpeciesRow], pick: impl Fn(&SpeciesRow) -> f64) -> f64 {
    rows.iter().map(pick).fold(0.0_f64, f64::max)
}

/// Stand age at the time of an intervention: `(year - survey_year) + stand_age`.
///
/// Printed as a plain number. Empty when either year is missing or the
/// result is negative.
pub fn intervention_age(year: f64, survey_year: f64, stand_age: f64) -> String {
    if !(year > 0.0 && survey_year > 0.0 && stand_age >= 0.0) {
        return String::new();
    }
    let age = (year - survey_year) + stand_age;
    if age >= 0.0 {
        format_plain(age)
    } else {
        String::new()
    }
}

/// Inputs shared by every intervention row of a parcel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StandFigures {
    /// Sub-unit area (ha).
    pub area: f64,
    pub stand_age: f64,
    pub imv: f64,
    pub total_volume: f64,
    /// Percentage kept after the intervention. Zero means "keep all".
    pub intensity: f64,
}

impl StandFigures {
    /// Fraction of the standing volume kept.
    pub fn keep_factor(&self) -> f64 {
        if self.intensity > 0.0 {
            self.intensity / 100.0
        } else {
            1.0
        }
    }
}

/// Standing volume ("provvigione") at the intervention age.
///
/// `(A * Imv * (age - stand_age) + total_volume) * keep`. Empty when the
/// intervention age is absent or any gate fails.
pub fn standing_volume(age: Option<f64>, stand: &StandFigures) -> String {
    let Some(age) = age else {
        return String::new();
    };
    if !(stand.area > 0.0 && stand.imv > 0.0 && age >= 0.0 && stand.stand_age >= 0.0) {
        return String::new();
    }

    let grown = stand.area * (stand.imv * (age - stand.stand_age));
    let value = (grown + stand.total_volume) * stand.keep_factor();
    if value >= 0.0 {
        format_fixed(value, VOLUME_DECIMALS)
    } else {
        String::new()
    }
}

/// Yield ("ripresa"): `area * Imv`, both positive.
pub fn yield_volume(area: f64, imv: f64) -> String {
    if area > 0.0 && imv > 0.0 {
        format_fixed(area * imv, VOLUME_DECIMALS)
    } else {
        String::new()
    }
}

/// Aggregate parcel area, empty when the sum is not positive.
pub fn parcel_area(total: f64) -> String {
    format_positive(total, AREA_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(p: &str, d: &str, h: &str) -> SpeciesRow {
        SpeciesRow {
            species: "Abete".into(),
            percentage: p.into(),
            diameter: d.into(),
            height: h.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_composite_key_trims() {
        assert_eq!(composite_key(" 12 ", "a "), "12a");
        assert_eq!(composite_key("", ""), "");
    }

    #[test]
    fn test_species_volumes() {
        // base = pi/4 * 0.3^2 * 20 * 0.5 = 0.706858...
        // vph = base * 400 * 0.5 = 141.37
        let v = species_volumes(&row("50", "30", "20"), 400.0, 2.0);
        assert_eq!(v.volume_per_hectare, "141.37");
        assert_eq!(v.volume, "282.74");
    }

    #[test]
    fn test_species_volumes_gating() {
        assert_eq!(species_volumes(&row("", "30", "20"), 400.0, 2.0), SpeciesVolumes::default());
        assert_eq!(species_volumes(&row("50", "30", "20"), 0.0, 2.0), SpeciesVolumes::default());

        let no_area = species_volumes(&row("50", "30", "20"), 400.0, 0.0);
        assert_eq!(no_area.volume_per_hectare, "141.37");
        assert_eq!(no_area.volume, "");
    }

    #[test]
    fn test_total_volume_sums_formatted_values() {
        let rows = vec![
            SpeciesRow { volume: "10.25".into(), ..Default::default() },
            SpeciesRow { volume: "".into(), ..Default::default() },
            SpeciesRow { volume: "2.50".into(), ..Default::default() },
        ];
        assert_eq!(total_volume(&rows), "12.75");
        assert_eq!(total_volume(&[]), "");
    }

    #[test]
    fn test_growth_indices() {
        let rows = vec![row("50", "30", "20"), row("50", "24", "22")];
        let idx = growth_indices(&rows, 40.0, "100.00");
        assert_eq!(idx.imd, "0.75");
        assert_eq!(idx.imh, "0.55");
        assert_eq!(idx.imv, "2.50");

        assert_eq!(growth_indices(&rows, 0.0, "100"), GrowthIndices::default());

        let idx = growth_indices(&[], 40.0, "");
        assert_eq!(idx, GrowthIndices::default());
    }

    #[test]
    fn test_intervention_age() {
        assert_eq!(intervention_age(2030.0, 2020.0, 40.0), "50");
        assert_eq!(intervention_age(2030.5, 2020.0, 40.0), "50.5");
        assert_eq!(intervention_age(2030.0, 0.0, 40.0), "");
        assert_eq!(intervention_age(1950.0, 2020.0, 40.0), "");
        assert_eq!(intervention_age(2030.0, 2020.0, 0.0), "10");
    }

    #[test]
    fn test_standing_volume_chain() {
        let stand = StandFigures {
            area: 2.0,
            stand_age: 40.0,
            imv: 3.2,
            total_volume: 100.0,
            intensity: 50.0,
        };
        assert_eq!(standing_volume(Some(50.0), &stand), "82.00");
        assert_eq!(standing_volume(None, &stand), "");

        let keep_all = StandFigures { intensity: 0.0, ..stand };
        assert_eq!(standing_volume(Some(50.0), &keep_all), "164.00");

        let no_imv = StandFigures { imv: 0.0, ..stand };
        assert_eq!(standing_volume(Some(50.0), &no_imv), "");
    }

    #[test]
    fn test_standing_volume_negative_is_empty() {
        let stand = StandFigures {
            area: 10.0,
            stand_age: 40.0,
            imv: 3.0,
            total_volume: 10.0,
            intensity: 0.0,
        };
        // 10 * 3 * (20 - 40) + 10 = -590
        assert_eq!(standing_volume(Some(20.0), &stand), "");
    }

    #[test]
    fn test_yield_volume() {
        assert_eq!(yield_volume(1.5, 3.2), "4.80");
        assert_eq!(yield_volume(0.0, 3.2), "");
        assert_eq!(yield_volume(1.5, 0.0), "");
    }
}
