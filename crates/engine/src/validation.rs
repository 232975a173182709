//! Validation of parcel forms.
//!
//! Two kinds of check live here:
//!
//! - **Constraint checks** over a whole form (species percentage sum,
//!   cadastral area bound). These never fail: they return a value with a
//!   severity and the caller decides whether to save.
//! - **Input checks** on a single value (area normalization on blur, per
//!   field bounds). Area normalization rejects with [`EngineError::Range`];
//!   field bounds only produce warnings.
//!
//! ## Percentage thresholds
//!
//! A sum above `hard_limit` (100) blocks the save. A sum above
//! `warning_threshold` (90) and up to the hard limit is a warning. Exactly
//! 90 is fine.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::numeric::{format_fixed, parse_number, value_or_zero, AREA_DECIMALS, MAX_AREA};
use crate::model::ParcelForm;

// ============================================================================
// Core Types
// ============================================================================

/// How serious a constraint violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the save.
    Error,
    /// Marker only.
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Thresholds for the species percentage check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub warning_threshold: f64,
    pub hard_limit: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            warning_threshold: 90.0,
            hard_limit: 100.0,
        }
    }
}

impl ValidationLimits {
    /// Limits with a custom warning threshold. Thresholds at or above the
    /// hard limit disable the warning band.
    pub fn with_warning_threshold(threshold: f64) -> Self {
        Self {
            warning_threshold: threshold,
            ..Self::default()
        }
    }
}

/// Numeric constraint for a single input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraint {
    pub operator: ComparisonOperator,
    /// First value (min for Between).
    pub value1: f64,
    /// Second value (max for Between).
    pub value2: Option<f64>,
}

impl NumericConstraint {
    /// Inclusive range.
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            operator: ComparisonOperator::Between,
            value1: min,
            value2: Some(max),
        }
    }

    pub fn greater_than(value: f64) -> Self {
        Self {
            operator: ComparisonOperator::GreaterThan,
            value1: value,
            value2: None,
        }
    }

    pub fn less_than_or_equal(value: f64) -> Self {
        Self {
            operator: ComparisonOperator::LessThanOrEqual,
            value1: value,
            value2: None,
        }
    }

    pub fn accepts(&self, x: f64) -> bool {
        eval_numeric_constraint(x, self.operator, self.value1, self.value2)
    }
}

/// Comparison operator for numeric constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Between,
    GreaterThan,
    LessThanOrEqual,
}

/// Evaluate a numeric constraint.
///
/// `Between(a, b)` is inclusive on both ends.
pub fn eval_numeric_constraint(
    x: f64,
    operator: ComparisonOperator,
    a: f64,
    b: Option<f64>,
) -> bool {
    match operator {
        ComparisonOperator::Between => {
            let max = b.unwrap_or(a);
            x >= a && x <= max
        }
        ComparisonOperator::GreaterThan => x > a,
        ComparisonOperator::LessThanOrEqual => x <= a,
    }
}

// ============================================================================
// Numeric Input Helpers
// ============================================================================

/// Error when parsing numeric input for validation.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericParseError {
    /// Input is empty (after trimming whitespace).
    Empty,
    /// Input contains invalid characters or format.
    InvalidFormat,
    /// Input has a fractional part but a whole number is required.
    FractionalNotAllowed,
}

impl std::fmt::Display for NumericParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericParseError::Empty => write!(f, "Value is empty"),
            NumericParseError::InvalidFormat => write!(f, "Value is not a valid number"),
            NumericParseError::FractionalNotAllowed => {
                write!(f, "Whole number required (no decimals)")
            }
        }
    }
}

/// Strictly parse user input as a number.
///
/// Unlike [`parse_number`], the whole input must be numeric. A comma is
/// accepted as the decimal separator.
///
/// # Examples
/// ```
/// use dbforestale_engine::validation::parse_numeric_input;
///
/// assert_eq!(parse_numeric_input("3,5", true), Ok(3.5));
/// assert!(parse_numeric_input("3.5", false).is_err());
/// assert!(parse_numeric_input("12 ha", true).is_err());
/// ```
pub fn parse_numeric_input(value: &str, allow_decimal: bool) -> Result<f64, NumericParseError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(NumericParseError::Empty);
    }

    let normalized = trimmed.strip_prefix('+').unwrap_or(trimmed).replace(',', ".");
    if normalized.is_empty() {
        return Err(NumericParseError::InvalidFormat);
    }

    if !allow_decimal && normalized.contains('.') {
        return Err(NumericParseError::FractionalNotAllowed);
    }

    normalized
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or(NumericParseError::InvalidFormat)
}

// ============================================================================
// Field Rules
// ============================================================================

/// Kind of numeric input a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleKind {
    WholeNumber,
    Decimal,
}

/// Input constraint attached to a form field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub kind: RuleKind,
    pub constraint: NumericConstraint,
}

impl FieldRule {
    pub fn whole_number(constraint: NumericConstraint) -> Self {
        Self { kind: RuleKind::WholeNumber, constraint }
    }

    pub fn decimal(constraint: NumericConstraint) -> Self {
        Self { kind: RuleKind::Decimal, constraint }
    }

    /// Check a value. Blank values are always valid.
    pub fn check(&self, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            return ValidationResult::Valid;
        }

        let allow_decimal = self.kind == RuleKind::Decimal;
        match parse_numeric_input(value, allow_decimal) {
            Ok(n) if self.constraint.accepts(n) => ValidationResult::Valid,
            Ok(_) => ValidationResult::Invalid {
                reason: match (self.constraint.operator, self.constraint.value2) {
                    (ComparisonOperator::Between, Some(max)) => {
                        format!("must be between {} and {}", self.constraint.value1, max)
                    }
                    _ => "value out of range".to_string(),
                },
            },
            Err(e) => ValidationResult::Invalid { reason: e.to_string() },
        }
    }
}

/// Result of validating a single input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid,
    Invalid {
        /// Human-readable description of why validation failed.
        reason: String,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }
}

// ============================================================================
// Area Normalization
// ============================================================================

/// Normalize an area-like value on blur.
///
/// Blank input is left alone (`Ok(None)`). A number within `[0, 999.9999]`
/// is reformatted to 4 decimals. Anything else is a range error and the
/// caller must keep the previous value.
pub fn normalize_decimal(field: &str, input: &str) -> Result<Option<String>, EngineError> {
    if input.trim().is_empty() {
        return Ok(None);
    }

    let range = NumericConstraint::between(0.0, MAX_AREA);
    match parse_number(input) {
        Some(n) if range.accepts(n) => Ok(Some(format_fixed(n, AREA_DECIMALS))),
        _ => Err(EngineError::Range {
            field: field.to_string(),
            input: input.to_string(),
            max: MAX_AREA,
        }),
    }
}

// ============================================================================
// Constraint Checks
// ============================================================================

/// Outcome of the species percentage check.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageCheck {
    pub total: f64,
    pub severity: Option<Severity>,
    /// Rows to mark. Every species row when flagged, empty otherwise.
    pub rows: Vec<usize>,
}

impl PercentageCheck {
    pub fn is_ok(&self) -> bool {
        self.severity.is_none()
    }

    pub fn blocks_save(&self) -> bool {
        self.severity == Some(Severity::Error)
    }

    pub fn message(&self) -> Option<String> {
        match self.severity {
            Some(Severity::Error) => Some(format!(
                "species percentages add up to {}%, which exceeds 100%",
                crate::numeric::format_plain(self.total)
            )),
            Some(Severity::Warning) => Some(format!(
                "species percentages add up to {}%, close to 100%",
                crate::numeric::format_plain(self.total)
            )),
            None => None,
        }
    }
}

/// Sum species percentages and classify the total.
pub fn validate_percentages(form: &ParcelForm, limits: &ValidationLimits) -> PercentageCheck {
    let total: f64 = form.species.iter().map(|r| value_or_zero(&r.percentage)).sum();

    let severity = if NumericConstraint::greater_than(limits.hard_limit).accepts(total) {
        Some(Severity::Error)
    } else if NumericConstraint::greater_than(limits.warning_threshold).accepts(total) {
        Some(Severity::Warning)
    } else {
        None
    };

    let rows = match severity {
        Some(_) => (0..form.species.len()).collect(),
        None => Vec::new(),
    };

    PercentageCheck { total, severity, rows }
}

/// Outcome of the cadastral area check.
#[derive(Debug, Clone, PartialEq)]
pub struct CadastralCheck {
    pub total: f64,
    pub limit: f64,
    pub violation: bool,
}

impl CadastralCheck {
    pub fn severity(&self) -> Option<Severity> {
        self.violation.then_some(Severity::Error)
    }

    pub fn message(&self) -> Option<String> {
        self.violation.then(|| {
            format!(
                "sum of cadastral areas ({} ha) exceeds the sub-unit area ({} ha)",
                format_fixed(self.total, AREA_DECIMALS),
                format_fixed(self.limit, AREA_DECIMALS)
            )
        })
    }
}

/// Compare the cadastral area sum against the sub-unit area. Never blocks.
pub fn validate_cadastral(form: &ParcelForm) -> CadastralCheck {
    let limit = value_or_zero(&form.sub_unit_area);
    let total: f64 = form.cadastral.iter().map(|r| value_or_zero(&r.area)).sum();
    let violation = !NumericConstraint::less_than_or_equal(limit).accepts(total);
    CadastralCheck { total, limit, violation }
}

/// A soft warning for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWarning {
    pub field: String,
    pub reason: String,
}

/// Check every row field that carries an input rule.
pub fn validate_field_bounds(form: &ParcelForm) -> Vec<FieldWarning> {
    use crate::field::{FieldId, InterventionColumn, SpeciesColumn};

    let mut fields = Vec::new();
    for i in 0..form.species.len() {
        for col in [SpeciesColumn::Percentage, SpeciesColumn::Diameter, SpeciesColumn::Height] {
            fields.push(FieldId::Species(i, col));
        }
    }
    for i in 0..form.interventions.len() {
        fields.push(FieldId::Intervention(i, InterventionColumn::Year));
    }

    fields
        .into_iter()
        .filter_map(|field| {
            let rule = field.rule()?;
            let value = form.get(&field).ok()?;
            match rule.check(value) {
                ValidationResult::Valid => None,
                ValidationResult::Invalid { reason } => Some(FieldWarning {
                    field: field.to_string(),
                    reason,
                }),
            }
        })
        .collect()
}

/// All form-level checks together.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub percentages: PercentageCheck,
    pub cadastral: CadastralCheck,
    pub fields: Vec<FieldWarning>,
}

impl ValidationReport {
    pub fn blocks_save(&self) -> bool {
        self.percentages.blocks_save()
    }

    pub fn is_clean(&self) -> bool {
        self.percentages.is_ok() && !self.cadastral.violation && self.fields.is_empty()
    }
}

pub fn validate_form(form: &ParcelForm, limits: &ValidationLimits) -> ValidationReport {
    ValidationReport {
        percentages: validate_percentages(form, limits),
        cadastral: validate_cadastral(form),
        fields: validate_field_bounds(form),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CadastralRow, InterventionRow, SpeciesRow};

    fn species(percentages: &[&str]) -> ParcelForm {
        ParcelForm {
            species: percentages
                .iter()
                .map(|p| SpeciesRow { percentage: p.to_string(), ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    fn cadastral(limit: &str, areas: &[&str]) -> ParcelForm {
        ParcelForm {
            sub_unit_area: limit.to_string(),
            cadastral: areas
                .iter()
                .map(|a| CadastralRow { area: a.to_string(), ..Default::default() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_percentages_hard_error_marks_all_rows() {
        let check = validate_percentages(&species(&["60", "45"]), &ValidationLimits::default());
        assert_eq!(check.total, 105.0);
        assert_eq!(check.severity, Some(Severity::Error));
        assert_eq!(check.rows, vec![0, 1]);
        assert!(check.blocks_save());
        assert!(check.message().unwrap().contains("105%"));
    }

    #[test]
    fn test_percentages_warning_band() {
        let check = validate_percentages(&species(&["60", "35"]), &ValidationLimits::default());
        assert_eq!(check.severity, Some(Severity::Warning));
        assert!(!check.blocks_save());

        let check = validate_percentages(&species(&["60", "30"]), &ValidationLimits::default());
        assert!(check.is_ok());
        assert!(check.rows.is_empty());

        let check = validate_percentages(&species(&["60", "40"]), &ValidationLimits::default());
        assert_eq!(check.severity, Some(Severity::Warning));
    }

    #[test]
    fn test_percentages_custom_threshold() {
        let limits = ValidationLimits::with_warning_threshold(80.0);
        let check = validate_percentages(&species(&["85"]), &limits);
        assert_eq!(check.severity, Some(Severity::Warning));
    }

    #[test]
    fn test_cadastral_bound() {
        let check = validate_cadastral(&cadastral("2.0000", &["1.5", "1.0"]));
        assert!(check.violation);
        assert_eq!(
            check.message().unwrap(),
            "sum of cadastral areas (2.5000 ha) exceeds the sub-unit area (2.0000 ha)"
        );

        let check = validate_cadastral(&cadastral("2.0000", &["1.9"]));
        assert!(!check.violation);
        assert!(check.message().is_none());

        let check = validate_cadastral(&cadastral("2.0000", &["2"]));
        assert!(!check.violation);
    }

    #[test]
    fn test_cadastral_without_sub_unit_area() {
        assert!(validate_cadastral(&cadastral("", &["0.5"])).violation);
        assert!(!validate_cadastral(&cadastral("", &[])).violation);
    }

    #[test]
    fn test_normalize_decimal() {
        assert_eq!(normalize_decimal("a", "12,5").unwrap(), Some("12.5000".into()));
        assert_eq!(normalize_decimal("a", "0").unwrap(), Some("0.0000".into()));
        assert_eq!(normalize_decimal("a", "999.9999").unwrap(), Some("999.9999".into()));
        assert_eq!(normalize_decimal("a", "  ").unwrap(), None);

        let err = normalize_decimal("sub_unit_area", "1000").unwrap_err();
        assert!(matches!(err, EngineError::Range { ref field, .. } if field == "sub_unit_area"));
        assert!(normalize_decimal("a", "-1").is_err());
        assert!(normalize_decimal("a", "abc").is_err());
    }

    #[test]
    fn test_field_bounds_warnings() {
        let form = ParcelForm {
            species: vec![SpeciesRow {
                percentage: "120".into(),
                diameter: "30".into(),
                height: "12.5".into(),
                ..Default::default()
            }],
            interventions: vec![InterventionRow { year: "1850".into(), ..Default::default() }],
            ..Default::default()
        };
        let warnings = validate_field_bounds(&form);
        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["species.0.percentage", "species.0.height", "interventions.0.year"]
        );
    }

    #[test]
    fn test_field_rule_blank_is_valid() {
        let rule = FieldRule::whole_number(NumericConstraint::between(0.0, 99.0));
        assert!(rule.check("").is_valid());
        assert!(rule.check("50").is_valid());
        assert!(rule.check("100").is_invalid());
        assert!(rule.check("5.5").is_invalid());
    }

    #[test]
    fn test_report_blocks_only_on_percentage_error() {
        let mut form = species(&["60", "45"]);
        form.sub_unit_area = "1".into();
        form.cadastral.push(CadastralRow { area: "3".into(), ..Default::default() });
        let report = validate_form(&form, &ValidationLimits::default());
        assert!(report.blocks_save());
        assert!(!report.is_clean());

        let form = cadastral("1", &["3"]);
        let report = validate_form(&form, &ValidationLimits::default());
        assert!(!report.blocks_save());
    }

    // ========================================================================
    // Numeric Validation Tests
    // ========================================================================

    #[test]
    fn test_parse_numeric_input_basic() {
        assert_eq!(parse_numeric_input("5", true).unwrap(), 5.0);
        assert_eq!(parse_numeric_input("  5  ", true).unwrap(), 5.0);
        assert_eq!(parse_numeric_input("+5", true).unwrap(), 5.0);
        assert_eq!(parse_numeric_input("-5", true).unwrap(), -5.0);
        assert_eq!(parse_numeric_input("2,25", true).unwrap(), 2.25);

        assert!(parse_numeric_input("", true).is_err());
        assert!(parse_numeric_input("abc", true).is_err());
        assert!(parse_numeric_input("+", true).is_err());
    }

    #[test]
    fn test_parse_numeric_input_whole_number_strictness() {
        assert_eq!(parse_numeric_input("3", false).unwrap(), 3.0);
        assert_eq!(
            parse_numeric_input("3.0", false),
            Err(NumericParseError::FractionalNotAllowed)
        );
        assert_eq!(
            parse_numeric_input("3,5", false),
            Err(NumericParseError::FractionalNotAllowed)
        );
    }

    #[test]
    fn test_eval_numeric_constraint_between_inclusive() {
        assert!(eval_numeric_constraint(1.0, ComparisonOperator::Between, 1.0, Some(100.0)));
        assert!(eval_numeric_constraint(100.0, ComparisonOperator::Between, 1.0, Some(100.0)));
        assert!(!eval_numeric_constraint(0.0, ComparisonOperator::Between, 1.0, Some(100.0)));
        assert!(!eval_numeric_constraint(101.0, ComparisonOperator::Between, 1.0, Some(100.0)));
    }

    #[test]
    fn test_eval_numeric_constraint_less_than_or_equal() {
        assert!(eval_numeric_constraint(0.5, ComparisonOperator::LessThanOrEqual, 1.0, None));
        assert!(eval_numeric_constraint(1.0, ComparisonOperator::LessThanOrEqual, 1.0, None)); // boundary
        assert!(!eval_numeric_constraint(1.1, ComparisonOperator::LessThanOrEqual, 1.0, None));
    }
}
