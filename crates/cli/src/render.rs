// Human-readable and JSON output for parcels, edits and validation

use serde_json::{json, Value};

use dbforestale_engine::summary::ParcelSummary;
use dbforestale_engine::validation::{Severity, ValidationReport};
use dbforestale_engine::{EditOutcome, FieldId, ParcelForm, Project};

use crate::util::{format_table, pad_right};

const LABEL_WIDTH: usize = 24;

pub(crate) fn project_line(project: &Project, current: bool) -> Vec<String> {
    vec![
        if current { "*".to_string() } else { String::new() },
        project.id.clone(),
        project.name.clone(),
        project.location.clone(),
        project.client.clone(),
        project.authority.clone(),
    ]
}

pub(crate) fn projects_table(projects: &[Project], current: Option<&str>) -> String {
    let rows: Vec<Vec<String>> = projects
        .iter()
        .map(|p| project_line(p, current == Some(p.id.as_str())))
        .collect();
    format_table(&["", "id", "name", "location", "client", "authority"], &rows)
}

pub(crate) fn project_details(project: &Project) -> String {
    let mut out = String::new();
    for (label, value) in [
        ("id", project.id.as_str()),
        ("name", &project.name),
        ("location", &project.location),
        ("client", &project.client),
        ("authority", &project.authority),
    ] {
        out.push_str(&format!("{}{}\n", pad_right(label, LABEL_WIDTH), value));
    }
    out.push_str(&format!(
        "{}{}\n",
        pad_right("created", LABEL_WIDTH),
        project.created_at.format("%Y-%m-%d %H:%M")
    ));
    out
}

pub(crate) fn parcels_table(rows: &[ParcelSummary], current: Option<usize>) -> String {
    let mut headers = vec!["", "#"];
    headers.extend(ParcelSummary::HEADERS);
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut line = vec![
                if current == Some(r.index) { "*".to_string() } else { String::new() },
                r.index.to_string(),
            ];
            line.extend(r.columns().iter().map(|c| c.to_string()));
            line
        })
        .collect();
    format_table(&headers, &rows)
}

/// Every value of a form, derived fields marked with `=`.
pub(crate) fn form_details(form: &ParcelForm) -> String {
    let mut out = String::new();
    for field in FieldId::scalars() {
        let value = form.get(&field).unwrap_or_default();
        let marker = if field.is_derived() { "= " } else { "" };
        out.push_str(&format!(
            "{}{}{}\n",
            pad_right(&field.to_string(), LABEL_WIDTH),
            marker,
            value
        ));
    }

    if !form.species.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = form
            .species
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    i.to_string(),
                    r.species.clone(),
                    r.percentage.clone(),
                    r.diameter.clone(),
                    r.height.clone(),
                    r.volume_per_hectare.clone(),
                    r.volume.clone(),
                ]
            })
            .collect();
        out.push_str(&format_table(
            &["species", "name", "%", "d (cm)", "h (m)", "= m3/ha", "= m3"],
            &rows,
        ));
    }

    if !form.interventions.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = form
            .interventions
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    i.to_string(),
                    r.kind.clone(),
                    r.area.clone(),
                    r.year.clone(),
                    r.age.clone(),
                    r.standing_volume.clone(),
                    r.yield_volume.clone(),
                ]
            })
            .collect();
        out.push_str(&format_table(
            &["interventions", "kind", "ha", "year", "= age", "= standing", "= yield"],
            &rows,
        ));
    }

    if !form.cadastral.is_empty() {
        out.push('\n');
        let rows: Vec<Vec<String>> = form
            .cadastral
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![i.to_string(), r.municipality.clone(), r.sheet.clone(), r.lot.clone(), r.area.clone()]
            })
            .collect();
        out.push_str(&format_table(&["cadastral", "municipality", "sheet", "lot", "ha"], &rows));
    }

    if !form.infrastructure.is_empty() {
        out.push('\n');
        let kinds: Vec<&str> = form.infrastructure.iter().map(|k| k.as_str()).collect();
        out.push_str(&format!("{}{}\n", pad_right("infrastructure", LABEL_WIDTH), kinds.join(", ")));
    }

    for (name, value) in &form.extra {
        out.push_str(&format!("{}{}\n", pad_right(&format!("extra.{name}"), LABEL_WIDTH), value));
    }
    out
}

/// One line per validation finding; empty when the form is clean.
pub(crate) fn validation_lines(report: &ValidationReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let (Some(severity), Some(message)) = (report.percentages.severity, report.percentages.message()) {
        lines.push(format!("{}: {}", severity.as_str(), message));
    }
    if let Some(message) = report.cadastral.message() {
        lines.push(format!("{}: {}", Severity::Error.as_str(), message));
    }
    for warning in &report.fields {
        lines.push(format!("{}: {}: {}", Severity::Warning.as_str(), warning.field, warning.reason));
    }
    lines
}

pub(crate) fn validation_json(report: &ValidationReport) -> Value {
    json!({
        "ok": report.is_clean(),
        "blocks_save": report.blocks_save(),
        "percentages": {
            "total": report.percentages.total,
            "severity": report.percentages.severity.map(|s| s.as_str()),
            "rows": report.percentages.rows,
        },
        "cadastral": {
            "total": report.cadastral.total,
            "limit": report.cadastral.limit,
            "violation": report.cadastral.violation,
        },
        "fields": report.fields.iter().map(|w| json!({
            "field": w.field,
            "reason": w.reason,
        })).collect::<Vec<_>>(),
    })
}

/// Changed derived fields with their new values, then validation findings.
pub(crate) fn outcome_lines(outcome: &EditOutcome, form: &ParcelForm) -> Vec<String> {
    let mut lines: Vec<String> = outcome
        .report
        .changed
        .iter()
        .map(|field| {
            let value = form.get(field).unwrap_or_default();
            let value = if value.is_empty() { "(empty)" } else { value };
            format!("  {} = {}", field, value)
        })
        .collect();
    if outcome.report.aggregates_updated > 0 {
        lines.push(format!(
            "  parcel area updated on {} other parcel(s)",
            outcome.report.aggregates_updated
        ));
    }
    lines.extend(validation_lines(&outcome.validation));
    lines
}

pub(crate) fn outcome_json(outcome: &EditOutcome, form: &ParcelForm) -> Value {
    let changed: serde_json::Map<String, Value> = outcome
        .report
        .changed
        .iter()
        .map(|field| {
            let value = form.get(field).unwrap_or_default();
            (field.to_string(), Value::String(value.to_string()))
        })
        .collect();
    json!({
        "saved": outcome.saved,
        "changed": changed,
        "aggregates_updated": outcome.report.aggregates_updated,
        "validation": validation_json(&outcome.validation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbforestale_engine::model::SpeciesRow;
    use dbforestale_engine::validation::{validate_form, ValidationLimits};

    #[test]
    fn form_details_marks_derived() {
        let form = ParcelForm {
            main_unit: "12".into(),
            composite_key: "12a".into(),
            ..Default::default()
        };
        let text = form_details(&form);
        assert!(text.contains(&format!("{}12\n", pad_right("main_unit", LABEL_WIDTH))));
        assert!(text.contains(&format!("{}= 12a\n", pad_right("composite_key", LABEL_WIDTH))));
    }

    #[test]
    fn validation_lines_for_over_allocation() {
        let form = ParcelForm {
            species: ["60", "45"]
                .iter()
                .map(|p| SpeciesRow { percentage: p.to_string(), ..Default::default() })
                .collect(),
            ..Default::default()
        };
        let report = validate_form(&form, &ValidationLimits::default());
        let lines = validation_lines(&report);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("error: species percentages add up to 105%"));

        let json = validation_json(&report);
        assert_eq!(json["blocks_save"], true);
        assert_eq!(json["percentages"]["rows"], json!([0, 1]));
    }
}
