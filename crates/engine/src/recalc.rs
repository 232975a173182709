//! Recalculation planning and reporting.
//!
//! An edit maps to the rule groups it triggers; the plan is then closed over
//! the downstream chain (volumes feed indices, indices feed interventions)
//! and run in dependency order.

use std::time::Instant;

use crate::aggregate::AggregateScope;
use crate::field::{FieldId, InterventionColumn, SpeciesColumn, Table};
use crate::model::ParcelForm;
use crate::recompute;

/// A group of derivation rules that always run together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleGroup {
    Key,
    Lookup,
    Areas,
    Volumes,
    Indices,
    Interventions,
}

impl RuleGroup {
    /// Every group in dependency order.
    pub const ORDER: [RuleGroup; 6] = [
        RuleGroup::Key,
        RuleGroup::Lookup,
        RuleGroup::Areas,
        RuleGroup::Volumes,
        RuleGroup::Indices,
        RuleGroup::Interventions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleGroup::Key => "key",
            RuleGroup::Lookup => "lookup",
            RuleGroup::Areas => "areas",
            RuleGroup::Volumes => "volumes",
            RuleGroup::Indices => "indices",
            RuleGroup::Interventions => "interventions",
        }
    }

    /// Groups that read this group's outputs.
    fn downstream(&self) -> &'static [RuleGroup] {
        match self {
            // The lookup may fill the sub-unit area
            RuleGroup::Lookup => &[RuleGroup::Areas, RuleGroup::Volumes, RuleGroup::Interventions],
            RuleGroup::Volumes => &[RuleGroup::Indices],
            RuleGroup::Indices => &[RuleGroup::Interventions],
            RuleGroup::Key | RuleGroup::Areas | RuleGroup::Interventions => &[],
        }
    }

    fn run(&self, form: &mut ParcelForm, scope: &AggregateScope<'_>) -> Vec<FieldId> {
        match self {
            RuleGroup::Key => recompute::recompute_key(form),
            RuleGroup::Lookup => recompute::recompute_lookup(form, scope),
            RuleGroup::Areas => recompute::recompute_areas(form, scope),
            RuleGroup::Volumes => recompute::recompute_volumes(form),
            RuleGroup::Indices => recompute::recompute_indices(form),
            RuleGroup::Interventions => recompute::recompute_interventions(form),
        }
    }
}

impl std::fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Groups directly triggered by an edit to `field`.
fn direct_groups(field: &FieldId) -> &'static [RuleGroup] {
    use RuleGroup::*;
    match field {
        FieldId::MainUnit | FieldId::SubUnit => &[Key, Lookup, Areas],
        FieldId::SubUnitArea => &[Areas, Volumes, Interventions],
        FieldId::TreesPerHectare => &[Volumes],
        FieldId::StandAge => &[Indices, Interventions],
        FieldId::SurveyYear | FieldId::InterventionIntensity => &[Interventions],
        FieldId::Species(_, SpeciesColumn::Species) => &[],
        FieldId::Species(_, _) => &[Volumes],
        FieldId::Intervention(_, InterventionColumn::Kind) => &[],
        FieldId::Intervention(_, _) => &[Interventions],
        _ => &[],
    }
}

/// Close a set of groups over the downstream chain, in dependency order.
pub fn close_groups(groups: &[RuleGroup]) -> Vec<RuleGroup> {
    let mut included = [false; 6];
    let mut stack: Vec<RuleGroup> = groups.to_vec();
    while let Some(group) = stack.pop() {
        let slot = &mut included[group as usize];
        if *slot {
            continue;
        }
        *slot = true;
        stack.extend_from_slice(group.downstream());
    }

    RuleGroup::ORDER
        .iter()
        .copied()
        .filter(|g| included[*g as usize])
        .collect()
}

/// Groups to run after `field` was edited.
pub fn groups_for(field: &FieldId) -> Vec<RuleGroup> {
    close_groups(direct_groups(field))
}

/// Groups to run after a row was added to or removed from `table`.
pub fn groups_for_table(table: Table) -> Vec<RuleGroup> {
    match table {
        Table::Species => close_groups(&[RuleGroup::Volumes]),
        Table::Interventions => close_groups(&[RuleGroup::Interventions]),
        Table::Cadastral | Table::Infrastructure => Vec::new(),
    }
}

/// Report from one recalculation pass over a form.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Groups that ran, in order.
    pub groups: Vec<RuleGroup>,
    /// Derived fields whose value changed.
    pub changed: Vec<FieldId>,
    /// Stored parcels whose aggregate area changed (fan-out).
    pub aggregates_updated: usize,
    /// Time taken in microseconds.
    pub duration_us: u64,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as a concise one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} group(s), {} field(s) changed, {} aggregate(s) in {}us",
            self.groups.len(),
            self.changed.len(),
            self.aggregates_updated,
            self.duration_us
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc/edit]   42us  groups=volumes,indices  changed=3  aggregates=0`
    pub fn log_line(&self) -> String {
        let groups: Vec<&str> = self.groups.iter().map(|g| g.as_str()).collect();
        let groups = if groups.is_empty() { "-".to_string() } else { groups.join(",") };
        format!(
            "[recalc/{}] {:>4}us  groups={}  changed={}  aggregates={}",
            if self.groups.len() >= RuleGroup::ORDER.len() - 1 { "full" } else { "edit" },
            self.duration_us,
            groups,
            self.changed.len(),
            self.aggregates_updated
        )
    }
}

/// Report from recomputing every stored parcel of a project.
#[derive(Debug, Clone, Default)]
pub struct ProjectRecalcReport {
    /// Derived fields whose value changed, with the index of their parcel.
    pub changed: Vec<(usize, FieldId)>,
    /// Parcels whose aggregate area changed in the final fan-out.
    pub aggregates_updated: Vec<usize>,
    pub duration_us: u64,
}

impl ProjectRecalcReport {
    /// Changed fields of one parcel.
    pub fn changed_in(&self, index: usize) -> Vec<&FieldId> {
        self.changed
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, field)| field)
            .collect()
    }

    /// Indices of parcels with at least one changed field, ascending.
    pub fn parcels_changed(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.changed.iter().map(|(i, _)| *i).collect();
        indices.dedup();
        indices
    }

    pub fn summary(&self) -> String {
        format!(
            "{} field(s) changed in {} parcel(s), {} aggregate(s) in {}us",
            self.changed.len(),
            self.parcels_changed().len(),
            self.aggregates_updated.len(),
            self.duration_us
        )
    }
}

/// Run `groups` on a form in dependency order.
pub fn run_groups(
    form: &mut ParcelForm,
    scope: &AggregateScope<'_>,
    groups: &[RuleGroup],
) -> RecalcReport {
    let start = Instant::now();
    let ordered = close_groups(groups);

    let mut changed = Vec::new();
    for group in &ordered {
        changed.extend(group.run(form, scope));
    }

    let report = RecalcReport {
        groups: ordered,
        changed,
        aggregates_updated: 0,
        duration_us: start.elapsed().as_micros() as u64,
    };
    log::debug!("{}", report.log_line());
    report
}

/// Every group except the lookup.
pub fn full_plan() -> Vec<RuleGroup> {
    RuleGroup::ORDER
        .iter()
        .copied()
        .filter(|g| *g != RuleGroup::Lookup)
        .collect()
}
