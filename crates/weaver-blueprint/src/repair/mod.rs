//! Blueprint healing.
//!
//! Healing rewrites a blueprint into the shape the bulk deployment API
//! accepts. It never fails and never mutates its input; applying it twice
//! gives the same result as applying it once.

mod schedule;
mod versions;

pub use schedule::IntervalMapping;
pub use versions::{
    apply_known_versions, force_revision, has_revision_pins, revision_of, strip_revisions, VersionReport,
};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::flow::{visit_nodes, visit_nodes_mut, visit_routes_mut, Blueprint, FlowNode, Scheduling, DEFAULT_SCENARIO_NAME};
use crate::registry::Registries;

/// Runtime block inserted into scenario metadata when missing
pub fn default_scenario_settings() -> Map<String, Value> {
    let settings = json!({
        "roundtrips": 1,
        "maxErrors": 3,
        "autoCommit": true,
        "autoCommitTriggerLast": true,
        "sequential": false,
        "confidential": false,
        "dataloss": false,
        "dlq": false,
        "freshVariables": false
    });
    match settings {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Scenario metadata used when a blueprint has none
pub fn default_scenario_metadata() -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("version".to_string(), json!(1));
    metadata.insert("scenario".to_string(), Value::Object(default_scenario_settings()));
    metadata.insert("designer".to_string(), json!({ "orphans": [] }));
    metadata
}

/// Summary of what a heal changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealReport {
    /// Scheduler nodes moved into scenario scheduling
    pub schedulers_removed: usize,
    /// Whether scenario metadata was created or completed
    pub metadata_filled: bool,
    /// Nodes given designer placeholders
    pub designer_placeholders: usize,
    /// Route filters removed
    pub filters_stripped: usize,
    /// Revision reconciliation
    pub versions: VersionReport,
    /// Nodes given an ordinal
    pub ordinals_assigned: usize,
}

/// Applies the healing rules with a fixed set of registries
#[derive(Debug, Clone)]
pub struct Healer<'a> {
    registries: &'a Registries,
    intervals: IntervalMapping,
}

impl<'a> Healer<'a> {
    pub fn new(registries: &'a Registries) -> Self {
        Self {
            registries,
            intervals: IntervalMapping::default(),
        }
    }

    /// Replace the interval mapping used for scheduler nodes
    pub fn with_intervals(mut self, intervals: IntervalMapping) -> Self {
        self.intervals = intervals;
        self
    }

    /// Heal a copy of the blueprint
    pub fn heal(&self, blueprint: &Blueprint) -> Blueprint {
        self.heal_with_report(blueprint).0
    }

    /// Heal a copy of the blueprint and report what changed
    pub fn heal_with_report(&self, blueprint: &Blueprint) -> (Blueprint, HealReport) {
        let mut healed = blueprint.clone();
        let mut report = HealReport::default();

        if healed.name.trim().is_empty() {
            healed.name = DEFAULT_SCENARIO_NAME.to_string();
        }

        report.schedulers_removed = self.extract_scheduling(&mut healed);
        report.metadata_filled = fill_scenario_metadata(&mut healed);
        report.designer_placeholders = add_designer_placeholders(&mut healed.flow);
        report.filters_stripped = strip_route_filters(&mut healed.flow);
        report.versions = apply_known_versions(&mut healed.flow, &self.registries.versions);
        report.ordinals_assigned = assign_missing_ordinals(&mut healed.flow);

        info!(
            name = %healed.name,
            schedulers_removed = report.schedulers_removed,
            filters_stripped = report.filters_stripped,
            injected = report.versions.injected.len(),
            stripped = report.versions.stripped.len(),
            ordinals_assigned = report.ordinals_assigned,
            "Healed blueprint"
        );

        (healed, report)
    }

    /// Remove scheduler nodes and turn the first one into scenario scheduling
    fn extract_scheduling(&self, blueprint: &mut Blueprint) -> usize {
        let mut removed = Vec::new();
        remove_nodes(&mut blueprint.flow, &|node: &FlowNode| self.registries.is_scheduler(node.step_id()), &mut removed);

        if let Some(scheduler) = removed.first() {
            let interval = self.intervals.interval_seconds(scheduler.parameter("interval"));
            debug!(step_id = scheduler.step_id(), interval, "Scheduler node becomes scenario scheduling");
            blueprint.scheduling = Scheduling::Indefinitely { interval };
        }
        removed.len()
    }
}

/// Heal a blueprint with the default interval mapping
pub fn heal(blueprint: &Blueprint, registries: &Registries) -> Blueprint {
    Healer::new(registries).heal(blueprint)
}

/// Replace every use of `from` with `to`; returns how many nodes changed
pub fn substitute_step(flow: &mut [FlowNode], from: &str, to: &str) -> usize {
    let mut changed = 0;
    visit_nodes_mut(flow, &mut |node| {
        let header = node.header_mut();
        if header.step_id == from {
            header.step_id = to.to_string();
            header.revision = None;
            changed += 1;
        }
    });
    changed
}

fn remove_nodes(flow: &mut Vec<FlowNode>, predicate: &impl Fn(&FlowNode) -> bool, removed: &mut Vec<FlowNode>) {
    let mut kept = Vec::with_capacity(flow.len());
    for mut node in flow.drain(..) {
        if predicate(&node) {
            removed.push(node);
            continue;
        }
        if let FlowNode::Router(router) = &mut node {
            for route in router.routes.iter_mut() {
                remove_nodes(&mut route.flow, predicate, removed);
            }
        }
        kept.push(node);
    }
    *flow = kept;
}

fn fill_scenario_metadata(blueprint: &mut Blueprint) -> bool {
    if blueprint.metadata.is_none() {
        blueprint.metadata = Some(default_scenario_metadata());
        return true;
    }
    let Some(metadata) = blueprint.metadata.as_mut() else {
        return false;
    };

    match metadata.get_mut("scenario") {
        Some(Value::Object(scenario)) => {
            let mut filled = false;
            for (key, value) in default_scenario_settings() {
                if !scenario.contains_key(&key) {
                    scenario.insert(key, value);
                    filled = true;
                }
            }
            filled
        }
        _ => {
            metadata.insert("scenario".to_string(), Value::Object(default_scenario_settings()));
            true
        }
    }
}

fn add_designer_placeholders(flow: &mut [FlowNode]) -> usize {
    let mut added = 0;
    visit_nodes_mut(flow, &mut |node| {
        let metadata = node.header_mut().metadata.get_or_insert_with(Map::new);
        if !metadata.contains_key("designer") {
            metadata.insert("designer".to_string(), json!({ "x": 0, "y": 0 }));
            added += 1;
        }
    });
    added
}

fn strip_route_filters(flow: &mut [FlowNode]) -> usize {
    let mut stripped = 0;
    visit_routes_mut(flow, &mut |route| {
        if route.filter.take().is_some() {
            stripped += 1;
        }
    });
    stripped
}

fn assign_missing_ordinals(flow: &mut [FlowNode]) -> usize {
    let mut next = 0;
    visit_nodes(flow, &mut |node| {
        if let Some(ordinal) = node.header().ordinal {
            next = next.max(ordinal);
        }
    });

    let mut assigned = 0;
    visit_nodes_mut(flow, &mut |node| {
        let header = node.header_mut();
        if header.ordinal.is_none() {
            next += 1;
            header.ordinal = Some(next);
            assigned += 1;
        }
    });
    assigned
}
