use serde::Serialize;
use tracing::debug;

use crate::flow::{visit_nodes, visit_nodes_mut, FlowNode};
use crate::registry::VersionRegistry;

/// What [`apply_known_versions`] changed, as step ids in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    /// Nodes whose revision was set to the registry revision
    pub injected: Vec<String>,
    /// Nodes of unregistered steps whose revision pin was removed
    pub stripped: Vec<String>,
}

impl VersionReport {
    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.injected.is_empty() && self.stripped.is_empty()
    }
}

/// Reconcile every revision in the flow with the registry.
///
/// Registered steps get the registry revision; every other step loses its pin
/// so the platform picks its current default.
pub fn apply_known_versions(flow: &mut [FlowNode], registry: &VersionRegistry) -> VersionReport {
    let mut report = VersionReport::default();

    visit_nodes_mut(flow, &mut |node| {
        let header = node.header_mut();
        match registry.get(&header.step_id) {
            Some(known) if header.revision != Some(known) => {
                debug!(step_id = %header.step_id, from = ?header.revision, to = known, "Injecting known revision");
                header.revision = Some(known);
                report.injected.push(header.step_id.clone());
            }
            Some(_) => {}
            None => {
                if header.revision.take().is_some() {
                    debug!(step_id = %header.step_id, "Stripping unverified revision pin");
                    report.stripped.push(header.step_id.clone());
                }
            }
        }
    });

    report
}

/// Set the revision of every node using `step_id`; returns how many nodes changed
pub fn force_revision(flow: &mut [FlowNode], step_id: &str, revision: u32) -> usize {
    let mut changed = 0;
    visit_nodes_mut(flow, &mut |node| {
        let header = node.header_mut();
        if header.step_id == step_id && header.revision != Some(revision) {
            header.revision = Some(revision);
            changed += 1;
        }
    });
    changed
}

/// Remove every revision pin; returns how many were removed
pub fn strip_revisions(flow: &mut [FlowNode]) -> usize {
    let mut removed = 0;
    visit_nodes_mut(flow, &mut |node| {
        if node.header_mut().revision.take().is_some() {
            removed += 1;
        }
    });
    removed
}

/// Whether any node pins a revision
pub fn has_revision_pins(flow: &[FlowNode]) -> bool {
    let mut pinned = false;
    visit_nodes(flow, &mut |node| pinned |= node.header().revision.is_some());
    pinned
}

/// Pinned revision of the first node using `step_id`
pub fn revision_of(flow: &[FlowNode], step_id: &str) -> Option<u32> {
    let mut found = None;
    visit_nodes(flow, &mut |node| {
        if found.is_none() && node.step_id() == step_id {
            found = node.header().revision;
        }
    });
    found
}
