//! Step-id compatibility resolution.
//!
//! Given a step id and a set of known-good ids (the live catalog or the static
//! catalog), decide whether the id is available and, when it is not, propose
//! the closest substitute. Matching runs in stages and stops at the first
//! success: exact, normalized, then token overlap within the same namespace.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_catalog::split_step_id;

use crate::utils::ident::{normalize_step_id, tokenize_identifier};

/// Default minimum token overlap for a fuzzy suggestion
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// How a resolution was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum MatchStage {
    /// Verbatim member of the known-good set
    Exact,
    /// Unique candidate equal after normalization
    Normalized,
    /// Best same-namespace candidate by token overlap
    TokenOverlap {
        /// Fraction of the target's tokens found in the candidate
        score: f64,
    },
}

/// Result of resolving a step id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Whether the id is available verbatim
    pub available: bool,
    /// Proposed substitute
    pub suggestion: Option<String>,
    /// Stage that produced the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchStage>,
}

impl Resolution {
    fn exact() -> Self {
        Self {
            available: true,
            suggestion: None,
            matched_by: Some(MatchStage::Exact),
        }
    }

    fn substitute(suggestion: &str, stage: MatchStage) -> Self {
        Self {
            available: false,
            suggestion: Some(suggestion.to_string()),
            matched_by: Some(stage),
        }
    }

    fn unresolved() -> Self {
        Self {
            available: false,
            suggestion: None,
            matched_by: None,
        }
    }
}

/// Multi-stage step-id resolver
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityResolver {
    threshold: f64,
}

impl Default for CompatibilityResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl CompatibilityResolver {
    /// Create a resolver with a custom token-overlap threshold (clamped to `0.0..=1.0`)
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Token-overlap threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolve `step_id` against `known_good`
    pub fn resolve(&self, step_id: &str, known_good: &BTreeSet<String>) -> Resolution {
        if known_good.contains(step_id) {
            return Resolution::exact();
        }

        if let Some(candidate) = self.normalized_match(step_id, known_good) {
            debug!(step_id, candidate, "Resolved by normalization");
            return Resolution::substitute(candidate, MatchStage::Normalized);
        }

        if let Some((candidate, score)) = self.token_overlap_match(step_id, known_good) {
            debug!(step_id, candidate, score, "Resolved by token overlap");
            return Resolution::substitute(candidate, MatchStage::TokenOverlap { score });
        }

        debug!(step_id, "No confident match");
        Resolution::unresolved()
    }

    /// The single known-good id equal to `step_id` after normalization.
    /// Ambiguous collisions resolve to nothing.
    fn normalized_match<'a>(&self, step_id: &str, known_good: &'a BTreeSet<String>) -> Option<&'a str> {
        let target = normalize_step_id(step_id);
        let mut matches = known_good
            .iter()
            .filter(|candidate| normalize_step_id(candidate) == target);

        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(step_id, "Normalized match is ambiguous");
            return None;
        }
        Some(first.as_str())
    }

    /// Highest scoring same-namespace candidate at or above the threshold.
    /// Ties go to the lexicographically smallest id.
    fn token_overlap_match<'a>(&self, step_id: &str, known_good: &'a BTreeSet<String>) -> Option<(&'a str, f64)> {
        let (namespace, identifier) = split_step_id(step_id)?;
        let target = tokenize_identifier(identifier);
        if target.is_empty() {
            return None;
        }

        let mut best: Option<(&'a str, f64)> = None;
        for candidate in known_good {
            let Some((candidate_ns, candidate_ident)) = split_step_id(candidate) else {
                continue;
            };
            if !candidate_ns.eq_ignore_ascii_case(namespace) {
                continue;
            }

            let tokens = tokenize_identifier(candidate_ident);
            let shared = target.intersection(&tokens).count();
            let score = shared as f64 / target.len() as f64;

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate.as_str(), score));
            }
        }

        best.filter(|(_, score)| *score >= self.threshold && *score > 0.0)
    }
}
