//! Version registry and problematic-step denylist.
//!
//! Both tables are read once at start-up and shared read-only (`Arc<Registries>`)
//! by validation, healing and the deployment retry loop.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DslError;

/// Bundled registry document
const BUNDLED_REGISTRY: &str = include_str!("../data/registry.yaml");

/// Known-good revision per verified step id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionRegistry {
    versions: BTreeMap<String, u32>,
}

impl VersionRegistry {
    /// Build a registry from `(step id, revision)` pairs
    pub fn new(entries: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            versions: entries.into_iter().collect(),
        }
    }

    /// Known-good revision of a step
    pub fn get(&self, step_id: &str) -> Option<u32> {
        self.versions.get(step_id).copied()
    }

    /// Whether a step has a known-good revision
    pub fn contains(&self, step_id: &str) -> bool {
        self.versions.contains_key(step_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// A step (or `namespace:*`) known to fail remote deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblematicStep {
    /// Step id or `namespace:*` pattern
    pub step: String,
    /// Why it fails
    pub reason: String,
    /// Suggested replacement
    #[serde(default)]
    pub alternative: Option<String>,
}

impl ProblematicStep {
    fn matches(&self, step_id: &str) -> bool {
        match self.step.strip_suffix(":*") {
            Some(namespace) => step_id
                .split_once(':')
                .map_or(false, |(ns, _)| ns == namespace),
            None => self.step == step_id,
        }
    }
}

/// Denylist of problematic steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblematicSteps {
    entries: Vec<ProblematicStep>,
}

impl ProblematicSteps {
    /// Build a denylist
    pub fn new(entries: Vec<ProblematicStep>) -> Self {
        Self { entries }
    }

    /// Find the entry for a step id; exact entries win over namespace patterns
    pub fn lookup(&self, step_id: &str) -> Option<&ProblematicStep> {
        self.entries
            .iter()
            .find(|entry| entry.step == step_id)
            .or_else(|| self.entries.iter().find(|entry| entry.matches(step_id)))
    }

    /// Whether a step id is denylisted
    pub fn contains(&self, step_id: &str) -> bool {
        self.lookup(step_id).is_some()
    }
}

/// All read-only registries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registries {
    /// Known-good revisions
    #[serde(default)]
    pub versions: VersionRegistry,

    /// Steps known to fail deployment
    #[serde(default)]
    pub problematic: ProblematicSteps,

    /// Scheduling pseudo-steps
    #[serde(default)]
    pub schedulers: BTreeSet<String>,
}

impl Registries {
    /// The registries shipped with this crate
    pub fn bundled() -> Result<Self, DslError> {
        Self::from_yaml_str(BUNDLED_REGISTRY)
    }

    /// Parse registries from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DslError> {
        let registries: Registries = serde_yaml::from_str(yaml)?;
        for entry in &registries.problematic.entries {
            if registries.versions.contains(&entry.step) {
                return Err(DslError::RegistryError(format!(
                    "'{}' is both denylisted and version-pinned",
                    entry.step
                )));
            }
        }
        Ok(registries)
    }

    /// Load registries from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DslError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DslError::RegistryError(format!("{}: {}", path.display(), e)))?;
        let registries = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            versions = registries.versions.len(),
            "Loaded registries"
        );
        Ok(registries)
    }

    /// Whether a step id is a scheduling pseudo-step
    pub fn is_scheduler(&self, step_id: &str) -> bool {
        self.schedulers.contains(step_id)
    }
}
