use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult};
use crate::schema::StepSchema;

/// Bundled step catalog
const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

/// Read-only interface over a step schema catalog
pub trait StepCatalog: Send + Sync + Debug {
    /// Look a step up by its exact id
    fn get_step(&self, step_id: &str) -> Option<&StepSchema>;

    /// Search the catalog.
    ///
    /// `"*"` returns every step. `namespace:*` returns every step of a namespace.
    /// Any other query is split on whitespace and every keyword must match the
    /// step's id, name, app or documentation. `app_filter` restricts the result
    /// to one app. Results are ordered by id.
    fn search_steps(&self, query: &str, app_filter: Option<&str>) -> Vec<&StepSchema>;

    /// All known step ids
    fn step_ids(&self) -> BTreeSet<String>;
}

/// In-memory catalog loaded from a JSON document
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    steps: BTreeMap<String, StepSchema>,
}

impl StaticCatalog {
    /// Build a catalog from schemas. Later duplicates replace earlier ones.
    pub fn new(schemas: impl IntoIterator<Item = StepSchema>) -> Self {
        let steps = schemas
            .into_iter()
            .map(|schema| (schema.id.clone(), schema))
            .collect();
        Self { steps }
    }

    /// The catalog shipped with this crate
    pub fn bundled() -> CatalogResult<Self> {
        Self::from_json_str(BUNDLED_CATALOG)
    }

    /// Parse a catalog from a JSON array of step schemas
    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        let schemas: Vec<StepSchema> = serde_json::from_str(json)?;
        Ok(Self::new(schemas))
    }

    /// Load a catalog file
    pub fn from_path(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json_str(&contents)?;
        info!(path = %path.display(), steps = catalog.len(), "Loaded step catalog");
        Ok(catalog)
    }

    /// Number of steps in the catalog
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StepCatalog for StaticCatalog {
    fn get_step(&self, step_id: &str) -> Option<&StepSchema> {
        self.steps.get(step_id)
    }

    fn search_steps(&self, query: &str, app_filter: Option<&str>) -> Vec<&StepSchema> {
        let query = query.trim();
        debug!(query, ?app_filter, "Searching step catalog");

        let by_app = |schema: &&StepSchema| app_filter.map_or(true, |app| schema.app.eq_ignore_ascii_case(app));

        if query.is_empty() || query == "*" {
            return self.steps.values().filter(by_app).collect();
        }

        if let Some(namespace) = query.strip_suffix(":*") {
            return self
                .steps
                .values()
                .filter(by_app)
                .filter(|schema| {
                    schema
                        .id
                        .split_once(':')
                        .map_or(false, |(ns, _)| ns.eq_ignore_ascii_case(namespace))
                })
                .collect();
        }

        let keywords: Vec<&str> = query.split_whitespace().collect();
        self.steps
            .values()
            .filter(by_app)
            .filter(|schema| keywords.iter().all(|kw| schema.matches_keyword(kw)))
            .collect()
    }

    fn step_ids(&self) -> BTreeSet<String> {
        self.steps.keys().cloned().collect()
    }
}
