//! Weaver Catalog
//!
//! This crate provides the step catalog gateway used by the blueprint
//! validator and the deployment engine:
//!
//! * [`StepSchema`] - the static description of a step (parameters, kind, docs)
//! * [`StepCatalog`] - read-only lookup and search over step schemas
//! * [`StaticCatalog`] - the bundled (or file-provided) catalog implementation
//! * [`LiveCatalogCache`] - a TTL cache over the remote list of step ids that
//!   are actually installable for the configured account

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod schema;
mod store;

/// Live (account specific) catalog of installable step ids
pub mod live;

pub use error::{CatalogError, CatalogResult};
pub use live::{LiveCatalogCache, LiveCatalogSnapshot, LiveCatalogSource, RemoteLiveCatalog, RemoteLiveCatalogConfig};
pub use schema::{ParameterDefinition, StepKind, StepSchema};
pub use store::{StaticCatalog, StepCatalog};

/// Splits a step id of the form `namespace:Identifier`.
///
/// Returns `None` when the id has no namespace separator or either side is empty.
///
/// ```
/// use weaver_catalog::split_step_id;
///
/// assert_eq!(split_step_id("slack:ActionPostMessage"), Some(("slack", "ActionPostMessage")));
/// assert_eq!(split_step_id("nonamespace"), None);
/// ```
pub fn split_step_id(step_id: &str) -> Option<(&str, &str)> {
    let (namespace, identifier) = step_id.split_once(':')?;
    if namespace.is_empty() || identifier.is_empty() {
        return None;
    }
    Some((namespace, identifier))
}
