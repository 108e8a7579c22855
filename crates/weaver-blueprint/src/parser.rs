use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DslError;
use crate::flow::{keys, Blueprint, Flow, FlowNode, LeafStep, Route, RouterStep, Scheduling, StepHeader, DEFAULT_SCENARIO_NAME};
use crate::validation::{error_codes, ValidationError};

/// Result of a lenient parse: whatever could be understood plus the
/// structural errors found on the way
#[derive(Debug)]
pub struct ParseOutcome {
    /// Parsed blueprint; `None` when the root itself is unusable
    pub blueprint: Option<Blueprint>,
    /// Structural errors
    pub errors: Vec<ValidationError>,
    /// Document locations of the parsed nodes
    pub paths: SourcePaths,
}

/// Maps path labels of the parsed tree back to the document.
///
/// Malformed nodes and routes are dropped by the lenient parse, so the
/// `Flow[1]` of the parsed tree may be the document's `Flow[2]`. Only
/// labels that moved are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePaths {
    moved: HashMap<String, String>,
    root_len: usize,
}

impl SourcePaths {
    /// Document label for a parsed-tree node path or route prefix
    pub fn label<'a>(&'a self, parsed: &'a str) -> &'a str {
        self.moved.get(parsed).map(String::as_str).unwrap_or(parsed)
    }

    /// Number of entries in the document's root flow, malformed ones included
    pub fn root_len(&self) -> usize {
        self.root_len
    }

    fn record(&mut self, parsed: String, source: String) {
        if parsed != source {
            self.moved.insert(parsed, source);
        }
    }
}

/// Errors and source locations gathered while walking the document
#[derive(Default)]
struct Scan {
    errors: Vec<ValidationError>,
    paths: SourcePaths,
}

/// Parse blueprint text. JSON is tried first, then YAML.
pub fn parse_document(text: &str) -> Result<Value, DslError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Parse a blueprint strictly: any structural error fails the parse
pub fn parse_blueprint(value: &Value) -> Result<Blueprint, DslError> {
    let outcome = parse_blueprint_lenient(value);
    match outcome.blueprint {
        Some(blueprint) if outcome.errors.is_empty() => Ok(blueprint),
        _ => Err(DslError::from_validation_errors(outcome.errors)),
    }
}

/// Parse a blueprint, skipping malformed nodes and collecting their errors
pub fn parse_blueprint_lenient(value: &Value) -> ParseOutcome {
    let mut scan = Scan::default();

    let Some(root) = value.as_object() else {
        scan.errors.push(structural(None, "Blueprint must be a JSON object"));
        return scan.finish(None);
    };

    let flow = match root.get("flow") {
        Some(Value::Array(items)) => {
            scan.paths.root_len = items.len();
            parse_flow(items, "Flow", "Flow", &mut scan)
        }
        Some(_) => {
            scan.errors.push(structural(Some("flow"), "'flow' must be an array"));
            return scan.finish(None);
        }
        None => {
            scan.errors.push(ValidationError {
                code: error_codes::MISSING_REQUIRED_FIELD,
                message: "Blueprint has no 'flow' array".to_string(),
                path: Some("flow".to_string()),
            });
            return scan.finish(None);
        }
    };

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_SCENARIO_NAME)
        .to_string();

    let metadata = match root.get("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            scan.errors.push(structural(Some("metadata"), "'metadata' must be an object"));
            None
        }
    };

    let extra = root
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "name" | "flow" | "metadata"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    debug!(nodes = flow.len(), errors = scan.errors.len(), "Parsed blueprint");

    scan.finish(Some(Blueprint {
        name,
        flow,
        metadata,
        scheduling: Scheduling::default(),
        extra,
    }))
}

impl Scan {
    fn finish(self, blueprint: Option<Blueprint>) -> ParseOutcome {
        ParseOutcome {
            blueprint,
            errors: self.errors,
            paths: self.paths,
        }
    }
}

/// Path label of the `index`th node under `prefix` (`Flow[0]`, `Flow[1].routes[0][2]`)
pub fn node_path(prefix: &str, index: usize) -> String {
    format!("{}[{}]", prefix, index)
}

/// Prefix for the nodes of route `route_index` of the node at `node_path`
pub fn route_prefix(node_path: &str, route_index: usize) -> String {
    format!("{}.routes[{}]", node_path, route_index)
}

/// Errors carry document labels; `parsed_prefix` tracks where kept nodes land
fn parse_flow(items: &[Value], prefix: &str, parsed_prefix: &str, scan: &mut Scan) -> Flow {
    let mut flow = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = node_path(prefix, index);
        let parsed_path = node_path(parsed_prefix, flow.len());
        if let Some(node) = parse_node(item, &path, &parsed_path, scan) {
            scan.paths.record(parsed_path, path);
            flow.push(node);
        }
    }
    flow
}

fn parse_node(value: &Value, path: &str, parsed_path: &str, scan: &mut Scan) -> Option<FlowNode> {
    let errors = &mut scan.errors;
    let Some(obj) = value.as_object() else {
        errors.push(structural(Some(path), "Module must be an object"));
        return None;
    };

    let step_id = match first_of(obj, keys::STEP_ID, keys::STEP_ID_ALIAS) {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            errors.push(ValidationError {
                code: error_codes::MISSING_STEP_ID,
                message: "Module is missing its 'module' identifier".to_string(),
                path: Some(path.to_string()),
            });
            return None;
        }
        Some(_) => {
            errors.push(structural(Some(path), "'module' must be a string"));
            return None;
        }
    };

    let ordinal = match first_of(obj, keys::ORDINAL, keys::ORDINAL_ALIAS) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(ordinal) => Some(ordinal),
            None => {
                errors.push(structural(Some(path), &format!("Module '{}' has a non-integer id", step_id)));
                None
            }
        },
    };

    let revision = match first_of(obj, keys::REVISION, keys::REVISION_ALIAS) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64().and_then(|v| u32::try_from(v).ok()).filter(|v| *v >= 1) {
            Some(revision) => Some(revision),
            None => {
                errors.push(structural(
                    Some(path),
                    &format!("Module '{}' has an invalid version (expected a positive integer)", step_id),
                ));
                None
            }
        },
    };

    let parameters = object_field(obj, keys::PARAMETERS, path, errors);
    let mapper = object_field(obj, keys::MAPPER, path, errors);

    let metadata = match obj.get(keys::METADATA) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            errors.push(structural(Some(path), "'metadata' must be an object"));
            None
        }
    };

    let extra = obj
        .iter()
        .filter(|(key, _)| !is_known_node_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let header = StepHeader {
        step_id,
        ordinal,
        revision,
        metadata,
        extra,
    };

    match obj.get(keys::ROUTES) {
        None | Some(Value::Null) => Some(FlowNode::Leaf(LeafStep {
            header,
            parameters,
            mapper,
        })),
        Some(Value::Array(items)) => {
            let mut routes = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let prefix = route_prefix(path, index);
                let parsed_prefix = route_prefix(parsed_path, routes.len());
                if let Some(route) = parse_route(item, &prefix, &parsed_prefix, scan) {
                    scan.paths.record(parsed_prefix, prefix);
                    routes.push(route);
                }
            }
            Some(FlowNode::Router(RouterStep {
                header,
                parameters,
                mapper,
                routes,
            }))
        }
        Some(_) => {
            scan.errors.push(structural(Some(path), "'routes' must be an array"));
            None
        }
    }
}

fn parse_route(value: &Value, prefix: &str, parsed_prefix: &str, scan: &mut Scan) -> Option<Route> {
    let Some(obj) = value.as_object() else {
        scan.errors.push(structural(Some(prefix), "Route must be an object"));
        return None;
    };

    let flow = match obj.get("flow") {
        Some(Value::Array(items)) => parse_flow(items, prefix, parsed_prefix, scan),
        Some(_) => {
            scan.errors.push(structural(Some(prefix), "Route 'flow' must be an array"));
            return None;
        }
        None => {
            scan.errors.push(ValidationError {
                code: error_codes::MISSING_REQUIRED_FIELD,
                message: "Route has no 'flow' array".to_string(),
                path: Some(prefix.to_string()),
            });
            return None;
        }
    };

    let extra = obj
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "flow" | "filter"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Route {
        flow,
        filter: obj.get("filter").filter(|f| !f.is_null()).cloned(),
        extra,
    })
}

fn first_of<'a>(obj: &'a Map<String, Value>, key: &str, alias: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| obj.get(alias))
}

fn object_field(obj: &Map<String, Value>, key: &str, path: &str, errors: &mut Vec<ValidationError>) -> Map<String, Value> {
    match obj.get(key) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            errors.push(structural(Some(path), &format!("'{}' must be an object", key)));
            Map::new()
        }
    }
}

fn is_known_node_key(key: &str) -> bool {
    matches!(
        key,
        keys::STEP_ID
            | keys::STEP_ID_ALIAS
            | keys::ORDINAL
            | keys::ORDINAL_ALIAS
            | keys::REVISION
            | keys::REVISION_ALIAS
            | keys::PARAMETERS
            | keys::MAPPER
            | keys::METADATA
            | keys::ROUTES
    )
}

fn structural(path: Option<&str>, message: &str) -> ValidationError {
    ValidationError {
        code: error_codes::STRUCTURAL,
        message: message.to_string(),
        path: path.map(str::to_string),
    }
}
