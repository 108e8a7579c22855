mod node;
mod route;

pub use node::{FlowNode, LeafStep, RouterStep, StepHeader};
pub(crate) use node::keys;
pub use route::Route;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// An ordered sequence of nodes
pub type Flow = Vec<FlowNode>;

/// Name used when a blueprint carries none
pub const DEFAULT_SCENARIO_NAME: &str = "Untitled scenario";

/// How the platform starts the scenario
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Scheduling {
    /// Runs when triggered (webhook, manual run)
    #[default]
    OnDemand,
    /// Runs on a fixed interval
    Indefinitely {
        /// Interval in seconds
        interval: u64,
    },
}

/// The complete scenario blueprint
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    /// Scenario name
    pub name: String,

    /// Root flow
    pub flow: Flow,

    /// Scenario metadata (runtime configuration)
    pub metadata: Option<Map<String, Value>>,

    /// Scheduling derived from scheduler steps; not part of the serialized blueprint
    pub scheduling: Scheduling,

    /// Any other top-level keys, preserved verbatim
    pub extra: Map<String, Value>,
}

impl Blueprint {
    /// Create a blueprint with a name and a root flow
    pub fn new(name: impl Into<String>, flow: Flow) -> Self {
        Self {
            name: name.into(),
            flow,
            metadata: None,
            scheduling: Scheduling::default(),
            extra: Map::new(),
        }
    }

    /// Wire representation (`{ name, flow, metadata }`)
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "flow".to_string(),
            Value::Array(self.flow.iter().map(FlowNode::to_value).collect()),
        );
        if let Some(metadata) = &self.metadata {
            map.insert("metadata".to_string(), Value::Object(metadata.clone()));
        }
        for (key, value) in &self.extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }

    /// Serialized blueprint as submitted to the platform
    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }

    /// Visit every node in document order
    pub fn visit_nodes<'a>(&'a self, visitor: &mut impl FnMut(&'a FlowNode)) {
        visit_nodes(&self.flow, visitor);
    }

    /// Distinct step ids in document order
    pub fn step_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        self.visit_nodes(&mut |node| {
            if !ids.iter().any(|id| id == node.step_id()) {
                ids.push(node.step_id().to_string());
            }
        });
        ids
    }

    /// Whether any node uses the given step id
    pub fn contains_step(&self, step_id: &str) -> bool {
        let mut found = false;
        self.visit_nodes(&mut |node| found |= node.step_id() == step_id);
        found
    }
}

impl Serialize for Blueprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Visit every node of a flow, routes included, in document order
pub fn visit_nodes<'a>(flow: &'a [FlowNode], visitor: &mut impl FnMut(&'a FlowNode)) {
    for node in flow {
        visitor(node);
        for route in node.routes() {
            visit_nodes(&route.flow, visitor);
        }
    }
}

/// Mutably visit every node of a flow, routes included, in document order
pub fn visit_nodes_mut(flow: &mut [FlowNode], visitor: &mut impl FnMut(&mut FlowNode)) {
    for node in flow.iter_mut() {
        visitor(node);
        if let FlowNode::Router(router) = node {
            for route in router.routes.iter_mut() {
                visit_nodes_mut(&mut route.flow, visitor);
            }
        }
    }
}

/// Mutably visit every route of a flow, nested routes included
pub fn visit_routes_mut(flow: &mut [FlowNode], visitor: &mut impl FnMut(&mut Route)) {
    for node in flow.iter_mut() {
        if let FlowNode::Router(router) = node {
            for route in router.routes.iter_mut() {
                visitor(route);
                visit_routes_mut(&mut route.flow, visitor);
            }
        }
    }
}
