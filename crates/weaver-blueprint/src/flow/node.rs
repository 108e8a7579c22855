use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::Route;

/// Wire keys of a node
pub(crate) mod keys {
    pub const STEP_ID: &str = "module";
    pub const STEP_ID_ALIAS: &str = "stepId";
    pub const ORDINAL: &str = "id";
    pub const ORDINAL_ALIAS: &str = "ordinal";
    pub const REVISION: &str = "version";
    pub const REVISION_ALIAS: &str = "revision";
    pub const PARAMETERS: &str = "parameters";
    pub const MAPPER: &str = "mapper";
    pub const METADATA: &str = "metadata";
    pub const ROUTES: &str = "routes";
}

/// Fields shared by every kind of node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepHeader {
    /// Step id (`namespace:Identifier`)
    pub step_id: String,

    /// Caller assigned ordinal
    pub ordinal: Option<i64>,

    /// Pinned revision
    pub revision: Option<u32>,

    /// Designer/layout metadata
    pub metadata: Option<Map<String, Value>>,

    /// Any other keys, preserved verbatim
    pub extra: Map<String, Value>,
}

/// A plain step invocation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeafStep {
    /// Common node fields
    pub header: StepHeader,

    /// Static parameters
    pub parameters: Map<String, Value>,

    /// Mapped parameters
    pub mapper: Map<String, Value>,
}

/// A step that branches the flow into routes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouterStep {
    /// Common node fields
    pub header: StepHeader,

    /// Static parameters
    pub parameters: Map<String, Value>,

    /// Mapped parameters
    pub mapper: Map<String, Value>,

    /// Routes, each a nested flow
    pub routes: Vec<Route>,
}

/// One node of a flow
#[derive(Debug, Clone, PartialEq)]
pub enum FlowNode {
    /// A plain step
    Leaf(LeafStep),
    /// A router owning sub-flows
    Router(RouterStep),
}

impl FlowNode {
    /// Create a leaf node for a step id
    pub fn leaf(step_id: impl Into<String>) -> Self {
        FlowNode::Leaf(LeafStep {
            header: StepHeader {
                step_id: step_id.into(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Create a router node with the given routes
    pub fn router(step_id: impl Into<String>, routes: Vec<Route>) -> Self {
        FlowNode::Router(RouterStep {
            header: StepHeader {
                step_id: step_id.into(),
                ..Default::default()
            },
            routes,
            ..Default::default()
        })
    }

    /// Set the ordinal (builder style)
    pub fn with_ordinal(mut self, ordinal: i64) -> Self {
        self.header_mut().ordinal = Some(ordinal);
        self
    }

    /// Set the revision (builder style)
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.header_mut().revision = Some(revision);
        self
    }

    /// Add a static parameter (builder style)
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters_mut().insert(name.into(), value);
        self
    }

    /// Add a mapped parameter (builder style)
    pub fn with_mapper(mut self, name: impl Into<String>, value: Value) -> Self {
        self.mapper_mut().insert(name.into(), value);
        self
    }

    /// Common node fields
    pub fn header(&self) -> &StepHeader {
        match self {
            FlowNode::Leaf(step) => &step.header,
            FlowNode::Router(step) => &step.header,
        }
    }

    /// Mutable common node fields
    pub fn header_mut(&mut self) -> &mut StepHeader {
        match self {
            FlowNode::Leaf(step) => &mut step.header,
            FlowNode::Router(step) => &mut step.header,
        }
    }

    /// Step id of this node
    pub fn step_id(&self) -> &str {
        &self.header().step_id
    }

    /// Static parameters
    pub fn parameters(&self) -> &Map<String, Value> {
        match self {
            FlowNode::Leaf(step) => &step.parameters,
            FlowNode::Router(step) => &step.parameters,
        }
    }

    fn parameters_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            FlowNode::Leaf(step) => &mut step.parameters,
            FlowNode::Router(step) => &mut step.parameters,
        }
    }

    /// Mapped parameters
    pub fn mapper(&self) -> &Map<String, Value> {
        match self {
            FlowNode::Leaf(step) => &step.mapper,
            FlowNode::Router(step) => &step.mapper,
        }
    }

    fn mapper_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            FlowNode::Leaf(step) => &mut step.mapper,
            FlowNode::Router(step) => &mut step.mapper,
        }
    }

    /// Whether a parameter is supplied in either `parameters` or `mapper`
    pub fn supplies(&self, name: &str) -> bool {
        self.parameters().contains_key(name) || self.mapper().contains_key(name)
    }

    /// Look a parameter up in `parameters`, then `mapper`
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters().get(name).or_else(|| self.mapper().get(name))
    }

    /// Routes of a router; empty for leaves
    pub fn routes(&self) -> &[Route] {
        match self {
            FlowNode::Leaf(_) => &[],
            FlowNode::Router(step) => &step.routes,
        }
    }

    /// Whether this node is a router
    pub fn is_router(&self) -> bool {
        matches!(self, FlowNode::Router(_))
    }

    /// Wire representation of this node
    pub fn to_value(&self) -> Value {
        let header = self.header();
        let mut map = Map::new();

        if let Some(ordinal) = header.ordinal {
            map.insert(keys::ORDINAL.to_string(), Value::from(ordinal));
        }
        map.insert(keys::STEP_ID.to_string(), Value::String(header.step_id.clone()));
        if let Some(revision) = header.revision {
            map.insert(keys::REVISION.to_string(), Value::from(revision));
        }
        map.insert(keys::PARAMETERS.to_string(), Value::Object(self.parameters().clone()));
        map.insert(keys::MAPPER.to_string(), Value::Object(self.mapper().clone()));
        if let Some(metadata) = &header.metadata {
            map.insert(keys::METADATA.to_string(), Value::Object(metadata.clone()));
        }
        if let FlowNode::Router(router) = self {
            let routes = router.routes.iter().map(Route::to_value).collect();
            map.insert(keys::ROUTES.to_string(), Value::Array(routes));
        }
        for (key, value) in &header.extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Value::Object(map)
    }
}

impl Serialize for FlowNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
