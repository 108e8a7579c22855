use serde_json::{Map, Value};

use super::{Flow, FlowNode};

/// One branch of a router
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Route {
    /// The nested flow
    pub flow: Flow,

    /// Route filter, accepted by the interactive editor but not by bulk deployment
    pub filter: Option<Value>,

    /// Any other keys, preserved verbatim
    pub extra: Map<String, Value>,
}

impl Route {
    /// Create a route around a flow
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            ..Default::default()
        }
    }

    /// Wire representation of this route
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "flow".to_string(),
            Value::Array(self.flow.iter().map(FlowNode::to_value).collect()),
        );
        if let Some(filter) = &self.filter {
            map.insert("filter".to_string(), filter.clone());
        }
        for (key, value) in &self.extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }
}
