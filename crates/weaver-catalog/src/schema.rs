use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The role a step plays inside a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Starts a scenario (webhooks, watchers, schedulers)
    Trigger,
    /// Performs an operation
    Action,
    /// Looks records up
    Search,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Trigger => write!(f, "trigger"),
            StepKind::Action => write!(f, "action"),
            StepKind::Search => write!(f, "search"),
        }
    }
}

/// Definition of a single step parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name as it appears in `parameters` or `mapper`
    pub name: String,

    /// Type tag (e.g. "text", "number", "array", "collection")
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,

    /// Whether the parameter must be supplied
    #[serde(default)]
    pub required: bool,

    /// Default value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_param_type() -> String {
    "text".to_string()
}

/// Catalog entry describing a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSchema {
    /// Step id (`namespace:Identifier`)
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Owning app
    pub app: String,

    /// Kind of step
    pub kind: StepKind,

    /// Parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,

    /// Free-text documentation
    #[serde(default)]
    pub docs: String,
}

impl StepSchema {
    /// Iterate the parameters flagged as required
    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// Whether this step starts a scenario
    pub fn is_trigger(&self) -> bool {
        self.kind == StepKind::Trigger
    }

    /// Case-insensitive keyword match against id, name, app and docs
    pub(crate) fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        [&self.id, &self.name, &self.app, &self.docs]
            .iter()
            .any(|field| field.to_lowercase().contains(&keyword))
    }
}
