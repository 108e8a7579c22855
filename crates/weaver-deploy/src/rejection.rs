//! Structured view of a platform rejection
//!
//! The platform answers failed scenario creation with a JSON body carrying a
//! code, a message, an optional detail and sometimes a list of sub-errors.
//! The offending step id and revision appear either as explicit fields or
//! only inside the text, so both are checked.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

lazy_static! {
    static ref STEP_ID_RE: Regex = Regex::new(r"\b([a-z0-9][a-z0-9-]*:[A-Za-z][A-Za-z0-9_]*)\b").unwrap();
    static ref REVISION_RE: Regex = Regex::new(r"(?i)\bversion\s*[:#]?\s*'?(\d+)").unwrap();
}

const STEP_ID_FIELDS: [&str; 4] = ["module", "moduleName", "stepId", "moduleId"];
const REVISION_FIELDS: [&str; 3] = ["version", "moduleVersion", "revision"];

/// A rejected scenario submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRejection {
    /// HTTP status
    pub status: u16,
    /// Platform error code (`IM007`, `SC400`, ...)
    pub code: Option<String>,
    /// Main message
    pub message: String,
    /// Detail text, sub-errors included
    pub detail: Option<String>,
    /// Step the platform complained about
    pub step_id: Option<String>,
    /// Revision the platform complained about
    pub revision: Option<u32>,
}

impl PlatformRejection {
    /// Parse a rejection from a status and a response body
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_json(status, &Value::Object(map)),
            _ => {
                let message = if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().chars().take(512).collect()
                };
                Self {
                    status,
                    code: None,
                    step_id: find_step_id(&message),
                    revision: find_revision(&message),
                    message,
                    detail: None,
                }
            }
        }
    }

    fn from_json(status: u16, body: &Value) -> Self {
        let code = match body.get("code") {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        };
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));

        let suberrors: Vec<&Value> = body
            .get("suberrors")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default();

        let mut detail_parts: Vec<String> = Vec::new();
        if let Some(detail) = body.get("detail").and_then(Value::as_str) {
            detail_parts.push(detail.to_string());
        }
        for suberror in &suberrors {
            if let Some(text) = suberror.get("message").and_then(Value::as_str) {
                detail_parts.push(text.to_string());
            }
        }
        let detail = (!detail_parts.is_empty()).then(|| detail_parts.join("; "));

        let sources: Vec<&Value> = std::iter::once(body).chain(suberrors.iter().copied()).collect();
        let text = format!("{} {}", message, detail.as_deref().unwrap_or_default());

        let step_id = sources
            .iter()
            .find_map(|source| string_field(source, &STEP_ID_FIELDS))
            .or_else(|| find_step_id(&text));
        let revision = sources
            .iter()
            .find_map(|source| revision_field(source))
            .or_else(|| find_revision(&text));

        Self {
            status,
            code,
            message,
            detail,
            step_id,
            revision,
        }
    }

    /// Whether the platform refused the credentials
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// Code or, without one, the HTTP status
    pub fn code_or_status(&self) -> String {
        self.code.clone().unwrap_or_else(|| self.status.to_string())
    }
}

impl fmt::Display for PlatformRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code_or_status(), self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

fn string_field(source: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|key| source.get(*key).and_then(Value::as_str))
        .filter(|id| id.contains(':'))
        .map(str::to_string)
}

fn revision_field(source: &Value) -> Option<u32> {
    REVISION_FIELDS.iter().find_map(|key| match source.get(*key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn find_step_id(text: &str) -> Option<String> {
    STEP_ID_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|candidate| !candidate.starts_with("http"))
}

fn find_revision(text: &str) -> Option<u32> {
    REVISION_RE.captures(text).and_then(|caps| caps[1].parse().ok())
}
