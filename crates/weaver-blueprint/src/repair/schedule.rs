use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

lazy_static! {
    static ref MINUTES_RE: Regex = Regex::new(r"(\d+)\s*(?:m\b|min|minute)").unwrap();
}

/// Interval text to seconds mapping used when a scheduler node becomes
/// scenario scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalMapping {
    pub hour: u64,
    pub day: u64,
    pub week: u64,
    pub month: u64,
    /// Used when the text is missing or not understood
    pub fallback: u64,
}

impl Default for IntervalMapping {
    fn default() -> Self {
        Self {
            hour: 3_600,
            day: 86_400,
            week: 604_800,
            month: 2_592_000,
            fallback: 900,
        }
    }
}

impl IntervalMapping {
    /// Interval in seconds for a scheduler's `interval` value.
    ///
    /// Numbers (and numeric strings) are taken as seconds. Text is matched
    /// loosely: `"every 15 minutes"` is 900, `"daily"` is one day.
    pub fn interval_seconds(&self, interval: Option<&Value>) -> u64 {
        match interval {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f.round() as u64))
                .filter(|secs| *secs > 0)
                .unwrap_or(self.fallback),
            Some(Value::String(text)) => self.text_seconds(text),
            _ => self.fallback,
        }
    }

    fn text_seconds(&self, text: &str) -> u64 {
        let text = text.trim().to_lowercase();

        if let Ok(secs) = text.parse::<u64>() {
            return if secs > 0 { secs } else { self.fallback };
        }
        if let Some(minutes) = MINUTES_RE
            .captures(&text)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .filter(|minutes| *minutes > 0)
        {
            return minutes.saturating_mul(60);
        }

        if text.contains("month") {
            self.month
        } else if text.contains("week") {
            self.week
        } else if text.contains("day") || text.contains("daily") {
            self.day
        } else if text.contains("hour") {
            self.hour
        } else {
            self.fallback
        }
    }
}
