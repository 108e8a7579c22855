use std::collections::BTreeSet;

/// Lower-case an id and drop every character outside `[a-z0-9:]`
pub fn normalize_step_id(step_id: &str) -> String {
    step_id
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ':')
        .collect()
}

/// Split an identifier into lower-cased tokens at lower→upper case
/// transitions and at runs of non-alphanumeric characters.
///
/// `ActionSendData` → `{action, send, data}`, `watch_rows` → `{watch, rows}`.
pub fn tokenize_identifier(identifier: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for c in identifier.chars() {
        if !c.is_alphanumeric() {
            flush(&mut current, &mut tokens);
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower {
            flush(&mut current, &mut tokens);
        }
        previous_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    flush(&mut current, &mut tokens);

    tokens
}

fn flush(current: &mut String, tokens: &mut BTreeSet<String>) {
    if !current.is_empty() {
        tokens.insert(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_step_id("Google-Sheets:addRow"), "googlesheets:addrow");
        assert_eq!(normalize_step_id("util:SetVariable2"), "util:setvariable2");
    }

    #[test]
    fn test_tokenize_camel_case() {
        assert_eq!(tokenize_identifier("ActionSendData"), set(&["action", "send", "data"]));
        assert_eq!(tokenize_identifier("addRow"), set(&["add", "row"]));
    }

    #[test]
    fn test_tokenize_separators_and_acronyms() {
        assert_eq!(tokenize_identifier("watch_rows--now"), set(&["watch", "rows", "now"]));
        // Upper after upper is not a boundary
        assert_eq!(tokenize_identifier("ParseJSON"), set(&["parse", "json"]));
        // Digits stay attached to their token
        assert_eq!(tokenize_identifier("SetVariable2"), set(&["set", "variable2"]));
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize_identifier("").is_empty());
        assert!(tokenize_identifier("__").is_empty());
    }
}
