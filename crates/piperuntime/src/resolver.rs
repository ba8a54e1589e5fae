//! Expansion of `{{nodeId.paramName}}` placeholders against the values a
//! run has produced so far.

use once_cell::sync::Lazy;
use pipecore::{ProcessResults, Value};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]*)\}\}").expect("placeholder pattern is valid"));

/// Split the inside of a placeholder into its `(nodeId, paramName)` parts.
pub fn parse_reference(inner: &str) -> Option<(&str, &str)> {
    inner.split_once('.')
}

/// The process-results key a placeholder like `{{n1.out}}` refers to, if
/// `text` is exactly one placeholder.
pub fn reference_key(text: &str) -> Option<String> {
    let captures = PLACEHOLDER.captures(text.trim())?;
    let whole = captures.get(0)?;
    if whole.as_str().len() != text.trim().len() {
        return None;
    }
    let (node, param) = parse_reference(captures.get(1)?.as_str())?;
    Some(ProcessResults::key(node, param))
}

/// Replace every known reference in `text` with the string form of its value.
///
/// References that are not in `results` stay as written. Substituted text is
/// not scanned again, so resolving already resolved text is a no-op.
pub fn resolve_text<'t>(text: &'t str, results: &ProcessResults) -> Cow<'t, str> {
    PLACEHOLDER.replace_all(text, |caps: &Captures| {
        let whole = &caps[0];
        let Some((node, param)) = parse_reference(&caps[1]) else {
            return whole.to_string();
        };
        let key = ProcessResults::key(node, param);
        match results.get(&key) {
            Some(value) => {
                tracing::debug!("Resolved {} -> {}", whole, value);
                value.to_string()
            }
            None => {
                tracing::warn!("Variable {} not found, leaving it unresolved", key);
                whole.to_string()
            }
        }
    })
}

/// Resolve a single param value. Non-string values pass through unchanged.
pub fn resolve_value(value: &Value, results: &ProcessResults) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_text(text, results).into_owned()),
        other => other.clone(),
    }
}

pub fn resolve_params(
    params: &HashMap<String, Value>,
    results: &ProcessResults,
) -> HashMap<String, Value> {
    params
        .iter()
        .map(|(name, value)| (name.clone(), resolve_value(value, results)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_key_requires_a_single_placeholder() {
        assert_eq!(reference_key("{{n1.out}}"), Some("n1.out".to_string()));
        assert_eq!(reference_key(" {{n1.out}} "), Some("n1.out".to_string()));
        assert_eq!(reference_key("x{{n1.out}}"), None);
        assert_eq!(reference_key("{{n1}}"), None);
        assert_eq!(reference_key("plain"), None);
    }

    #[test]
    fn reference_splits_on_first_dot() {
        assert_eq!(parse_reference("n1.a.b"), Some(("n1", "a.b")));
    }
}
