//! Access helpers over the XML-shaped JSON document
//!
//! Attributes live under `@name` keys, element text under `#text`. Any child
//! element may show up as a single object or as a list, so reads go through
//! [`many`].

use serde_json::Value;

const LEGACY_PREFIXES: [&str; 2] = [
    "_.fcp.ObjectModelEncapsulateLegacy.true...",
    "_.fcp.ObjectModelEncapsulateLegacy.false...",
];

/// Zero or more: absent/null is empty, a list is itself, anything else is one item.
pub fn many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Child element `key` of `node`.
pub fn child<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get(key).filter(|v| !v.is_null())
}

/// Follow a chain of child keys.
pub fn path<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(node, |current, key| child(current, key))
}

/// Text content: a plain string, or an element's `#text`.
pub fn text(value: Option<&Value>) -> Option<&str> {
    match value? {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("#text").and_then(Value::as_str),
        _ => None,
    }
}

/// Attribute `@name` of `node`.
pub fn attr<'a>(node: &'a Value, name: &str) -> Option<&'a str> {
    node.get(format!("@{name}").as_str()).and_then(Value::as_str)
}

/// Child text of `node`, e.g. `<remote-name>Sales</remote-name>`.
pub fn child_text<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    text(child(node, key))
}

/// Child `key`, also looked up under the legacy object-model spellings.
pub fn probe<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    std::iter::once(key.to_string())
        .chain(LEGACY_PREFIXES.iter().map(|prefix| format!("{prefix}{key}")))
        .find_map(|k| child(node, &k).filter(|v| !is_empty(v)))
}

/// Every `key` child under all spellings, normalized with [`many`].
pub fn probe_all<'a>(node: &'a Value, key: &str) -> Vec<&'a Value> {
    std::iter::once(key.to_string())
        .chain(LEGACY_PREFIXES.iter().map(|prefix| format!("{prefix}{key}")))
        .flat_map(|k| many(child(node, &k)))
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// `[Sales]` → `Sales`; anything else unchanged.
pub fn strip_brackets(name: &str) -> &str {
    name.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(name)
}

/// Undo the XML entity escaping some exports leave in operator strings.
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
