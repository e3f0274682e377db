//! Minimal KQL-to-filter translation.
//!
//! Only two shapes are understood:
//!
//! ```text
//! @timestamp >= "2024-01-01" and < "2024-02-01"   -> range
//! status: 500                                    -> match
//! ```
//!
//! Anything else is passed through as a `query_string` filter.

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*([A-Za-z_@][\w.@]*)\s*(>=|>|<=|<)\s*"?([^"\s]+)"?\s*(?:and\s+(?:([A-Za-z_@][\w.@]*)\s*)?(>=|>|<=|<)\s*"?([^"\s]+)"?\s*)?$"#,
    )
    .expect("range pattern compiles")
});

static MATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([A-Za-z_@][\w.@]*)\s*:\s*(?:"([^"]*)"|([^\s"]+))\s*$"#)
        .expect("match pattern compiles")
});

/// Translates a KQL snippet into a search-engine filter clause.
pub fn translate(kql: &str) -> Value {
    if let Some(filter) = translate_range(kql) {
        return filter;
    }

    if let Some(caps) = MATCH.captures(kql) {
        let field = &caps[1];
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        return json!({ "match": { field: value } });
    }

    json!({ "query_string": { "query": kql } })
}

fn translate_range(kql: &str) -> Option<Value> {
    let caps = RANGE.captures(kql)?;
    let field = &caps[1];

    // A second bound on a different field is not a single range.
    if let Some(second_field) = caps.get(4)
        && second_field.as_str() != field
    {
        return None;
    }

    let mut bounds = Map::new();
    bounds.insert(bound_key(&caps[2]).to_string(), Value::from(&caps[3]));
    if let (Some(op), Some(value)) = (caps.get(5), caps.get(6)) {
        bounds.insert(bound_key(op.as_str()).to_string(), Value::from(value.as_str()));
    }

    Some(json!({ "range": { field: bounds } }))
}

fn bound_key(op: &str) -> &'static str {
    match op {
        ">=" => "gte",
        ">" => "gt",
        "<=" => "lte",
        _ => "lt",
    }
}
