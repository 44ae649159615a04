//! Dot-path navigation over decoded JSON payloads

use serde_json::Value;

/// Splits a dot path into segments; an empty path addresses the value itself
pub(crate) fn parse_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every value reached by following `segments` from `root`
///
/// Numeric segments index arrays. Any other segment applied to an array is
/// applied to each of its elements, so `characters.name` over an array of
/// objects yields every name.
pub(crate) fn resolve<'a>(root: &'a Value, segments: &[String]) -> Vec<&'a Value> {
    let mut current = vec![root];

    for segment in segments {
        let index = segment.parse::<usize>().ok();
        current = current
            .into_iter()
            .flat_map(|value| step(value, segment, index))
            .collect();

        if current.is_empty() {
            break;
        }
    }

    current
}

fn step<'a>(value: &'a Value, segment: &str, index: Option<usize>) -> Vec<&'a Value> {
    match (value, index) {
        (Value::Array(items), Some(i)) => items.get(i).into_iter().collect(),
        (Value::Array(items), None) => items.iter().filter_map(|v| v.get(segment)).collect(),
        (Value::Object(map), _) => map.get(segment).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Item values found at `segments`; arrays are flattened one level
pub(crate) fn items<'a>(root: &'a Value, segments: &[String]) -> Vec<&'a Value> {
    resolve(root, segments)
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(elements) => elements.iter().collect(),
            Value::Object(_) => vec![value],
            _ => Vec::new(),
        })
        .collect()
}

/// String forms of the scalars among `values`; nested arrays are flattened
///
/// Nulls and objects contribute nothing.
pub(crate) fn scalar_strings(values: &[&Value]) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        push_scalars(value, &mut out);
    }
    out
}

fn push_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.trim().to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(elements) => elements.iter().for_each(|v| push_scalars(v, out)),
        Value::Null | Value::Object(_) => {}
    }
}
