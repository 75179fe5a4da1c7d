//! Dotted-path access into loosely structured JSON records.

use serde_json::Value;

/// Resolve `a.b.c` against nested objects. Missing keys, non-object
/// intermediates and explicit `null` all resolve to `None`.
pub fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = raw;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// First candidate path whose value `extract` accepts.
pub fn first_match<T, F>(raw: &Value, paths: &[&str], extract: F) -> Option<T>
where
    F: Fn(&Value) -> Option<T>,
{
    paths
        .iter()
        .filter_map(|path| lookup(raw, path))
        .find_map(extract)
}
