//! Dot-separated path resolution over JSON objects

use serde_json::Value;

/// Resolve `path` (e.g. `user.name`) against `data`
///
/// Every segment but the last must land on an object. A missing key or a
/// non-object intermediate yields `None`; the terminal value may be of any
/// JSON type.
pub fn extract<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| current.as_object()?.get(segment))
}
