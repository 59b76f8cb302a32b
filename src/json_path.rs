//! Minimal JSON path resolution
//!
//! Paths are dot-separated field names; a segment may carry one trailing
//! array index, e.g. `weather[0].icon` or `data.items`. Resolution never
//! fails loudly: any missing field, type mismatch, bad index or
//! out-of-range index yields `None`.

use serde_json::Value;

/// A single parsed path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Field(&'a str),
    Indexed(&'a str, usize),
}

impl<'a> Segment<'a> {
    /// Parses a segment. `None` means the segment is malformed and can never match.
    fn parse(raw: &'a str) -> Option<Self> {
        let Some(open) = raw.find('[') else {
            return Some(Segment::Field(raw));
        };

        let name = &raw[..open];
        let index = raw[open + 1..].strip_suffix(']')?;
        if index.contains('[') || index.contains(']') {
            return None;
        }

        let index = index.parse::<usize>().ok()?;
        Some(Segment::Indexed(name, index))
    }

    fn step<'v>(self, current: &'v Value) -> Option<&'v Value> {
        match self {
            Segment::Field(name) => current.as_object()?.get(name),
            Segment::Indexed(name, index) => current.as_object()?.get(name)?.as_array()?.get(index),
        }
    }
}

/// Resolves `path` against `root`.
///
/// A blank path means "not configured" and resolves to `None`, never to the root.
pub fn resolve<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    path.split('.')
        .try_fold(root, |current, raw| Segment::parse(raw)?.step(current))
}

/// Resolves an optional path; unset paths resolve to `None`.
pub fn resolve_opt<'v>(root: &'v Value, path: Option<&str>) -> Option<&'v Value> {
    path.and_then(|p| resolve(root, p))
}

/// Resolves a path and returns the value only if it is a JSON string
pub fn resolve_str<'v>(root: &'v Value, path: Option<&str>) -> Option<&'v str> {
    resolve_opt(root, path)?.as_str()
}

/// Like [`resolve_str`], but treats blank strings as absent
pub fn resolve_non_empty_str<'v>(root: &'v Value, path: Option<&str>) -> Option<&'v str> {
    resolve_str(root, path).filter(|s| !s.trim().is_empty())
}

/// Resolves a path to display text: strings as is, `null` as empty,
/// anything else as its JSON text.
pub fn resolve_text(root: &Value, path: Option<&str>) -> Option<String> {
    match resolve_opt(root, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}

/// Resolves a path to an integer if the value is a JSON number.
///
/// Floating point values are truncated toward zero.
pub fn resolve_number(root: &Value, path: Option<&str>) -> Option<i64> {
    let value = resolve_opt(root, path)?;
    if !value.is_number() {
        return None;
    }
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "name": "Athens",
            "main": { "temp": 21.5 },
            "weather": [
                { "main": "Clear", "description": "clear sky", "icon": "01d" },
                { "main": "Clouds" }
            ],
            "data": { "items": [1, 2, 3] },
            "nothing": null
        })
    }

    #[test]
    fn test_plain_and_nested_fields() {
        let doc = sample();
        assert_eq!(resolve(&doc, "name"), Some(&json!("Athens")));
        assert_eq!(resolve(&doc, "main.temp"), Some(&json!(21.5)));
        assert_eq!(resolve(&doc, "data.items"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn test_indexed_segments() {
        let doc = sample();
        assert_eq!(resolve(&doc, "weather[0].icon"), Some(&json!("01d")));
        assert_eq!(resolve(&doc, "weather[1].main"), Some(&json!("Clouds")));
        assert_eq!(resolve(&doc, "data.items[2]"), Some(&json!(3)));
    }

    #[test]
    fn test_returns_non_scalar_values_as_is() {
        let doc = sample();
        assert!(resolve(&doc, "weather").unwrap().is_array());
        assert!(resolve(&doc, "main").unwrap().is_object());
        assert_eq!(resolve(&doc, "nothing"), Some(&Value::Null));
    }

    #[test]
    fn test_blank_path_is_not_the_root() {
        let doc = sample();
        assert_eq!(resolve(&doc, ""), None);
        assert_eq!(resolve(&doc, "   "), None);
        assert_eq!(resolve_opt(&doc, None), None);
    }

    #[test]
    fn test_invalid_paths_resolve_to_none() {
        let doc = sample();
        // missing field at any depth
        assert_eq!(resolve(&doc, "missing"), None);
        assert_eq!(resolve(&doc, "main.missing"), None);
        assert_eq!(resolve(&doc, "missing.temp"), None);
        // out of range, negative and non-integer indices
        assert_eq!(resolve(&doc, "weather[5].main"), None);
        assert_eq!(resolve(&doc, "weather[-1].main"), None);
        assert_eq!(resolve(&doc, "weather[x].main"), None);
        assert_eq!(resolve(&doc, "weather[].main"), None);
        // malformed brackets
        assert_eq!(resolve(&doc, "weather[0"), None);
        assert_eq!(resolve(&doc, "weather[0][0]"), None);
        assert_eq!(resolve(&doc, "weather[0]x"), None);
        // indexing a non-array, descending into a scalar
        assert_eq!(resolve(&doc, "main[0]"), None);
        assert_eq!(resolve(&doc, "name.first"), None);
        assert_eq!(resolve(&doc, "nothing.inner"), None);
    }

    #[test]
    fn test_root_must_be_object() {
        assert_eq!(resolve(&json!([1, 2]), "0"), None);
        assert_eq!(resolve(&json!("text"), "len"), None);
    }

    #[test]
    fn test_resolution_is_pure() {
        let doc = sample();
        let first = resolve(&doc, "weather[0].description").cloned();
        let second = resolve(&doc, "weather[0].description").cloned();
        assert_eq!(first, second);
        assert_eq!(doc, sample());
    }

    #[test]
    fn test_typed_helpers() {
        let doc = json!({ "title": "T", "blank": "  ", "count": 42, "ratio": 7.9, "text": "42" });
        assert_eq!(resolve_str(&doc, Some("title")), Some("T"));
        assert_eq!(resolve_str(&doc, Some("count")), None);
        assert_eq!(resolve_non_empty_str(&doc, Some("blank")), None);
        assert_eq!(resolve_number(&doc, Some("count")), Some(42));
        assert_eq!(resolve_number(&doc, Some("ratio")), Some(7));
        assert_eq!(resolve_number(&doc, Some("text")), None);
        assert_eq!(resolve_number(&doc, None), None);
    }

    #[test]
    fn test_resolve_text_stringifies_scalars() {
        let doc = json!({ "s": "text", "n": 800, "b": true, "z": null, "o": { "k": 1 } });
        assert_eq!(resolve_text(&doc, Some("s")).as_deref(), Some("text"));
        assert_eq!(resolve_text(&doc, Some("n")).as_deref(), Some("800"));
        assert_eq!(resolve_text(&doc, Some("b")).as_deref(), Some("true"));
        assert_eq!(resolve_text(&doc, Some("z")).as_deref(), Some(""));
        assert_eq!(resolve_text(&doc, Some("o")).as_deref(), Some(r#"{"k":1}"#));
        assert_eq!(resolve_text(&doc, Some("missing")), None);
    }
}
