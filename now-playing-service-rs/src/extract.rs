use serde_json::Value;

use crate::text::{normalize, normalize_non_empty};

const SHORT_LIMIT: usize = 44;
const SHORT_KEEP: usize = 41;

/// One step of a path into a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Seg<'a> {
    fn from(key: &'a str) -> Self {
        Seg::Key(key)
    }
}

impl From<usize> for Seg<'_> {
    fn from(index: usize) -> Self {
        Seg::Index(index)
    }
}

/// Builds a `&[Seg]` path from mixed keys and indices: `path!["shows", "current", "name"]`,
/// `path!["currentShow", 0, "name"]`.
#[macro_export]
macro_rules! path {
    ($($seg:expr),* $(,)?) => {
        &[$($crate::extract::Seg::from($seg)),*]
    };
}

/// A located value, or nothing. Transforms never fail; they degrade to `None`.
#[derive(Debug, Clone, Copy)]
pub struct Extracted<'a>(Option<&'a Value>);

/// Walks `path` through `doc`. Any missing, mistyped, or falsy intermediate
/// value short-circuits; a `null` at the end does too.
pub fn extract<'a>(doc: &'a Value, path: &[Seg<'_>]) -> Extracted<'a> {
    let mut current = doc;
    for (position, seg) in path.iter().enumerate() {
        if position > 0 && is_falsy(current) {
            return Extracted(None);
        }
        let next = match (seg, current) {
            (Seg::Key(key), Value::Object(map)) => map.get(*key),
            (Seg::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Extracted(None),
        }
    }
    if current.is_null() {
        return Extracted(None);
    }
    Extracted(Some(current))
}

/// Python-style truthiness as the upstream payloads use it.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

impl<'a> Extracted<'a> {
    pub fn value(self) -> Option<&'a Value> {
        self.0
    }

    pub fn is_some(self) -> bool {
        self.0.is_some()
    }

    /// The located value when it is truthy.
    pub fn truthy(self) -> Option<&'a Value> {
        self.0.filter(|value| !is_falsy(value))
    }

    pub fn as_bool(self) -> Option<bool> {
        self.0.and_then(Value::as_bool)
    }

    pub fn as_i64(self) -> Option<i64> {
        self.0.and_then(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
    }

    /// The raw string, untouched by the normalizer.
    pub fn raw_str(self) -> Option<&'a str> {
        self.0.and_then(Value::as_str)
    }

    pub fn text(self) -> Option<String> {
        self.0.and_then(scalar_text)
    }

    /// Like [`Extracted::text`] but cut to 41 chars plus `...` past 44.
    pub fn shorten(self) -> Option<String> {
        self.text().map(|text| shorten(&text))
    }

    pub fn listeners(self) -> Option<String> {
        self.as_i64().map(listeners)
    }

    /// Collects `sub_path` from each array element and joins with `", "`.
    pub fn join(self, sub_path: &[Seg<'_>]) -> Option<String> {
        self.collect(sub_path).map(|items| items.join(", "))
    }

    /// Collects `sub_path` from each array element. With an empty `sub_path`
    /// the elements themselves are taken.
    pub fn collect(self, sub_path: &[Seg<'_>]) -> Option<Vec<String>> {
        let items = self.0?.as_array()?;
        let collected: Vec<String> = items
            .iter()
            .filter_map(|item| extract(item, sub_path).text())
            .collect();
        (!collected.is_empty()).then_some(collected)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => normalize_non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn shorten(text: &str) -> String {
    if text.chars().count() > SHORT_LIMIT {
        let kept: String = text.chars().take(SHORT_KEEP).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

/// First 44 chars plus `...` when the text is longer than that.
pub fn abridge(text: &str) -> String {
    if text.chars().count() > SHORT_LIMIT {
        let kept: String = text.chars().take(SHORT_LIMIT).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

pub fn listeners(count: i64) -> String {
    if count == 1 {
        "1 listener".to_string()
    } else {
        format!("{count} listeners")
    }
}

/// Normalizes free text and returns `(long, short)` description fields.
pub fn descriptions(raw: Option<&str>) -> (Option<String>, Option<String>) {
    match raw.map(normalize).filter(|text| !text.is_empty()) {
        Some(long) => {
            let short = abridge(&long);
            (Some(long), Some(short))
        }
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn walks_keys_and_indices() {
        let doc = json!({"currentShow": [{"name": "Morning &amp; Co"}]});
        assert_eq!(
            extract(&doc, path!["currentShow", 0, "name"]).text(),
            Some("Morning & Co".to_string())
        );
    }

    #[test]
    fn falsy_intermediates_short_circuit() {
        let docs = [
            json!({"shows": {"current": null}}),
            json!({"shows": {"current": {}}}),
            json!({"shows": {"current": []}}),
            json!({"shows": {"current": ""}}),
            json!({"shows": {"current": false}}),
            json!({"shows": {"current": 0}}),
            json!({"shows": []}),
            json!({"other": 1}),
            json!([1, 2]),
        ];
        for doc in docs {
            assert!(
                !extract(&doc, path!["shows", "current", "name"]).is_some(),
                "doc: {doc}"
            );
        }
    }

    #[test]
    fn final_values_keep_zero_and_false() {
        let doc = json!({"listeners": 0, "live": false, "gone": null});
        assert_eq!(
            extract(&doc, path!["listeners"]).listeners(),
            Some("0 listeners".to_string())
        );
        assert_eq!(extract(&doc, path!["live"]).as_bool(), Some(false));
        assert!(!extract(&doc, path!["gone"]).is_some());
    }

    #[test]
    fn out_of_range_index_is_none() {
        let doc = json!({"songs": []});
        assert_eq!(extract(&doc, path!["songs", 0, "title"]).text(), None);
    }

    #[test]
    fn listener_pluralization() {
        assert_eq!(listeners(1), "1 listener");
        assert_eq!(listeners(0), "0 listeners");
        assert_eq!(listeners(2), "2 listeners");
    }

    #[test]
    fn numbers_render_as_text() {
        let doc = json!({"year": 1999, "empty": "  "});
        assert_eq!(extract(&doc, path!["year"]).text(), Some("1999".to_string()));
        assert_eq!(extract(&doc, path!["empty"]).text(), None);
    }

    #[test]
    fn join_and_collect_sub_paths() {
        let doc = json!({"moods": [{"value": "Warm"}, {"value": "Dubby"}, {"other": 1}]});
        assert_eq!(
            extract(&doc, path!["moods"]).join(path!["value"]),
            Some("Warm, Dubby".to_string())
        );
        let genres = json!({"genres": ["Jazz", "Ambient"]});
        assert_eq!(
            extract(&genres, path!["genres"]).collect(&[]),
            Some(vec!["Jazz".to_string(), "Ambient".to_string()])
        );
        let empty = json!({"moods": [{"other": 1}]});
        assert_eq!(extract(&empty, path!["moods"]).join(path!["value"]), None);
    }

    #[test]
    fn shorten_and_abridge_cut_long_text() {
        let long = "a".repeat(50);
        assert_eq!(shorten(&long), format!("{}...", "a".repeat(41)));
        assert_eq!(abridge(&long), format!("{}...", "a".repeat(44)));
        assert_eq!(shorten(&"b".repeat(44)), "b".repeat(44));
    }

    #[test]
    fn descriptions_pair_long_and_short() {
        let (long, short) = descriptions(Some("<p>Short one</p>"));
        assert_eq!(long.as_deref(), Some("Short one"));
        assert_eq!(short.as_deref(), Some("Short one"));
        assert_eq!(descriptions(Some("<br>")), (None, None));
    }
}
