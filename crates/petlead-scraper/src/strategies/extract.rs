//! Turning JSON store-locator payloads into flat string records.
//!
//! Locator endpoints disagree on where the store array lives, so the array is
//! looked up by an explicit key path when configured, and otherwise among the
//! keys these endpoints commonly use. Every store object is flattened without
//! renaming or dropping anything.

use petlead_core::{Provenance, StoreRecord};
use serde_json::Value;

use crate::error::FetchError;

/// Keys that commonly hold the store array.
const RECORD_KEYS: [&str; 9] = [
    "stores",
    "stockists",
    "dealers",
    "shops",
    "partners",
    "locations",
    "data",
    "results",
    "items",
];

/// Next.js data routes nest page data one level down.
const NESTED_CONTAINERS: [&str; 2] = ["pageProps", "props"];

/// Find the store array in `body`.
pub(crate) fn locate_records<'a>(
    body: &'a Value,
    records_path: Option<&str>,
) -> Result<&'a [Value], FetchError> {
    if let Some(path) = records_path {
        let mut current = body;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = current.get(segment).ok_or_else(|| {
                FetchError::Incompatible(format!("records_path '{path}': no key '{segment}'"))
            })?;
        }
        return current.as_array().map(Vec::as_slice).ok_or_else(|| {
            FetchError::Incompatible(format!("records_path '{path}' is not an array"))
        });
    }

    if let Some(items) = body.as_array() {
        return Ok(items);
    }

    let object = body
        .as_object()
        .ok_or_else(|| FetchError::Incompatible("response is neither array nor object".into()))?;

    let candidates = std::iter::once(object).chain(
        NESTED_CONTAINERS
            .iter()
            .filter_map(|key| object.get(*key).and_then(Value::as_object)),
    );
    for container in candidates {
        for key in RECORD_KEYS {
            if let Some(items) = container.get(key).and_then(Value::as_array) {
                return Ok(items);
            }
            if let Some(items) = container
                .get(key)
                .and_then(Value::as_object)
                .and_then(|inner| {
                    RECORD_KEYS
                        .iter()
                        .find_map(|k| inner.get(*k).and_then(Value::as_array))
                })
            {
                return Ok(items);
            }
        }
    }

    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    Err(FetchError::Incompatible(format!(
        "no store array found; top-level keys: [{}]",
        keys.join(", ")
    )))
}

/// Flatten every store object into a record with `provenance`.
///
/// Non-object entries are skipped.
pub(crate) fn to_records(items: &[Value], provenance: &Provenance) -> Vec<StoreRecord> {
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let mut fields = Vec::new();
            for (key, value) in object {
                flatten(key, value, &mut fields);
            }
            Some(
                fields
                    .into_iter()
                    .fold(StoreRecord::new(provenance.clone()), |record, (k, v)| {
                        record.with_field(k, v)
                    }),
            )
        })
        .collect()
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                flatten(&format!("{prefix}.{key}"), inner, out);
            }
        }
        Value::Array(items) if items.iter().all(is_scalar) => {
            let joined = items
                .iter()
                .map(scalar_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            out.push((prefix.to_string(), joined));
        }
        Value::Array(_) => out.push((prefix.to_string(), value.to_string())),
        scalar => out.push((prefix.to_string(), scalar_text(scalar))),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use petlead_core::SearchQuery;
    use serde_json::json;

    use super::*;

    fn provenance() -> Provenance {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Provenance::for_query("Josera", &SearchQuery::nationwide(50), at)
    }

    #[test]
    fn top_level_array_is_used() {
        let body = json!([{"name": "A"}, {"name": "B"}]);
        assert_eq!(locate_records(&body, None).unwrap().len(), 2);
    }

    #[test]
    fn finds_array_under_known_key() {
        let body = json!({"status": "ok", "dealers": [{"name": "A"}]});
        assert_eq!(locate_records(&body, None).unwrap().len(), 1);
    }

    #[test]
    fn finds_array_under_next_page_props() {
        let body = json!({"pageProps": {"shops": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}});
        assert_eq!(locate_records(&body, None).unwrap().len(), 3);
    }

    #[test]
    fn finds_array_one_level_inside_known_key() {
        let body = json!({"data": {"items": [{"name": "A"}]}});
        assert_eq!(locate_records(&body, None).unwrap().len(), 1);
    }

    #[test]
    fn skips_non_array_known_key_inside_container() {
        let body = json!({"data": {"data": "v2", "results": [{"name": "A"}, {"name": "B"}]}});
        assert_eq!(locate_records(&body, None).unwrap().len(), 2);
    }

    #[test]
    fn explicit_path_wins() {
        let body = json!({"stores": [], "payload": {"retailers": [{"name": "A"}]}});
        let items = locate_records(&body, Some("payload.retailers")).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn explicit_path_missing_is_incompatible() {
        let body = json!({"payload": {}});
        let err = locate_records(&body, Some("payload.retailers")).unwrap_err();
        assert!(matches!(err, FetchError::Incompatible(ref m) if m.contains("retailers")));
    }

    #[test]
    fn unknown_shape_is_incompatible() {
        let body = json!({"html": "<div>...</div>"});
        let err = locate_records(&body, None).unwrap_err();
        assert!(matches!(err, FetchError::Incompatible(ref m) if m.contains("html")));
        assert!(!err.is_transient());
    }

    #[test]
    fn flattens_nested_values_without_renaming() {
        let items = vec![json!({
            "name": " Futterhaus ",
            "address": {"street": "Maximilianstr. 12", "zip": "80539", "city": "München"},
            "lat": 48.139,
            "open": true,
            "fax": null,
            "brands": ["Bozita", "Mera"],
            "hours": [{"day": "Mo", "from": "9"}]
        })];
        let records = to_records(&items, &provenance());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("name"), Some("Futterhaus"));
        assert_eq!(r.get("address.street"), Some("Maximilianstr. 12"));
        assert_eq!(r.get("address.city"), Some("München"));
        assert_eq!(r.get("lat"), Some("48.139"));
        assert_eq!(r.get("open"), Some("true"));
        assert_eq!(r.get("fax"), Some(""));
        assert_eq!(r.get("brands"), Some("Bozita, Mera"));
        assert_eq!(r.get("hours"), Some(r#"[{"day":"Mo","from":"9"}]"#));
        assert_eq!(r.provenance.source_website, "Josera");
    }

    #[test]
    fn skips_non_object_entries() {
        let items = vec![json!("header"), json!({"name": "A"})];
        assert_eq!(to_records(&items, &provenance()).len(), 1);
    }
}
