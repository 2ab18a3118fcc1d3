//! Normalisation of upstream records into plain JSON.
//!
//! The wire format encodes content identifiers as `{"$link": "bafy..."}` and
//! raw bytes as `{"$bytes": "..."}`. Callers only ever see the string form.

use serde_json::{Map, Value};

const LINK_KEY: &str = "$link";
const BYTES_KEY: &str = "$bytes";

/// Recursively replaces every `$link` / `$bytes` object with its payload
/// string. Everything else (null, bool, number, string, array, plain
/// object) keeps its structure.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => match special_form(&map) {
            Some(flat) => Value::String(flat),
            None => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        },
        primitive => primitive,
    }
}

fn special_form(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 1 {
        return None;
    }

    let (key, payload) = map.iter().next()?;
    if key != LINK_KEY && key != BYTES_KEY {
        return None;
    }

    Some(match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

    #[test]
    fn plain_structures_are_unchanged() {
        let v = json!({
            "handle": "alice.test",
            "postsCount": 12,
            "labels": [],
            "viewer": { "muted": false, "blocking": null },
            "nested": [[1, 2], { "a": { "b": "c" } }]
        });
        assert_eq!(sanitize(v.clone()), v);
    }

    #[test]
    fn link_objects_become_strings_at_every_depth() {
        let v = json!({
            "cid": { "$link": CID },
            "labels": [{ "src": "did:plc:x", "cid": { "$link": CID } }],
            "deep": { "a": { "b": [{ "$link": CID }] } }
        });

        let out = sanitize(v);

        assert_eq!(out["cid"], json!(CID));
        assert_eq!(out["labels"][0]["cid"], json!(CID));
        assert_eq!(out["labels"][0]["src"], json!("did:plc:x"));
        assert_eq!(out["deep"]["a"]["b"][0], json!(CID));
    }

    #[test]
    fn blob_refs_keep_their_shape_but_flatten_the_link() {
        let v = json!({
            "$type": "blob",
            "ref": { "$link": CID },
            "mimeType": "image/jpeg",
            "size": 1024
        });

        let out = sanitize(v);
        assert_eq!(
            out,
            json!({ "$type": "blob", "ref": CID, "mimeType": "image/jpeg", "size": 1024 })
        );
    }

    #[test]
    fn bytes_and_non_string_payloads_are_stringified() {
        assert_eq!(sanitize(json!({ "$bytes": "aGVsbG8" })), json!("aGVsbG8"));
        assert_eq!(sanitize(json!({ "$link": 7 })), json!("7"));
    }

    #[test]
    fn object_with_link_and_other_keys_is_plain() {
        let v = json!({ "$link": CID, "extra": true });
        assert_eq!(sanitize(v.clone()), v);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let v = json!({ "a": [{ "$link": CID }, { "b": { "$bytes": "AA" } }] });
        let once = sanitize(v);
        assert_eq!(sanitize(once.clone()), once);
    }
}
