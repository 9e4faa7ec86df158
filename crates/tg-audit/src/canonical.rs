// canonical.rs — Deterministic JSON serialization.
//
// Receipt hashes must be reproducible from a record's fields alone, so the
// bytes that get hashed cannot depend on struct field order or on how the
// JSON map type happens to be configured. The canonical form is:
//
//   - object keys sorted lexicographically (by UTF-8 bytes), recursively
//   - array order preserved
//   - no insignificant whitespace
//   - strings and numbers rendered exactly as serde_json renders them

use serde_json::Value;

/// Render a JSON value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, bools and numbers have a single rendering.
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Serializing a &str cannot fail.
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let v = json!({ "b": 1, "a": { "z": true, "m": null } });
        assert_eq!(canonical_json(&v), r#"{"a":{"m":null,"z":true},"b":1}"#);
    }

    #[test]
    fn array_order_is_preserved() {
        let v = json!([3, 1, { "b": 2, "a": 1 }]);
        assert_eq!(canonical_json(&v), r#"[3,1,{"a":1,"b":2}]"#);
    }

    #[test]
    fn strings_are_escaped() {
        let v = json!({ "q": "say \"hi\"\n" });
        assert_eq!(canonical_json(&v), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn canonical_form_parses_back_to_same_value() {
        let v = json!({ "n": -1.5, "s": "ü", "list": [null, false] });
        let parsed: Value = serde_json::from_str(&canonical_json(&v)).unwrap();
        assert_eq!(parsed, v);
    }
}
