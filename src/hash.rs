//! Deterministic cache keys for argument tuples
//!
//! Arguments are serialized with `serde_json` and re-emitted in a canonical
//! form: map keys are sorted lexicographically at every nesting level, arrays
//! keep their order, and non-finite floats and `None` both become `null`.
//! Tuples serialize as arrays, so `hash(&(1, "seven"))` is `[1,"seven"]`.

use crate::cache::CacheKey;
use crate::error::HashError;
use serde::Serialize;
use serde_json::Value;

/// Hash an argument tuple into a stable string key
pub fn hash<A>(args: &A) -> Result<CacheKey, HashError>
where
    A: Serialize + ?Sized,
{
    let value = serde_json::to_value(args)?;
    let mut key = String::new();
    write_canonical(&value, &mut key);
    Ok(key)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Value's Display produces escaped compact JSON
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
