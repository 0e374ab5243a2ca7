//! Management API JSON → [`StatRecord`] conversion.

use serde_json::{Map, Value};

use hutch_core::{FetchError, StatRecord};

/// Decode a management API list response (a JSON array of objects).
pub fn records_from_json(
    domain: &str,
    body: &[u8],
    label_keys: &[&str],
) -> Result<Vec<StatRecord>, FetchError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| FetchError::Decode {
        domain: domain.to_string(),
        reason: e.to_string(),
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(FetchError::Decode {
                domain: domain.to_string(),
                reason: format!("expected a JSON array, got {}", kind(&other)),
            });
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => Ok(record_from_object(obj, label_keys)),
            other => Err(FetchError::Decode {
                domain: domain.to_string(),
                reason: format!("expected array elements to be objects, got {}", kind(other)),
            }),
        })
        .collect()
}

/// Flatten one API object. Every key in `label_keys` ends up in the
/// record's labels, as `""` when the object has no string value for it.
pub fn record_from_object(obj: &Map<String, Value>, label_keys: &[&str]) -> StatRecord {
    let mut record = StatRecord::new();

    for label in label_keys {
        let value = match obj.get(*label) {
            Some(Value::String(s)) => s.as_str(),
            _ => "",
        };
        record.labels.insert(label.to_string(), value.to_string());
    }

    flatten_metrics("", obj, &mut record);
    record
}

fn flatten_metrics(prefix: &str, obj: &Map<String, Value>, record: &mut StatRecord) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    record.metrics.insert(name, v);
                }
            }
            Value::Bool(b) => {
                record.metrics.insert(name, if *b { 1.0 } else { 0.0 });
            }
            Value::Object(nested) => flatten_metrics(&name, nested, record),
            Value::String(_) | Value::Array(_) | Value::Null => {}
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
