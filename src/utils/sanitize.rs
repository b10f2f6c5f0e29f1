use serde_json::Value;

/// Masks credentials in JSON payloads before they are logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password"
            | "newpassword"
            | "confirmpassword"
            | "token"
            | "accesstoken"
            | "refreshtoken"
            | "authorization"
            | "secret"
            | "otp"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        // Long tokens keep their first and last four characters so log lines
        // can still be correlated.
        Value::String(s) if s.chars().count() > 16 => {
            let head: String = s.chars().take(4).collect();
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            Value::String(format!("{head}****{tail}"))
        }
        _ => Value::String("****".to_string()),
    }
}
