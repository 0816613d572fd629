use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tap_core::errors::TapError;
use validator::Validate;

/// Field errors collected while checking a payload, keyed by field path.
/// Whole-payload problems go under `_schema`.
#[derive(Default)]
pub struct SchemaErrors {
    map: Map<String, Value>,
}

impl SchemaErrors {
    pub fn push_schema(&mut self, msg: impl Into<String>) {
        Self::push_to(&mut self.map, "_schema", msg);
    }

    pub fn push_field(&mut self, field: &str, msg: impl Into<String>) {
        Self::push_to(&mut self.map, field, msg);
    }

    fn push_to(map: &mut Map<String, Value>, key: &str, msg: impl Into<String>) {
        let msg = Value::String(msg.into());
        match map.get_mut(key) {
            Some(Value::Array(arr)) => arr.push(msg),
            _ => {
                map.insert(key.to_string(), Value::Array(vec![msg]));
            }
        }
    }

    pub fn into_unprocessable_anyhow(self, message: &str) -> anyhow::Error {
        TapError::unprocessable(message)
            .with_errors(Value::Object(self.map))
            .into_anyhow()
    }
}

/// Shortcut for a single-field 422.
pub fn field_error(message: &str, field: &str, msg: impl Into<String>) -> anyhow::Error {
    let mut errors = SchemaErrors::default();
    errors.push_field(field, msg);
    errors.into_unprocessable_anyhow(message)
}

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "length" => Some("has invalid length"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut SchemaErrors, prefix: &str, errs: &validator::ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(|m| m.to_string()))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push_field(&key, msg);
                }
            }
            validator::ValidationErrorsKind::Struct(struct_errs) => {
                let next = join_path(prefix, field);
                push_validation_errors(out, &next, struct_errs.as_ref());
            }
            validator::ValidationErrorsKind::List(list_errs) => {
                let base = join_path(prefix, field);
                for (idx, nested) in list_errs {
                    let next = format!("{base}[{idx}]");
                    push_validation_errors(out, &next, nested.as_ref());
                }
            }
        }
    }
}

/// Parse `data` into `T` and run its `validator` rules.
///
/// Shape errors land under `_schema`, rule failures under their field path;
/// both come back as a 422 `TapError` inside `anyhow::Error`.
pub fn validate<T>(data: &Value, error_message: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone()).map_err(|e| {
        let mut out = SchemaErrors::default();
        out.push_schema(e.to_string());
        out.into_unprocessable_anyhow(error_message)
    })?;

    parsed.validate().map_err(|e| {
        let mut out = SchemaErrors::default();
        push_validation_errors(&mut out, "", &e);
        out.into_unprocessable_anyhow(error_message)
    })?;

    Ok(parsed)
}
