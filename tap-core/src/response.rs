use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::TapError;

/// Response envelope: `{"statusCode": 200, "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub data: Value,
}

impl Response {
    pub fn new(status_code: u16, data: Value) -> Self {
        Self { status_code, data }
    }

    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }

    pub fn message(status_code: u16, message: &str) -> Self {
        Self::new(status_code, json!({ "message": message }))
    }

    /// Error envelope. Only the client-safe part of the error is kept:
    /// `{"message": ...}` plus `errors` when the error carries field details.
    pub fn from_error(err: &TapError) -> Self {
        let safe = err.sanitize_for_client();
        let mut data = json!({ "message": safe.message });
        if let Some(errors) = &safe.errors {
            data["errors"] = errors.clone();
        }
        Self::new(safe.code(), data)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// `data.message`, when the payload is a message object.
    pub fn message_text(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}
