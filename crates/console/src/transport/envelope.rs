//! The standard `{success, code, message, data}` response wrapper.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ApiError;

/// Code the server uses for successful envelopes.
pub const OK_CODE: &str = "OK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            code: OK_CODE.to_string(),
            message: "Request successful".to_string(),
            data: Some(data),
        }
    }

    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Turn a `success: false` envelope into [`ApiError::Envelope`].
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ApiError::Envelope {
                code: self.code,
                message: self.message,
            })
        }
    }
}

/// Decode a body declared as enveloped.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(format!("expected envelope: {e}")))
}

/// Best-effort peek at an error body: `(code, message)` when it is an
/// envelope, otherwise the trimmed text.
pub(crate) fn describe_error_body(body: &[u8]) -> (Option<String>, String) {
    if let Ok(env) = serde_json::from_slice::<Envelope<serde_json::Value>>(body) {
        let code = (!env.code.is_empty()).then_some(env.code);
        return (code, env.message);
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    let message: String = text.chars().take(200).collect();
    (None, message)
}
