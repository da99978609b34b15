//! Response envelope for the administrative surface.
//!
//! Success wraps the payload as `{"data": …}`; failure as
//! `{"error": {status, code, description, extra?}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::CustodyError;

/// Error code for request data with an invalid field.
pub const CODE_BAD_DATA: u16 = 10002;
/// Error code for an exhausted application pool.
pub const CODE_OUT_OF_CAPACITY: u16 = 10004;

/// Structured error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorView {
    /// HTTP status the transport should answer with.
    pub status: u16,
    pub code: u16,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Top-level response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseView<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorView>,
}

impl<T> ResponseView<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn error(err: &CustodyError) -> Self {
        Self {
            data: None,
            error: Some(ErrorView::from(err)),
        }
    }

    /// HTTP status for this response.
    pub fn status(&self) -> u16 {
        self.error.as_ref().map_or(200, |e| e.status)
    }
}

impl From<&CustodyError> for ErrorView {
    fn from(err: &CustodyError) -> Self {
        match err {
            CustodyError::InvalidPayload { field, reason } => Self {
                status: 202,
                code: CODE_BAD_DATA,
                description: "The request data has invalid field.".into(),
                extra: Some(json!({ "field": field, "reason": reason })),
            },
            CustodyError::BadRequest { .. } => Self {
                status: 202,
                code: 400,
                description: "The request body can't be parsed as valid data.".into(),
                extra: None,
            },
            CustodyError::NodeNotFound { .. } => Self {
                status: 202,
                code: 404,
                description: "The custody node is not found.".into(),
                extra: None,
            },
            CustodyError::OutOfCapacity => Self {
                status: 202,
                code: CODE_OUT_OF_CAPACITY,
                description: "No unassigned application remains.".into(),
                extra: None,
            },
            // Storage and upstream failures surface as a plain server error.
            _ => Self {
                status: 500,
                code: 500,
                description: "Internal Server Error".into(),
                extra: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_envelope_shape() {
        let view = ResponseView::data(vec![1, 2]);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json, json!({ "data": [1, 2] }));
        assert_eq!(view.status(), 200);
    }

    #[test]
    fn invalid_payload_carries_field() {
        let err = CustodyError::invalid_payload("signer", "not existing");
        let view: ResponseView<()> = ResponseView::error(&err);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["error"]["code"], 10002);
        assert_eq!(json["error"]["status"], 202);
        assert_eq!(json["error"]["extra"]["field"], "signer");
        assert_eq!(json["error"]["extra"]["reason"], "not existing");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn transaction_error_renders_as_500() {
        let view = ErrorView::from(&CustodyError::transaction("disk I/O error"));
        assert_eq!(view.status, 500);
        assert_eq!(view.code, 500);
        assert!(view.extra.is_none());
        assert!(!view.description.contains("disk"));
    }

    #[test]
    fn out_of_capacity_code() {
        let view = ErrorView::from(&CustodyError::OutOfCapacity);
        assert_eq!(view.code, CODE_OUT_OF_CAPACITY);
    }
}
