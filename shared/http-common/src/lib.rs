//! Shared HTTP utilities for the Member Vault workspace.
//!
//! Framework-agnostic error body, tracking ids and route helpers used by the
//! api-server.

use serde::Serialize;

/// Base path of the member resource.
pub const MEMBER_ROUTE: &str = "/api/v1/member";

/// Message returned for unexpected failures outside development.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please contact support.";

// ============================================================================
// Error Body
// ============================================================================

/// JSON error body returned for every failed request.
///
/// Serializes as `{"error", "trackingId"?, "stackTrace"?, "statusCode", "errors"?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldErrorBody>,
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            tracking_id: None,
            stack_trace: None,
            status_code,
            errors: Vec::new(),
        }
    }

    pub fn with_tracking_id(mut self, id: impl Into<String>) -> Self {
        self.tracking_id = Some(id.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn with_field_errors<I>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.errors = errors
            .into_iter()
            .map(|(field, message)| FieldErrorBody { field, message })
            .collect();
        self
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Fresh opaque correlation token for an unexpected failure.
pub fn generate_tracking_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `Location` value for a member resource.
pub fn member_location(id: i64) -> String {
    format!("{}/{}", MEMBER_ROUTE, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(ErrorBody::new(404, "Member with ID 1 was not found."))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "Member with ID 1 was not found.", "statusCode": 404})
        );
    }

    #[test]
    fn full_body_uses_camel_case() {
        let body = ErrorBody::new(500, UNEXPECTED_ERROR_MESSAGE)
            .with_tracking_id("abc")
            .with_stack_trace("trace");
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["trackingId"], "abc");
        assert_eq!(json["stackTrace"], "trace");
        assert_eq!(json["statusCode"], 500);
    }

    #[test]
    fn field_errors_are_listed() {
        let body = ErrorBody::new(400, "validation failed")
            .with_field_errors(vec![("name".to_string(), "Name is required.".to_string())]);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["errors"][0]["field"], "name");
        assert_eq!(json["errors"][0]["message"], "Name is required.");
    }

    #[test]
    fn tracking_ids_are_unique() {
        assert_ne!(generate_tracking_id(), generate_tracking_id());
    }

    #[test]
    fn location_points_at_member() {
        assert_eq!(member_location(7), "/api/v1/member/7");
    }
}
