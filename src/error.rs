//! Error types for the New Relic provider.
//!
//! Two layers exist: [`ApiError`] describes what went wrong talking to
//! NerdGraph, and [`ProviderError`] is what every provider operation returns.
//! Both can be rendered into user-facing [`Diagnostic`]s.

use serde::Deserialize;
use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while running a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Client-side validation rejected the input before any API call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider is missing configuration or was configured incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A resource ID could not be parsed.
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upstream API returned an error.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A polling operation did not converge before its timeout.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation not supported by this resource.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// One or more error diagnostics were produced.
    #[error("{} error diagnostic(s): {}", .0.len(), summaries(.0))]
    Diagnostics(Vec<Diagnostic>),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::InvalidId(msg)
            | Self::DeadlineExceeded(msg)
            | Self::Unimplemented(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Api(err) => err.to_string(),
            Self::Diagnostics(diags) => summaries(diags),
        }
    }

    /// Whether this error means the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Render the error as diagnostics, one per upstream error where possible.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::Api(ApiError::GraphQl(errors)) => errors
                .into_iter()
                .map(|e| Diagnostic::error(e.message))
                .collect(),
            Self::Api(ApiError::Payload(errors)) => errors
                .into_iter()
                .map(|e| {
                    let diag = Diagnostic::error(e.message);
                    if e.kind.is_empty() {
                        diag
                    } else {
                        diag.with_detail(e.kind)
                    }
                })
                .collect(),
            Self::Diagnostics(diags) => diags,
            other => vec![Diagnostic::error(other.message())],
        }
    }
}

impl From<Vec<Diagnostic>> for ProviderError {
    fn from(diags: Vec<Diagnostic>) -> Self {
        Self::Diagnostics(diags)
    }
}

fn summaries(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(|d| d.summary.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by the NerdGraph client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request could not be sent or its body not read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// NerdGraph answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The API key was rejected.
    #[error("unauthorized (HTTP {0}): check the configured API key")]
    Unauthorized(u16),

    /// The requested object does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The response carried a top-level GraphQL `errors` array.
    #[error("{}", graphql_messages(.0))]
    GraphQl(Vec<GraphQlError>),

    /// A mutation payload reported errors alongside an otherwise successful response.
    #[error("{}", payload_messages(.0))]
    Payload(Vec<PayloadError>),

    /// The response did not contain the expected data.
    #[error("response is missing {0}")]
    MissingData(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether the error means the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Http { status, .. } => *status == 404,
            Self::GraphQl(errors) => errors.iter().any(GraphQlError::is_not_found),
            Self::Payload(errors) => errors
                .iter()
                .any(|e| e.kind.contains("NOT_FOUND") || mentions_not_found(&e.message)),
            _ => false,
        }
    }
}

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphQlError {
    /// Human readable message.
    pub message: String,
    /// Optional error classification.
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

/// NerdGraph error classification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlErrorExtensions {
    /// Error class such as `NOT_FOUND`.
    #[serde(default)]
    pub error_class: Option<String>,
}

impl GraphQlError {
    /// Build an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }

    fn is_not_found(&self) -> bool {
        let classified = self
            .extensions
            .as_ref()
            .and_then(|ext| ext.error_class.as_deref())
            .is_some_and(|class| class == "NOT_FOUND");
        classified || mentions_not_found(&self.message)
    }
}

/// An error reported inside a mutation payload (`payload.errors`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayloadError {
    /// Error message. Some mutations call this field `description`.
    #[serde(alias = "description", default, deserialize_with = "crate::client::null_as_default")]
    pub message: String,
    /// Error type code.
    #[serde(rename = "type", default, deserialize_with = "crate::client::null_as_default")]
    pub kind: String,
}

impl PayloadError {
    /// Build a payload error.
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }
}

fn mentions_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not found") || lower.contains("does not exist")
}

fn graphql_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn payload_messages(errors: &[PayloadError]) -> String {
    errors
        .iter()
        .map(|e| {
            if e.kind.is_empty() {
                e.message.clone()
            } else {
                format!("{}: {}", e.kind, e.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("policy 123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: policy 123");

        let err = ProviderError::UnknownResource("newrelic_dashboard".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: newrelic_dashboard"
        );

        let err = ProviderError::Api(ApiError::Http {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(format!("{}", err), "API error: HTTP 500: boom");
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::InvalidId("unable to parse ID 12".to_string());
        assert_eq!(err.message(), "unable to parse ID 12");

        let err = ProviderError::Configuration("api_key is required".to_string());
        assert_eq!(err.message(), "api_key is required");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ProviderError::NotFound("x".into()).is_not_found());
        assert!(ApiError::Http {
            status: 404,
            body: String::new()
        }
        .is_not_found());
        assert!(ApiError::GraphQl(vec![GraphQlError::new("Policy does not exist")]).is_not_found());
        assert!(ApiError::GraphQl(vec![GraphQlError {
            message: "gone".into(),
            extensions: Some(GraphQlErrorExtensions {
                error_class: Some("NOT_FOUND".into()),
            }),
        }])
        .is_not_found());
        assert!(!ApiError::GraphQl(vec![GraphQlError::new("Access denied")]).is_not_found());
        assert!(!ProviderError::Validation("bad".into()).is_not_found());
    }

    #[test]
    fn test_graphql_errors_become_one_diagnostic_each() {
        let err = ProviderError::Api(ApiError::GraphQl(vec![
            GraphQlError::new("first"),
            GraphQlError::new("second"),
        ]));
        let diags = err.into_diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].summary, "first");
        assert_eq!(diags[1].summary, "second");
        assert!(diags
            .iter()
            .all(|d| d.severity == DiagnosticSeverity::Error));
    }

    #[test]
    fn test_payload_errors_keep_type_as_detail() {
        let err = ProviderError::Api(ApiError::Payload(vec![PayloadError::new(
            "Invalid NRQL",
            "INVALID_NRQL",
        )]));
        let diags = err.into_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid NRQL");
        assert_eq!(diags[0].detail.as_deref(), Some("INVALID_NRQL"));
    }

    #[test]
    fn test_payload_error_accepts_description_field() {
        let err: PayloadError =
            serde_json::from_str(r#"{"description": "bad name", "type": "INVALID"}"#).unwrap();
        assert_eq!(err.message, "bad name");
        assert_eq!(err.kind, "INVALID");
    }
}
