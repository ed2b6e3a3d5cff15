//! NerdGraph (GraphQL) client.
//!
//! A thin wrapper over `reqwest` that posts GraphQL documents to the regional
//! NerdGraph endpoint. Domain-specific calls live in the submodules as
//! additional `impl NerdGraphClient` blocks.

pub mod accounts;
pub mod alerts;
pub mod authorization;
pub mod cloud;
pub mod entities;
pub mod logconfigurations;
pub mod notifications;
pub mod synthetics;
pub mod workflows;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Certificate, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::error::{ApiError, GraphQlError, PayloadError, ProviderError};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Api-Key";

/// Header scoping a request to a single account.
pub const ACCOUNT_ID_HEADER: &str = "X-Account-ID";

/// Maximum length of a response body kept in errors and logs.
const MAX_LOG_BODY_LENGTH: usize = 200;

static OPERATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:query|mutation)\b[^{]*\{\s*(\w+)").expect("static pattern compiles")
});

/// Connection settings for [`NerdGraphClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Full GraphQL endpoint URL.
    pub endpoint: String,
    /// User API key.
    pub api_key: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Accept invalid TLS certificates.
    pub insecure_skip_verify: bool,
    /// Additional PEM-encoded root certificate.
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Maximum number of requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientOptions {
    /// Options for `endpoint` with defaults for everything else.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            user_agent: format!("newrelic-provider/{}", env!("CARGO_PKG_VERSION")),
            insecure_skip_verify: false,
            ca_cert_pem: None,
            max_concurrent_requests: 10,
            timeout: Duration::from_secs(60),
        }
    }
}

/// A NerdGraph client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct NerdGraphClient {
    http: Client,
    endpoint: String,
    api_key: String,
    account_header: Option<i64>,
    limiter: Arc<Semaphore>,
}

impl fmt::Debug for NerdGraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NerdGraphClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("account_header", &self.account_header)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<GraphQlError>,
}

impl NerdGraphClient {
    /// Build a client from `options`.
    pub fn new(options: ClientOptions) -> Result<Self, ProviderError> {
        let mut builder = Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify);

        if let Some(pem) = &options.ca_cert_pem {
            let cert = Certificate::from_pem(pem).map_err(|e| {
                ProviderError::Configuration(format!("invalid CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|e| {
            ProviderError::Configuration(format!("failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            http,
            endpoint: options.endpoint,
            api_key: options.api_key,
            account_header: None,
            limiter: Arc::new(Semaphore::new(options.max_concurrent_requests.max(1))),
        })
    }

    /// The GraphQL endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// A copy of this client that sends the `X-Account-ID` header.
    ///
    /// Non-positive account IDs leave the client unscoped.
    pub fn scoped_to_account(&self, account_id: i64) -> Self {
        let mut scoped = self.clone();
        scoped.account_header = (account_id > 0).then_some(account_id);
        scoped
    }

    /// Post a GraphQL document and return its `data` member.
    pub async fn execute(&self, document: &str, variables: Value) -> Result<Value, ApiError> {
        let _permit = self.limiter.acquire().await.ok();
        let operation = operation_name(document);
        debug!(endpoint = %self.endpoint, operation, account = ?self.account_header, "POST NerdGraph");

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "query": document, "variables": variables }));
        if let Some(account_id) = self.account_header {
            request = request.header(ACCOUNT_ID_HEADER, account_id.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!(operation, status = status.as_u16(), "NerdGraph rejected the API key");
            return Err(ApiError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = sanitize_for_log(&body);
            error!(operation, status = status.as_u16(), body = %body, "NerdGraph request failed");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlResponse = serde_json::from_str(&body)?;
        if !envelope.errors.is_empty() {
            debug!(operation, errors = envelope.errors.len(), "NerdGraph returned errors");
            return Err(ApiError::GraphQl(envelope.errors));
        }
        Ok(envelope.data)
    }

    /// Run a document and decode the value at JSON `pointer` inside `data`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        pointer: &str,
    ) -> Result<T, ApiError> {
        self.query_optional(document, variables, pointer)
            .await?
            .ok_or_else(|| ApiError::MissingData(pointer.to_string()))
    }

    /// Like [`query`](Self::query), but a missing or null value yields `None`.
    pub async fn query_optional<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
        pointer: &str,
    ) -> Result<Option<T>, ApiError> {
        let mut data = self.execute(document, variables).await?;
        match data.pointer_mut(pointer).map(Value::take) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

/// Deserialize `null` as the type's default; NerdGraph returns `null` for empty lists.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Turn mutation payload errors into an [`ApiError::Payload`].
pub(crate) fn check_payload(errors: Vec<PayloadError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Payload(errors))
    }
}

/// Name of the first field selected by a GraphQL document, for logging.
fn operation_name(document: &str) -> &str {
    OPERATION_NAME
        .captures(document)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("anonymous")
}

/// Truncate a response body and drop control characters.
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name() {
        assert_eq!(
            operation_name("mutation($a: Int!) { alertsPolicyCreate(accountId: $a) { id } }"),
            "alertsPolicyCreate"
        );
        assert_eq!(
            operation_name("query { actor { organization { id } } }"),
            "actor"
        );
        assert_eq!(operation_name("{ actor { user { id } } }"), "anonymous");
    }

    #[test]
    fn test_sanitize_for_log() {
        assert_eq!(sanitize_for_log("short\nbody"), "shortbody");

        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_scoped_to_account() {
        let client =
            NerdGraphClient::new(ClientOptions::new("http://localhost/graphql", "key")).unwrap();
        assert_eq!(client.scoped_to_account(123).account_header, Some(123));
        assert_eq!(client.scoped_to_account(0).account_header, None);
        assert_eq!(client.scoped_to_account(-1).account_header, None);
        assert_eq!(client.account_header, None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client =
            NerdGraphClient::new(ClientOptions::new("http://localhost/graphql", "NRAK-SECRET"))
                .unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("NRAK-SECRET"));
        assert!(rendered.contains("<redacted>"));
    }
}
