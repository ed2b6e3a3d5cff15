//! Provider configuration.
//!
//! Raw configuration arrives as JSON, is decoded into [`ProviderConfigInput`],
//! topped up from `NEW_RELIC_*` environment variables and resolved into an
//! immutable [`ProviderConfig`] shared by every resource operation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{ClientOptions, NerdGraphClient};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Environment variable holding the default account ID.
pub const ENV_ACCOUNT_ID: &str = "NEW_RELIC_ACCOUNT_ID";
/// Environment variable holding the user API key.
pub const ENV_API_KEY: &str = "NEW_RELIC_API_KEY";
/// Environment variable selecting the region.
pub const ENV_REGION: &str = "NEW_RELIC_REGION";
/// Environment variable overriding the NerdGraph URL.
pub const ENV_NERDGRAPH_API_URL: &str = "NEW_RELIC_NERDGRAPH_API_URL";
/// Environment variable disabling TLS verification.
pub const ENV_API_SKIP_VERIFY: &str = "NEW_RELIC_API_SKIP_VERIFY";
/// Environment variable naming an extra PEM root certificate.
pub const ENV_API_CACERT: &str = "NEW_RELIC_API_CACERT";

const DEFAULT_MAX_CONCURRENT_REQUESTS: i64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: i64 = 60;

/// A New Relic data center region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// United States.
    #[default]
    Us,
    /// European Union.
    Eu,
    /// Internal staging.
    Staging,
}

impl Region {
    /// NerdGraph endpoint of the region.
    pub fn nerdgraph_url(&self) -> &'static str {
        match self {
            Region::Us => "https://api.newrelic.com/graphql",
            Region::Eu => "https://api.eu.newrelic.com/graphql",
            Region::Staging => "https://staging-api.newrelic.com/graphql",
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Staging => "Staging",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            "staging" => Ok(Region::Staging),
            other => Err(ProviderError::Configuration(format!(
                "invalid region '{}': expected one of US, EU, Staging",
                other
            ))),
        }
    }
}

/// Provider configuration as written by the user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfigInput {
    /// Default account for resources that do not set their own.
    pub account_id: Option<i64>,
    /// User API key.
    pub api_key: Option<String>,
    /// Region name.
    pub region: Option<String>,
    /// NerdGraph URL override.
    pub nerdgraph_api_url: Option<String>,
    /// Accept invalid TLS certificates.
    pub insecure_skip_verify: Option<bool>,
    /// Path to an extra PEM root certificate.
    pub cacert_file: Option<String>,
    /// Cap on in-flight API calls.
    pub max_concurrent_requests: Option<i64>,
    /// Per-request timeout.
    pub request_timeout_seconds: Option<i64>,
}

impl ProviderConfigInput {
    /// Decode the JSON configuration block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Fill unset attributes from the process environment.
    pub fn with_process_env(self) -> Result<Self, ProviderError> {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Fill unset attributes using `lookup` as the environment.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.account_id.is_none() {
            if let Some(raw) = get(ENV_ACCOUNT_ID) {
                let id = raw.trim().parse::<i64>().map_err(|_| {
                    ProviderError::Configuration(format!(
                        "{} must be an integer, got '{}'",
                        ENV_ACCOUNT_ID, raw
                    ))
                })?;
                self.account_id = Some(id);
            }
        }
        if self.api_key.is_none() {
            self.api_key = get(ENV_API_KEY);
        }
        if self.region.is_none() {
            self.region = get(ENV_REGION);
        }
        if self.nerdgraph_api_url.is_none() {
            self.nerdgraph_api_url = get(ENV_NERDGRAPH_API_URL);
        }
        if self.insecure_skip_verify.is_none() {
            self.insecure_skip_verify = get(ENV_API_SKIP_VERIFY)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"));
        }
        if self.cacert_file.is_none() {
            self.cacert_file = get(ENV_API_CACERT);
        }
        Ok(self)
    }
}

/// Resolved provider configuration shared by all handlers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// NerdGraph client.
    pub client: NerdGraphClient,
    /// Default account ID, `0` when unset.
    pub account_id: i64,
    /// Selected region.
    pub region: Region,
}

impl ProviderConfig {
    /// Assemble a configuration from its parts.
    pub fn new(client: NerdGraphClient, account_id: i64, region: Region) -> Self {
        Self {
            client,
            account_id,
            region,
        }
    }

    /// Resolve user input into a configuration, returning warnings alongside.
    pub fn resolve(input: ProviderConfigInput) -> Result<(Self, Vec<Diagnostic>), ProviderError> {
        let mut diagnostics = Vec::new();

        let api_key = input
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "api_key is required: set it in the provider block or via {}",
                    ENV_API_KEY
                ))
            })?;

        let region = match input.region.as_deref() {
            Some(name) => name.parse::<Region>()?,
            None => Region::default(),
        };

        let endpoint = input
            .nerdgraph_api_url
            .unwrap_or_else(|| region.nerdgraph_url().to_string());

        let mut options = ClientOptions::new(endpoint, api_key);
        options.insecure_skip_verify = input.insecure_skip_verify.unwrap_or(false);
        options.max_concurrent_requests = positive(
            "max_concurrent_requests",
            input
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
        )? as usize;
        options.timeout = Duration::from_secs(positive(
            "request_timeout_seconds",
            input
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )? as u64);

        if let Some(path) = &input.cacert_file {
            let pem = std::fs::read(path).map_err(|e| {
                ProviderError::Configuration(format!("unable to read cacert_file {}: {}", path, e))
            })?;
            options.ca_cert_pem = Some(pem);
        }

        if options.insecure_skip_verify {
            warn!("TLS certificate verification is disabled");
        }

        let account_id = input.account_id.unwrap_or(0);
        if account_id == 0 {
            diagnostics.push(
                Diagnostic::warning("account_id is not set")
                    .with_detail(format!(
                        "Set account_id in the provider block or via {}; otherwise every resource must set its own account_id.",
                        ENV_ACCOUNT_ID
                    ))
                    .with_attribute("account_id"),
            );
        }

        let client = NerdGraphClient::new(options)?;
        debug!(region = %region, endpoint = client.endpoint(), account_id, "provider configuration resolved");

        Ok((Self::new(client, account_id, region), diagnostics))
    }
}

fn positive(name: &str, value: i64) -> Result<i64, ProviderError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ProviderError::Configuration(format!(
            "{} must be greater than zero, got {}",
            name, value
        )))
    }
}

/// Pick the account a resource operates on.
///
/// A non-zero resource-level `account_id` wins; otherwise the provider default
/// is used.
pub fn select_account_id(config: &ProviderConfig, account_id: Option<i64>) -> i64 {
    match account_id {
        Some(id) if id != 0 => id,
        _ => config.account_id,
    }
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Configuration for the New Relic provider.")
        .with_attribute(
            "account_id",
            Attribute::optional_int64()
                .sensitive()
                .with_description("Default account ID. Falls back to NEW_RELIC_ACCOUNT_ID."),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_validator(Validator::NotEmpty)
                .with_description("User API key. Falls back to NEW_RELIC_API_KEY."),
        )
        .with_attribute(
            "region",
            Attribute::optional_string()
                .with_default(serde_json::json!("US"))
                .with_validator(Validator::one_of_ignore_case(&["US", "EU", "Staging"]))
                .with_description("Data center region."),
        )
        .with_attribute(
            "nerdgraph_api_url",
            Attribute::optional_string().with_description("NerdGraph URL override."),
        )
        .with_attribute(
            "insecure_skip_verify",
            Attribute::optional_bool().with_description("Skip TLS certificate verification."),
        )
        .with_attribute(
            "cacert_file",
            Attribute::optional_string().with_description("Extra PEM root certificate."),
        )
        .with_attribute(
            "max_concurrent_requests",
            Attribute::optional_int64()
                .with_default(serde_json::json!(DEFAULT_MAX_CONCURRENT_REQUESTS))
                .with_validator(Validator::int_at_least(1)),
        )
        .with_attribute(
            "request_timeout_seconds",
            Attribute::optional_int64()
                .with_default(serde_json::json!(DEFAULT_REQUEST_TIMEOUT_SECONDS))
                .with_validator(Validator::int_at_least(1)),
        )
}
