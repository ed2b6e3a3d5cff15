//! New Relic Provider
//!
//! A declarative infrastructure provider that manages New Relic
//! configuration objects through the NerdGraph GraphQL API.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Schema types**: Attribute and block descriptions for the provider
//!   configuration, every resource, and every data source
//! - **ProviderService trait**: The operation surface a host drives
//!   (configure, plan, create, read, update, delete, import, data source reads)
//! - **NerdGraph client**: Typed queries and mutations over `reqwest`
//! - **Resources**: Alert policies, compound conditions, notification
//!   destinations and channels, workflows, log configuration rules,
//!   synthetics private locations, accounts, fleet grants, and AWS links
//! - **Data sources**: Entity lookup and service level alert thresholds
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use newrelic_provider::{NewRelicProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     newrelic_provider::init_logging();
//!
//!     let provider = NewRelicProvider::new();
//!     provider
//!         .configure(json!({ "api_key": "NRAK-...", "account_id": 1234567 }))
//!         .await?;
//!
//!     let plan = provider
//!         .plan("newrelic_alert_policy", None, json!({ "name": "payments" }), json!({}))
//!         .await?;
//!     let created = provider
//!         .create("newrelic_alert_policy", plan.planned_state)
//!         .await?;
//!     println!("{:?}", created.state);
//!     Ok(())
//! }
//! ```
//!
//! # Absent resources
//!
//! Reads return [`ApplyResult`] with `state: None` when the remote object
//! has been deleted out of band. The host should drop the resource from its
//! state rather than treating this as an error.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod ids;
pub mod logging;
pub mod nrql;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::{ProviderConfig, Region};
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{NewRelicProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{
    ApplyResult, AttributeChange, ImportedResource, PlanResult, ProviderMetadata,
    ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
