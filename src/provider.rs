//! The provider surface.
//!
//! [`ProviderService`] is the set of operations a host drives: schema and
//! metadata, configuration, validation, planning, CRUD, import and data source
//! reads. [`NewRelicProvider`] implements it on top of a registry of typed
//! resources and data sources.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{provider_schema, ProviderConfig, ProviderConfigInput};
use crate::data_sources;
use crate::error::ProviderError;
use crate::resource::{DynDataSource, DynResource};
use crate::resources;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{
    ApplyResult, AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
};
use crate::validation;

/// Operations a provider host can invoke.
///
/// Values cross this boundary as `serde_json::Value`: configuration and state
/// documents keyed by attribute name.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource. A null `proposed_state` plans deletion.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<ApplyResult, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ApplyResult, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError>;

    /// Delete a resource. Returned diagnostics are warnings.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(&self, data_source_type: &str, _config: Value) -> Result<ApplyResult, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// The New Relic provider.
pub struct NewRelicProvider {
    resources: HashMap<&'static str, Box<dyn DynResource>>,
    data_sources: HashMap<&'static str, Box<dyn DynDataSource>>,
    config: RwLock<Option<Arc<ProviderConfig>>>,
}

impl Default for NewRelicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NewRelicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        f.debug_struct("NewRelicProvider")
            .field("resources", &resources)
            .field("configured", &self.current_config().is_ok())
            .finish()
    }
}

impl NewRelicProvider {
    /// An unconfigured provider with every resource and data source registered.
    pub fn new() -> Self {
        let resources = resources::all()
            .into_iter()
            .map(|r| (r.type_name(), r))
            .collect();
        let data_sources = data_sources::all()
            .into_iter()
            .map(|d| (d.type_name(), d))
            .collect();
        Self {
            resources,
            data_sources,
            config: RwLock::new(None),
        }
    }

    /// A provider already configured with `config`.
    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            config: RwLock::new(Some(Arc::new(config))),
            ..Self::new()
        }
    }

    /// The active configuration.
    pub fn current_config(&self) -> Result<Arc<ProviderConfig>, ProviderError> {
        let guard = self
            .config
            .read()
            .map_err(|_| ProviderError::Sdk("provider configuration lock poisoned".to_string()))?;
        guard.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured: call configure before managing resources".to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn DynResource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DynDataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for NewRelicProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    #[instrument(skip(self, config))]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&provider_schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&provider_schema(), &config);
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "provider configuration is invalid");
            return Ok(diagnostics);
        }

        let input = ProviderConfigInput::from_value(config)?.with_process_env()?;
        let (resolved, warnings) = ProviderConfig::resolve(input)?;
        diagnostics.extend(warnings);

        let mut slot = self
            .config
            .write()
            .map_err(|_| ProviderError::Sdk("provider configuration lock poisoned".to_string()))?;
        info!(region = %resolved.region, account_id = resolved.account_id, "provider configured");
        *slot = Some(Arc::new(resolved));
        Ok(diagnostics)
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), ProviderError> {
        let mut slot = self
            .config
            .write()
            .map_err(|_| ProviderError::Sdk("provider configuration lock poisoned".to_string()))?;
        *slot = None;
        debug!("provider stopped");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    #[instrument(skip(self, state))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let current = resource.schema().version;
        let version = u64::try_from(version)
            .map_err(|_| ProviderError::Validation(format!("invalid schema version {}", version)))?;
        if version > current {
            return Err(ProviderError::Validation(format!(
                "state version {} is newer than schema version {}",
                version, current
            )));
        }
        if version == current {
            return Ok(state);
        }
        debug!(resource_type, from = version, to = current, "upgrading state");
        resource.upgrade_state(version, state)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let plan = plan_resource(&resource.schema(), prior_state.as_ref(), proposed_state);
        debug!(
            resource_type,
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "plan computed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<ApplyResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let diagnostics = resource.validate(&planned_state);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }
        let config = self.current_config()?;
        let result = resource.create(&config, planned_state).await;
        log_outcome("create", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ApplyResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let config = self.current_config()?;
        let result = resource.read(&config, current_state).await;
        log_outcome("read", resource_type, &result);
        result
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let diagnostics = resource.validate(&planned_state);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }
        let config = self.current_config()?;
        let result = resource.update(&config, prior_state, planned_state).await;
        log_outcome("update", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let config = self.current_config()?;
        match resource.delete(&config, current_state).await {
            Ok(warnings) => {
                info!(resource_type, warnings = warnings.len(), "delete completed");
                Ok(warnings)
            },
            Err(e) => {
                error!(resource_type, error = %e, "delete failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let skeleton = resource.import(id)?;
        let config = self.current_config()?;
        let read = resource.read(&config, skeleton).await?;
        match read.state {
            Some(state) => Ok(vec![ImportedResource::new(resource_type, state)]),
            None => Err(ProviderError::NotFound(format!(
                "{} with ID {} does not exist",
                resource_type, id
            ))),
        }
    }

    #[instrument(skip(self, config))]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<ApplyResult, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let diagnostics = data_source.validate(&config);
        if has_errors(&diagnostics) {
            return Err(ProviderError::Diagnostics(diagnostics));
        }
        let provider_config = self.current_config()?;
        let result = data_source.read(&provider_config, config).await;
        log_outcome("read_data_source", data_source_type, &result);
        result
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error)
}

fn log_outcome(operation: &str, resource_type: &str, result: &Result<ApplyResult, ProviderError>) {
    match result {
        Ok(r) if r.is_absent() => {
            info!(operation, resource_type, "resource no longer exists")
        },
        Ok(r) => {
            let id = r
                .state
                .as_ref()
                .and_then(|s| s.get("id"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            info!(operation, resource_type, id, warnings = r.diagnostics.len(), "completed")
        },
        Err(e) => error!(operation, resource_type, error = %e, "failed"),
    }
}

/// Compute a plan from the resource schema.
///
/// Omitted attributes take their default, or their prior value when
/// computed. Any change to a `force_new` attribute or block forces
/// replacement.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    if proposed.is_null() {
        let changes = prior
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let empty = Map::new();
    let prior_obj = prior.and_then(Value::as_object).unwrap_or(&empty);
    let mut planned = match proposed {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for (name, attr) in &schema.block.attributes {
        let present = planned.get(name).is_some_and(|v| !v.is_null());
        if present {
            continue;
        }
        if attr.flags.computed && !attr.flags.required {
            if let Some(prior_value) = prior_obj.get(name).filter(|v| !v.is_null()) {
                planned.insert(name.clone(), prior_value.clone());
                continue;
            }
        }
        if let Some(default) = &attr.default {
            planned.insert(name.clone(), default.clone());
        }
    }

    let keys: BTreeSet<&String> = planned.keys().chain(prior_obj.keys()).collect();
    let mut changes = Vec::new();
    let mut requires_replace = false;
    for key in keys {
        let before = prior_obj.get(key).filter(|v| !v.is_null());
        let after = planned.get(key).filter(|v| !v.is_null());
        let change = match (before, after) {
            (None, None) => continue,
            (Some(b), Some(a)) if b == a => continue,
            (Some(b), Some(a)) => AttributeChange::modified(key.clone(), b.clone(), a.clone()),
            (None, Some(a)) => AttributeChange::added(key.clone(), a.clone()),
            (Some(b), None) => AttributeChange::removed(key.clone(), b.clone()),
        };
        if prior.is_some() && is_force_new(schema, key) {
            requires_replace = true;
        }
        changes.push(change);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn is_force_new(schema: &Schema, name: &str) -> bool {
    schema
        .block
        .attributes
        .get(name)
        .map(|a| a.force_new)
        .or_else(|| schema.block.blocks.get(name).map(|b| b.force_new))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("guid", Attribute::computed_string())
            .with_attribute(
                "region",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "enabled",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_attribute("account_id", Attribute::optional_computed_int64())
            .with_block(
                "filter",
                NestedBlock::single(Block::new().with_attribute("query", Attribute::required_string()))
                    .with_force_new(),
            )
    }

    #[test]
    fn test_plan_create_fills_defaults() {
        let plan = plan_resource(&sample_schema(), None, json!({"name": "a", "region": "us01"}));
        assert_eq!(plan.planned_state["enabled"], json!(true));
        assert!(!plan.requires_replace);
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["enabled", "name", "region"]);
    }

    #[test]
    fn test_plan_carries_computed_values() {
        let prior = json!({
            "id": "1", "name": "a", "guid": "G", "region": "us01",
            "enabled": true, "account_id": 5
        });
        let plan = plan_resource(
            &sample_schema(),
            Some(&prior),
            json!({"name": "a", "region": "us01"}),
        );
        assert_eq!(plan.planned_state, prior);
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_plan_in_place_update() {
        let prior = json!({"id": "1", "name": "a", "region": "us01", "enabled": true});
        let plan = plan_resource(
            &sample_schema(),
            Some(&prior),
            json!({"name": "b", "region": "us01", "enabled": false}),
        );
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_plan_force_new_attribute() {
        let prior = json!({"id": "1", "name": "a", "region": "us01", "enabled": true});
        let plan = plan_resource(
            &sample_schema(),
            Some(&prior),
            json!({"name": "a", "region": "eu01"}),
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_plan_force_new_block() {
        let prior = json!({
            "id": "1", "name": "a", "region": "us01", "enabled": true,
            "filter": {"query": "a"}
        });
        let plan = plan_resource(
            &sample_schema(),
            Some(&prior),
            json!({"name": "a", "region": "us01", "filter": {"query": "b"}}),
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_plan_delete() {
        let prior = json!({"id": "1", "name": "a"});
        let plan = plan_resource(&sample_schema(), Some(&prior), Value::Null);
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejects_crud() {
        let provider = NewRelicProvider::new();
        let err = provider
            .read("newrelic_alert_policy", json!({"id": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = NewRelicProvider::new();
        let err = provider
            .plan("newrelic_nope", None, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[test]
    fn test_metadata_lists_registered_types() {
        let provider = NewRelicProvider::new();
        let metadata = provider.metadata();
        assert!(metadata.resources.contains(&"newrelic_alert_policy".to_string()));
        assert!(metadata.resources.contains(&"newrelic_fleet_grant".to_string()));
        assert_eq!(metadata.resources.len(), 13);
        assert!(metadata.capabilities.plan_destroy);
        assert_eq!(
            metadata.data_sources,
            vec![
                "newrelic_entity".to_string(),
                "newrelic_service_level_alert_helper".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_configure_rejects_invalid_region() {
        let provider = NewRelicProvider::new();
        let diags = provider
            .configure(json!({"api_key": "NRAK-X", "region": "apac"}))
            .await
            .unwrap();
        assert!(has_errors(&diags));
        assert!(provider.current_config().is_err());
    }

    #[tokio::test]
    async fn test_with_config_serves_data_sources() {
        use crate::client::{ClientOptions, NerdGraphClient};
        use crate::config::Region;

        let client = NerdGraphClient::new(ClientOptions::new("http://localhost/graphql", "NRAK-X")).unwrap();
        let provider = NewRelicProvider::with_config(ProviderConfig::new(client, 1, Region::Us));
        let result = provider
            .read_data_source(
                "newrelic_service_level_alert_helper",
                json!({"alert_type": "slow_burn", "sli_guid": "MXxTTE98", "slo_target": 99.0, "slo_period": 7}),
            )
            .await
            .unwrap();
        let state = result.state.unwrap();
        assert_eq!(state["evaluation_period"], json!(360));
        assert_eq!(state["id"], json!("MXxTTE98:slow_burn"));
    }

    #[tokio::test]
    async fn test_stop_clears_configuration() {
        let provider = NewRelicProvider::new();
        let config = json!({"api_key": "NRAK-X", "account_id": 1});
        assert!(provider
            .validate_provider_config(config.clone())
            .await
            .unwrap()
            .is_empty());

        provider.configure(config).await.unwrap();
        assert_eq!(provider.current_config().unwrap().account_id, 1);

        provider.stop().await.unwrap();
        assert!(provider.current_config().is_err());
    }
}
