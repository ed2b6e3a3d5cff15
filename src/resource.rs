//! Typed resources and data sources.
//!
//! Each New Relic object is implemented as a [`Resource`] with its own state
//! struct: the expand step reads that struct into an API input, the flatten
//! step writes an API response back into it. The provider holds resources
//! behind [`DynResource`], which converts between JSON and the typed state.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::ApplyResult;
use crate::validation;

/// Outcome of a typed resource operation.
///
/// `state == None` means the remote object is gone and the ID is cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<S> {
    /// Resulting state.
    pub state: Option<S>,
    /// Warnings.
    pub diagnostics: Vec<Diagnostic>,
}

impl<S> Applied<S> {
    /// The object exists with `state`.
    pub fn present(state: S) -> Self {
        Self {
            state: Some(state),
            diagnostics: Vec::new(),
        }
    }

    /// The object no longer exists.
    pub fn absent() -> Self {
        Self {
            state: None,
            diagnostics: Vec::new(),
        }
    }

    /// Append warnings.
    pub fn with_diagnostics(mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }
}

/// A managed New Relic object.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Typed state. Attributes the user omitted decode to their defaults.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// Type name, e.g. `newrelic_alert_policy`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Cross-field checks that the schema cannot express.
    fn validate(&self, state: &Self::State) -> Vec<Diagnostic> {
        let _ = state;
        Vec::new()
    }

    /// Create the object and return its state.
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: Self::State,
    ) -> Result<Applied<Self::State>, ProviderError>;

    /// Refresh state from the API.
    async fn read(
        &self,
        config: &ProviderConfig,
        current: Self::State,
    ) -> Result<Applied<Self::State>, ProviderError>;

    /// Apply in-place changes.
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Applied<Self::State>, ProviderError>;

    /// Delete the object. Returned diagnostics are warnings.
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: Self::State,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Skeleton state for an import ID, completed by a subsequent read.
    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id }))
    }

    /// Migrate state written by schema `version` to the current version.
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let _ = version;
        Ok(state)
    }
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Typed configuration and result.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// Type name.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Cross-field checks.
    fn validate(&self, state: &Self::State) -> Vec<Diagnostic> {
        let _ = state;
        Vec::new()
    }

    /// Resolve the data source.
    async fn read(
        &self,
        config: &ProviderConfig,
        state: Self::State,
    ) -> Result<Applied<Self::State>, ProviderError>;
}

/// JSON-facing view of a [`Resource`].
#[async_trait]
pub trait DynResource: Send + Sync {
    /// Type name.
    fn type_name(&self) -> &'static str;
    /// Attribute schema.
    fn schema(&self) -> Schema;
    /// Schema and cross-field validation.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// See [`Resource::create`].
    async fn create(&self, config: &ProviderConfig, planned: Value) -> Result<ApplyResult, ProviderError>;
    /// See [`Resource::read`].
    async fn read(&self, config: &ProviderConfig, current: Value) -> Result<ApplyResult, ProviderError>;
    /// See [`Resource::update`].
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: Value,
        planned: Value,
    ) -> Result<ApplyResult, ProviderError>;
    /// See [`Resource::delete`].
    async fn delete(&self, config: &ProviderConfig, current: Value) -> Result<Vec<Diagnostic>, ProviderError>;
    /// See [`Resource::import`].
    fn import(&self, id: &str) -> Result<Value, ProviderError>;
    /// See [`Resource::upgrade_state`].
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError>;
}

#[async_trait]
impl<R: Resource> DynResource for R {
    fn type_name(&self) -> &'static str {
        Resource::type_name(self)
    }

    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&Resource::schema(self), config);
        if diagnostics.is_empty() {
            match decode_state::<R::State>(config.clone()) {
                Ok(state) => diagnostics.extend(Resource::validate(self, &state)),
                Err(err) => diagnostics.extend(err.into_diagnostics()),
            }
        }
        diagnostics
    }

    async fn create(&self, config: &ProviderConfig, planned: Value) -> Result<ApplyResult, ProviderError> {
        let state = decode_state(planned)?;
        encode_applied(Resource::create(self, config, state).await?)
    }

    async fn read(&self, config: &ProviderConfig, current: Value) -> Result<ApplyResult, ProviderError> {
        let state = decode_state(current)?;
        encode_applied(Resource::read(self, config, state).await?)
    }

    async fn update(
        &self,
        config: &ProviderConfig,
        prior: Value,
        planned: Value,
    ) -> Result<ApplyResult, ProviderError> {
        let prior = decode_state(prior)?;
        let planned = decode_state(planned)?;
        encode_applied(Resource::update(self, config, prior, planned).await?)
    }

    async fn delete(&self, config: &ProviderConfig, current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let state = decode_state(current)?;
        Resource::delete(self, config, state).await
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        Resource::import(self, id)
    }

    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        Resource::upgrade_state(self, version, state)
    }
}

/// JSON-facing view of a [`DataSource`].
#[async_trait]
pub trait DynDataSource: Send + Sync {
    /// Type name.
    fn type_name(&self) -> &'static str;
    /// Attribute schema.
    fn schema(&self) -> Schema;
    /// Schema and cross-field validation.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// See [`DataSource::read`].
    async fn read(&self, config: &ProviderConfig, state: Value) -> Result<ApplyResult, ProviderError>;
}

#[async_trait]
impl<D: DataSource> DynDataSource for D {
    fn type_name(&self) -> &'static str {
        DataSource::type_name(self)
    }

    fn schema(&self) -> Schema {
        DataSource::schema(self)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&DataSource::schema(self), config);
        if diagnostics.is_empty() {
            match decode_state::<D::State>(config.clone()) {
                Ok(state) => diagnostics.extend(DataSource::validate(self, &state)),
                Err(err) => diagnostics.extend(err.into_diagnostics()),
            }
        }
        diagnostics
    }

    async fn read(&self, config: &ProviderConfig, state: Value) -> Result<ApplyResult, ProviderError> {
        let state = decode_state(state)?;
        encode_applied(DataSource::read(self, config, state).await?)
    }
}

/// Decode JSON state into a typed state, treating `null` like an omitted attribute.
pub fn decode_state<S: DeserializeOwned>(value: Value) -> Result<S, ProviderError> {
    let value = match strip_nulls(value) {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn encode_applied<S: Serialize>(applied: Applied<S>) -> Result<ApplyResult, ProviderError> {
    let state = applied.state.map(serde_json::to_value).transpose()?;
    Ok(ApplyResult {
        state,
        diagnostics: applied.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        id: Option<String>,
        name: String,
        enabled: bool,
        tags: Vec<String>,
    }

    #[test]
    fn test_decode_state_treats_null_as_omitted() {
        let state: Sample = decode_state(json!({
            "id": null,
            "name": "x",
            "enabled": null,
            "tags": null
        }))
        .unwrap();
        assert_eq!(
            state,
            Sample {
                name: "x".into(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_decode_state_null_document() {
        let state: Sample = decode_state(Value::Null).unwrap();
        assert_eq!(state, Sample::default());
    }

    #[test]
    fn test_encode_applied_absent() {
        let result = encode_applied(Applied::<Sample>::absent()).unwrap();
        assert!(result.is_absent());
    }

    #[test]
    fn test_applied_with_diagnostics() {
        let applied = Applied::present(Sample::default())
            .with_diagnostics(vec![Diagnostic::warning("careful")]);
        let result = encode_applied(applied).unwrap();
        assert_eq!(result.state.unwrap()["name"], "");
        assert_eq!(result.diagnostics.len(), 1);
    }
}
