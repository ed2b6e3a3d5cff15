//! `newrelic_alert_policy`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::client::alerts::{AlertsPolicy, AlertsPolicyInput};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::ids::{import_with_metadata, parse_hashed_ids};
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Incident rollup strategies.
pub const INCIDENT_PREFERENCES: &[&str] = &["PER_POLICY", "PER_CONDITION", "PER_CONDITION_AND_TARGET"];

/// State of an alert policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicyState {
    /// Policy ID, optionally followed by `:<account>`.
    pub id: Option<String>,
    pub name: String,
    pub account_id: Option<i64>,
    pub incident_preference: String,
}

/// Alert policy resource.
pub struct AlertPolicyResource;

impl AlertPolicyResource {
    /// Resolve the account and policy addressed by a state.
    fn locate(config: &ProviderConfig, state: &AlertPolicyState) -> Result<(i64, i64), ProviderError> {
        let id = existing_id(&state.id)?;
        match parse_hashed_ids(id)?.as_slice() {
            [policy_id] => Ok((select_account_id(config, state.account_id), *policy_id)),
            [policy_id, account_id] => Ok((*account_id, *policy_id)),
            _ => Err(ProviderError::InvalidId(format!("unhandled id format {}", id))),
        }
    }
}

fn expand_policy_input(state: &AlertPolicyState) -> AlertsPolicyInput {
    let incident_preference = if state.incident_preference.is_empty() {
        "PER_POLICY".to_string()
    } else {
        state.incident_preference.clone()
    };
    AlertsPolicyInput {
        name: state.name.clone(),
        incident_preference,
    }
}

fn flatten_policy(id: Option<String>, policy: AlertsPolicy, account_id: i64) -> AlertPolicyState {
    AlertPolicyState {
        id: id.or(Some(policy.id)),
        name: policy.name,
        account_id: Some(account_id),
        incident_preference: policy.incident_preference,
    }
}

#[async_trait]
impl Resource for AlertPolicyResource {
    type State = AlertPolicyState;

    fn type_name(&self) -> &'static str {
        "newrelic_alert_policy"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An alert policy groups alert conditions and controls how incidents roll up.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the policy.")
                    .with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The New Relic account ID to operate on."),
            )
            .with_attribute(
                "incident_preference",
                Attribute::optional_string()
                    .with_description("The rollup strategy for the policy.")
                    .with_default(json!("PER_POLICY"))
                    .with_validator(Validator::one_of(INCIDENT_PREFERENCES)),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: AlertPolicyState,
    ) -> Result<Applied<AlertPolicyState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let input = expand_policy_input(&planned);
        let policy = config.client.create_policy(account_id, &input).await?;
        info!(policy_id = %policy.id, account_id, "created alert policy");
        Ok(Applied::present(flatten_policy(None, policy, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: AlertPolicyState,
    ) -> Result<Applied<AlertPolicyState>, ProviderError> {
        let (account_id, policy_id) = Self::locate(config, &current)?;
        match config
            .client
            .get_policy(account_id, &policy_id.to_string())
            .await
        {
            Ok(Some(policy)) => Ok(Applied::present(flatten_policy(current.id, policy, account_id))),
            Ok(None) => Ok(Applied::absent()),
            Err(err) if err.is_not_found() => Ok(Applied::absent()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: AlertPolicyState,
        planned: AlertPolicyState,
    ) -> Result<Applied<AlertPolicyState>, ProviderError> {
        let (_, policy_id) = Self::locate(config, &prior)?;
        let account_id = select_account_id(config, planned.account_id);
        let input = expand_policy_input(&planned);
        let policy = config
            .client
            .update_policy(account_id, &policy_id.to_string(), &input)
            .await?;
        Ok(Applied::present(flatten_policy(prior.id, policy, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: AlertPolicyState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let (_, policy_id) = Self::locate(config, &current)?;
        let account_id = select_account_id(config, current.account_id);
        ignore_not_found(
            config
                .client
                .delete_policy(account_id, &policy_id.to_string())
                .await,
        )?;
        Ok(Vec::new())
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        import_with_metadata(id, 1, "account_id", &Resource::schema(self))
    }
}
