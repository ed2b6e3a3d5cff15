//! `newrelic_data_partition_rule`
//!
//! Newly created rules take a moment to show up in the rule list, so create
//! polls until the rule is visible before reporting success.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::logconfigurations::{
    DataPartitionRule, DataPartitionRuleCreateInput, DataPartitionRuleUpdateInput,
};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found, non_empty};
use crate::retry::{poll_until, RetryError, DEFAULT_POLL_INTERVAL};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Retention policies a partition can use.
pub const RETENTION_POLICIES: &[&str] = &["SECONDARY", "STANDARD"];

/// How long create waits for the rule to become visible.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(30);

/// State of a data partition rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPartitionRuleState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub description: String,
    pub enabled: bool,
    pub nrql: String,
    pub retention_policy: String,
    pub target_data_partition: String,
    pub deleted: bool,
}

/// Data partition rule resource.
pub struct DataPartitionRuleResource;

fn expand_create_input(state: &DataPartitionRuleState) -> DataPartitionRuleCreateInput {
    DataPartitionRuleCreateInput {
        target_data_partition: state.target_data_partition.clone(),
        description: non_empty(&state.description),
        enabled: state.enabled,
        nrql: state.nrql.clone(),
        retention_policy: state.retention_policy.clone(),
    }
}

fn expand_update_input(id: &str, state: &DataPartitionRuleState) -> DataPartitionRuleUpdateInput {
    DataPartitionRuleUpdateInput {
        id: id.to_string(),
        description: non_empty(&state.description),
        enabled: state.enabled,
        nrql: state.nrql.clone(),
    }
}

fn flatten_rule(rule: DataPartitionRule, account_id: i64) -> DataPartitionRuleState {
    DataPartitionRuleState {
        id: Some(rule.id),
        account_id: Some(account_id),
        description: rule.description.unwrap_or_default(),
        enabled: rule.enabled,
        nrql: rule.nrql.unwrap_or_default(),
        retention_policy: rule.retention_policy,
        target_data_partition: rule.target_data_partition,
        deleted: rule.deleted,
    }
}

/// Find a live rule by ID. Deleted rules count as missing.
async fn find_live_rule(
    config: &ProviderConfig,
    account_id: i64,
    id: &str,
) -> Result<Option<DataPartitionRule>, ProviderError> {
    let rules = match config.client.list_data_partition_rules(account_id).await {
        Ok(rules) => rules,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(rules.into_iter().find(|r| r.id == id && !r.deleted))
}

#[async_trait]
impl Resource for DataPartitionRuleResource {
    type State = DataPartitionRuleState;

    fn type_name(&self) -> &'static str {
        "newrelic_data_partition_rule"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The account id associated with the data partition rule."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("The description of the data partition rule."),
            )
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Whether or not this data partition rule is enabled."),
            )
            .with_attribute(
                "nrql",
                Attribute::required_string().with_description(
                    "The NRQL to match events for this data partition rule. \
                     Logs matching this criteria will be routed to the specified data partition.",
                ),
            )
            .with_attribute(
                "retention_policy",
                Attribute::required_string()
                    .with_description("The retention policy of the data partition data.")
                    .with_force_new()
                    .with_validator(Validator::one_of(RETENTION_POLICIES)),
            )
            .with_attribute(
                "target_data_partition",
                Attribute::required_string()
                    .with_description(
                        "The name of the data partition where logs will be allocated once the rule is enabled.",
                    )
                    .with_force_new()
                    .with_validator(Validator::has_prefix(
                        "Log_",
                        "Prepend \"Log_\" to the given target_data_partition value.",
                    )),
            )
            .with_attribute(
                "deleted",
                Attribute::computed_bool().with_description(
                    "Whether or not this data partition rule is deleted. \
                     Deleting a rule does not delete the data already persisted.",
                ),
            )
    }

    #[instrument(skip_all, fields(target = %planned.target_data_partition))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: DataPartitionRuleState,
    ) -> Result<Applied<DataPartitionRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        info!(account_id, "creating data partition rule");
        let created = config
            .client
            .create_data_partition_rule(account_id, &expand_create_input(&planned))
            .await?;
        let rule_id = created.id.as_str();

        let rule = poll_until(CREATE_TIMEOUT, DEFAULT_POLL_INTERVAL, move || async move {
            match find_live_rule(config, account_id, rule_id).await {
                Ok(Some(rule)) => Ok(rule),
                Ok(None) => Err(RetryError::retryable("data partition rule was not created")),
                Err(err) => Err(RetryError::NonRetryable(err)),
            }
        })
        .await?;

        info!(rule_id = %rule.id, "created data partition rule");
        Ok(Applied::present(flatten_rule(rule, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: DataPartitionRuleState,
    ) -> Result<Applied<DataPartitionRuleState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        match find_live_rule(config, account_id, id).await? {
            Some(rule) => Ok(Applied::present(flatten_rule(rule, account_id))),
            None => Ok(Applied::absent()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: DataPartitionRuleState,
        planned: DataPartitionRuleState,
    ) -> Result<Applied<DataPartitionRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let id = existing_id(&prior.id)?;
        let rule = config
            .client
            .update_data_partition_rule(account_id, &expand_update_input(id, &planned))
            .await?;
        Ok(Applied::present(flatten_rule(rule, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: DataPartitionRuleState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(config.client.delete_data_partition_rule(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_target_partition_needs_log_prefix() {
        let diags = crate::validation::validate(
            &DataPartitionRuleResource.schema(),
            &json!({
                "enabled": true,
                "nrql": "logtype = 'nginx'",
                "retention_policy": "STANDARD",
                "target_data_partition": "nginx"
            }),
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid value");
        assert_eq!(
            diags[0].detail.as_deref(),
            Some("Prepend \"Log_\" to the given target_data_partition value.")
        );
    }

    #[test]
    fn test_update_input_carries_id() {
        let state = DataPartitionRuleState {
            enabled: true,
            nrql: "logtype = 'nginx'".into(),
            ..Default::default()
        };
        let input = expand_update_input("dp-1", &state);
        assert_eq!(input.id, "dp-1");
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_flatten_defaults_missing_nrql() {
        let rule = DataPartitionRule {
            id: "dp-1".into(),
            target_data_partition: "Log_nginx".into(),
            description: Some("nginx logs".into()),
            enabled: true,
            nrql: None,
            retention_policy: "STANDARD".into(),
            deleted: false,
        };
        let state = flatten_rule(rule, 3);
        assert_eq!(state.nrql, "");
        assert_eq!(state.description, "nginx logs");
        assert_eq!(state.account_id, Some(3));
    }
}
