//! `newrelic_cloud_aws_link_account`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::client::cloud::{AwsLinkAccountInput, LinkedAccount};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::{ApiError, ProviderError};
use crate::ids::parse_ids;
use crate::resource::{Applied, Resource};
use crate::resources::existing_id;
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// State of a linked AWS account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudAwsLinkAccountState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub arn: String,
    pub metric_collection_mode: String,
    pub name: String,
}

/// AWS link account resource.
pub struct CloudAwsLinkAccountResource;

/// Render cloud payload errors as `<type> : <message>`.
fn cloud_error(err: ApiError) -> ProviderError {
    match err {
        ApiError::Payload(errors) => ProviderError::Diagnostics(
            errors
                .into_iter()
                .map(|e| Diagnostic::error(format!("{} : {}", e.kind, e.message)))
                .collect(),
        ),
        other => other.into(),
    }
}

fn expand_link_input(state: &CloudAwsLinkAccountState) -> AwsLinkAccountInput {
    let mode = if state.metric_collection_mode.is_empty() {
        "PULL".to_string()
    } else {
        state.metric_collection_mode.to_uppercase()
    };
    AwsLinkAccountInput {
        arn: state.arn.clone(),
        metric_collection_mode: mode,
        name: state.name.clone(),
    }
}

fn flatten_linked_account(id: String, fallback_account_id: i64, linked: LinkedAccount) -> CloudAwsLinkAccountState {
    let account_id = if linked.nr_account_id != 0 {
        linked.nr_account_id
    } else {
        fallback_account_id
    };
    CloudAwsLinkAccountState {
        id: Some(id),
        account_id: Some(account_id),
        arn: linked.auth_label,
        metric_collection_mode: linked.metric_collection_mode,
        name: linked.name,
    }
}

fn linked_account_id(state: &CloudAwsLinkAccountState) -> Result<i64, ProviderError> {
    Ok(parse_ids(existing_id(&state.id)?, 1)?[0])
}

#[async_trait]
impl Resource for CloudAwsLinkAccountResource {
    type State = CloudAwsLinkAccountState;

    fn type_name(&self) -> &'static str {
        "newrelic_cloud_aws_link_account"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Links an AWS account to New Relic.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The New Relic account ID where you want to link the AWS account."),
            )
            .with_attribute(
                "arn",
                Attribute::required_string()
                    .with_description("The AWS role ARN.")
                    .with_force_new(),
            )
            .with_attribute(
                "metric_collection_mode",
                Attribute::optional_string()
                    .with_description("How metrics will be collected: PULL or PUSH.")
                    .with_default(json!("PULL"))
                    .with_force_new()
                    .with_validator(Validator::one_of_ignore_case(&["PULL", "PUSH"])),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the linked account."),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: CloudAwsLinkAccountState,
    ) -> Result<Applied<CloudAwsLinkAccountState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let input = expand_link_input(&planned);
        let linked = config
            .client
            .link_aws_account(account_id, &input)
            .await
            .map_err(cloud_error)?;
        info!(linked_account_id = linked.id, account_id, "linked AWS account");
        Ok(Applied::present(flatten_linked_account(
            linked.id.to_string(),
            account_id,
            linked,
        )))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: CloudAwsLinkAccountState,
    ) -> Result<Applied<CloudAwsLinkAccountState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let linked_id = linked_account_id(&current)?;
        match config.client.get_linked_account(account_id, linked_id).await? {
            Some(linked) => Ok(Applied::present(flatten_linked_account(
                linked_id.to_string(),
                account_id,
                linked,
            ))),
            None => Ok(Applied::absent()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: CloudAwsLinkAccountState,
        planned: CloudAwsLinkAccountState,
    ) -> Result<Applied<CloudAwsLinkAccountState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let linked_id = linked_account_id(&prior)?;
        config
            .client
            .rename_linked_account(account_id, linked_id, &planned.name)
            .await
            .map_err(cloud_error)?;
        Ok(Applied::present(CloudAwsLinkAccountState {
            id: prior.id,
            account_id: Some(account_id),
            ..planned
        }))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: CloudAwsLinkAccountState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let linked_id = linked_account_id(&current)?;
        match config.client.unlink_account(account_id, linked_id).await {
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            result => result.map(|_| Vec::new()).map_err(cloud_error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayloadError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_uppercases_mode() {
        let input = expand_link_input(&CloudAwsLinkAccountState {
            arn: "arn:aws:iam::123:role/nr".into(),
            metric_collection_mode: "push".into(),
            name: "prod".into(),
            ..Default::default()
        });
        assert_eq!(input.metric_collection_mode, "PUSH");

        let input = expand_link_input(&CloudAwsLinkAccountState::default());
        assert_eq!(input.metric_collection_mode, "PULL");
    }

    #[test]
    fn test_cloud_error_format() {
        let err = cloud_error(ApiError::Payload(vec![PayloadError::new(
            "ARN is invalid",
            "INVALID_INPUT",
        )]));
        let diags = err.into_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "INVALID_INPUT : ARN is invalid");
    }

    #[test]
    fn test_flatten_prefers_reported_account() {
        let linked = LinkedAccount {
            id: 9,
            name: "prod".into(),
            auth_label: "arn:aws:iam::123:role/nr".into(),
            metric_collection_mode: "PULL".into(),
            nr_account_id: 0,
        };
        let state = flatten_linked_account("9".into(), 55, linked);
        assert_eq!(state.account_id, Some(55));
        assert_eq!(state.arn, "arn:aws:iam::123:role/nr");
    }
}
