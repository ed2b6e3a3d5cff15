//! `newrelic_account_management`
//!
//! Managed accounts can be created and renamed but not deleted through the
//! API. Deleting the resource only drops it from state.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::accounts::ManagedAccount;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::ids::parse_ids;
use crate::resource::{Applied, Resource};
use crate::resources::existing_id;
use crate::retry::{poll_until, RetryError, DEFAULT_POLL_INTERVAL};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Regions a managed account can live in.
pub const ACCOUNT_REGIONS: &[&str] = &["us01", "eu01"];

/// How long create waits for the new account to be listed.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Warning returned by delete.
pub const DELETE_WARNING: &str = "Account cannot be deleted via Terraform. Please contact support";

/// State of a managed account. The ID is the account ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountManagementState {
    pub id: Option<String>,
    pub name: String,
    pub region: String,
}

/// Managed account resource.
pub struct AccountManagementResource;

fn flatten_account(account: ManagedAccount) -> AccountManagementState {
    AccountManagementState {
        id: Some(account.id.to_string()),
        name: account.name,
        region: account.region_code,
    }
}

fn managed_account_id(state: &AccountManagementState) -> Result<i64, ProviderError> {
    Ok(parse_ids(existing_id(&state.id)?, 1)?[0])
}

async fn find_account(config: &ProviderConfig, account_id: i64) -> Result<Option<ManagedAccount>, ProviderError> {
    let accounts = config.client.list_managed_accounts().await?;
    Ok(accounts.into_iter().find(|a| a.id == account_id))
}

#[async_trait]
impl Resource for AccountManagementResource {
    type State = AccountManagementState;

    fn type_name(&self) -> &'static str {
        "newrelic_account_management"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the account to be created."),
            )
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_description("Data center region of the account.")
                    .with_force_new()
                    .with_validator(Validator::one_of(ACCOUNT_REGIONS)),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name, region = %planned.region))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: AccountManagementState,
    ) -> Result<Applied<AccountManagementState>, ProviderError> {
        let created = config
            .client
            .create_managed_account(&planned.name, &planned.region)
            .await?;
        let account_id = created.id;
        info!(account_id, "created managed account");

        let account = poll_until(CREATE_TIMEOUT, DEFAULT_POLL_INTERVAL, move || async move {
            match find_account(config, account_id).await {
                Ok(Some(account)) => Ok(account),
                Ok(None) => Err(RetryError::retryable("account not found")),
                Err(err) => Err(RetryError::NonRetryable(err)),
            }
        })
        .await?;
        Ok(Applied::present(flatten_account(account)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: AccountManagementState,
    ) -> Result<Applied<AccountManagementState>, ProviderError> {
        let account_id = managed_account_id(&current)?;
        match find_account(config, account_id).await? {
            Some(account) => Ok(Applied::present(flatten_account(account))),
            None => Ok(Applied::absent()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: AccountManagementState,
        planned: AccountManagementState,
    ) -> Result<Applied<AccountManagementState>, ProviderError> {
        let account_id = managed_account_id(&prior)?;
        let account = config
            .client
            .update_managed_account(account_id, &planned.name)
            .await?;
        let mut state = flatten_account(account);
        if state.region.is_empty() {
            state.region = planned.region;
        }
        Ok(Applied::present(state))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        _config: &ProviderConfig,
        current: AccountManagementState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        warn!(id = ?current.id, "managed accounts cannot be deleted, dropping from state");
        Ok(vec![Diagnostic::warning(DELETE_WARNING)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flatten_account() {
        let state = flatten_account(ManagedAccount {
            id: 4242,
            name: "sandbox".into(),
            region_code: "eu01".into(),
        });
        assert_eq!(
            state,
            AccountManagementState {
                id: Some("4242".into()),
                name: "sandbox".into(),
                region: "eu01".into(),
            }
        );
    }

    #[test]
    fn test_region_is_validated() {
        let diags = crate::validation::validate(
            &AccountManagementResource.schema(),
            &json!({ "name": "sandbox", "region": "ap01" }),
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("region"));
    }

    #[test]
    fn test_managed_account_id_rejects_garbage() {
        let state = AccountManagementState {
            id: Some("abc".into()),
            ..Default::default()
        };
        assert!(managed_account_id(&state).is_err());
    }
}
