//! Cloud integrations: linking AWS accounts.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_payload, NerdGraphClient};
use crate::error::{ApiError, PayloadError};

/// A cloud account linked to New Relic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    /// Linked account ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// For AWS, the role ARN.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub auth_label: String,
    /// PULL or PUSH.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub metric_collection_mode: String,
    /// New Relic account the cloud account reports to.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub nr_account_id: i64,
}

/// Input for linking an AWS account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsLinkAccountInput {
    /// IAM role ARN.
    pub arn: String,
    /// PULL or PUSH.
    pub metric_collection_mode: String,
    /// Display name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    linked_accounts: Vec<LinkedAccount>,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct UnlinkPayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

const LINKED_ACCOUNT_FIELDS: &str = "id name authLabel metricCollectionMode nrAccountId";

impl NerdGraphClient {
    /// Link an AWS account, returning the first linked account.
    pub async fn link_aws_account(
        &self,
        account_id: i64,
        input: &AwsLinkAccountInput,
    ) -> Result<LinkedAccount, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $accounts: CloudLinkCloudAccountsInput!) {{ \
             cloudLinkAccount(accountId: $accountId, accounts: $accounts) {{ \
             linkedAccounts {{ {} }} errors {{ type message }} }} }}",
            LINKED_ACCOUNT_FIELDS
        );
        let payload: LinkPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "accounts": { "aws": [input] } }),
                "/cloudLinkAccount",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .linked_accounts
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::MissingData("cloudLinkAccount.linkedAccounts".to_string()))
    }

    /// Fetch a linked account, `None` if it does not exist.
    pub async fn get_linked_account(
        &self,
        account_id: i64,
        linked_account_id: i64,
    ) -> Result<Option<LinkedAccount>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $id: Int!) {{ actor {{ account(id: $accountId) {{ \
             cloud {{ linkedAccount(id: $id) {{ {} }} }} }} }} }}",
            LINKED_ACCOUNT_FIELDS
        );
        self.query_optional(
            &document,
            json!({ "accountId": account_id, "id": linked_account_id }),
            "/actor/account/cloud/linkedAccount",
        )
        .await
    }

    /// Rename a linked account.
    pub async fn rename_linked_account(
        &self,
        account_id: i64,
        linked_account_id: i64,
        name: &str,
    ) -> Result<(), ApiError> {
        let payload: LinkPayload = self
            .query(
                "mutation($accountId: Int!, $accounts: [CloudRenameAccountsInput!]!) { \
                 cloudRenameAccount(accountId: $accountId, accounts: $accounts) { \
                 linkedAccounts { id name } errors { type message } } }",
                json!({
                    "accountId": account_id,
                    "accounts": [{ "linkedAccountId": linked_account_id, "name": name }]
                }),
                "/cloudRenameAccount",
            )
            .await?;
        check_payload(payload.errors)
    }

    /// Unlink a cloud account.
    pub async fn unlink_account(
        &self,
        account_id: i64,
        linked_account_id: i64,
    ) -> Result<(), ApiError> {
        let payload: UnlinkPayload = self
            .query(
                "mutation($accountId: Int!, $accounts: [CloudUnlinkAccountsInput!]!) { \
                 cloudUnlinkAccount(accountId: $accountId, accounts: $accounts) { \
                 unlinkedAccounts { id } errors { type message } } }",
                json!({
                    "accountId": account_id,
                    "accounts": [{ "linkedAccountId": linked_account_id }]
                }),
                "/cloudUnlinkAccount",
            )
            .await?;
        check_payload(payload.errors)
    }
}
