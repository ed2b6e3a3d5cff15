//! Managed accounts (`accountManagement`).

use serde::Deserialize;
use serde_json::json;

use super::NerdGraphClient;
use crate::error::ApiError;

/// An account managed by the organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedAccount {
    /// Account ID.
    pub id: i64,
    /// Account name.
    pub name: String,
    /// Data center region, e.g. `us01`.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub region_code: String,
}

const MANAGED_ACCOUNT_FIELDS: &str = "id name regionCode";

impl NerdGraphClient {
    /// Create a managed account in `region_code`.
    pub async fn create_managed_account(
        &self,
        name: &str,
        region_code: &str,
    ) -> Result<ManagedAccount, ApiError> {
        let document = format!(
            "mutation($account: AccountManagementCreateInput!) {{ \
             accountManagementCreateAccount(managedAccount: $account) {{ \
             managedAccount {{ {} }} }} }}",
            MANAGED_ACCOUNT_FIELDS
        );
        self.query(
            &document,
            json!({ "account": { "name": name, "regionCode": region_code } }),
            "/accountManagementCreateAccount/managedAccount",
        )
        .await
    }

    /// Rename a managed account.
    pub async fn update_managed_account(
        &self,
        account_id: i64,
        name: &str,
    ) -> Result<ManagedAccount, ApiError> {
        let document = format!(
            "mutation($account: AccountManagementUpdateInput!) {{ \
             accountManagementUpdateAccount(managedAccount: $account) {{ \
             managedAccount {{ {} }} }} }}",
            MANAGED_ACCOUNT_FIELDS
        );
        self.query(
            &document,
            json!({ "account": { "id": account_id, "name": name } }),
            "/accountManagementUpdateAccount/managedAccount",
        )
        .await
    }

    /// List every account managed by the organization.
    pub async fn list_managed_accounts(&self) -> Result<Vec<ManagedAccount>, ApiError> {
        let document = format!(
            "query {{ actor {{ organization {{ accountManagement {{ \
             managedAccounts {{ {} }} }} }} }} }}",
            MANAGED_ACCOUNT_FIELDS
        );
        let accounts: Option<Vec<ManagedAccount>> = self
            .query_optional(
                &document,
                json!({}),
                "/actor/organization/accountManagement/managedAccounts",
            )
            .await?;
        Ok(accounts.unwrap_or_default())
    }
}
