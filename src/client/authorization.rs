//! Organization lookup and fleet access grants.

use serde::Deserialize;
use serde_json::{json, Value};

use super::NerdGraphClient;
use crate::error::ApiError;

/// An access grant as reported by customer administration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Grant {
    /// Grant ID.
    pub id: i64,
    /// The group the grant was given to.
    pub grantee: GrantReference,
    /// The granted role.
    pub role: GrantReference,
}

/// `{ id }` reference to a grantee or role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GrantReference {
    /// Referenced ID. Grantee IDs are strings, role IDs are numbers.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessGrant {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessPayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    access_grants: Vec<AccessGrant>,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number ID, got {}",
            other
        ))),
    }
}

fn fleet_access(group_id: &str, fleet_id: &str, role_id: i64) -> Value {
    json!({
        "groupId": group_id,
        "entityAccessGrants": [{
            "entity": { "type": "fleet", "id": fleet_id },
            "roleId": role_id.to_string(),
        }],
    })
}

impl NerdGraphClient {
    /// Grant `role_id` on a fleet to a group, returning the new grant ID.
    pub async fn grant_fleet_access(
        &self,
        group_id: &str,
        fleet_id: &str,
        role_id: i64,
    ) -> Result<String, ApiError> {
        let payload: AccessPayload = self
            .query(
                "mutation($grant: AuthorizationManagementGrantAccess!) { \
                 authorizationManagementGrantAccess(grantAccessOptions: $grant) { \
                 accessGrants { id } } }",
                json!({ "grant": fleet_access(group_id, fleet_id, role_id) }),
                "/authorizationManagementGrantAccess",
            )
            .await?;
        payload
            .access_grants
            .into_iter()
            .next()
            .map(|g| g.id)
            .ok_or_else(|| {
                ApiError::MissingData("authorizationManagementGrantAccess.accessGrants".into())
            })
    }

    /// Revoke `role_id` on a fleet from a group.
    pub async fn revoke_fleet_access(
        &self,
        group_id: &str,
        fleet_id: &str,
        role_id: i64,
    ) -> Result<(), ApiError> {
        self.execute(
            "mutation($revoke: AuthorizationManagementRevokeAccess!) { \
             authorizationManagementRevokeAccess(revokeAccessOptions: $revoke) { \
             accessGrants { id } } }",
            json!({ "revoke": fleet_access(group_id, fleet_id, role_id) }),
        )
        .await
        .map(|_| ())
    }

    /// ID of the organization the API key belongs to.
    pub async fn get_organization_id(&self) -> Result<String, ApiError> {
        self.query(
            "query { actor { organization { id } } }",
            json!({}),
            "/actor/organization/id",
        )
        .await
    }

    /// Grants of an organization on a single scope (e.g. a fleet).
    pub async fn list_grants(
        &self,
        organization_id: &str,
        scope_id: &str,
    ) -> Result<Vec<Grant>, ApiError> {
        let items: Option<Vec<Grant>> = self
            .query_optional(
                "query($filter: MultiTenantAuthorizationGrantFilterInputExpression!) { \
                 customerAdministration { grants(filter: $filter) { \
                 items { id grantee { id } role { id } } } } }",
                json!({
                    "filter": {
                        "organizationId": { "eq": organization_id },
                        "scopeId": { "eq": scope_id },
                    }
                }),
                "/customerAdministration/grants/items",
            )
            .await?;
        Ok(items.unwrap_or_default())
    }
}
