//! Synthetics private locations.

use serde::Deserialize;
use serde_json::json;

use super::{check_payload, NerdGraphClient};
use crate::error::{ApiError, PayloadError};

/// A private location as returned by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLocation {
    /// Entity GUID.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub guid: String,
    /// Globally unique location identifier.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub domain_id: String,
    /// Key used by minions to connect.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub key: String,
    /// Identifier derived from the name.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub location_id: String,
    /// Location name.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub name: String,
    /// Location description.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub description: String,
    /// Whether scripts need a password to run.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub verified_script_execution: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrivateLocationPayload {
    #[serde(flatten)]
    location: PrivateLocation,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct DeletePayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

const PRIVATE_LOCATION_FIELDS: &str =
    "guid domainId key locationId name description verifiedScriptExecution \
     errors { description type }";

impl NerdGraphClient {
    /// Create a private location.
    pub async fn create_private_location(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
        verified_script_execution: bool,
    ) -> Result<PrivateLocation, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $name: String!, $description: String!, $verified: Boolean!) {{ \
             syntheticsCreatePrivateLocation(accountId: $accountId, name: $name, \
             description: $description, verifiedScriptExecution: $verified) {{ {} }} }}",
            PRIVATE_LOCATION_FIELDS
        );
        let payload: PrivateLocationPayload = self
            .query(
                &document,
                json!({
                    "accountId": account_id,
                    "name": name,
                    "description": description,
                    "verified": verified_script_execution,
                }),
                "/syntheticsCreatePrivateLocation",
            )
            .await?;
        check_payload(payload.errors)?;
        if payload.location.guid.is_empty() {
            return Err(ApiError::MissingData(
                "syntheticsCreatePrivateLocation.guid".to_string(),
            ));
        }
        Ok(payload.location)
    }

    /// Update the mutable fields of a private location.
    pub async fn update_private_location(
        &self,
        guid: &str,
        description: &str,
        verified_script_execution: bool,
    ) -> Result<PrivateLocation, ApiError> {
        let document = format!(
            "mutation($guid: EntityGuid!, $description: String!, $verified: Boolean!) {{ \
             syntheticsUpdatePrivateLocation(guid: $guid, description: $description, \
             verifiedScriptExecution: $verified) {{ {} }} }}",
            PRIVATE_LOCATION_FIELDS
        );
        let payload: PrivateLocationPayload = self
            .query(
                &document,
                json!({
                    "guid": guid,
                    "description": description,
                    "verified": verified_script_execution,
                }),
                "/syntheticsUpdatePrivateLocation",
            )
            .await?;
        check_payload(payload.errors)?;
        if payload.location.guid.is_empty() {
            return Err(ApiError::MissingData(
                "syntheticsUpdatePrivateLocation.guid".to_string(),
            ));
        }
        Ok(payload.location)
    }

    /// Delete a private location.
    pub async fn delete_private_location(&self, guid: &str) -> Result<(), ApiError> {
        let payload: DeletePayload = self
            .query(
                "mutation($guid: EntityGuid!) { \
                 syntheticsDeletePrivateLocation(guid: $guid) { errors { description type } } }",
                json!({ "guid": guid }),
                "/syntheticsDeletePrivateLocation",
            )
            .await?;
        check_payload(payload.errors)
    }
}
