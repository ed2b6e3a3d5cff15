//! `newrelic_synthetics_private_location`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::client::entities::EntityOutline;
use crate::client::synthetics::PrivateLocation;
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found};
use crate::schema::{Attribute, Diagnostic, Schema};

/// State of a private location. The ID is the entity GUID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticsPrivateLocationState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub verified_script_execution: bool,
    pub domain_id: Option<String>,
    pub guid: Option<String>,
    pub key: Option<String>,
    pub location_id: Option<String>,
}

/// Synthetics private location resource.
pub struct SyntheticsPrivateLocationResource;

fn flatten_location(
    location: PrivateLocation,
    account_id: i64,
    planned: SyntheticsPrivateLocationState,
) -> SyntheticsPrivateLocationState {
    SyntheticsPrivateLocationState {
        id: Some(location.guid.clone()),
        account_id: Some(account_id),
        domain_id: Some(location.domain_id),
        guid: Some(location.guid),
        key: Some(location.key),
        location_id: Some(location.location_id),
        ..planned
    }
}

/// Refresh the entity-backed attributes. The remaining ones are not exposed
/// by entity search and keep their stored values.
fn flatten_entity(entity: EntityOutline, current: SyntheticsPrivateLocationState) -> SyntheticsPrivateLocationState {
    SyntheticsPrivateLocationState {
        id: Some(entity.guid.clone()),
        account_id: Some(entity.account_id),
        name: entity.name,
        guid: Some(entity.guid),
        ..current
    }
}

#[async_trait]
impl Resource for SyntheticsPrivateLocationResource {
    type State = SyntheticsPrivateLocationState;

    fn type_name(&self) -> &'static str {
        "newrelic_synthetics_private_location"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64().with_description("The ID of the account in New Relic."),
            )
            .with_attribute(
                "description",
                Attribute::required_string().with_description("The private location description."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the private location.")
                    .with_force_new(),
            )
            .with_attribute(
                "verified_script_execution",
                Attribute::optional_bool()
                    .with_description("The private location requires a password to edit if value is true.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "domain_id",
                Attribute::computed_string().with_description("The private location globally unique identifier."),
            )
            .with_attribute("guid", Attribute::computed_string().with_description("The guid of the entity to tag."))
            .with_attribute("key", Attribute::computed_string().with_description("The private locations key.").sensitive())
            .with_attribute(
                "location_id",
                Attribute::computed_string().with_description("An alternate identifier based on name."),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: SyntheticsPrivateLocationState,
    ) -> Result<Applied<SyntheticsPrivateLocationState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let location = config
            .client
            .create_private_location(
                account_id,
                &planned.name,
                &planned.description,
                planned.verified_script_execution,
            )
            .await?;
        info!(guid = %location.guid, account_id, "created private location");
        Ok(Applied::present(flatten_location(location, account_id, planned)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: SyntheticsPrivateLocationState,
    ) -> Result<Applied<SyntheticsPrivateLocationState>, ProviderError> {
        let guid = existing_id(&current.id)?;
        if guid.trim().is_empty() {
            return Err(ProviderError::InvalidId("invalid GUID".to_string()));
        }
        match config.client.get_entity(guid).await {
            Ok(Some(entity)) => Ok(Applied::present(flatten_entity(entity, current))),
            Ok(None) => Ok(Applied::absent()),
            Err(err) if err.is_not_found() => Ok(Applied::absent()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: SyntheticsPrivateLocationState,
        planned: SyntheticsPrivateLocationState,
    ) -> Result<Applied<SyntheticsPrivateLocationState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let guid = existing_id(&prior.id)?;
        let location = config
            .client
            .update_private_location(guid, &planned.description, planned.verified_script_execution)
            .await?;
        Ok(Applied::present(flatten_location(location, account_id, planned)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: SyntheticsPrivateLocationState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let guid = existing_id(&current.id)?;
        ignore_not_found(config.client.delete_private_location(guid).await)?;
        Ok(Vec::new())
    }
}
