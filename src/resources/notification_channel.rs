//! `newrelic_notification_channel`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::client::notifications::{Channel, ChannelInput};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::notification_destination::{property_block, PropertyState, DESTINATION_TYPES};
use crate::resources::{default_true, existing_id, ignore_not_found};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Products a channel can serve.
pub const CHANNEL_PRODUCTS: &[&str] = &[
    "ALERTS",
    "DISCUSSIONS",
    "ERROR_TRACKING",
    "IINT",
    "NTFC",
    "PD",
    "SHARING",
];

/// State of a notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationChannelState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    pub destination_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub product: String,
    pub active: bool,
    pub property: Vec<PropertyState>,
    pub status: Option<String>,
}

impl Default for NotificationChannelState {
    fn default() -> Self {
        Self {
            id: None,
            account_id: None,
            name: String::new(),
            destination_id: String::new(),
            kind: String::new(),
            product: String::new(),
            active: default_true(),
            property: Vec::new(),
            status: None,
        }
    }
}

/// Notification channel resource.
pub struct NotificationChannelResource;

/// Build the API input. Identity fields are only sent on create.
fn expand_channel(state: &NotificationChannelState, creating: bool) -> ChannelInput {
    ChannelInput {
        name: state.name.clone(),
        kind: creating.then(|| state.kind.clone()),
        destination_id: creating.then(|| state.destination_id.clone()),
        product: creating.then(|| state.product.clone()),
        active: state.active,
        properties: state.property.iter().map(PropertyState::expand).collect(),
    }
}

fn flatten_channel(channel: Channel, account_id: i64) -> NotificationChannelState {
    NotificationChannelState {
        id: Some(channel.id),
        account_id: Some(if channel.account_id != 0 {
            channel.account_id
        } else {
            account_id
        }),
        name: channel.name,
        destination_id: channel.destination_id,
        kind: channel.kind,
        product: channel.product,
        active: channel.active,
        property: channel
            .properties
            .into_iter()
            .map(PropertyState::flatten)
            .collect(),
        status: Some(channel.status),
    }
}

#[async_trait]
impl Resource for NotificationChannelResource {
    type State = NotificationChannelState;

    fn type_name(&self) -> &'static str {
        "newrelic_notification_channel"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64().with_description("The account ID under which to put the channel."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the channel."),
            )
            .with_attribute(
                "destination_id",
                Attribute::required_string()
                    .with_description("The id of the destination.")
                    .with_force_new(),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description(format!("The type of the channel. One of: ({}).", DESTINATION_TYPES.join(", ")))
                    .with_force_new()
                    .with_validator(Validator::one_of(DESTINATION_TYPES)),
            )
            .with_attribute(
                "product",
                Attribute::required_string()
                    .with_description(format!("The product of the channel. One of: ({}).", CHANNEL_PRODUCTS.join(", ")))
                    .with_force_new()
                    .with_validator(Validator::one_of(CHANNEL_PRODUCTS)),
            )
            .with_attribute(
                "active",
                Attribute::optional_bool()
                    .with_description("Indicates whether the channel is active.")
                    .with_default(json!(true)),
            )
            .with_block("property", property_block("channel"))
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("The status of the channel."),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name, destination_id = %planned.destination_id))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: NotificationChannelState,
    ) -> Result<Applied<NotificationChannelState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let channel = client
            .create_channel(account_id, &expand_channel(&planned, true))
            .await?;
        info!(channel_id = %channel.id, account_id, "created notification channel");
        Ok(Applied::present(flatten_channel(channel, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: NotificationChannelState,
    ) -> Result<Applied<NotificationChannelState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        match client.get_channel(account_id, id).await {
            Ok(Some(channel)) => Ok(Applied::present(flatten_channel(channel, account_id))),
            Ok(None) => Ok(Applied::absent()),
            Err(err) if err.is_not_found() => Ok(Applied::absent()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: NotificationChannelState,
        planned: NotificationChannelState,
    ) -> Result<Applied<NotificationChannelState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&prior.id)?;
        let channel = client
            .update_channel(account_id, id, &expand_channel(&planned, false))
            .await?;
        Ok(Applied::present(flatten_channel(channel, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: NotificationChannelState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(client.delete_channel(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_channel_identity_only_on_create() {
        let state = NotificationChannelState {
            name: "ops".into(),
            destination_id: "d-1".into(),
            kind: "EMAIL".into(),
            product: "IINT".into(),
            property: vec![PropertyState {
                key: "subject".into(),
                value: "{{ issueTitle }}".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let create = expand_channel(&state, true);
        assert_eq!(create.destination_id.as_deref(), Some("d-1"));
        assert_eq!(create.product.as_deref(), Some("IINT"));
        assert_eq!(create.properties[0].label, None);

        let update = expand_channel(&state, false);
        assert_eq!(update.destination_id, None);
        assert_eq!(update.kind, None);
        assert!(update.active);
    }

    #[test]
    fn test_schema_rejects_unknown_product() {
        let diags = crate::validation::validate(
            &NotificationChannelResource.schema(),
            &json!({
                "name": "ops",
                "destination_id": "d-1",
                "type": "EMAIL",
                "product": "NOPE"
            }),
        );
        assert_eq!(diags.len(), 1);
    }
}
