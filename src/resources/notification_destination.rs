//! `newrelic_notification_destination`
//!
//! The API never returns secrets (passwords, tokens, custom header values,
//! secure URL suffixes), so flattening carries them over from the prior state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::client::notifications::{
    AuthInput, CustomHeaderInput, Destination, DestinationAuth, DestinationInput, Property,
    SecureUrlInput,
};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{default_true, existing_id, ignore_not_found, non_empty};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema, Validator};

/// Destination types accepted by `type`.
pub const DESTINATION_TYPES: &[&str] = &[
    "EMAIL",
    "EVENT_BRIDGE",
    "JIRA",
    "MOBILE_PUSH",
    "PAGERDUTY_ACCOUNT_INTEGRATION",
    "PAGERDUTY_SERVICE_INTEGRATION",
    "SERVICE_NOW",
    "SLACK",
    "WEBHOOK",
];

/// A `property` block, shared with notification channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyState {
    pub key: String,
    pub value: String,
    pub label: String,
    pub display_value: String,
}

impl PropertyState {
    pub(crate) fn expand(&self) -> Property {
        Property {
            key: self.key.clone(),
            value: self.value.clone(),
            label: non_empty(&self.label),
            display_value: non_empty(&self.display_value),
        }
    }

    pub(crate) fn flatten(property: Property) -> Self {
        Self {
            key: property.key,
            value: property.value,
            label: property.label.unwrap_or_default(),
            display_value: property.display_value.unwrap_or_default(),
        }
    }
}

/// Schema of a `property` block.
pub(crate) fn property_block(subject: &str) -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "key",
                Attribute::required_string().with_description(format!("Notification {} property key.", subject)),
            )
            .with_attribute(
                "value",
                Attribute::required_string().with_description(format!("Notification {} property value.", subject)),
            )
            .with_attribute(
                "label",
                Attribute::optional_string().with_description(format!("Notification {} property label.", subject)),
            )
            .with_attribute(
                "display_value",
                Attribute::optional_string()
                    .with_description(format!("Notification {} property display value.", subject)),
            ),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthBasicState {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthTokenState {
    pub prefix: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomHeaderState {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureUrlState {
    pub prefix: String,
    pub secure_suffix: String,
}

/// State of a notification destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDestinationState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub active: bool,
    pub property: Vec<PropertyState>,
    pub auth_basic: Vec<AuthBasicState>,
    pub auth_token: Vec<AuthTokenState>,
    pub auth_custom_header: Vec<CustomHeaderState>,
    pub secure_url: Vec<SecureUrlState>,
    pub guid: Option<String>,
    pub status: Option<String>,
    pub last_sent: Option<String>,
}

impl Default for NotificationDestinationState {
    fn default() -> Self {
        Self {
            id: None,
            account_id: None,
            name: String::new(),
            kind: String::new(),
            active: default_true(),
            property: Vec::new(),
            auth_basic: Vec::new(),
            auth_token: Vec::new(),
            auth_custom_header: Vec::new(),
            secure_url: Vec::new(),
            guid: None,
            status: None,
            last_sent: None,
        }
    }
}

/// Notification destination resource.
pub struct NotificationDestinationResource;

fn expand_auth(state: &NotificationDestinationState) -> Option<AuthInput> {
    if let Some(basic) = state.auth_basic.first() {
        return Some(AuthInput::basic(basic.user.clone(), basic.password.clone()));
    }
    if let Some(token) = state.auth_token.first() {
        return Some(AuthInput::token(non_empty(&token.prefix), token.token.clone()));
    }
    if !state.auth_custom_header.is_empty() {
        return Some(AuthInput::custom_headers(
            state
                .auth_custom_header
                .iter()
                .map(|h| CustomHeaderInput {
                    key: h.key.clone(),
                    value: h.value.clone(),
                })
                .collect(),
        ));
    }
    None
}

/// Build the API input. The type is only sent on create.
fn expand_destination(state: &NotificationDestinationState, include_type: bool) -> DestinationInput {
    DestinationInput {
        name: state.name.clone(),
        kind: include_type.then(|| state.kind.clone()),
        active: state.active,
        properties: state.property.iter().map(PropertyState::expand).collect(),
        auth: expand_auth(state),
        secure_url: state.secure_url.first().map(|url| SecureUrlInput {
            prefix: url.prefix.clone(),
            secure_suffix: url.secure_suffix.clone(),
        }),
    }
}

fn flatten_destination(
    destination: Destination,
    prior: &NotificationDestinationState,
) -> NotificationDestinationState {
    let mut state = NotificationDestinationState {
        id: Some(destination.id),
        account_id: Some(destination.account_id).filter(|id| *id != 0).or(prior.account_id),
        name: destination.name,
        kind: destination.kind,
        active: destination.active,
        property: destination
            .properties
            .into_iter()
            .map(PropertyState::flatten)
            .collect(),
        guid: Some(destination.guid),
        status: Some(destination.status),
        last_sent: destination.last_sent,
        ..NotificationDestinationState::default()
    };

    match destination.auth {
        Some(DestinationAuth::Basic { user }) => {
            state.auth_basic = vec![AuthBasicState {
                user,
                password: prior
                    .auth_basic
                    .first()
                    .map(|a| a.password.clone())
                    .unwrap_or_default(),
            }];
        },
        Some(DestinationAuth::Token { prefix }) => {
            state.auth_token = vec![AuthTokenState {
                prefix: prefix.unwrap_or_default(),
                token: prior
                    .auth_token
                    .first()
                    .map(|a| a.token.clone())
                    .unwrap_or_default(),
            }];
        },
        Some(DestinationAuth::CustomHeaders { custom_headers }) => {
            state.auth_custom_header = custom_headers
                .into_iter()
                .map(|header| {
                    let value = prior
                        .auth_custom_header
                        .iter()
                        .find(|h| h.key == header.key)
                        .map(|h| h.value.clone())
                        .unwrap_or_default();
                    CustomHeaderState {
                        key: header.key,
                        value,
                    }
                })
                .collect();
        },
        None => {},
    }

    if let Some(url) = destination.secure_url.filter(|u| !u.prefix.is_empty()) {
        state.secure_url = vec![SecureUrlState {
            prefix: url.prefix,
            secure_suffix: prior
                .secure_url
                .first()
                .map(|u| u.secure_suffix.clone())
                .unwrap_or_default(),
        }];
    }

    state
}

#[async_trait]
impl Resource for NotificationDestinationResource {
    type State = NotificationDestinationState;

    fn type_name(&self) -> &'static str {
        "newrelic_notification_destination"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64().with_description("The account ID under which to put the destination."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the destination."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description(format!(
                        "The type of the destination. One of: ({}).",
                        DESTINATION_TYPES.join(", ")
                    ))
                    .with_force_new()
                    .with_validator(Validator::one_of(DESTINATION_TYPES)),
            )
            .with_attribute(
                "active",
                Attribute::optional_bool()
                    .with_description("Indicates whether the destination is active.")
                    .with_default(json!(true)),
            )
            .with_block("property", property_block("destination").with_min_items(1))
            .with_block(
                "auth_basic",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("user", Attribute::required_string())
                        .with_attribute("password", Attribute::required_string().sensitive()),
                )
                .with_max_items(1),
            )
            .with_block(
                "auth_token",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("prefix", Attribute::optional_string())
                        .with_attribute("token", Attribute::required_string().sensitive()),
                )
                .with_max_items(1),
            )
            .with_block(
                "auth_custom_header",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("key", Attribute::required_string())
                        .with_attribute("value", Attribute::required_string().sensitive()),
                ),
            )
            .with_block(
                "secure_url",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("prefix", Attribute::required_string())
                        .with_attribute("secure_suffix", Attribute::required_string().sensitive()),
                )
                .with_max_items(1),
            )
            .with_attribute(
                "guid",
                Attribute::computed_string().with_description("The unique entity identifier of the destination."),
            )
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("The status of the destination."),
            )
            .with_attribute(
                "last_sent",
                Attribute::computed_string().with_description("The last time a notification was sent."),
            )
    }

    fn validate(&self, state: &NotificationDestinationState) -> Vec<Diagnostic> {
        let configured = [
            ("auth_basic", !state.auth_basic.is_empty()),
            ("auth_token", !state.auth_token.is_empty()),
            ("auth_custom_header", !state.auth_custom_header.is_empty()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if configured.len() > 1 {
            vec![Diagnostic::error("only one authentication method can be configured")
                .with_detail(format!("conflicting blocks: {}", configured.join(", ")))]
        } else {
            Vec::new()
        }
    }

    #[instrument(skip_all, fields(name = %planned.name, kind = %planned.kind))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: NotificationDestinationState,
    ) -> Result<Applied<NotificationDestinationState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let input = expand_destination(&planned, true);
        let destination = client.create_destination(account_id, &input).await?;
        info!(destination_id = %destination.id, account_id, "created notification destination");
        let mut state = flatten_destination(destination, &planned);
        state.account_id = Some(account_id);
        Ok(Applied::present(state))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: NotificationDestinationState,
    ) -> Result<Applied<NotificationDestinationState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        match client.get_destination(account_id, id).await {
            Ok(Some(destination)) => Ok(Applied::present(flatten_destination(destination, &current))),
            Ok(None) => Ok(Applied::absent()),
            Err(err) if err.is_not_found() => Ok(Applied::absent()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: NotificationDestinationState,
        planned: NotificationDestinationState,
    ) -> Result<Applied<NotificationDestinationState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&prior.id)?;
        let input = expand_destination(&planned, false);
        let destination = client.update_destination(account_id, id, &input).await?;
        Ok(Applied::present(flatten_destination(destination, &planned)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: NotificationDestinationState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(client.delete_destination(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::notifications::{CustomHeaderKey, SecureUrl};
    use pretty_assertions::assert_eq;

    fn destination(auth: Option<DestinationAuth>) -> Destination {
        Destination {
            id: "d-1".into(),
            name: "hook".into(),
            kind: "WEBHOOK".into(),
            active: true,
            account_id: 10,
            guid: "GUID".into(),
            status: "DEFAULT".into(),
            last_sent: None,
            properties: vec![Property {
                key: "url".into(),
                value: "https://example.com".into(),
                label: None,
                display_value: None,
            }],
            auth,
            secure_url: Some(SecureUrl {
                prefix: "https://example.com/".into(),
            }),
        }
    }

    #[test]
    fn test_flatten_preserves_secrets() {
        let prior = NotificationDestinationState {
            auth_basic: vec![AuthBasicState {
                user: "old".into(),
                password: "s3cret".into(),
            }],
            secure_url: vec![SecureUrlState {
                prefix: "https://example.com/".into(),
                secure_suffix: "token".into(),
            }],
            ..Default::default()
        };
        let state = flatten_destination(
            destination(Some(DestinationAuth::Basic { user: "admin".into() })),
            &prior,
        );
        assert_eq!(
            state.auth_basic,
            vec![AuthBasicState {
                user: "admin".into(),
                password: "s3cret".into(),
            }]
        );
        assert_eq!(state.secure_url[0].secure_suffix, "token");
        assert_eq!(state.property[0].key, "url");
        assert_eq!(state.guid.as_deref(), Some("GUID"));
    }

    #[test]
    fn test_flatten_custom_headers_by_key() {
        let prior = NotificationDestinationState {
            auth_custom_header: vec![
                CustomHeaderState {
                    key: "X-A".into(),
                    value: "a".into(),
                },
                CustomHeaderState {
                    key: "X-B".into(),
                    value: "b".into(),
                },
            ],
            ..Default::default()
        };
        let state = flatten_destination(
            destination(Some(DestinationAuth::CustomHeaders {
                custom_headers: vec![CustomHeaderKey { key: "X-B".into() }],
            })),
            &prior,
        );
        assert_eq!(
            state.auth_custom_header,
            vec![CustomHeaderState {
                key: "X-B".into(),
                value: "b".into(),
            }]
        );
    }

    #[test]
    fn test_expand_token_auth() {
        let state = NotificationDestinationState {
            name: "pd".into(),
            kind: "PAGERDUTY_SERVICE_INTEGRATION".into(),
            auth_token: vec![AuthTokenState {
                prefix: String::new(),
                token: "abc".into(),
            }],
            ..Default::default()
        };
        let input = expand_destination(&state, true);
        let auth = input.auth.unwrap();
        assert_eq!(auth.kind, "TOKEN");
        assert_eq!(auth.token.unwrap().prefix, None);
        assert_eq!(input.kind.as_deref(), Some("PAGERDUTY_SERVICE_INTEGRATION"));
        assert!(input.active);

        assert_eq!(expand_destination(&state, false).kind, None);
    }

    #[test]
    fn test_validate_single_auth_method() {
        let state = NotificationDestinationState {
            auth_basic: vec![AuthBasicState::default()],
            auth_token: vec![AuthTokenState::default()],
            ..Default::default()
        };
        let diags = NotificationDestinationResource.validate(&state);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].detail.as_deref(), Some("conflicting blocks: auth_basic, auth_token"));
    }
}
