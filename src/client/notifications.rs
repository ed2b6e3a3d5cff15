//! Notification destinations and channels (`aiNotifications`).

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_payload, NerdGraphClient};
use crate::error::{ApiError, PayloadError};

/// A key/value property of a destination or channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Display value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

/// Header key of a custom-header authentication (values are write-only).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomHeaderKey {
    /// Header name.
    pub key: String,
}

/// Destination authentication as returned by the API, keyed by `authType`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "authType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationAuth {
    /// Username and password.
    Basic {
        /// Username.
        user: String,
    },
    /// Bearer-style token.
    Token {
        /// Token prefix, e.g. `Bearer`.
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Arbitrary headers.
    CustomHeaders {
        /// Header names.
        #[serde(rename = "customHeaders", default, deserialize_with = "crate::client::null_as_default")]
        custom_headers: Vec<CustomHeaderKey>,
    },
}

/// The non-secret part of a secure URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecureUrl {
    /// URL prefix.
    pub prefix: String,
}

/// A notification destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Destination ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Destination type, e.g. WEBHOOK.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the destination is active.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub active: bool,
    /// Owning account.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub account_id: i64,
    /// Entity GUID.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub guid: String,
    /// Destination status.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub status: String,
    /// Last time a notification was sent.
    #[serde(default)]
    pub last_sent: Option<String>,
    /// Type-specific properties.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub properties: Vec<Property>,
    /// Authentication, if any.
    #[serde(default)]
    pub auth: Option<DestinationAuth>,
    /// Secure URL, if any.
    #[serde(default)]
    pub secure_url: Option<SecureUrl>,
}

/// Basic authentication input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicAuthInput {
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
}

/// Token authentication input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAuthInput {
    /// Token prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Token.
    pub token: String,
}

/// A custom header input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomHeaderInput {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
}

/// Destination authentication input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInput {
    /// BASIC, TOKEN or CUSTOM_HEADERS.
    #[serde(rename = "type")]
    pub kind: String,
    /// Basic credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicAuthInput>,
    /// Token credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenAuthInput>,
    /// Custom headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<Vec<CustomHeaderInput>>,
}

impl AuthInput {
    /// Basic authentication.
    pub fn basic(user: String, password: String) -> Self {
        Self {
            kind: "BASIC".to_string(),
            basic: Some(BasicAuthInput { user, password }),
            token: None,
            custom_headers: None,
        }
    }

    /// Token authentication.
    pub fn token(prefix: Option<String>, token: String) -> Self {
        Self {
            kind: "TOKEN".to_string(),
            basic: None,
            token: Some(TokenAuthInput { prefix, token }),
            custom_headers: None,
        }
    }

    /// Custom header authentication.
    pub fn custom_headers(headers: Vec<CustomHeaderInput>) -> Self {
        Self {
            kind: "CUSTOM_HEADERS".to_string(),
            basic: None,
            token: None,
            custom_headers: Some(headers),
        }
    }
}

/// Secure URL input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureUrlInput {
    /// URL prefix.
    pub prefix: String,
    /// Secret suffix.
    pub secure_suffix: String,
}

/// Create and update input for a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationInput {
    /// Display name.
    pub name: String,
    /// Destination type; omitted on update.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether the destination is active.
    pub active: bool,
    /// Type-specific properties.
    pub properties: Vec<Property>,
    /// Authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthInput>,
    /// Secure URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<SecureUrlInput>,
}

/// A notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Channel ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Channel type, e.g. WEBHOOK.
    #[serde(rename = "type")]
    pub kind: String,
    /// Destination this channel sends to.
    pub destination_id: String,
    /// Product, e.g. IINT.
    pub product: String,
    /// Whether the channel is active.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub active: bool,
    /// Owning account.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub account_id: i64,
    /// Channel status.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub status: String,
    /// Type-specific properties.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub properties: Vec<Property>,
}

/// Create and update input for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInput {
    /// Display name.
    pub name: String,
    /// Channel type; omitted on update.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Destination; omitted on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    /// Product; omitted on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Whether the channel is active.
    pub active: bool,
    /// Type-specific properties.
    pub properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
struct DestinationPayload {
    destination: Option<Destination>,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    channel: Option<Channel>,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct DeletePayload {
    #[serde(default)]
    error: Option<PayloadError>,
}

const DESTINATION_FIELDS: &str = "id name type active accountId guid status lastSent \
     properties { key value label displayValue } \
     auth { authType ... on AiNotificationsBasicAuth { user } \
     ... on AiNotificationsTokenAuth { prefix } \
     ... on AiNotificationsCustomHeadersAuth { customHeaders { key } } } \
     secureUrl { prefix }";

const CHANNEL_FIELDS: &str = "id name type destinationId product active accountId status \
     properties { key value label displayValue }";

const RESPONSE_ERROR: &str = "... on AiNotificationsResponseError { description type }";

impl NerdGraphClient {
    /// Create a destination.
    pub async fn create_destination(
        &self,
        account_id: i64,
        destination: &DestinationInput,
    ) -> Result<Destination, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $destination: AiNotificationsDestinationInput!) {{ \
             aiNotificationsCreateDestination(accountId: $accountId, destination: $destination) {{ \
             destination {{ {} }} errors {{ {} }} }} }}",
            DESTINATION_FIELDS, RESPONSE_ERROR
        );
        let payload: DestinationPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "destination": destination }),
                "/aiNotificationsCreateDestination",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .destination
            .ok_or_else(|| ApiError::MissingData("aiNotificationsCreateDestination.destination".into()))
    }

    /// Fetch a destination, `None` if it does not exist.
    pub async fn get_destination(
        &self,
        account_id: i64,
        destination_id: &str,
    ) -> Result<Option<Destination>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $id: ID!) {{ actor {{ account(id: $accountId) {{ \
             aiNotifications {{ destinations(filters: {{ id: $id }}) {{ entities {{ {} }} }} }} }} }} }}",
            DESTINATION_FIELDS
        );
        let entities: Option<Vec<Destination>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id, "id": destination_id }),
                "/actor/account/aiNotifications/destinations/entities",
            )
            .await?;
        Ok(entities.and_then(|e| e.into_iter().find(|d| d.id == destination_id)))
    }

    /// Update a destination.
    pub async fn update_destination(
        &self,
        account_id: i64,
        destination_id: &str,
        destination: &DestinationInput,
    ) -> Result<Destination, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $destinationId: ID!, $destination: AiNotificationsDestinationUpdate!) {{ \
             aiNotificationsUpdateDestination(accountId: $accountId, destinationId: $destinationId, destination: $destination) {{ \
             destination {{ {} }} errors {{ {} }} }} }}",
            DESTINATION_FIELDS, RESPONSE_ERROR
        );
        let payload: DestinationPayload = self
            .query(
                &document,
                json!({
                    "accountId": account_id,
                    "destinationId": destination_id,
                    "destination": destination
                }),
                "/aiNotificationsUpdateDestination",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .destination
            .ok_or_else(|| ApiError::MissingData("aiNotificationsUpdateDestination.destination".into()))
    }

    /// Delete a destination.
    pub async fn delete_destination(
        &self,
        account_id: i64,
        destination_id: &str,
    ) -> Result<(), ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $destinationId: ID!) {{ \
             aiNotificationsDeleteDestination(accountId: $accountId, destinationId: $destinationId) {{ \
             ids error {{ {} }} }} }}",
            RESPONSE_ERROR
        );
        let payload: DeletePayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "destinationId": destination_id }),
                "/aiNotificationsDeleteDestination",
            )
            .await?;
        check_payload(payload.error.into_iter().collect())
    }

    /// Create a channel.
    pub async fn create_channel(
        &self,
        account_id: i64,
        channel: &ChannelInput,
    ) -> Result<Channel, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $channel: AiNotificationsChannelInput!) {{ \
             aiNotificationsCreateChannel(accountId: $accountId, channel: $channel) {{ \
             channel {{ {} }} errors {{ {} }} }} }}",
            CHANNEL_FIELDS, RESPONSE_ERROR
        );
        let payload: ChannelPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "channel": channel }),
                "/aiNotificationsCreateChannel",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .channel
            .ok_or_else(|| ApiError::MissingData("aiNotificationsCreateChannel.channel".into()))
    }

    /// Fetch a channel, `None` if it does not exist.
    pub async fn get_channel(
        &self,
        account_id: i64,
        channel_id: &str,
    ) -> Result<Option<Channel>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $id: ID!) {{ actor {{ account(id: $accountId) {{ \
             aiNotifications {{ channels(filters: {{ id: $id }}) {{ entities {{ {} }} }} }} }} }} }}",
            CHANNEL_FIELDS
        );
        let entities: Option<Vec<Channel>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id, "id": channel_id }),
                "/actor/account/aiNotifications/channels/entities",
            )
            .await?;
        Ok(entities.and_then(|e| e.into_iter().find(|c| c.id == channel_id)))
    }

    /// Update a channel.
    pub async fn update_channel(
        &self,
        account_id: i64,
        channel_id: &str,
        channel: &ChannelInput,
    ) -> Result<Channel, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $channelId: ID!, $channel: AiNotificationsChannelUpdate!) {{ \
             aiNotificationsUpdateChannel(accountId: $accountId, channelId: $channelId, channel: $channel) {{ \
             channel {{ {} }} errors {{ {} }} }} }}",
            CHANNEL_FIELDS, RESPONSE_ERROR
        );
        let payload: ChannelPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "channelId": channel_id, "channel": channel }),
                "/aiNotificationsUpdateChannel",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .channel
            .ok_or_else(|| ApiError::MissingData("aiNotificationsUpdateChannel.channel".into()))
    }

    /// Delete a channel.
    pub async fn delete_channel(&self, account_id: i64, channel_id: &str) -> Result<(), ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $channelId: ID!) {{ \
             aiNotificationsDeleteChannel(accountId: $accountId, channelId: $channelId) {{ \
             ids error {{ {} }} }} }}",
            RESPONSE_ERROR
        );
        let payload: DeletePayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "channelId": channel_id }),
                "/aiNotificationsDeleteChannel",
            )
            .await?;
        check_payload(payload.error.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_destination_auth_is_tagged_by_auth_type() {
        let basic: DestinationAuth =
            serde_json::from_value(json!({"authType": "BASIC", "user": "ops"})).unwrap();
        assert_eq!(
            basic,
            DestinationAuth::Basic {
                user: "ops".into()
            }
        );

        let token: DestinationAuth =
            serde_json::from_value(json!({"authType": "TOKEN", "prefix": "Bearer"})).unwrap();
        assert_eq!(
            token,
            DestinationAuth::Token {
                prefix: Some("Bearer".into())
            }
        );

        let headers: DestinationAuth = serde_json::from_value(json!({
            "authType": "CUSTOM_HEADERS",
            "customHeaders": [{"key": "X-Team"}]
        }))
        .unwrap();
        assert!(matches!(headers, DestinationAuth::CustomHeaders { custom_headers } if custom_headers[0].key == "X-Team"));
    }

    #[test]
    fn test_auth_input_serialization() {
        let auth = AuthInput::token(Some("Bearer".into()), "secret".into());
        assert_eq!(
            serde_json::to_value(&auth).unwrap(),
            json!({"type": "TOKEN", "token": {"prefix": "Bearer", "token": "secret"}})
        );
    }
}
