//! Entity search and lookup.
//!
//! Entity search returns outlines of many concrete shapes. They are decoded
//! into [`EntityOutline`], whose [`EntityKind`] is chosen by the `entityType`
//! discriminant.

use serde::Deserialize;
use serde_json::json;

use super::NerdGraphClient;
use crate::error::ApiError;

/// Entity-type specific fields of an outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// An APM application.
    ApmApplication {
        /// Application ID.
        application_id: Option<i64>,
    },
    /// A browser application.
    BrowserApplication {
        /// Application ID.
        application_id: Option<i64>,
        /// APM application that serves the browser application.
        serving_apm_application_id: Option<i64>,
    },
    /// A mobile application.
    MobileApplication {
        /// Application ID.
        application_id: Option<i64>,
    },
    /// Any other entity type.
    Generic,
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawEntityOutline")]
pub struct EntityOutline {
    /// Entity GUID.
    pub guid: String,
    /// Entity name.
    pub name: String,
    /// Owning account.
    pub account_id: i64,
    /// Domain, e.g. APM.
    pub domain: String,
    /// Type, e.g. APPLICATION.
    pub entity_type: String,
    /// Type-specific fields.
    pub kind: EntityKind,
}

impl EntityOutline {
    /// Application ID of application entities.
    pub fn application_id(&self) -> Option<i64> {
        match &self.kind {
            EntityKind::ApmApplication { application_id }
            | EntityKind::BrowserApplication { application_id, .. }
            | EntityKind::MobileApplication { application_id } => *application_id,
            EntityKind::Generic => None,
        }
    }

    /// Serving APM application of browser applications, when positive.
    pub fn serving_apm_application_id(&self) -> Option<i64> {
        match &self.kind {
            EntityKind::BrowserApplication {
                serving_apm_application_id: Some(id),
                ..
            } if *id > 0 => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntityOutline {
    guid: String,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    account_id: i64,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    domain: String,
    #[serde(rename = "type", default, deserialize_with = "crate::client::null_as_default")]
    entity_type: String,
    #[serde(rename = "entityType", default, deserialize_with = "crate::client::null_as_default")]
    discriminant: String,
    #[serde(default)]
    application_id: Option<i64>,
    #[serde(default)]
    serving_apm_application_id: Option<i64>,
}

impl From<RawEntityOutline> for EntityOutline {
    fn from(raw: RawEntityOutline) -> Self {
        let kind = match raw.discriminant.as_str() {
            "APM_APPLICATION_ENTITY" => EntityKind::ApmApplication {
                application_id: raw.application_id,
            },
            "BROWSER_APPLICATION_ENTITY" => EntityKind::BrowserApplication {
                application_id: raw.application_id,
                serving_apm_application_id: raw.serving_apm_application_id,
            },
            "MOBILE_APPLICATION_ENTITY" => EntityKind::MobileApplication {
                application_id: raw.application_id,
            },
            _ => EntityKind::Generic,
        };
        Self {
            guid: raw.guid,
            name: raw.name,
            account_id: raw.account_id,
            domain: raw.domain,
            entity_type: raw.entity_type,
            kind,
        }
    }
}

const OUTLINE_FIELDS: &str = "guid name accountId domain type entityType \
     ... on ApmApplicationEntityOutline { applicationId } \
     ... on BrowserApplicationEntityOutline { applicationId servingApmApplicationId } \
     ... on MobileApplicationEntityOutline { applicationId }";

impl NerdGraphClient {
    /// Run an entity search query and return every matching outline.
    pub async fn search_entities(&self, query: &str) -> Result<Vec<EntityOutline>, ApiError> {
        let document = format!(
            "query($query: String!) {{ actor {{ entitySearch(query: $query) {{ \
             results {{ entities {{ {} }} }} }} }} }}",
            OUTLINE_FIELDS
        );
        let entities: Option<Vec<EntityOutline>> = self
            .query_optional(
                &document,
                json!({ "query": query }),
                "/actor/entitySearch/results/entities",
            )
            .await?;
        Ok(entities.unwrap_or_default())
    }

    /// Fetch a single entity by GUID, `None` if it does not exist.
    pub async fn get_entity(&self, guid: &str) -> Result<Option<EntityOutline>, ApiError> {
        self.query_optional(
            "query($guid: EntityGuid!) { actor { entity(guid: $guid) { \
             guid name accountId domain type entityType } } }",
            json!({ "guid": guid }),
            "/actor/entity",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outline_variants() {
        let browser: EntityOutline = serde_json::from_value(json!({
            "guid": "MXxCUk9XU0VS",
            "name": "web",
            "accountId": 1,
            "domain": "BROWSER",
            "type": "APPLICATION",
            "entityType": "BROWSER_APPLICATION_ENTITY",
            "applicationId": 99,
            "servingApmApplicationId": 12
        }))
        .unwrap();
        assert_eq!(browser.application_id(), Some(99));
        assert_eq!(browser.serving_apm_application_id(), Some(12));

        let apm: EntityOutline = serde_json::from_value(json!({
            "guid": "MXxBUE0",
            "name": "api",
            "accountId": 1,
            "domain": "APM",
            "type": "APPLICATION",
            "entityType": "APM_APPLICATION_ENTITY",
            "applicationId": 7
        }))
        .unwrap();
        assert_eq!(
            apm.kind,
            EntityKind::ApmApplication {
                application_id: Some(7)
            }
        );
        assert_eq!(apm.serving_apm_application_id(), None);

        let host: EntityOutline = serde_json::from_value(json!({
            "guid": "MXxJTkZSQQ",
            "name": "host-1",
            "accountId": 1,
            "domain": "INFRA",
            "type": "HOST",
            "entityType": "INFRASTRUCTURE_HOST_ENTITY"
        }))
        .unwrap();
        assert_eq!(host.kind, EntityKind::Generic);
        assert_eq!(host.application_id(), None);
    }

    #[test]
    fn test_browser_without_serving_app() {
        let browser: EntityOutline = serde_json::from_value(json!({
            "guid": "g",
            "name": "web",
            "accountId": 1,
            "domain": "BROWSER",
            "type": "APPLICATION",
            "entityType": "BROWSER_APPLICATION_ENTITY",
            "applicationId": 99,
            "servingApmApplicationId": 0
        }))
        .unwrap();
        assert_eq!(browser.serving_apm_application_id(), None);
    }
}
