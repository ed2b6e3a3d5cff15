//! `newrelic_entity`
//!
//! Looks up a single entity by name through entity search. The search is
//! fuzzy, so results are filtered locally on the exact (trimmed) name and
//! the account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::client::entities::EntityOutline;
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::nrql::{build_entity_search_query, escape_single_quote, TagFilter};
use crate::resource::{Applied, DataSource};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};

/// Entity types accepted by the `type` filter.
pub const ENTITY_TYPES: &[&str] = &["APPLICATION", "DASHBOARD", "HOST", "MONITOR", "WORKLOAD"];

/// Entity domains accepted by the `domain` filter.
pub const ENTITY_DOMAINS: &[&str] = &["APM", "BROWSER", "INFRA", "MOBILE", "SYNTH", "VIZ"];

/// Configuration and result of an entity lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityState {
    pub id: Option<String>,
    pub name: String,
    pub ignore_case: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
    pub tag: Vec<TagFilter>,
    pub account_id: Option<i64>,
    pub guid: Option<String>,
    pub application_id: Option<i64>,
    pub serving_apm_application_id: Option<i64>,
}

/// Entity lookup data source.
pub struct EntityDataSource;

/// Search query for the configured filters.
fn search_query(state: &EntityState) -> String {
    build_entity_search_query(
        &escape_single_quote(&state.name),
        &state.domain.to_uppercase(),
        &state.kind.to_uppercase(),
        &state.tag,
    )
}

fn name_matches(candidate: &str, name: &str, ignore_case: bool) -> bool {
    let candidate = candidate.trim();
    candidate == name || (ignore_case && candidate.eq_ignore_ascii_case(name))
}

/// First entity whose name and account match.
fn select_entity(
    entities: Vec<EntityOutline>,
    name: &str,
    ignore_case: bool,
    account_id: i64,
) -> Option<EntityOutline> {
    entities
        .into_iter()
        .find(|e| name_matches(&e.name, name, ignore_case) && e.account_id == account_id)
}

fn flatten_entity(entity: EntityOutline, state: EntityState) -> EntityState {
    EntityState {
        id: Some(entity.guid.clone()),
        application_id: entity.application_id(),
        serving_apm_application_id: entity.serving_apm_application_id(),
        name: entity.name,
        kind: entity.entity_type,
        domain: entity.domain,
        account_id: Some(entity.account_id),
        guid: Some(entity.guid),
        ..state
    }
}

#[async_trait]
impl DataSource for EntityDataSource {
    type State = EntityState;

    fn type_name(&self) -> &'static str {
        "newrelic_entity"
    }

    fn schema(&self) -> Schema {
        let tag = Block::new()
            .with_attribute("key", Attribute::required_string().with_description("The tag key."))
            .with_attribute("value", Attribute::required_string().with_description("The tag value."));

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description(
                    "The name of the entity in New Relic One. \
                     The first entity matching this name for the given search parameters will be returned.",
                ),
            )
            .with_attribute(
                "ignore_case",
                Attribute::optional_bool()
                    .with_description("Ignore case when searching the entity name.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "type",
                Attribute::optional_computed_string()
                    .with_description("The entity's type.")
                    .with_validator(Validator::one_of_ignore_case(ENTITY_TYPES)),
            )
            .with_attribute(
                "domain",
                Attribute::optional_computed_string()
                    .with_description("The entity's domain. If not specified, all domains are searched.")
                    .with_validator(Validator::one_of_ignore_case(ENTITY_DOMAINS)),
            )
            .with_block("tag", NestedBlock::list(tag).with_max_items(1))
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64().with_description(
                    "The New Relic account ID; constrains the lookup to entities of this account.",
                ),
            )
            .with_attribute(
                "application_id",
                Attribute::computed_int64()
                    .with_description("The domain-specific ID of the entity (APM, browser and mobile applications)."),
            )
            .with_attribute(
                "serving_apm_application_id",
                Attribute::computed_int64()
                    .with_description("The browser-specific ID of the backing APM entity."),
            )
            .with_attribute("guid", Attribute::computed_string().with_description("A unique entity identifier."))
    }

    #[instrument(skip_all, fields(name = %state.name))]
    async fn read(&self, config: &ProviderConfig, state: EntityState) -> Result<Applied<EntityState>, ProviderError> {
        let account_id = select_account_id(config, state.account_id);
        let query = search_query(&state);
        debug!(%query, "searching entities");

        let entities = config.client.search_entities(&query).await?;
        match select_entity(entities, state.name.trim(), state.ignore_case, account_id) {
            Some(entity) => Ok(Applied::present(flatten_entity(entity, state))),
            None => Err(ProviderError::NotFound(format!(
                "the name '{}' does not match any New Relic One entity for the given search parameters (ignore_case: {})",
                state.name, state.ignore_case
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::entities::EntityKind;
    use pretty_assertions::assert_eq;

    fn outline(name: &str, account_id: i64, kind: EntityKind) -> EntityOutline {
        EntityOutline {
            guid: format!("GUID-{}-{}", name.trim(), account_id),
            name: name.to_string(),
            account_id,
            domain: "APM".into(),
            entity_type: "APPLICATION".into(),
            kind,
        }
    }

    #[test]
    fn test_search_query_escapes_and_uppercases() {
        let state = EntityState {
            name: "Bob's App".into(),
            kind: "application".into(),
            domain: "apm".into(),
            tag: vec![TagFilter::new("env", "prod")],
            ..Default::default()
        };
        assert_eq!(
            search_query(&state),
            "name = 'Bob\\'s App' AND domain = 'APM' AND type = 'APPLICATION' AND tags.`env` = 'prod'"
        );
    }

    #[test]
    fn test_select_entity_matching() {
        let entities = vec![
            outline("Dummy App Two", 1, EntityKind::Generic),
            outline("dummy app", 1, EntityKind::Generic),
            outline(" Dummy App ", 2, EntityKind::Generic),
            outline("Dummy App", 1, EntityKind::Generic),
        ];

        let found = select_entity(entities.clone(), "Dummy App", false, 1).unwrap();
        assert_eq!(found.guid, "GUID-Dummy App-1");

        let found = select_entity(entities.clone(), "Dummy App", true, 1).unwrap();
        assert_eq!(found.name, "dummy app");

        let found = select_entity(entities.clone(), "Dummy App", false, 2).unwrap();
        assert_eq!(found.account_id, 2);

        assert!(select_entity(entities, "Dummy App", false, 3).is_none());
    }

    #[test]
    fn test_flatten_entity_application_ids() {
        let entity = outline(
            "web",
            1,
            EntityKind::BrowserApplication {
                application_id: Some(99),
                serving_apm_application_id: Some(0),
            },
        );
        let state = flatten_entity(
            entity,
            EntityState {
                name: "web".into(),
                ignore_case: true,
                ..Default::default()
            },
        );
        assert_eq!(state.application_id, Some(99));
        assert_eq!(state.serving_apm_application_id, None);
        assert_eq!(state.kind, "APPLICATION");
        assert!(state.ignore_case);
        assert_eq!(state.id, state.guid);
    }
}
