//! `newrelic_alert_compound_condition`
//!
//! A compound condition combines at least two existing alert conditions with a
//! boolean trigger expression over their aliases.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::client::alerts::{ComponentCondition, CompoundCondition, CompoundConditionInput};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::nrql::condition_entity_guid;
use crate::resource::{Applied, Resource};
use crate::resources::{default_true, existing_id, ignore_not_found, non_empty};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema, Validator};

/// Accepted `facet_matching_behavior` values.
pub const FACET_MATCHING_BEHAVIORS: &[&str] = &["FACETS_MATCH", "FACETS_IGNORED"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConditionState {
    pub id: String,
    pub alias: String,
}

/// State of a compound alert condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertCompoundConditionState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub policy_id: i64,
    pub name: String,
    pub enabled: bool,
    pub trigger_expression: String,
    pub component_conditions: Vec<ComponentConditionState>,
    pub facet_matching_behavior: String,
    pub runbook_url: Option<String>,
    pub threshold_duration: Option<i64>,
    pub entity_guid: Option<String>,
}

impl Default for AlertCompoundConditionState {
    fn default() -> Self {
        Self {
            id: None,
            account_id: None,
            policy_id: 0,
            name: String::new(),
            enabled: default_true(),
            trigger_expression: String::new(),
            component_conditions: Vec::new(),
            facet_matching_behavior: String::new(),
            runbook_url: None,
            threshold_duration: None,
            entity_guid: None,
        }
    }
}

/// Compound alert condition resource.
pub struct AlertCompoundConditionResource;

/// Convert component conditions, rejecting repeated aliases.
fn expand_component_conditions(
    components: &[ComponentConditionState],
) -> Result<Vec<ComponentCondition>, ProviderError> {
    let mut aliases = HashSet::new();
    components
        .iter()
        .map(|component| {
            if !aliases.insert(component.alias.as_str()) {
                return Err(ProviderError::Validation(format!(
                    "duplicate alias '{}' found in component_conditions",
                    component.alias
                )));
            }
            Ok(ComponentCondition {
                id: component.id.clone(),
                alias: component.alias.clone(),
            })
        })
        .collect()
}

fn expand_condition_input(
    state: &AlertCompoundConditionState,
    policy_id: Option<String>,
) -> Result<CompoundConditionInput, ProviderError> {
    Ok(CompoundConditionInput {
        name: state.name.clone(),
        enabled: state.enabled,
        trigger_expression: state.trigger_expression.clone(),
        component_conditions: expand_component_conditions(&state.component_conditions)?,
        policy_id,
        facet_matching_behavior: non_empty(&state.facet_matching_behavior),
        runbook_url: state.runbook_url.as_deref().and_then(non_empty),
        threshold_duration: state.threshold_duration.filter(|d| *d != 0),
    })
}

fn flatten_condition(
    account_id: i64,
    condition: CompoundCondition,
) -> Result<AlertCompoundConditionState, ProviderError> {
    let policy_id = condition.policy_id.parse::<i64>().map_err(|err| {
        ProviderError::Sdk(format!("error converting policy ID to int: {}", err))
    })?;
    Ok(AlertCompoundConditionState {
        entity_guid: Some(condition_entity_guid(account_id, &condition.id)),
        id: Some(condition.id),
        account_id: Some(account_id),
        policy_id,
        name: condition.name,
        enabled: condition.enabled,
        trigger_expression: condition.trigger_expression,
        component_conditions: condition
            .component_conditions
            .into_iter()
            .map(|c| ComponentConditionState {
                id: c.id,
                alias: c.alias,
            })
            .collect(),
        facet_matching_behavior: condition.facet_matching_behavior.unwrap_or_default(),
        runbook_url: condition.runbook_url,
        threshold_duration: condition.threshold_duration,
    })
}

#[async_trait]
impl Resource for AlertCompoundConditionResource {
    type State = AlertCompoundConditionState;

    fn type_name(&self) -> &'static str {
        "newrelic_alert_compound_condition"
    }

    fn schema(&self) -> Schema {
        let component = Block::new()
            .with_attribute(
                "id",
                Attribute::required_string()
                    .with_description("The ID of the existing alert condition to use as a component."),
            )
            .with_attribute(
                "alias",
                Attribute::required_string()
                    .with_description("Identifier used in trigger_expression, e.g. A, B, C.")
                    .with_validator(Validator::matches(
                        "^[A-Za-z][A-Za-z0-9_]*$",
                        "alias must start with a letter and contain only letters, numbers, and underscores",
                    )),
            );

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The New Relic account ID for managing your compound alert conditions."),
            )
            .with_attribute(
                "policy_id",
                Attribute::required_int64()
                    .with_description("The ID of the policy where this condition should be used.")
                    .with_force_new(),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The title of the compound alert condition."),
            )
            .with_attribute(
                "enabled",
                Attribute::optional_bool()
                    .with_description("Whether or not to enable the alert condition.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "trigger_expression",
                Attribute::required_string().with_description(
                    "How component evaluations are combined, e.g. 'A AND (B OR C) AND NOT D'.",
                ),
            )
            .with_block(
                "component_conditions",
                NestedBlock::set(component).with_min_items(2),
            )
            .with_attribute(
                "facet_matching_behavior",
                Attribute::optional_string()
                    .with_description("How facets of the component conditions are taken into account.")
                    .with_default(json!("FACETS_IGNORED"))
                    .with_validator(Validator::one_of(FACET_MATCHING_BEHAVIORS)),
            )
            .with_attribute(
                "runbook_url",
                Attribute::optional_string().with_description("Runbook URL to display in notifications."),
            )
            .with_attribute(
                "threshold_duration",
                Attribute::optional_computed_int64()
                    .with_description("Seconds the trigger expression must hold before the condition activates.")
                    .with_validator(Validator::int_between(30, 1440)),
            )
            .with_attribute(
                "entity_guid",
                Attribute::computed_string()
                    .with_description("The unique entity identifier of the condition in New Relic."),
            )
    }

    fn validate(&self, state: &AlertCompoundConditionState) -> Vec<Diagnostic> {
        match expand_component_conditions(&state.component_conditions) {
            Ok(_) => Vec::new(),
            Err(err) => vec![Diagnostic::error(err.message()).with_attribute("component_conditions")],
        }
    }

    #[instrument(skip_all, fields(name = %planned.name, policy_id = planned.policy_id))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: AlertCompoundConditionState,
    ) -> Result<Applied<AlertCompoundConditionState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let input = expand_condition_input(&planned, None)?;
        let condition = config
            .client
            .create_compound_condition(account_id, &planned.policy_id.to_string(), &input)
            .await?;
        info!(condition_id = %condition.id, "created compound alert condition");
        Ok(Applied::present(flatten_condition(account_id, condition)?))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: AlertCompoundConditionState,
    ) -> Result<Applied<AlertCompoundConditionState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let condition_id = existing_id(&current.id)?.to_string();
        let conditions = match config
            .client
            .search_compound_conditions(account_id, &[condition_id.clone()])
            .await
        {
            Ok(conditions) => conditions,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        match conditions.into_iter().find(|c| c.id == condition_id) {
            Some(condition) => Ok(Applied::present(flatten_condition(account_id, condition)?)),
            None => {
                warn!(condition_id, "compound alert condition not found, removing from state");
                Ok(Applied::absent())
            },
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: AlertCompoundConditionState,
        planned: AlertCompoundConditionState,
    ) -> Result<Applied<AlertCompoundConditionState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let condition_id = existing_id(&prior.id)?.to_string();
        let input = expand_condition_input(&planned, Some(planned.policy_id.to_string()))?;
        config
            .client
            .update_compound_condition(account_id, &condition_id, &input)
            .await?;
        self.read(
            config,
            AlertCompoundConditionState {
                id: Some(condition_id),
                ..planned
            },
        )
        .await
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: AlertCompoundConditionState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let condition_id = existing_id(&current.id)?;
        ignore_not_found(
            config
                .client
                .delete_compound_condition(account_id, condition_id)
                .await,
        )?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn component(id: &str, alias: &str) -> ComponentConditionState {
        ComponentConditionState {
            id: id.into(),
            alias: alias.into(),
        }
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let err = expand_component_conditions(&[component("1", "a"), component("2", "a")]).unwrap_err();
        assert_eq!(err.message(), "duplicate alias 'a' found in component_conditions");

        let state = AlertCompoundConditionState {
            component_conditions: vec![component("1", "a"), component("2", "a")],
            ..Default::default()
        };
        let diags = AlertCompoundConditionResource.validate(&state);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("component_conditions"));
    }

    #[test]
    fn test_expand_optional_fields() {
        let state = AlertCompoundConditionState {
            name: "combined".into(),
            trigger_expression: "A AND B".into(),
            component_conditions: vec![component("1", "A"), component("2", "B")],
            facet_matching_behavior: "FACETS_MATCH".into(),
            runbook_url: Some(String::new()),
            ..Default::default()
        };
        let input = expand_condition_input(&state, None).unwrap();
        assert!(input.enabled);
        assert_eq!(input.facet_matching_behavior.as_deref(), Some("FACETS_MATCH"));
        assert_eq!(input.runbook_url, None);
        assert_eq!(input.threshold_duration, None);
        assert_eq!(input.policy_id, None);
        assert_eq!(input.component_conditions.len(), 2);
    }

    #[test]
    fn test_flatten_sets_entity_guid() {
        let condition = CompoundCondition {
            id: "789".into(),
            name: "combined".into(),
            enabled: true,
            policy_id: "55".into(),
            trigger_expression: "A OR B".into(),
            component_conditions: vec![
                ComponentCondition {
                    id: "1".into(),
                    alias: "A".into(),
                },
                ComponentCondition {
                    id: "2".into(),
                    alias: "B".into(),
                },
            ],
            facet_matching_behavior: Some("FACETS_IGNORED".into()),
            runbook_url: None,
            threshold_duration: Some(60),
        };
        let state = flatten_condition(12345, condition).unwrap();
        assert_eq!(state.policy_id, 55);
        assert_eq!(state.id.as_deref(), Some("789"));
        assert_eq!(state.entity_guid, Some(condition_entity_guid(12345, "789")));
        assert_eq!(state.threshold_duration, Some(60));
    }

    #[test]
    fn test_flatten_rejects_non_numeric_policy() {
        let condition = CompoundCondition {
            id: "1".into(),
            name: "x".into(),
            enabled: true,
            policy_id: "abc".into(),
            trigger_expression: "A".into(),
            component_conditions: Vec::new(),
            facet_matching_behavior: None,
            runbook_url: None,
            threshold_duration: None,
        };
        assert!(flatten_condition(1, condition).is_err());
    }
}
