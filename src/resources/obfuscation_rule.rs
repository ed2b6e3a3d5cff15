//! `newrelic_obfuscation_rule`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::logconfigurations::{
    ObfuscationAction, ObfuscationActionInput, ObfuscationRule, ObfuscationRuleInput,
};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found, non_empty};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};

/// Supported obfuscation methods.
pub const OBFUSCATION_METHODS: &[&str] = &["HASH_SHA256", "MASK"];

/// One `action` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionState {
    /// Attribute names; empty applies the action to every attribute.
    pub attribute: Vec<String>,
    pub expression_id: String,
    pub method: String,
}

impl ActionState {
    fn expand(&self) -> ObfuscationActionInput {
        ObfuscationActionInput {
            attributes: self.attribute.clone(),
            expression_id: self.expression_id.clone(),
            method: self.method.clone(),
        }
    }

    fn flatten(action: ObfuscationAction) -> Self {
        Self {
            attribute: action.attributes,
            expression_id: action.expression.id,
            method: action.method,
        }
    }
}

/// State of an obfuscation rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationRuleState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub filter: String,
    pub enabled: bool,
    pub action: Vec<ActionState>,
}

/// Obfuscation rule resource.
pub struct ObfuscationRuleResource;

fn expand_rule(state: &ObfuscationRuleState, id: Option<&str>) -> ObfuscationRuleInput {
    ObfuscationRuleInput {
        id: id.map(str::to_string),
        name: state.name.clone(),
        description: non_empty(&state.description),
        enabled: state.enabled,
        filter: state.filter.clone(),
        actions: state.action.iter().map(ActionState::expand).collect(),
    }
}

fn flatten_rule(rule: ObfuscationRule, account_id: i64) -> ObfuscationRuleState {
    ObfuscationRuleState {
        id: Some(rule.id),
        account_id: Some(account_id),
        name: rule.name,
        description: rule.description.unwrap_or_default(),
        filter: rule.filter,
        enabled: rule.enabled,
        action: rule.actions.into_iter().map(ActionState::flatten).collect(),
    }
}

#[async_trait]
impl Resource for ObfuscationRuleResource {
    type State = ObfuscationRuleState;

    fn type_name(&self) -> &'static str {
        "newrelic_obfuscation_rule"
    }

    fn schema(&self) -> Schema {
        let action = Block::new()
            .with_attribute(
                "attribute",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("Attribute names for action. An empty list applies the action to all the attributes."),
            )
            .with_attribute(
                "expression_id",
                Attribute::required_string().with_description("Expression Id for action."),
            )
            .with_attribute(
                "method",
                Attribute::required_string()
                    .with_description("Obfuscation method to use.")
                    .with_validator(Validator::one_of(OBFUSCATION_METHODS)),
            );

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The account id associated with the obfuscation rule."),
            )
            .with_attribute(
                "filter",
                Attribute::required_string().with_description(
                    "NRQL for determining whether a given log record should have obfuscation actions applied.",
                ),
            )
            .with_attribute("name", Attribute::required_string().with_description("Name of rule."))
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Whether the rule should be applied or not to incoming data."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of rule."),
            )
            .with_block("action", NestedBlock::set(action).with_min_items(1))
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: ObfuscationRuleState,
    ) -> Result<Applied<ObfuscationRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let rule = config
            .client
            .create_obfuscation_rule(account_id, &expand_rule(&planned, None))
            .await?;
        info!(rule_id = %rule.id, account_id, "created obfuscation rule");
        Ok(Applied::present(flatten_rule(rule, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: ObfuscationRuleState,
    ) -> Result<Applied<ObfuscationRuleState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        let rules = match config.client.list_obfuscation_rules(account_id).await {
            Ok(rules) => rules,
            Err(err) if err.is_not_found() => return Ok(Applied::absent()),
            Err(err) => return Err(err.into()),
        };
        Ok(rules
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| Applied::present(flatten_rule(r, account_id)))
            .unwrap_or_else(Applied::absent))
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: ObfuscationRuleState,
        planned: ObfuscationRuleState,
    ) -> Result<Applied<ObfuscationRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let id = existing_id(&prior.id)?;
        let rule = config
            .client
            .update_obfuscation_rule(account_id, &expand_rule(&planned, Some(id)))
            .await?;
        Ok(Applied::present(flatten_rule(rule, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: ObfuscationRuleState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(config.client.delete_obfuscation_rule(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::logconfigurations::ExpressionRef;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flatten_actions() {
        let rule = ObfuscationRule {
            id: "r-1".into(),
            name: "mask ssn".into(),
            description: None,
            enabled: true,
            filter: "SELECT * FROM Log".into(),
            actions: vec![ObfuscationAction {
                attributes: vec!["message".into()],
                expression: ExpressionRef { id: "e-1".into() },
                method: "MASK".into(),
            }],
        };
        let state = flatten_rule(rule, 10);
        assert_eq!(
            state.action,
            vec![ActionState {
                attribute: vec!["message".into()],
                expression_id: "e-1".into(),
                method: "MASK".into(),
            }]
        );
        assert_eq!(state.description, "");

        let input = expand_rule(&state, Some("r-1"));
        assert_eq!(input.actions[0].expression_id, "e-1");
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_schema_requires_an_action() {
        let schema = ObfuscationRuleResource.schema();
        let base = json!({
            "name": "mask ssn",
            "filter": "SELECT * FROM Log",
            "enabled": true,
            "action": []
        });
        assert!(!crate::validation::validate(&schema, &base).is_empty());

        let bad_method = json!({
            "name": "mask ssn",
            "filter": "SELECT * FROM Log",
            "enabled": true,
            "action": [{ "attribute": ["message"], "expression_id": "e-1", "method": "ROT13" }]
        });
        let diags = crate::validation::validate(&schema, &bad_method);
        assert_eq!(diags.len(), 1);
    }
}
