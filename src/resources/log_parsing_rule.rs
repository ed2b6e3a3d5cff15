//! `newrelic_log_parsing_rule`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::logconfigurations::{ParsingRule, ParsingRuleInput};
use crate::client::NerdGraphClient;
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Warning emitted when a rule is applied with `matched = false`.
pub const UNTESTED_GROK_WARNING: &str = "The grok pattern is not tested against log lines from the New Relic";

/// State of a log parsing rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParsingRuleState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub attribute: String,
    /// Stored by the API as the rule description.
    pub name: String,
    pub enabled: bool,
    pub grok: String,
    pub lucene: String,
    pub nrql: String,
    pub deleted: bool,
    pub matched: Option<bool>,
}

/// Log parsing rule resource.
pub struct LogParsingRuleResource;

fn expand_rule(state: &LogParsingRuleState) -> ParsingRuleInput {
    ParsingRuleInput {
        attribute: state.attribute.clone(),
        description: state.name.clone(),
        enabled: state.enabled,
        grok: state.grok.clone(),
        lucene: state.lucene.clone(),
        nrql: state.nrql.clone(),
    }
}

fn flatten_rule(rule: ParsingRule, account_id: i64, matched: Option<bool>) -> LogParsingRuleState {
    LogParsingRuleState {
        id: Some(rule.id),
        account_id: Some(account_id),
        attribute: rule.attribute,
        name: rule.description,
        enabled: rule.enabled,
        grok: rule.grok,
        lucene: rule.lucene,
        nrql: rule.nrql,
        deleted: rule.deleted,
        matched,
    }
}

fn untested_warning(matched: Option<bool>) -> Vec<Diagnostic> {
    match matched {
        Some(false) => vec![Diagnostic::warning(UNTESTED_GROK_WARNING)],
        _ => Vec::new(),
    }
}

/// Fail when a live rule other than `own_id` already uses `name`.
async fn ensure_name_available(
    client: &NerdGraphClient,
    account_id: i64,
    name: &str,
    own_id: Option<&str>,
) -> Result<(), ProviderError> {
    let rules = match client.list_parsing_rules(account_id).await {
        Ok(rules) => rules,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    let taken = rules
        .iter()
        .any(|r| r.description == name && !r.deleted && Some(r.id.as_str()) != own_id);
    if taken {
        Err(ProviderError::Validation("name is already in use by another rule".to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Resource for LogParsingRuleResource {
    type State = LogParsingRuleState;

    fn type_name(&self) -> &'static str {
        "newrelic_log_parsing_rule"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64().with_description("The account id associated with the parsing rule."),
            )
            .with_attribute(
                "attribute",
                Attribute::optional_string()
                    .with_description("The parsing rule applies to the value of this attribute. Defaults to message."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("A description of what this parsing rule represents."),
            )
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Whether or not this rule is enabled."),
            )
            .with_attribute("grok", Attribute::required_string().with_description("The Grok of what to parse."))
            .with_attribute(
                "lucene",
                Attribute::required_string().with_description("The Lucene to match events to the parsing rule."),
            )
            .with_attribute(
                "nrql",
                Attribute::required_string().with_description("The NRQL to match events to the parsing rule."),
            )
            .with_attribute(
                "deleted",
                Attribute::computed_bool().with_description("Whether or not this rule is deleted."),
            )
            .with_attribute(
                "matched",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_description("Whether the Grok pattern matched."),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: LogParsingRuleState,
    ) -> Result<Applied<LogParsingRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        ensure_name_available(&config.client, account_id, &planned.name, None).await?;

        let rule = config
            .client
            .create_parsing_rule(account_id, &expand_rule(&planned))
            .await?;
        info!(rule_id = %rule.id, account_id, "created log parsing rule");
        Ok(Applied::present(flatten_rule(rule, account_id, planned.matched))
            .with_diagnostics(untested_warning(planned.matched)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: LogParsingRuleState,
    ) -> Result<Applied<LogParsingRuleState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        let rules = match config.client.list_parsing_rules(account_id).await {
            Ok(rules) => rules,
            Err(err) if err.is_not_found() => return Ok(Applied::absent()),
            Err(err) => return Err(err.into()),
        };
        match rules.into_iter().find(|r| r.id == id) {
            Some(rule) => Ok(Applied::present(flatten_rule(rule, account_id, current.matched))),
            None => Ok(Applied::absent()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: LogParsingRuleState,
        planned: LogParsingRuleState,
    ) -> Result<Applied<LogParsingRuleState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let id = existing_id(&prior.id)?;
        if planned.name != prior.name {
            ensure_name_available(&config.client, account_id, &planned.name, Some(id)).await?;
        }

        let rule = config
            .client
            .update_parsing_rule(account_id, id, &expand_rule(&planned))
            .await?;
        Ok(Applied::present(flatten_rule(rule, account_id, planned.matched))
            .with_diagnostics(untested_warning(planned.matched)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: LogParsingRuleState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(config.client.delete_parsing_rule(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_untested_warning() {
        assert_eq!(untested_warning(Some(false))[0].summary, UNTESTED_GROK_WARNING);
        assert!(untested_warning(Some(true)).is_empty());
        assert!(untested_warning(None).is_empty());
    }

    #[test]
    fn test_expand_maps_name_to_description() {
        let input = expand_rule(&LogParsingRuleState {
            name: "nginx".into(),
            enabled: true,
            grok: "%{IP:ip}".into(),
            lucene: "logtype:nginx".into(),
            nrql: "SELECT * FROM Log WHERE logtype = 'nginx'".into(),
            ..Default::default()
        });
        assert_eq!(input.description, "nginx");
        assert_eq!(input.attribute, "");
        assert!(input.enabled);
    }

    #[test]
    fn test_flatten_carries_matched() {
        let rule = ParsingRule {
            id: "r-1".into(),
            account_id: 1,
            attribute: "message".into(),
            description: "nginx".into(),
            enabled: true,
            grok: "%{IP:ip}".into(),
            lucene: "logtype:nginx".into(),
            nrql: "SELECT 1".into(),
            deleted: false,
        };
        let state = flatten_rule(rule, 1, Some(true));
        assert_eq!(state.name, "nginx");
        assert_eq!(state.matched, Some(true));
        assert_eq!(state.id.as_deref(), Some("r-1"));
    }
}
