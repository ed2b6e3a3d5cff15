//! `newrelic_obfuscation_expression`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::logconfigurations::{ObfuscationExpression, ObfuscationExpressionInput};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{existing_id, ignore_not_found, non_empty};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// State of an obfuscation expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationExpressionState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub regex: String,
}

/// Obfuscation expression resource.
pub struct ObfuscationExpressionResource;

fn expand_expression(state: &ObfuscationExpressionState, id: Option<&str>) -> ObfuscationExpressionInput {
    ObfuscationExpressionInput {
        id: id.map(str::to_string),
        name: state.name.clone(),
        description: non_empty(&state.description),
        regex: state.regex.clone(),
    }
}

fn flatten_expression(expression: ObfuscationExpression, account_id: i64) -> ObfuscationExpressionState {
    ObfuscationExpressionState {
        id: Some(expression.id),
        account_id: Some(account_id),
        name: expression.name,
        description: expression.description.unwrap_or_default(),
        regex: expression.regex,
    }
}

#[async_trait]
impl Resource for ObfuscationExpressionResource {
    type State = ObfuscationExpressionState;

    fn type_name(&self) -> &'static str {
        "newrelic_obfuscation_expression"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The account id associated with the obfuscation expression."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of expression.")
                    .with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of expression."),
            )
            .with_attribute(
                "regex",
                Attribute::required_string()
                    .with_description("Regex of expression.")
                    .with_validator(Validator::NotEmpty),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: ObfuscationExpressionState,
    ) -> Result<Applied<ObfuscationExpressionState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let expression = config
            .client
            .create_obfuscation_expression(account_id, &expand_expression(&planned, None))
            .await?;
        info!(expression_id = %expression.id, account_id, "created obfuscation expression");
        Ok(Applied::present(flatten_expression(expression, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: ObfuscationExpressionState,
    ) -> Result<Applied<ObfuscationExpressionState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        let expressions = match config.client.list_obfuscation_expressions(account_id).await {
            Ok(expressions) => expressions,
            Err(err) if err.is_not_found() => return Ok(Applied::absent()),
            Err(err) => return Err(err.into()),
        };
        Ok(expressions
            .into_iter()
            .find(|e| e.id == id)
            .map(|e| Applied::present(flatten_expression(e, account_id)))
            .unwrap_or_else(Applied::absent))
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: ObfuscationExpressionState,
        planned: ObfuscationExpressionState,
    ) -> Result<Applied<ObfuscationExpressionState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let id = existing_id(&prior.id)?;
        info!(id, "updating obfuscation expression");
        let expression = config
            .client
            .update_obfuscation_expression(account_id, &expand_expression(&planned, Some(id)))
            .await?;
        Ok(Applied::present(flatten_expression(expression, account_id)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: ObfuscationExpressionState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(config.client.delete_obfuscation_expression(account_id, id).await)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_expand_omits_empty_description() {
        let state = ObfuscationExpressionState {
            name: "ssn".into(),
            regex: r"\d{3}-\d{2}-\d{4}".into(),
            ..Default::default()
        };
        let create = expand_expression(&state, None);
        assert_eq!(create.id, None);
        assert_eq!(create.description, None);

        let update = expand_expression(&state, Some("e-1"));
        assert_eq!(update.id.as_deref(), Some("e-1"));
    }

    #[test]
    fn test_schema_requires_regex() {
        let diags = crate::validation::validate(&ObfuscationExpressionResource.schema(), &json!({ "name": "ssn" }));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("regex"));
    }
}
