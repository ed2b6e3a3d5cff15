//! Log management configuration: parsing rules, obfuscation and data partitions.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_payload, NerdGraphClient};
use crate::error::{ApiError, PayloadError};

/// A log parsing rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingRule {
    /// Rule ID.
    pub id: String,
    /// Owning account.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub account_id: i64,
    /// Attribute the grok pattern is applied to.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub attribute: String,
    /// Rule name.
    pub description: String,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// Grok pattern.
    pub grok: String,
    /// Lucene filter.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub lucene: String,
    /// NRQL filter.
    pub nrql: String,
    /// Whether the rule has been deleted.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub deleted: bool,
}

/// Create and update input for a parsing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingRuleInput {
    /// Attribute the grok pattern is applied to.
    pub attribute: String,
    /// Rule name.
    pub description: String,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// Grok pattern.
    pub grok: String,
    /// Lucene filter.
    pub lucene: String,
    /// NRQL filter.
    pub nrql: String,
}

/// An obfuscation expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObfuscationExpression {
    /// Expression ID.
    pub id: String,
    /// Expression name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Regular expression.
    pub regex: String,
}

/// Create and update input for an obfuscation expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObfuscationExpressionInput {
    /// Expression ID, on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Expression name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Regular expression.
    pub regex: String,
}

/// Reference to an expression inside an obfuscation action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpressionRef {
    /// Expression ID.
    pub id: String,
}

/// An obfuscation action as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObfuscationAction {
    /// Attributes the action applies to.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub attributes: Vec<String>,
    /// Expression applied.
    pub expression: ExpressionRef,
    /// HASH_SHA256 or MASK.
    pub method: String,
}

/// An obfuscation rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObfuscationRule {
    /// Rule ID.
    pub id: String,
    /// Rule name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// NRQL filter selecting the logs.
    pub filter: String,
    /// Actions.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub actions: Vec<ObfuscationAction>,
}

/// An obfuscation action input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscationActionInput {
    /// Attributes the action applies to.
    pub attributes: Vec<String>,
    /// Expression applied.
    pub expression_id: String,
    /// HASH_SHA256 or MASK.
    pub method: String,
}

/// Create and update input for an obfuscation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObfuscationRuleInput {
    /// Rule ID, on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rule name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// NRQL filter selecting the logs.
    pub filter: String,
    /// Actions.
    pub actions: Vec<ObfuscationActionInput>,
}

/// A data partition rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPartitionRule {
    /// Rule ID.
    pub id: String,
    /// Partition the matching logs are routed to.
    pub target_data_partition: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// NRQL matching criteria.
    #[serde(default)]
    pub nrql: Option<String>,
    /// STANDARD or SECONDARY.
    pub retention_policy: String,
    /// Whether the rule has been deleted.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub deleted: bool,
}

/// Create input for a data partition rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPartitionRuleCreateInput {
    /// Partition the matching logs are routed to.
    pub target_data_partition: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// NRQL matching criteria.
    pub nrql: String,
    /// STANDARD or SECONDARY.
    pub retention_policy: String,
}

/// Update input for a data partition rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataPartitionRuleUpdateInput {
    /// Rule ID.
    pub id: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the rule is applied.
    pub enabled: bool,
    /// NRQL matching criteria.
    pub nrql: String,
}

#[derive(Debug, Deserialize)]
struct RulePayload<T> {
    rule: Option<T>,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct ErrorsPayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

const PARSING_RULE_FIELDS: &str =
    "id accountId attribute description enabled grok lucene nrql deleted";
const EXPRESSION_FIELDS: &str = "id name description regex";
const OBFUSCATION_RULE_FIELDS: &str =
    "id name description enabled filter actions { attributes expression { id } method }";
const DATA_PARTITION_FIELDS: &str =
    "id targetDataPartition description enabled nrql retentionPolicy deleted";

impl NerdGraphClient {
    /// Create a parsing rule.
    pub async fn create_parsing_rule(
        &self,
        account_id: i64,
        rule: &ParsingRuleInput,
    ) -> Result<ParsingRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $rule: LogConfigurationsParsingRuleConfiguration!) {{ \
             logConfigurationsCreateParsingRule(accountId: $accountId, rule: $rule) {{ \
             rule {{ {} }} errors {{ message type }} }} }}",
            PARSING_RULE_FIELDS
        );
        let payload: RulePayload<ParsingRule> = self
            .query(
                &document,
                json!({ "accountId": account_id, "rule": rule }),
                "/logConfigurationsCreateParsingRule",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .rule
            .ok_or_else(|| ApiError::MissingData("logConfigurationsCreateParsingRule.rule".into()))
    }

    /// List all parsing rules of an account.
    pub async fn list_parsing_rules(&self, account_id: i64) -> Result<Vec<ParsingRule>, ApiError> {
        let document = format!(
            "query($accountId: Int!) {{ actor {{ account(id: $accountId) {{ \
             logConfigurations {{ parsingRules {{ {} }} }} }} }} }}",
            PARSING_RULE_FIELDS
        );
        let rules: Option<Vec<ParsingRule>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id }),
                "/actor/account/logConfigurations/parsingRules",
            )
            .await?;
        Ok(rules.unwrap_or_default())
    }

    /// Update a parsing rule.
    pub async fn update_parsing_rule(
        &self,
        account_id: i64,
        rule_id: &str,
        rule: &ParsingRuleInput,
    ) -> Result<ParsingRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $id: ID!, $rule: LogConfigurationsParsingRuleConfiguration!) {{ \
             logConfigurationsUpdateParsingRule(accountId: $accountId, id: $id, rule: $rule) {{ \
             rule {{ {} }} errors {{ message type }} }} }}",
            PARSING_RULE_FIELDS
        );
        let payload: RulePayload<ParsingRule> = self
            .query(
                &document,
                json!({ "accountId": account_id, "id": rule_id, "rule": rule }),
                "/logConfigurationsUpdateParsingRule",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .rule
            .ok_or_else(|| ApiError::MissingData("logConfigurationsUpdateParsingRule.rule".into()))
    }

    /// Delete a parsing rule.
    pub async fn delete_parsing_rule(&self, account_id: i64, rule_id: &str) -> Result<(), ApiError> {
        let payload: ErrorsPayload = self
            .query(
                "mutation($accountId: Int!, $id: ID!) { \
                 logConfigurationsDeleteParsingRule(accountId: $accountId, id: $id) { \
                 errors { message type } } }",
                json!({ "accountId": account_id, "id": rule_id }),
                "/logConfigurationsDeleteParsingRule",
            )
            .await?;
        check_payload(payload.errors)
    }

    /// Create an obfuscation expression.
    pub async fn create_obfuscation_expression(
        &self,
        account_id: i64,
        expression: &ObfuscationExpressionInput,
    ) -> Result<ObfuscationExpression, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $expression: LogConfigurationsCreateObfuscationExpressionInput!) {{ \
             logConfigurationsCreateObfuscationExpression(accountId: $accountId, expression: $expression) {{ {} }} }}",
            EXPRESSION_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "expression": expression }),
            "/logConfigurationsCreateObfuscationExpression",
        )
        .await
    }

    /// List all obfuscation expressions of an account.
    pub async fn list_obfuscation_expressions(
        &self,
        account_id: i64,
    ) -> Result<Vec<ObfuscationExpression>, ApiError> {
        let document = format!(
            "query($accountId: Int!) {{ actor {{ account(id: $accountId) {{ \
             logConfigurations {{ obfuscationExpressions {{ {} }} }} }} }} }}",
            EXPRESSION_FIELDS
        );
        let expressions: Option<Vec<ObfuscationExpression>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id }),
                "/actor/account/logConfigurations/obfuscationExpressions",
            )
            .await?;
        Ok(expressions.unwrap_or_default())
    }

    /// Update an obfuscation expression. `expression.id` must be set.
    pub async fn update_obfuscation_expression(
        &self,
        account_id: i64,
        expression: &ObfuscationExpressionInput,
    ) -> Result<ObfuscationExpression, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $expression: LogConfigurationsUpdateObfuscationExpressionInput!) {{ \
             logConfigurationsUpdateObfuscationExpression(accountId: $accountId, expression: $expression) {{ {} }} }}",
            EXPRESSION_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "expression": expression }),
            "/logConfigurationsUpdateObfuscationExpression",
        )
        .await
    }

    /// Delete an obfuscation expression.
    pub async fn delete_obfuscation_expression(
        &self,
        account_id: i64,
        expression_id: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            "mutation($accountId: Int!, $id: ID!) { \
             logConfigurationsDeleteObfuscationExpression(accountId: $accountId, id: $id) { id } }",
            json!({ "accountId": account_id, "id": expression_id }),
        )
        .await
        .map(|_| ())
    }

    /// Create an obfuscation rule.
    pub async fn create_obfuscation_rule(
        &self,
        account_id: i64,
        rule: &ObfuscationRuleInput,
    ) -> Result<ObfuscationRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $rule: LogConfigurationsCreateObfuscationRuleInput!) {{ \
             logConfigurationsCreateObfuscationRule(accountId: $accountId, rule: $rule) {{ {} }} }}",
            OBFUSCATION_RULE_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "rule": rule }),
            "/logConfigurationsCreateObfuscationRule",
        )
        .await
    }

    /// List all obfuscation rules of an account.
    pub async fn list_obfuscation_rules(
        &self,
        account_id: i64,
    ) -> Result<Vec<ObfuscationRule>, ApiError> {
        let document = format!(
            "query($accountId: Int!) {{ actor {{ account(id: $accountId) {{ \
             logConfigurations {{ obfuscationRules {{ {} }} }} }} }} }}",
            OBFUSCATION_RULE_FIELDS
        );
        let rules: Option<Vec<ObfuscationRule>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id }),
                "/actor/account/logConfigurations/obfuscationRules",
            )
            .await?;
        Ok(rules.unwrap_or_default())
    }

    /// Update an obfuscation rule. `rule.id` must be set.
    pub async fn update_obfuscation_rule(
        &self,
        account_id: i64,
        rule: &ObfuscationRuleInput,
    ) -> Result<ObfuscationRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $rule: LogConfigurationsUpdateObfuscationRuleInput!) {{ \
             logConfigurationsUpdateObfuscationRule(accountId: $accountId, rule: $rule) {{ {} }} }}",
            OBFUSCATION_RULE_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "rule": rule }),
            "/logConfigurationsUpdateObfuscationRule",
        )
        .await
    }

    /// Delete an obfuscation rule.
    pub async fn delete_obfuscation_rule(
        &self,
        account_id: i64,
        rule_id: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            "mutation($accountId: Int!, $id: ID!) { \
             logConfigurationsDeleteObfuscationRule(accountId: $accountId, id: $id) { id } }",
            json!({ "accountId": account_id, "id": rule_id }),
        )
        .await
        .map(|_| ())
    }

    /// Create a data partition rule.
    pub async fn create_data_partition_rule(
        &self,
        account_id: i64,
        rule: &DataPartitionRuleCreateInput,
    ) -> Result<DataPartitionRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $rule: LogConfigurationsCreateDataPartitionRuleInput!) {{ \
             logConfigurationsCreateDataPartitionRule(accountId: $accountId, rule: $rule) {{ \
             rule {{ {} }} errors {{ message type }} }} }}",
            DATA_PARTITION_FIELDS
        );
        let payload: RulePayload<DataPartitionRule> = self
            .query(
                &document,
                json!({ "accountId": account_id, "rule": rule }),
                "/logConfigurationsCreateDataPartitionRule",
            )
            .await?;
        check_payload(payload.errors)?;
        payload.rule.ok_or_else(|| {
            ApiError::MissingData("logConfigurationsCreateDataPartitionRule.rule".into())
        })
    }

    /// List all data partition rules of an account.
    pub async fn list_data_partition_rules(
        &self,
        account_id: i64,
    ) -> Result<Vec<DataPartitionRule>, ApiError> {
        let document = format!(
            "query($accountId: Int!) {{ actor {{ account(id: $accountId) {{ \
             logConfigurations {{ dataPartitionRules {{ {} }} }} }} }} }}",
            DATA_PARTITION_FIELDS
        );
        let rules: Option<Vec<DataPartitionRule>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id }),
                "/actor/account/logConfigurations/dataPartitionRules",
            )
            .await?;
        Ok(rules.unwrap_or_default())
    }

    /// Update a data partition rule.
    pub async fn update_data_partition_rule(
        &self,
        account_id: i64,
        rule: &DataPartitionRuleUpdateInput,
    ) -> Result<DataPartitionRule, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $rule: LogConfigurationsUpdateDataPartitionRuleInput!) {{ \
             logConfigurationsUpdateDataPartitionRule(accountId: $accountId, rule: $rule) {{ \
             rule {{ {} }} errors {{ message type }} }} }}",
            DATA_PARTITION_FIELDS
        );
        let payload: RulePayload<DataPartitionRule> = self
            .query(
                &document,
                json!({ "accountId": account_id, "rule": rule }),
                "/logConfigurationsUpdateDataPartitionRule",
            )
            .await?;
        check_payload(payload.errors)?;
        payload.rule.ok_or_else(|| {
            ApiError::MissingData("logConfigurationsUpdateDataPartitionRule.rule".into())
        })
    }

    /// Delete a data partition rule.
    pub async fn delete_data_partition_rule(
        &self,
        account_id: i64,
        rule_id: &str,
    ) -> Result<(), ApiError> {
        let payload: ErrorsPayload = self
            .query(
                "mutation($accountId: Int!, $id: ID!) { \
                 logConfigurationsDeleteDataPartitionRule(accountId: $accountId, id: $id) { \
                 errors { message type } } }",
                json!({ "accountId": account_id, "id": rule_id }),
                "/logConfigurationsDeleteDataPartitionRule",
            )
            .await?;
        check_payload(payload.errors)
    }
}
