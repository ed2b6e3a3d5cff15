//! Alert policies and compound alert conditions.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::NerdGraphClient;
use crate::error::ApiError;

/// An alert policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsPolicy {
    /// Policy ID.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// How incidents are grouped.
    pub incident_preference: String,
    /// Owning account.
    pub account_id: i64,
}

/// Create and update input for an alert policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsPolicyInput {
    /// Policy name.
    pub name: String,
    /// How incidents are grouped.
    pub incident_preference: String,
}

const POLICY_FIELDS: &str = "id name incidentPreference accountId";

/// A compound condition component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCondition {
    /// ID of the referenced alert condition.
    pub id: String,
    /// Alias used in the trigger expression.
    pub alias: String,
}

/// A compound alert condition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundCondition {
    /// Condition ID.
    pub id: String,
    /// Condition name.
    pub name: String,
    /// Whether the condition is evaluated.
    pub enabled: bool,
    /// Owning policy.
    pub policy_id: String,
    /// Boolean expression over component aliases.
    pub trigger_expression: String,
    /// Component conditions.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub component_conditions: Vec<ComponentCondition>,
    /// FACETS_IGNORED or FACETS_MATCH.
    #[serde(default)]
    pub facet_matching_behavior: Option<String>,
    /// Runbook link.
    #[serde(default)]
    pub runbook_url: Option<String>,
    /// Seconds the expression must hold.
    #[serde(default)]
    pub threshold_duration: Option<i64>,
}

/// Create and update input for a compound condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundConditionInput {
    /// Condition name.
    pub name: String,
    /// Whether the condition is evaluated.
    pub enabled: bool,
    /// Boolean expression over component aliases.
    pub trigger_expression: String,
    /// Component conditions.
    pub component_conditions: Vec<ComponentCondition>,
    /// Owning policy, sent on update only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// FACETS_IGNORED or FACETS_MATCH.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_matching_behavior: Option<String>,
    /// Runbook link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runbook_url: Option<String>,
    /// Seconds the expression must hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_duration: Option<i64>,
}

const COMPOUND_CONDITION_FIELDS: &str = "id name enabled policyId triggerExpression \
     componentConditions { id alias } facetMatchingBehavior runbookUrl thresholdDuration";

impl NerdGraphClient {
    /// Create an alert policy.
    pub async fn create_policy(
        &self,
        account_id: i64,
        policy: &AlertsPolicyInput,
    ) -> Result<AlertsPolicy, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $policy: AlertsPolicyInput!) {{ \
             alertsPolicyCreate(accountId: $accountId, policy: $policy) {{ {} }} }}",
            POLICY_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "policy": policy }),
            "/alertsPolicyCreate",
        )
        .await
    }

    /// Fetch an alert policy, `None` if it does not exist.
    pub async fn get_policy(
        &self,
        account_id: i64,
        policy_id: &str,
    ) -> Result<Option<AlertsPolicy>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $id: ID!) {{ actor {{ account(id: $accountId) {{ \
             alerts {{ policy(id: $id) {{ {} }} }} }} }} }}",
            POLICY_FIELDS
        );
        self.query_optional(
            &document,
            json!({ "accountId": account_id, "id": policy_id }),
            "/actor/account/alerts/policy",
        )
        .await
    }

    /// Update an alert policy.
    pub async fn update_policy(
        &self,
        account_id: i64,
        policy_id: &str,
        policy: &AlertsPolicyInput,
    ) -> Result<AlertsPolicy, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $id: ID!, $policy: AlertsPolicyUpdateInput!) {{ \
             alertsPolicyUpdate(accountId: $accountId, id: $id, policy: $policy) {{ {} }} }}",
            POLICY_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "id": policy_id, "policy": policy }),
            "/alertsPolicyUpdate",
        )
        .await
    }

    /// Delete an alert policy.
    pub async fn delete_policy(&self, account_id: i64, policy_id: &str) -> Result<(), ApiError> {
        self.execute(
            "mutation($accountId: Int!, $id: ID!) { \
             alertsPolicyDelete(accountId: $accountId, id: $id) { id } }",
            json!({ "accountId": account_id, "id": policy_id }),
        )
        .await
        .map(|_| ())
    }

    /// Create a compound condition under `policy_id`.
    pub async fn create_compound_condition(
        &self,
        account_id: i64,
        policy_id: &str,
        condition: &CompoundConditionInput,
    ) -> Result<CompoundCondition, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $policyId: ID!, $condition: AlertsCompoundConditionInput!) {{ \
             alertsCompoundConditionCreate(accountId: $accountId, policyId: $policyId, condition: $condition) {{ {} }} }}",
            COMPOUND_CONDITION_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "policyId": policy_id, "condition": condition }),
            "/alertsCompoundConditionCreate",
        )
        .await
    }

    /// Search compound conditions by ID.
    pub async fn search_compound_conditions(
        &self,
        account_id: i64,
        ids: &[String],
    ) -> Result<Vec<CompoundCondition>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $ids: [ID!]) {{ actor {{ account(id: $accountId) {{ alerts {{ \
             compoundConditions(filter: {{ id: {{ in: $ids }} }}) {{ items {{ {} }} }} }} }} }} }}",
            COMPOUND_CONDITION_FIELDS
        );
        let items: Option<Vec<CompoundCondition>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id, "ids": ids }),
                "/actor/account/alerts/compoundConditions/items",
            )
            .await?;
        Ok(items.unwrap_or_default())
    }

    /// Update a compound condition.
    pub async fn update_compound_condition(
        &self,
        account_id: i64,
        condition_id: &str,
        condition: &CompoundConditionInput,
    ) -> Result<CompoundCondition, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $id: ID!, $condition: AlertsCompoundConditionInput!) {{ \
             alertsCompoundConditionUpdate(accountId: $accountId, id: $id, condition: $condition) {{ {} }} }}",
            COMPOUND_CONDITION_FIELDS
        );
        self.query(
            &document,
            json!({ "accountId": account_id, "id": condition_id, "condition": condition }),
            "/alertsCompoundConditionUpdate",
        )
        .await
    }

    /// Delete a compound condition.
    pub async fn delete_compound_condition(
        &self,
        account_id: i64,
        condition_id: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            "mutation($accountId: Int!, $id: ID!) { \
             alertsCompoundConditionDelete(accountId: $accountId, id: $id) { id } }",
            json!({ "accountId": account_id, "id": condition_id }),
        )
        .await
        .map(|_| ())
    }
}
