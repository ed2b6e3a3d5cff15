//! Workflows (`aiWorkflows`).

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_payload, NerdGraphClient};
use crate::error::{ApiError, PayloadError};

/// Where a workflow sends notifications.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfiguration {
    /// Notification channel ID.
    pub channel_id: String,
    /// Channel name.
    #[serde(default)]
    pub name: Option<String>,
    /// Channel type.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Issue events that trigger a notification.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub notification_triggers: Vec<String>,
}

/// A filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Predicate {
    /// Issue attribute.
    pub attribute: String,
    /// Comparison operator, e.g. EXACTLY_MATCHES.
    pub operator: String,
    /// Values compared against.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub values: Vec<String>,
}

/// The issue filter of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuesFilter {
    /// Filter ID.
    pub id: String,
    /// Filter name.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub name: String,
    /// FILTER or VIEW.
    #[serde(rename = "type")]
    pub kind: String,
    /// Predicates combined with AND.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub predicates: Vec<Predicate>,
}

/// An NRQL enrichment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NrqlConfiguration {
    /// NRQL query.
    pub query: String,
}

/// An enrichment attached to notifications.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Enrichment {
    /// Enrichment ID.
    pub id: String,
    /// Enrichment name.
    pub name: String,
    /// Enrichment type, e.g. NRQL.
    #[serde(rename = "type", default, deserialize_with = "crate::client::null_as_default")]
    pub kind: String,
    /// Configurations.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub configurations: Vec<NrqlConfiguration>,
}

/// A workflow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Workflow ID.
    pub id: String,
    /// Workflow name.
    pub name: String,
    /// Owning account.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub account_id: i64,
    /// Entity GUID.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub guid: String,
    /// Whether the workflow runs.
    pub workflow_enabled: bool,
    /// Whether destinations are notified.
    pub destinations_enabled: bool,
    /// Whether enrichments run.
    pub enrichments_enabled: bool,
    /// How muted issues are handled.
    pub muting_rules_handling: String,
    /// Last time the workflow ran.
    #[serde(default)]
    pub last_run: Option<String>,
    /// Destinations.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub destination_configurations: Vec<DestinationConfiguration>,
    /// Issue filter.
    #[serde(default)]
    pub issues_filter: Option<IssuesFilter>,
    /// Enrichments.
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    pub enrichments: Vec<Enrichment>,
}

/// Destination input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationConfigurationInput {
    /// Notification channel ID.
    pub channel_id: String,
    /// Issue events that trigger a notification.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notification_triggers: Vec<String>,
}

/// Issue filter input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterInput {
    /// Existing filter ID, on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
    /// Filter name.
    pub name: String,
    /// FILTER or VIEW.
    #[serde(rename = "type")]
    pub kind: String,
    /// Predicates.
    pub predicates: Vec<Predicate>,
}

/// NRQL enrichment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NrqlEnrichmentInput {
    /// Enrichment name.
    pub name: String,
    /// Configurations.
    pub configuration: Vec<NrqlConfiguration>,
}

/// Enrichments input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentsInput {
    /// NRQL enrichments.
    pub nrql: Vec<NrqlEnrichmentInput>,
}

/// Create and update input for a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    /// Workflow ID, on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workflow name.
    pub name: String,
    /// Whether the workflow runs.
    pub workflow_enabled: bool,
    /// Whether destinations are notified.
    pub destinations_enabled: bool,
    /// Whether enrichments run.
    pub enrichments_enabled: bool,
    /// How muted issues are handled.
    pub muting_rules_handling: String,
    /// Destinations.
    pub destination_configurations: Vec<DestinationConfigurationInput>,
    /// Issue filter.
    pub issues_filter: FilterInput,
    /// Enrichments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichments: Option<EnrichmentsInput>,
}

#[derive(Debug, Deserialize)]
struct WorkflowPayload {
    workflow: Option<Workflow>,
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

#[derive(Debug, Deserialize)]
struct DeletePayload {
    #[serde(default, deserialize_with = "crate::client::null_as_default")]
    errors: Vec<PayloadError>,
}

const WORKFLOW_FIELDS: &str = "id name accountId guid workflowEnabled destinationsEnabled \
     enrichmentsEnabled mutingRulesHandling lastRun \
     destinationConfigurations { channelId name type notificationTriggers } \
     issuesFilter { id name type predicates { attribute operator values } } \
     enrichments { id name type configurations { ... on AiWorkflowsNrqlConfiguration { query } } }";

impl NerdGraphClient {
    /// Create a workflow.
    pub async fn create_workflow(
        &self,
        account_id: i64,
        workflow: &WorkflowInput,
    ) -> Result<Workflow, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $data: AiWorkflowsCreateWorkflowInput!) {{ \
             aiWorkflowsCreateWorkflow(accountId: $accountId, createWorkflowData: $data) {{ \
             workflow {{ {} }} errors {{ description type }} }} }}",
            WORKFLOW_FIELDS
        );
        let payload: WorkflowPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "data": workflow }),
                "/aiWorkflowsCreateWorkflow",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .workflow
            .ok_or_else(|| ApiError::MissingData("aiWorkflowsCreateWorkflow.workflow".into()))
    }

    /// Fetch a workflow, `None` if it does not exist.
    pub async fn get_workflow(
        &self,
        account_id: i64,
        workflow_id: &str,
    ) -> Result<Option<Workflow>, ApiError> {
        let document = format!(
            "query($accountId: Int!, $id: ID!) {{ actor {{ account(id: $accountId) {{ \
             aiWorkflows {{ workflows(filters: {{ id: $id }}) {{ entities {{ {} }} }} }} }} }} }}",
            WORKFLOW_FIELDS
        );
        let entities: Option<Vec<Workflow>> = self
            .query_optional(
                &document,
                json!({ "accountId": account_id, "id": workflow_id }),
                "/actor/account/aiWorkflows/workflows/entities",
            )
            .await?;
        Ok(entities.and_then(|e| e.into_iter().find(|w| w.id == workflow_id)))
    }

    /// Update a workflow. `workflow.id` must be set.
    pub async fn update_workflow(
        &self,
        account_id: i64,
        workflow: &WorkflowInput,
    ) -> Result<Workflow, ApiError> {
        let document = format!(
            "mutation($accountId: Int!, $data: AiWorkflowsUpdateWorkflowInput!) {{ \
             aiWorkflowsUpdateWorkflow(accountId: $accountId, updateWorkflowData: $data) {{ \
             workflow {{ {} }} errors {{ description type }} }} }}",
            WORKFLOW_FIELDS
        );
        let payload: WorkflowPayload = self
            .query(
                &document,
                json!({ "accountId": account_id, "data": workflow }),
                "/aiWorkflowsUpdateWorkflow",
            )
            .await?;
        check_payload(payload.errors)?;
        payload
            .workflow
            .ok_or_else(|| ApiError::MissingData("aiWorkflowsUpdateWorkflow.workflow".into()))
    }

    /// Delete a workflow, leaving its channels in place.
    pub async fn delete_workflow(&self, account_id: i64, workflow_id: &str) -> Result<(), ApiError> {
        let payload: DeletePayload = self
            .query(
                "mutation($accountId: Int!, $id: ID!) { \
                 aiWorkflowsDeleteWorkflow(accountId: $accountId, id: $id, deleteChannels: false) { \
                 id errors { description type } } }",
                json!({ "accountId": account_id, "id": workflow_id }),
                "/aiWorkflowsDeleteWorkflow",
            )
            .await?;
        check_payload(payload.errors)
    }
}
