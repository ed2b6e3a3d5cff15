//! `newrelic_workflow`
//!
//! Schema version 1. Version 0 state used `workflow_enabled`,
//! `destination_configuration`, `predicates` and `configurations`; see
//! [`migrate_state_v0_to_v1`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::client::workflows::{
    DestinationConfiguration, DestinationConfigurationInput, Enrichment, EnrichmentsInput,
    FilterInput, IssuesFilter, NrqlConfiguration, NrqlEnrichmentInput, Predicate, Workflow,
    WorkflowInput,
};
use crate::config::{select_account_id, ProviderConfig};
use crate::error::ProviderError;
use crate::resource::{Applied, Resource};
use crate::resources::{default_true, existing_id, ignore_not_found};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};

pub const MUTING_RULES_HANDLING: &[&str] = &[
    "NOTIFY_ALL_ISSUES",
    "DONT_NOTIFY_FULLY_MUTED_ISSUES",
    "DONT_NOTIFY_FULLY_OR_PARTIALLY_MUTED_ISSUES",
];

pub const NOTIFICATION_TRIGGERS: &[&str] = &[
    "ACKNOWLEDGED",
    "ACTIVATED",
    "CLOSED",
    "INVESTIGATING",
    "OTHER_UPDATES",
    "PRIORITY_CHANGED",
];

pub const FILTER_TYPES: &[&str] = &["FILTER", "VIEW"];

pub const PREDICATE_OPERATORS: &[&str] = &[
    "CONTAINS",
    "DOES_NOT_CONTAIN",
    "DOES_NOT_EQUAL",
    "DOES_NOT_EXACTLY_MATCH",
    "ENDS_WITH",
    "EQUAL",
    "EXACTLY_MATCHES",
    "GREATER_OR_EQUAL",
    "GREATER_THAN",
    "IS",
    "IS_NOT",
    "LESS_OR_EQUAL",
    "LESS_THAN",
    "STARTS_WITH",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationState {
    pub channel_id: String,
    pub notification_triggers: Vec<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateState {
    pub attribute: String,
    pub operator: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuesFilterState {
    pub filter_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub predicate: Vec<PredicateState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationState {
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NrqlEnrichmentState {
    pub enrichment_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub configuration: Vec<ConfigurationState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentsState {
    pub nrql: Vec<NrqlEnrichmentState>,
}

/// State of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub id: Option<String>,
    pub account_id: Option<i64>,
    pub name: String,
    pub enabled: bool,
    pub enrichments_enabled: bool,
    pub destinations_enabled: bool,
    pub muting_rules_handling: String,
    pub destination: Vec<DestinationState>,
    pub issues_filter: Vec<IssuesFilterState>,
    pub enrichments: Vec<EnrichmentsState>,
    pub workflow_id: Option<String>,
    pub guid: Option<String>,
    pub last_run: Option<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            id: None,
            account_id: None,
            name: String::new(),
            enabled: default_true(),
            enrichments_enabled: default_true(),
            destinations_enabled: default_true(),
            muting_rules_handling: String::new(),
            destination: Vec::new(),
            issues_filter: Vec::new(),
            enrichments: Vec::new(),
            workflow_id: None,
            guid: None,
            last_run: None,
        }
    }
}

/// Workflow resource.
pub struct WorkflowResource;

/// Order triggers like the prior state, then append triggers the state did not know.
///
/// Triggers that no longer exist remotely are dropped.
pub fn normalise_trigger_list(actual: &[String], current: &[String]) -> Vec<String> {
    let mut result: Vec<String> = current
        .iter()
        .filter(|trigger| actual.contains(trigger))
        .cloned()
        .collect();
    result.extend(
        actual
            .iter()
            .filter(|trigger| !current.contains(trigger))
            .cloned(),
    );
    result
}

/// Rename version 0 attributes to their version 1 names.
pub fn migrate_state_v0_to_v1(state: Value) -> Value {
    let mut map = match state {
        Value::Object(map) => map,
        other => return other,
    };

    if let Some(enabled) = map.remove("workflow_enabled") {
        map.insert("enabled".to_string(), enabled);
    }
    if let Some(destination) = map.remove("destination_configuration") {
        map.insert("destination".to_string(), destination);
    }

    if let Some(Value::Array(filters)) = map.get_mut("issues_filter") {
        for filter in filters.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(predicates) = filter.remove("predicates") {
                filter.insert("predicate".to_string(), predicates);
            }
        }
    }

    if let Some(Value::Array(enrichments)) = map.get_mut("enrichments") {
        for enrichment in enrichments.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(Value::Array(nrqls)) = enrichment.get_mut("nrql") {
                for nrql in nrqls.iter_mut().filter_map(Value::as_object_mut) {
                    if let Some(configurations) = nrql.remove("configurations") {
                        nrql.insert("configuration".to_string(), configurations);
                    }
                }
            }
        }
    }

    Value::Object(map)
}

fn expand_filter(state: &WorkflowState, with_id: bool) -> FilterInput {
    let filter = state.issues_filter.first().cloned().unwrap_or_default();
    FilterInput {
        filter_id: (with_id && !filter.filter_id.is_empty()).then(|| filter.filter_id.clone()),
        name: filter.name,
        kind: filter.kind,
        predicates: filter
            .predicate
            .into_iter()
            .map(|p| Predicate {
                attribute: p.attribute,
                operator: p.operator,
                values: p.values,
            })
            .collect(),
    }
}

fn expand_enrichments(state: &WorkflowState) -> Option<EnrichmentsInput> {
    let enrichments = state.enrichments.first()?;
    Some(EnrichmentsInput {
        nrql: enrichments
            .nrql
            .iter()
            .map(|nrql| NrqlEnrichmentInput {
                name: nrql.name.clone(),
                configuration: nrql
                    .configuration
                    .iter()
                    .map(|c| NrqlConfiguration { query: c.query.clone() })
                    .collect(),
            })
            .collect(),
    })
}

/// Build the create input, or the update input when `id` is given.
fn expand_workflow(state: &WorkflowState, id: Option<String>) -> WorkflowInput {
    let updating = id.is_some();
    let enrichments = match expand_enrichments(state) {
        Some(enrichments) => Some(enrichments),
        // An update without enrichments removes existing ones.
        None if updating => Some(EnrichmentsInput { nrql: Vec::new() }),
        None => None,
    };
    WorkflowInput {
        id,
        name: state.name.clone(),
        workflow_enabled: state.enabled,
        destinations_enabled: state.destinations_enabled,
        enrichments_enabled: state.enrichments_enabled,
        muting_rules_handling: state.muting_rules_handling.clone(),
        destination_configurations: state
            .destination
            .iter()
            .map(|d| DestinationConfigurationInput {
                channel_id: d.channel_id.clone(),
                notification_triggers: d.notification_triggers.clone(),
            })
            .collect(),
        issues_filter: expand_filter(state, updating),
        enrichments,
    }
}

fn flatten_destination(config: DestinationConfiguration, current: &[DestinationState]) -> DestinationState {
    let notification_triggers = match current.iter().find(|d| d.channel_id == config.channel_id) {
        Some(state) if !state.notification_triggers.is_empty() => {
            normalise_trigger_list(&config.notification_triggers, &state.notification_triggers)
        },
        _ => config.notification_triggers,
    };
    DestinationState {
        channel_id: config.channel_id,
        notification_triggers,
        name: config.name.unwrap_or_default(),
        kind: config.kind.unwrap_or_default(),
    }
}

fn flatten_filter(filter: IssuesFilter) -> IssuesFilterState {
    IssuesFilterState {
        filter_id: filter.id,
        name: filter.name,
        kind: filter.kind,
        predicate: filter
            .predicates
            .into_iter()
            .map(|p| PredicateState {
                attribute: p.attribute,
                operator: p.operator,
                values: p.values,
            })
            .collect(),
    }
}

fn flatten_enrichments(enrichments: Vec<Enrichment>) -> Vec<EnrichmentsState> {
    if enrichments.is_empty() {
        return Vec::new();
    }
    vec![EnrichmentsState {
        nrql: enrichments
            .into_iter()
            .map(|e| NrqlEnrichmentState {
                enrichment_id: e.id,
                name: e.name,
                kind: e.kind,
                configuration: e
                    .configurations
                    .into_iter()
                    .map(|c| ConfigurationState { query: c.query })
                    .collect(),
            })
            .collect(),
    }]
}

fn flatten_workflow(workflow: Workflow, current: &WorkflowState) -> WorkflowState {
    WorkflowState {
        id: Some(workflow.id.clone()),
        account_id: Some(workflow.account_id).filter(|id| *id != 0).or(current.account_id),
        name: workflow.name,
        enabled: workflow.workflow_enabled,
        enrichments_enabled: workflow.enrichments_enabled,
        destinations_enabled: workflow.destinations_enabled,
        muting_rules_handling: workflow.muting_rules_handling,
        destination: workflow
            .destination_configurations
            .into_iter()
            .map(|d| flatten_destination(d, &current.destination))
            .collect(),
        issues_filter: workflow.issues_filter.map(flatten_filter).into_iter().collect(),
        enrichments: flatten_enrichments(workflow.enrichments),
        workflow_id: Some(workflow.id),
        guid: Some(workflow.guid),
        last_run: workflow.last_run,
    }
}

fn string_list() -> AttributeType {
    AttributeType::list(AttributeType::String)
}

#[async_trait]
impl Resource for WorkflowResource {
    type State = WorkflowState;

    fn type_name(&self) -> &'static str {
        "newrelic_workflow"
    }

    fn schema(&self) -> Schema {
        let destination = Block::new()
            .with_attribute("channel_id", Attribute::required_string().with_description("Destination's channel id."))
            .with_attribute(
                "notification_triggers",
                Attribute::new(string_list(), AttributeFlags::optional_computed())
                    .with_description("Issue events to notify on.")
                    .with_validator(Validator::one_of(NOTIFICATION_TRIGGERS)),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string());

        let predicate = Block::new()
            .with_attribute("attribute", Attribute::required_string())
            .with_attribute(
                "operator",
                Attribute::required_string().with_validator(Validator::one_of(PREDICATE_OPERATORS)),
            )
            .with_attribute("values", Attribute::new(string_list(), AttributeFlags::required()));

        let issues_filter = Block::new()
            .with_attribute("filter_id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "type",
                Attribute::required_string().with_validator(Validator::one_of(FILTER_TYPES)),
            )
            .with_block("predicate", NestedBlock::list(predicate));

        let nrql = Block::new()
            .with_attribute("enrichment_id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("type", Attribute::computed_string())
            .with_block(
                "configuration",
                NestedBlock::list(Block::new().with_attribute("query", Attribute::required_string()))
                    .with_min_items(1),
            );

        Schema::new(1)
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "account_id",
                Attribute::optional_computed_int64()
                    .with_description("The account id of the workflow.")
                    .with_force_new(),
            )
            .with_attribute("name", Attribute::required_string().with_description("The name of the workflow."))
            .with_attribute(
                "enabled",
                Attribute::optional_bool()
                    .with_description("Whether the workflow is enabled.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "enrichments_enabled",
                Attribute::optional_bool()
                    .with_description("Whether the enrichments are enabled.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "destinations_enabled",
                Attribute::optional_bool()
                    .with_description("Whether the destinations are enabled.")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "muting_rules_handling",
                Attribute::required_string()
                    .with_description(format!(
                        "How muted issues are handled. One of: ({}).",
                        MUTING_RULES_HANDLING.join(", ")
                    ))
                    .with_validator(Validator::one_of(MUTING_RULES_HANDLING)),
            )
            .with_block("destination", NestedBlock::set(destination).with_min_items(1))
            .with_block(
                "issues_filter",
                NestedBlock::list(issues_filter).with_min_items(1).with_max_items(1),
            )
            .with_block(
                "enrichments",
                NestedBlock::list(Block::new().with_block("nrql", NestedBlock::list(nrql).with_min_items(1)))
                    .with_max_items(1),
            )
            .with_attribute("workflow_id", Attribute::computed_string())
            .with_attribute("guid", Attribute::computed_string())
            .with_attribute(
                "last_run",
                Attribute::computed_string().with_description("The last time a notification was sent."),
            )
    }

    #[instrument(skip_all, fields(name = %planned.name))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: WorkflowState,
    ) -> Result<Applied<WorkflowState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let workflow = client
            .create_workflow(account_id, &expand_workflow(&planned, None))
            .await?;
        info!(workflow_id = %workflow.id, account_id, "created workflow");
        let mut state = flatten_workflow(workflow, &planned);
        state.account_id = Some(account_id);
        Ok(Applied::present(state))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: WorkflowState,
    ) -> Result<Applied<WorkflowState>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        match client.get_workflow(account_id, id).await {
            Ok(Some(workflow)) => Ok(Applied::present(flatten_workflow(workflow, &current))),
            Ok(None) => Ok(Applied::absent()),
            Err(err) if err.is_not_found() => Ok(Applied::absent()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: WorkflowState,
        planned: WorkflowState,
    ) -> Result<Applied<WorkflowState>, ProviderError> {
        let account_id = select_account_id(config, planned.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&prior.id)?.to_string();

        // The filter ID is computed; carry it from the prior state when the plan lost it.
        let mut planned = planned;
        if let (Some(planned_filter), Some(prior_filter)) =
            (planned.issues_filter.first_mut(), prior.issues_filter.first())
        {
            if planned_filter.filter_id.is_empty() {
                planned_filter.filter_id = prior_filter.filter_id.clone();
            }
        }

        let workflow = client
            .update_workflow(account_id, &expand_workflow(&planned, Some(id)))
            .await?;
        Ok(Applied::present(flatten_workflow(workflow, &planned)))
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: WorkflowState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let account_id = select_account_id(config, current.account_id);
        let client = config.client.scoped_to_account(account_id);
        let id = existing_id(&current.id)?;
        ignore_not_found(client.delete_workflow(account_id, id).await)?;
        Ok(Vec::new())
    }

    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        match version {
            0 => {
                debug!("migrating workflow state from version 0");
                Ok(migrate_state_v0_to_v1(state))
            },
            _ => Ok(state),
        }
    }
}
