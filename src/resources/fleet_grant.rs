//! `newrelic_fleet_grant`
//!
//! Grants roles on a fleet to groups. One resource owns many remote grants,
//! so partial failures are reported as warnings and the state converges to
//! the grants that actually exist. The resource ID packs the grant IDs with
//! [`encode_grant_ids`].

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::authorization::Grant;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::ids::encode_grant_ids;
use crate::resource::{Applied, Resource};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};

/// One `grant` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantState {
    pub id: Option<String>,
    pub group_id: String,
    pub role_id: i64,
}

impl GrantState {
    /// Identity of a grant within the set.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.role_id)
    }
}

/// State of a fleet grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetGrantState {
    pub id: Option<String>,
    pub fleet_id: String,
    pub organization_id: Option<String>,
    pub grant: Vec<GrantState>,
}

/// Changes needed to move from one grant set to another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantDiff {
    /// Present only in the new set.
    pub add: Vec<GrantState>,
    /// Present only in the old set.
    pub remove: Vec<GrantState>,
    /// Present in both; taken from the old set so their IDs are known.
    pub keep: Vec<GrantState>,
}

/// Compare grant sets by `group_id:role_id`.
pub fn diff_grants(old: &[GrantState], new: &[GrantState]) -> GrantDiff {
    let old_keys: HashSet<String> = old.iter().map(GrantState::key).collect();
    let new_keys: HashSet<String> = new.iter().map(GrantState::key).collect();

    let mut diff = GrantDiff::default();
    let mut seen = HashSet::new();
    for grant in new {
        if !old_keys.contains(&grant.key()) && seen.insert(grant.key()) {
            diff.add.push(grant.clone());
        }
    }
    for grant in old {
        if !seen.insert(grant.key()) {
            continue;
        }
        if new_keys.contains(&grant.key()) {
            diff.keep.push(grant.clone());
        } else {
            diff.remove.push(grant.clone());
        }
    }
    diff
}

/// Fleet grant resource.
pub struct FleetGrantResource;

fn grant_failed(grant: &GrantState, err: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::warning(format!(
        "Failed to grant access for group {} and role {}",
        grant.group_id, grant.role_id
    ))
    .with_detail(err.to_string())
}

fn revoke_failed(grant: &GrantState, err: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::warning(format!(
        "Failed to revoke access for group {} and role {}",
        grant.group_id, grant.role_id
    ))
    .with_detail(err.to_string())
}

/// Fail with `summary`, keeping the warnings gathered so far.
fn fail_with(mut diagnostics: Vec<Diagnostic>, summary: &str) -> ProviderError {
    diagnostics.push(Diagnostic::error(summary));
    ProviderError::Diagnostics(diagnostics)
}

/// Grant each entry, returning the ones that succeeded with their new IDs.
async fn grant_all(
    config: &ProviderConfig,
    fleet_id: &str,
    grants: &[GrantState],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<GrantState> {
    let mut granted = Vec::with_capacity(grants.len());
    for grant in grants {
        match config
            .client
            .grant_fleet_access(&grant.group_id, fleet_id, grant.role_id)
            .await
        {
            Ok(id) => granted.push(GrantState {
                id: Some(id),
                ..grant.clone()
            }),
            Err(err) => {
                warn!(group_id = %grant.group_id, role_id = grant.role_id, error = %err, "grant failed");
                diagnostics.push(grant_failed(grant, err));
            },
        }
    }
    granted
}

/// Revoke each entry, returning how many succeeded.
async fn revoke_all(
    config: &ProviderConfig,
    fleet_id: &str,
    grants: &[GrantState],
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let mut revoked = 0;
    for grant in grants {
        match config
            .client
            .revoke_fleet_access(&grant.group_id, fleet_id, grant.role_id)
            .await
        {
            Ok(()) => revoked += 1,
            Err(err) => {
                warn!(group_id = %grant.group_id, role_id = grant.role_id, error = %err, "revoke failed");
                diagnostics.push(revoke_failed(grant, err));
            },
        }
    }
    revoked
}

fn grant_ids(grants: &[GrantState]) -> Vec<&str> {
    grants
        .iter()
        .filter_map(|g| g.id.as_deref())
        .filter(|id| !id.is_empty())
        .collect()
}

fn flatten_grant(grant: Grant) -> Result<GrantState, ProviderError> {
    let role_id = grant
        .role
        .id
        .parse::<i64>()
        .map_err(|err| ProviderError::Sdk(format!("unexpected role ID {}: {}", grant.role.id, err)))?;
    Ok(GrantState {
        id: Some(grant.id.to_string()),
        group_id: grant.grantee.id,
        role_id,
    })
}

#[async_trait]
impl Resource for FleetGrantResource {
    type State = FleetGrantState;

    fn type_name(&self) -> &'static str {
        "newrelic_fleet_grant"
    }

    fn schema(&self) -> Schema {
        let grant = Block::new()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("The unique ID of the grant."),
            )
            .with_attribute("group_id", Attribute::required_string().with_description("The group ID."))
            .with_attribute("role_id", Attribute::required_int64().with_description("The role ID."));

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "fleet_id",
                Attribute::required_string()
                    .with_description("The fleet ID.")
                    .with_force_new(),
            )
            .with_attribute(
                "organization_id",
                Attribute::computed_string().with_description("The organization ID."),
            )
            .with_block("grant", NestedBlock::set(grant).with_min_items(1))
    }

    #[instrument(skip_all, fields(fleet_id = %planned.fleet_id))]
    async fn create(
        &self,
        config: &ProviderConfig,
        planned: FleetGrantState,
    ) -> Result<Applied<FleetGrantState>, ProviderError> {
        let mut diagnostics = Vec::new();
        let granted = grant_all(config, &planned.fleet_id, &planned.grant, &mut diagnostics).await;
        if granted.is_empty() {
            return Err(fail_with(diagnostics, "no grants were successfully created"));
        }
        info!(granted = granted.len(), "created fleet grants");

        let organization_id = match config.client.get_organization_id().await {
            Ok(id) => Some(id),
            Err(err) => {
                diagnostics.push(
                    Diagnostic::warning("Failed to fetch organization ID").with_detail(format!(
                        "Grants were successfully created, but failed to fetch organization ID: {}",
                        err
                    )),
                );
                None
            },
        };

        let state = FleetGrantState {
            id: Some(encode_grant_ids(&grant_ids(&granted))),
            fleet_id: planned.fleet_id,
            organization_id,
            grant: granted,
        };
        Ok(Applied::present(state).with_diagnostics(diagnostics))
    }

    #[instrument(skip_all, fields(fleet_id = %current.fleet_id))]
    async fn read(
        &self,
        config: &ProviderConfig,
        current: FleetGrantState,
    ) -> Result<Applied<FleetGrantState>, ProviderError> {
        if current.fleet_id.is_empty() {
            return Err(ProviderError::InvalidId("fleet_id is not set".to_string()));
        }
        let organization_id = match current.organization_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => config.client.get_organization_id().await.map_err(|err| {
                ProviderError::Sdk(format!("failed to fetch organization information: {}", err))
            })?,
        };

        let grants = config
            .client
            .list_grants(&organization_id, &current.fleet_id)
            .await
            .map_err(|err| ProviderError::Sdk(format!("failed to fetch grants: {}", err)))?;
        if grants.is_empty() {
            return Ok(Applied::absent());
        }
        let grant = grants
            .into_iter()
            .map(flatten_grant)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Applied::present(FleetGrantState {
            id: current.id,
            fleet_id: current.fleet_id,
            organization_id: Some(organization_id),
            grant,
        }))
    }

    #[instrument(skip_all, fields(fleet_id = %planned.fleet_id))]
    async fn update(
        &self,
        config: &ProviderConfig,
        prior: FleetGrantState,
        planned: FleetGrantState,
    ) -> Result<Applied<FleetGrantState>, ProviderError> {
        let diff = diff_grants(&prior.grant, &planned.grant);
        if diff.add.is_empty() && diff.remove.is_empty() {
            return Ok(Applied::present(FleetGrantState {
                grant: prior.grant,
                organization_id: prior.organization_id,
                id: prior.id,
                ..planned
            }));
        }
        info!(
            add = diff.add.len(),
            remove = diff.remove.len(),
            keep = diff.keep.len(),
            "reconciling fleet grants"
        );

        let mut diagnostics = Vec::new();
        let mut remaining = diff.keep;
        remaining.extend(grant_all(config, &planned.fleet_id, &diff.add, &mut diagnostics).await);
        revoke_all(config, &planned.fleet_id, &diff.remove, &mut diagnostics).await;

        let ids = grant_ids(&remaining);
        if ids.is_empty() {
            return Err(fail_with(diagnostics, "no grants remain after update"));
        }
        let state = FleetGrantState {
            id: Some(encode_grant_ids(&ids)),
            fleet_id: planned.fleet_id,
            organization_id: prior.organization_id,
            grant: remaining,
        };
        Ok(Applied::present(state).with_diagnostics(diagnostics))
    }

    #[instrument(skip_all, fields(fleet_id = %current.fleet_id))]
    async fn delete(
        &self,
        config: &ProviderConfig,
        current: FleetGrantState,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = Vec::new();
        let revoked = revoke_all(config, &current.fleet_id, &current.grant, &mut diagnostics).await;
        if revoked == 0 && !current.grant.is_empty() {
            return Err(fail_with(diagnostics, "failed to revoke any grants"));
        }
        Ok(diagnostics)
    }
}
