//! Managed resources.
//!
//! Each module holds one resource: its state struct, schema, the expand step
//! from state to API input, the flatten step back, and the CRUD handlers.

use crate::error::{ApiError, ProviderError};
use crate::resource::DynResource;

pub mod account_management;
pub mod alert_compound_condition;
pub mod alert_policy;
pub mod cloud_aws_link_account;
pub mod data_partition_rule;
pub mod fleet_grant;
pub mod log_parsing_rule;
pub mod notification_channel;
pub mod notification_destination;
pub mod obfuscation_expression;
pub mod obfuscation_rule;
pub mod synthetics_private_location;
pub mod workflow;

/// Every resource the provider serves.
pub(crate) fn all() -> Vec<Box<dyn DynResource>> {
    vec![
        Box::new(account_management::AccountManagementResource),
        Box::new(alert_compound_condition::AlertCompoundConditionResource),
        Box::new(alert_policy::AlertPolicyResource),
        Box::new(cloud_aws_link_account::CloudAwsLinkAccountResource),
        Box::new(data_partition_rule::DataPartitionRuleResource),
        Box::new(fleet_grant::FleetGrantResource),
        Box::new(log_parsing_rule::LogParsingRuleResource),
        Box::new(notification_channel::NotificationChannelResource),
        Box::new(notification_destination::NotificationDestinationResource),
        Box::new(obfuscation_expression::ObfuscationExpressionResource),
        Box::new(obfuscation_rule::ObfuscationRuleResource),
        Box::new(synthetics_private_location::SyntheticsPrivateLocationResource),
        Box::new(workflow::WorkflowResource),
    ]
}

/// ID of a state that must already exist remotely.
pub(crate) fn existing_id(id: &Option<String>) -> Result<&str, ProviderError> {
    id.as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidId("resource has no ID".to_string()))
}

/// Treat "already gone" as a successful delete.
pub(crate) fn ignore_not_found(result: Result<(), ApiError>) -> Result<(), ProviderError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other.map_err(ProviderError::from),
    }
}

pub(crate) fn default_true() -> bool {
    true
}

/// `None` for empty strings.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_are_unique() {
        let resources = all();
        let names: HashSet<&str> = resources.iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), resources.len());
        assert!(names.iter().all(|n| n.starts_with("newrelic_")));
    }

    #[test]
    fn test_existing_id() {
        assert_eq!(existing_id(&Some("42".to_string())).unwrap(), "42");
        assert!(existing_id(&Some(String::new())).is_err());
        assert!(existing_id(&None).is_err());
    }

    #[test]
    fn test_ignore_not_found() {
        assert!(ignore_not_found(Err(ApiError::NotFound("gone".into()))).is_ok());
        assert!(ignore_not_found(Err(ApiError::Unauthorized(401))).is_err());
        assert!(ignore_not_found(Ok(())).is_ok());
    }
}
