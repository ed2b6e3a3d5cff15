//! `newrelic_service_level_alert_helper`
//!
//! Computes burn-rate alert settings for a service level. No API calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resource::{Applied, DataSource};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

/// Alert profiles.
pub const ALERT_TYPES: &[&str] = &["custom", "fast_burn", "slow_burn"];

/// SLO periods in days.
pub const SLO_PERIODS: &[i64] = &[1, 7, 28];

/// Evaluation window and tolerated budget consumption of an alert profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnProfile {
    /// Evaluation period in minutes.
    pub evaluation_period: i64,
    /// Percentage of the error budget allowed to burn in that period.
    pub tolerated_budget_consumption: f64,
}

/// Configuration and result of the helper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceLevelAlertHelperState {
    pub id: Option<String>,
    pub alert_type: String,
    pub sli_guid: String,
    pub slo_target: f64,
    pub slo_period: i64,
    pub custom_tolerated_budget_consumption: Option<f64>,
    pub custom_evaluation_period: Option<i64>,
    pub is_bad_events: bool,
    pub tolerated_budget_consumption: Option<f64>,
    pub evaluation_period: Option<i64>,
    pub threshold: Option<f64>,
    pub nrql: Option<String>,
}

/// Service level alert helper data source.
pub struct ServiceLevelAlertHelperDataSource;

/// Alert threshold for an SLO target and burn profile.
pub fn calculate_threshold(
    slo_target: f64,
    tolerated_budget_consumption: f64,
    slo_period: i64,
    evaluation_period: i64,
) -> f64 {
    (100.0 - slo_target)
        * ((tolerated_budget_consumption / 100.0 * slo_period as f64 * 24.0) / (evaluation_period as f64 / 60.0))
}

/// Resolve the burn profile, rejecting custom fields where they do not apply.
pub fn burn_profile(state: &ServiceLevelAlertHelperState) -> Result<BurnProfile, ProviderError> {
    let has_custom =
        state.custom_tolerated_budget_consumption.is_some() || state.custom_evaluation_period.is_some();
    match state.alert_type.to_lowercase().as_str() {
        "fast_burn" if has_custom => Err(ProviderError::Validation(
            "For 'fast_burn' alert type do not fill 'custom_evaluation_period' or \
             'custom_tolerated_budget_consumption', we use 60 minutes and 2%."
                .to_string(),
        )),
        "fast_burn" => Ok(BurnProfile {
            evaluation_period: 60,
            tolerated_budget_consumption: 2.0,
        }),
        "slow_burn" if has_custom => Err(ProviderError::Validation(
            "For 'slow_burn' alert type do not fill 'custom_evaluation_period' or \
             'custom_tolerated_budget_consumption', we use 360 minutes and 5%."
                .to_string(),
        )),
        "slow_burn" => Ok(BurnProfile {
            evaluation_period: 360,
            tolerated_budget_consumption: 5.0,
        }),
        "custom" => match (state.custom_evaluation_period, state.custom_tolerated_budget_consumption) {
            (Some(evaluation_period), Some(tolerated_budget_consumption)) => Ok(BurnProfile {
                evaluation_period,
                tolerated_budget_consumption,
            }),
            _ => Err(ProviderError::Validation(
                "For 'custom' alert type the fields 'custom_evaluation_period' and \
                 'custom_tolerated_budget_consumption' are mandatory."
                    .to_string(),
            )),
        },
        other => Err(ProviderError::Validation(format!("unknown alert_type {:?}", other))),
    }
}

/// SLO compliance query for an SLI.
fn compliance_nrql(sli_guid: &str, is_bad_events: bool) -> String {
    if is_bad_events {
        format!(
            "FROM Metric SELECT 100 - clamp_max((sum(newrelic.sli.valid) - sum(newrelic.sli.bad)) / \
             sum(newrelic.sli.valid) * 100, 100) as 'SLO compliance' WHERE sli.guid = '{}'",
            sli_guid
        )
    } else {
        format!(
            "FROM Metric SELECT 100 - clamp_max(sum(newrelic.sli.good) / sum(newrelic.sli.valid) * 100, 100) \
             as 'SLO compliance' WHERE sli.guid = '{}'",
            sli_guid
        )
    }
}

/// Fill the computed attributes.
fn compute(state: ServiceLevelAlertHelperState) -> Result<ServiceLevelAlertHelperState, ProviderError> {
    let profile = burn_profile(&state)?;
    Ok(ServiceLevelAlertHelperState {
        id: Some(format!("{}:{}", state.sli_guid, state.alert_type.to_lowercase())),
        tolerated_budget_consumption: Some(profile.tolerated_budget_consumption),
        evaluation_period: Some(profile.evaluation_period),
        threshold: Some(calculate_threshold(
            state.slo_target,
            profile.tolerated_budget_consumption,
            state.slo_period,
            profile.evaluation_period,
        )),
        nrql: Some(compliance_nrql(&state.sli_guid, state.is_bad_events)),
        ..state
    })
}

#[async_trait]
impl DataSource for ServiceLevelAlertHelperDataSource {
    type State = ServiceLevelAlertHelperState;

    fn type_name(&self) -> &'static str {
        "newrelic_service_level_alert_helper"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "alert_type",
                Attribute::required_string().with_validator(Validator::one_of_ignore_case(ALERT_TYPES)),
            )
            .with_attribute("sli_guid", Attribute::required_string())
            .with_attribute(
                "slo_target",
                Attribute::required_float64().with_validator(Validator::float_between(0.0, 100.0)),
            )
            .with_attribute(
                "slo_period",
                Attribute::required_int64().with_validator(Validator::int_one_of(SLO_PERIODS)),
            )
            .with_attribute(
                "custom_tolerated_budget_consumption",
                Attribute::optional_float64().with_validator(Validator::float_between(0.0, 100.0)),
            )
            .with_attribute(
                "custom_evaluation_period",
                Attribute::optional_int64().with_validator(Validator::int_at_least(1)),
            )
            .with_attribute("is_bad_events", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("tolerated_budget_consumption", Attribute::computed_float64())
            .with_attribute("evaluation_period", Attribute::computed_int64())
            .with_attribute("threshold", Attribute::computed_float64())
            .with_attribute("nrql", Attribute::computed_string())
    }

    fn validate(&self, state: &ServiceLevelAlertHelperState) -> Vec<Diagnostic> {
        match burn_profile(state) {
            Ok(_) => Vec::new(),
            Err(err) => vec![Diagnostic::error(err.message()).with_attribute("alert_type")],
        }
    }

    async fn read(
        &self,
        _config: &ProviderConfig,
        state: ServiceLevelAlertHelperState,
    ) -> Result<Applied<ServiceLevelAlertHelperState>, ProviderError> {
        Ok(Applied::present(compute(state)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn helper(alert_type: &str) -> ServiceLevelAlertHelperState {
        ServiceLevelAlertHelperState {
            alert_type: alert_type.into(),
            sli_guid: "MXxTTE98".into(),
            slo_target: 99.9,
            slo_period: 28,
            ..Default::default()
        }
    }

    #[test]
    fn test_calculate_threshold_regression() {
        assert_eq!(calculate_threshold(99.9, 2.0, 28, 60), 1.3439999999999237);
    }

    #[test]
    fn test_fast_and_slow_burn_profiles() {
        let fast = compute(helper("fast_burn")).unwrap();
        assert_eq!(fast.evaluation_period, Some(60));
        assert_eq!(fast.tolerated_budget_consumption, Some(2.0));
        assert_eq!(fast.threshold, Some(1.3439999999999237));

        let slow = compute(helper("SLOW_BURN")).unwrap();
        assert_eq!(slow.evaluation_period, Some(360));
        assert_eq!(slow.tolerated_budget_consumption, Some(5.0));
    }

    #[test]
    fn test_custom_fields_rules() {
        let mut fast = helper("fast_burn");
        fast.custom_evaluation_period = Some(30);
        let err = burn_profile(&fast).unwrap_err();
        assert!(err.message().contains("we use 60 minutes and 2%"));

        let mut custom = helper("custom");
        custom.custom_evaluation_period = Some(30);
        let err = burn_profile(&custom).unwrap_err();
        assert!(err.message().contains("are mandatory"));

        custom.custom_tolerated_budget_consumption = Some(10.0);
        assert_eq!(
            burn_profile(&custom).unwrap(),
            BurnProfile {
                evaluation_period: 30,
                tolerated_budget_consumption: 10.0,
            }
        );
    }

    #[test]
    fn test_nrql_variants() {
        let good = compute(helper("fast_burn")).unwrap().nrql.unwrap();
        assert!(good.contains("sum(newrelic.sli.good)"));
        assert!(good.ends_with("WHERE sli.guid = 'MXxTTE98'"));

        let mut bad = helper("fast_burn");
        bad.is_bad_events = true;
        let bad = compute(bad).unwrap().nrql.unwrap();
        assert!(bad.contains("sum(newrelic.sli.bad)"));
    }

    #[test]
    fn test_validate_reports_on_alert_type() {
        let mut state = helper("custom");
        state.custom_tolerated_budget_consumption = Some(5.0);
        let diags = ServiceLevelAlertHelperDataSource.validate(&state);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("alert_type"));
    }
}
