//! Integration tests for resource operations against a mocked NerdGraph endpoint
//!
//! Every request is a POST to `/graphql`; mocks tell operations apart by the
//! GraphQL document or the variables in the request body.

use newrelic_provider::ids::encode_grant_ids;
use newrelic_provider::testing::{assert_plan_creates, present, ProviderTester};
use newrelic_provider::{NewRelicProvider, ProviderError};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "NRAK-TEST";

async fn configured_tester(server: &MockServer) -> ProviderTester<NewRelicProvider> {
    let tester = ProviderTester::new(NewRelicProvider::new());
    tester
        .configure(json!({
            "api_key": API_KEY,
            "account_id": 1,
            "nerdgraph_api_url": format!("{}/graphql", server.uri()),
        }))
        .await
        .expect("provider should configure");
    tester
}

fn graphql(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

fn graphql_error(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": null, "errors": [{ "message": message }] }))
}

mod alert_policy {
    use super::*;

    fn policy() -> Value {
        json!({
            "id": "42",
            "name": "payments",
            "incidentPreference": "PER_POLICY",
            "accountId": 1
        })
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("Api-Key", API_KEY))
            .and(body_string_contains("alertsPolicyCreate"))
            .respond_with(graphql(json!({ "alertsPolicyCreate": policy() })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("policy(id: $id)"))
            .and(body_partial_json(json!({ "variables": { "accountId": 1, "id": "42" } })))
            .respond_with(graphql(json!({
                "actor": { "account": { "alerts": { "policy": policy() } } }
            })))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let plan = tester
            .plan_create("newrelic_alert_policy", json!({ "name": "payments" }))
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let state = tester
            .lifecycle_create("newrelic_alert_policy", json!({ "name": "payments" }))
            .await
            .unwrap();
        assert_eq!(state["id"], "42");
        assert_eq!(state["account_id"], 1);
        assert_eq!(state["incident_preference"], "PER_POLICY");
    }

    #[tokio::test]
    async fn test_read_missing_policy_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(graphql(json!({
                "actor": { "account": { "alerts": { "policy": null } } }
            })))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let result = tester
            .read(
                "newrelic_alert_policy",
                json!({ "id": "42", "name": "payments", "account_id": 1 }),
            )
            .await
            .unwrap();
        assert!(result.is_absent());
    }

    #[tokio::test]
    async fn test_read_not_found_error_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("policy(id: $id)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "actor": { "account": { "alerts": { "policy": null } } } },
                "errors": [{
                    "message": "Not Found",
                    "extensions": { "errorClass": "NOT_FOUND" }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let result = tester
            .read(
                "newrelic_alert_policy",
                json!({ "id": "42", "name": "payments", "account_id": 1 }),
            )
            .await
            .unwrap();
        assert!(result.is_absent());
    }

    #[tokio::test]
    async fn test_read_other_graphql_error_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(graphql_error("internal server error"))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let err = tester
            .read(
                "newrelic_alert_policy",
                json!({ "id": "42", "name": "payments", "account_id": 1 }),
            )
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("internal server error"));
    }

    #[tokio::test]
    async fn test_rejected_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let err = tester
            .read("newrelic_alert_policy", json!({ "id": "42", "name": "payments" }))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("unauthorized"));
    }
}

mod log_parsing_rule {
    use super::*;

    fn rule(id: &str, name: &str, deleted: bool) -> Value {
        json!({
            "id": id,
            "accountId": 1,
            "attribute": "message",
            "description": name,
            "enabled": true,
            "grok": "%{IP:client_ip}",
            "lucene": "logtype:nginx",
            "nrql": "SELECT * FROM Log WHERE logtype = 'nginx'",
            "deleted": deleted
        })
    }

    fn config(name: &str) -> Value {
        json!({
            "name": name,
            "attribute": "message",
            "enabled": true,
            "grok": "%{IP:client_ip}",
            "lucene": "logtype:nginx",
            "nrql": "SELECT * FROM Log WHERE logtype = 'nginx'",
            "matched": false
        })
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("parsingRules"))
            .respond_with(graphql(json!({
                "actor": { "account": { "logConfigurations": {
                    "parsingRules": [rule("r-1", "nginx", false)]
                } } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("logConfigurationsCreateParsingRule"))
            .respond_with(graphql(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let plan = tester
            .plan_create("newrelic_log_parsing_rule", config("nginx"))
            .await
            .unwrap();
        let err = tester
            .create("newrelic_log_parsing_rule", plan.planned_state)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test]
    async fn test_deleted_rule_name_can_be_reused() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("parsingRules"))
            .respond_with(graphql(json!({
                "actor": { "account": { "logConfigurations": {
                    "parsingRules": [rule("r-1", "nginx", true)]
                } } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("logConfigurationsCreateParsingRule"))
            .respond_with(graphql(json!({
                "logConfigurationsCreateParsingRule": {
                    "rule": rule("r-2", "nginx", false),
                    "errors": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let plan = tester
            .plan_create("newrelic_log_parsing_rule", config("nginx"))
            .await
            .unwrap();
        let result = tester
            .create("newrelic_log_parsing_rule", plan.planned_state)
            .await
            .unwrap();

        assert_eq!(result.warnings().count(), 1);
        let state = present(result).unwrap();
        assert_eq!(state["id"], "r-2");
        assert_eq!(state["matched"], false);
    }
}

mod fleet_grant {
    use super::*;

    #[tokio::test]
    async fn test_partial_grant_failure_keeps_successes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "grant": { "groupId": "g-1" } } })))
            .respond_with(graphql(json!({
                "authorizationManagementGrantAccess": { "accessGrants": [{ "id": "101" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "grant": { "groupId": "g-2" } } })))
            .respond_with(graphql_error("role is not assignable"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("organization { id }"))
            .respond_with(graphql(json!({ "actor": { "organization": { "id": "org-1" } } })))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let result = tester
            .create(
                "newrelic_fleet_grant",
                json!({
                    "fleet_id": "fleet-1",
                    "grant": [
                        { "group_id": "g-1", "role_id": 1 },
                        { "group_id": "g-2", "role_id": 2 }
                    ]
                }),
            )
            .await
            .unwrap();

        let warnings: Vec<_> = result.warnings().map(|d| d.summary.clone()).collect();
        assert_eq!(warnings, vec!["Failed to grant access for group g-2 and role 2"]);

        let state = present(result).unwrap();
        assert_eq!(state["id"], encode_grant_ids(&["101"]));
        assert_eq!(state["organization_id"], "org-1");
        assert_eq!(state["grant"].as_array().map(Vec::len), Some(1));
        assert_eq!(state["grant"][0]["group_id"], "g-1");
    }

    #[tokio::test]
    async fn test_all_grants_failing_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("authorizationManagementGrantAccess"))
            .respond_with(graphql_error("forbidden"))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let err = tester
            .create(
                "newrelic_fleet_grant",
                json!({
                    "fleet_id": "fleet-1",
                    "grant": [{ "group_id": "g-1", "role_id": 1 }]
                }),
            )
            .await
            .unwrap_err();

        let ProviderError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[1].summary, "no grants were successfully created");
    }
}

mod fleet_grant_update {
    use super::*;

    fn revoke_ok() -> ResponseTemplate {
        graphql(json!({ "authorizationManagementRevokeAccess": { "accessGrants": [] } }))
    }

    #[tokio::test]
    async fn test_update_grants_added_and_revokes_removed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "grant": { "groupId": "g-3" } } })))
            .respond_with(graphql(json!({
                "authorizationManagementGrantAccess": { "accessGrants": [{ "id": "33" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "revoke": { "groupId": "g-1" } } })))
            .respond_with(graphql_error("grant is locked"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "grant": { "groupId": "g-2" } } })))
            .respond_with(graphql(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "revoke": { "groupId": "g-2" } } })))
            .respond_with(revoke_ok())
            .expect(0)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let result = tester
            .update(
                "newrelic_fleet_grant",
                json!({
                    "id": encode_grant_ids(&["11", "22"]),
                    "fleet_id": "fleet-1",
                    "organization_id": "org-1",
                    "grant": [
                        { "id": "11", "group_id": "g-1", "role_id": 1 },
                        { "id": "22", "group_id": "g-2", "role_id": 2 }
                    ]
                }),
                json!({
                    "fleet_id": "fleet-1",
                    "grant": [
                        { "group_id": "g-2", "role_id": 2 },
                        { "group_id": "g-3", "role_id": 3 }
                    ]
                }),
            )
            .await
            .unwrap();

        let warnings: Vec<_> = result.warnings().map(|d| d.summary.clone()).collect();
        assert_eq!(warnings, vec!["Failed to revoke access for group g-1 and role 1"]);

        let state = present(result).unwrap();
        assert_eq!(state["id"], encode_grant_ids(&["22", "33"]));
        assert_eq!(state["organization_id"], "org-1");
        assert_eq!(state["grant"][0]["id"], "22");
        assert_eq!(state["grant"][1]["id"], "33");
        assert_eq!(state["grant"][1]["group_id"], "g-3");
    }

    #[tokio::test]
    async fn test_update_with_nothing_left_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("authorizationManagementGrantAccess"))
            .respond_with(graphql_error("role is not assignable"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("authorizationManagementRevokeAccess"))
            .respond_with(revoke_ok())
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let err = tester
            .update(
                "newrelic_fleet_grant",
                json!({
                    "id": encode_grant_ids(&["11"]),
                    "fleet_id": "fleet-1",
                    "grant": [{ "id": "11", "group_id": "g-1", "role_id": 1 }]
                }),
                json!({
                    "fleet_id": "fleet-1",
                    "grant": [{ "group_id": "g-2", "role_id": 2 }]
                }),
            )
            .await
            .unwrap_err();

        let ProviderError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Failed to grant access for group g-2 and role 2",
                "no grants remain after update"
            ]
        );
    }
}

mod polling_create {
    use super::*;

    fn partition_rule() -> Value {
        json!({
            "id": "dp-1",
            "targetDataPartition": "Log_Nginx",
            "description": null,
            "enabled": true,
            "nrql": "logtype = 'nginx'",
            "retentionPolicy": "STANDARD",
            "deleted": false
        })
    }

    fn partition_config() -> Value {
        json!({
            "enabled": true,
            "nrql": "logtype = 'nginx'",
            "retention_policy": "STANDARD",
            "target_data_partition": "Log_Nginx"
        })
    }

    fn partition_list(rules: Value) -> ResponseTemplate {
        graphql(json!({
            "actor": { "account": { "logConfigurations": { "dataPartitionRules": rules } } }
        }))
    }

    #[tokio::test]
    async fn test_data_partition_waits_until_listed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("logConfigurationsCreateDataPartitionRule"))
            .respond_with(graphql(json!({
                "logConfigurationsCreateDataPartitionRule": {
                    "rule": partition_rule(),
                    "errors": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("dataPartitionRules"))
            .respond_with(partition_list(json!([])))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("dataPartitionRules"))
            .respond_with(partition_list(json!([partition_rule()])))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let plan = tester
            .plan_create("newrelic_data_partition_rule", partition_config())
            .await
            .unwrap();
        let state = present(
            tester
                .create("newrelic_data_partition_rule", plan.planned_state)
                .await
                .unwrap(),
        )
        .unwrap();

        assert_eq!(state["id"], "dp-1");
        assert_eq!(state["target_data_partition"], "Log_Nginx");
        assert_eq!(state["deleted"], false);
    }

    #[tokio::test]
    async fn test_data_partition_list_error_stops_polling() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("logConfigurationsCreateDataPartitionRule"))
            .respond_with(graphql(json!({
                "logConfigurationsCreateDataPartitionRule": {
                    "rule": partition_rule(),
                    "errors": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("dataPartitionRules"))
            .respond_with(graphql_error("permission denied"))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let plan = tester
            .plan_create("newrelic_data_partition_rule", partition_config())
            .await
            .unwrap();
        let err = tester
            .create("newrelic_data_partition_rule", plan.planned_state)
            .await
            .unwrap_err();

        assert!(!matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_account_waits_until_listed() {
        let server = MockServer::start().await;
        let account = json!({ "id": 55, "name": "staging", "regionCode": "us01" });

        Mock::given(method("POST"))
            .and(body_string_contains("accountManagementCreateAccount"))
            .and(body_partial_json(json!({
                "variables": { "account": { "name": "staging", "regionCode": "us01" } }
            })))
            .respond_with(graphql(json!({
                "accountManagementCreateAccount": { "managedAccount": account.clone() }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("managedAccounts"))
            .respond_with(graphql(json!({
                "actor": { "organization": { "accountManagement": {
                    "managedAccounts": [{ "id": 54, "name": "prod", "regionCode": "us01" }]
                } } }
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("managedAccounts"))
            .respond_with(graphql(json!({
                "actor": { "organization": { "accountManagement": {
                    "managedAccounts": [account]
                } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let state = present(
            tester
                .create(
                    "newrelic_account_management",
                    json!({ "name": "staging", "region": "us01" }),
                )
                .await
                .unwrap(),
        )
        .unwrap();

        assert_eq!(state["id"], "55");
        assert_eq!(state["name"], "staging");
        assert_eq!(state["region"], "us01");
    }
}

mod entity {
    use super::*;

    #[tokio::test]
    async fn test_lookup_picks_exact_name_in_account() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("entitySearch"))
            .and(body_partial_json(json!({
                "variables": { "query": "name = 'checkout' AND domain = 'APM' AND type = 'APPLICATION'" }
            })))
            .respond_with(graphql(json!({
                "actor": { "entitySearch": { "results": { "entities": [
                    {
                        "guid": "MXxBUE18b3RoZXI",
                        "name": "checkout-legacy",
                        "accountId": 1,
                        "domain": "APM",
                        "type": "APPLICATION",
                        "entityType": "APM_APPLICATION_ENTITY",
                        "applicationId": 6
                    },
                    {
                        "guid": "MXxBUE18Y2hlY2tvdXQ",
                        "name": "checkout",
                        "accountId": 1,
                        "domain": "APM",
                        "type": "APPLICATION",
                        "entityType": "APM_APPLICATION_ENTITY",
                        "applicationId": 7
                    }
                ] } } }
            })))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let result = tester
            .read_data_source(
                "newrelic_entity",
                json!({ "name": "checkout", "domain": "APM", "type": "APPLICATION" }),
            )
            .await
            .unwrap();

        let state = present(result).unwrap();
        assert_eq!(state["guid"], "MXxBUE18Y2hlY2tvdXQ");
        assert_eq!(state["id"], "MXxBUE18Y2hlY2tvdXQ");
        assert_eq!(state["application_id"], 7);
    }

    #[tokio::test]
    async fn test_lookup_without_match_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("entitySearch"))
            .respond_with(graphql(json!({
                "actor": { "entitySearch": { "results": { "entities": [] } } }
            })))
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let err = tester
            .read_data_source("newrelic_entity", json!({ "name": "ghost" }))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ignore_case: false"));
    }
}

mod state_management {
    use super::*;
    use newrelic_provider::testing::TestError;

    #[tokio::test]
    async fn test_import_policy_with_account_suffix() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "accountId": 7, "id": "42" } })))
            .respond_with(graphql(json!({
                "actor": { "account": { "alerts": { "policy": {
                    "id": "42",
                    "name": "payments",
                    "incidentPreference": "PER_CONDITION",
                    "accountId": 7
                } } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured_tester(&server).await;
        let imported = tester
            .import_resource("newrelic_alert_policy", "42:7")
            .await
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "newrelic_alert_policy");
        assert_eq!(imported[0].state["account_id"], 7);
        assert_eq!(imported[0].state["incident_preference"], "PER_CONDITION");
    }

    #[tokio::test]
    async fn test_upgrade_workflow_state_from_version_zero() {
        let tester = ProviderTester::new(NewRelicProvider::new());
        let upgraded = tester
            .upgrade_resource_state(
                "newrelic_workflow",
                0,
                json!({
                    "id": "wf-1",
                    "name": "ops",
                    "workflow_enabled": false,
                    "destination_configuration": [{ "channel_id": "c-1" }]
                }),
            )
            .await
            .unwrap();

        assert_eq!(upgraded["enabled"], false);
        assert_eq!(upgraded["destination"][0]["channel_id"], "c-1");
        assert!(upgraded.get("workflow_enabled").is_none());
    }

    #[tokio::test]
    async fn test_data_partition_requires_log_prefix() {
        let tester = ProviderTester::new(NewRelicProvider::new());
        let err = tester
            .validate_resource_config(
                "newrelic_data_partition_rule",
                json!({
                    "enabled": true,
                    "nrql": "logtype = 'nginx'",
                    "retention_policy": "STANDARD",
                    "target_data_partition": "Nginx"
                }),
            )
            .await
            .unwrap_err();

        let TestError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        assert_eq!(diags[0].summary, "Invalid value");
        assert_eq!(diags[0].attribute.as_deref(), Some("target_data_partition"));
        assert_eq!(
            diags[0].detail.as_deref(),
            Some("Prepend \"Log_\" to the given target_data_partition value.")
        );
    }
}
