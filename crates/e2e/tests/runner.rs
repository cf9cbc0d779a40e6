//! Scenarios and suite cases run against an in-memory console

mod support;

use std::path::Path;
use std::time::Duration;

use console_e2e::runner::{run_case, run_scenario};
use console_e2e::selectors::*;
use console_e2e::{suites, Scenario};
use support::{console, run_config, Dom, FakeConsole};

fn clusters_list(dom: &mut Dom) {
    dom.show(PAGE_TITLE, "Assisted Bare Metal Clusters");
    dom.show(&cluster_link("test-infra-cluster"), "test-infra-cluster");
    dom.show(&cluster_table_cell(1, "Name"), "test-infra-cluster");
    dom.show(&cluster_table_cell(1, "Base domain"), "redhat.com");
    dom.show(&cluster_table_cell(1, "Version"), "4.5");
    dom.show(&cluster_table_cell(1, "Status"), "Pending");
    dom.show(&cluster_table_cell(1, "Hosts"), "3");
    for column in ["Name", "Base domain", "Version", "Status", "Hosts"] {
        dom.show(&cluster_column_header(column), column);
    }
    dom.after(Duration::from_secs(12), |dom| {
        dom.show(&cluster_table_cell(1, "Status"), "Ready");
    });
}

#[tokio::test(start_paused = true)]
async fn test_scenario_passes() {
    let yaml = r#"
name: list-renders
tags: [clusters]
steps:
  - action: visit
    path: /clusters
  - action: expect
    selector: h1
    contains: Assisted Bare Metal
  - action: expect
    selector: 'tbody > tr:nth-child(1) > [data-label="Status"]'
    equals: Ready
    deadline: api_request
  - action: expect
    selector: '#cluster-link-some-other-cluster'
    exists: false
  - action: log
    message: list is ready
"#;
    let scenario = Scenario::from_yaml(yaml).unwrap();
    let config = run_config();
    let fake = FakeConsole::new(clusters_list);

    let result = run_scenario(&console(&fake, &config), &scenario).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps.len(), 5);
    assert!(result.duration_ms >= 12_000);
    assert_eq!(fake.actions(), vec!["visit:/clusters"]);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_stops_at_first_failure() {
    let yaml = r#"
name: missing-button
steps:
  - action: click
    selector: '#button-create-new-cluster'
  - action: expect
    selector: '#form-input-name-field'
    visible: true
    timeout_ms: 500
  - action: visit
    path: /clusters
"#;
    let scenario = Scenario::from_yaml(yaml).unwrap();
    let config = run_config();
    let fake = FakeConsole::new(|dom| {
        dom.show(CREATE_CLUSTER_BUTTON, "Create New Cluster");
    });

    let result = run_scenario(&console(&fake, &config), &scenario).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps[0].success);
    let error = result.error.unwrap();
    assert!(error.contains("visibility of #form-input-name-field"), "{}", error);
    assert_eq!(fake.count("visit:/clusters"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_managed_clusters_cases() {
    let suite = suites::managed_clusters();
    let config = run_config();

    for name in ["can render", "has columns"] {
        let fake = FakeConsole::new(clusters_list);
        let result = run_case(&console(&fake, &config), &suite, suite.case(name).unwrap()).await;

        assert!(result.success, "{}: {:?}", name, result.error);
        assert_eq!(result.name, format!("managed-clusters > {}", name));
        assert_eq!(result.steps[0].step_name, "before each");
        assert_eq!(fake.count("visit:/clusters"), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_before_each_skips_case() {
    let suite = suites::managed_clusters();
    let config = run_config_short();
    let fake = FakeConsole::new(|dom| {
        dom.show(PAGE_TITLE, "Assisted Bare Metal Clusters");
    });

    let result = run_case(&console(&fake, &config), &suite, suite.case("can render").unwrap()).await;

    assert!(!result.success);
    assert_eq!(result.steps.len(), 1);
    assert!(result.error.unwrap().contains("#cluster-link-test-infra-cluster"));
}

fn run_config_short() -> console_e2e::RunConfig {
    support::run_config_with(&[("E2E_COMMAND_TIMEOUT", "1")])
}

#[test]
fn test_bundled_scenarios_parse() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
    let scenarios = Scenario::load_all(&dir).unwrap();
    assert!(!scenarios.is_empty());
    assert!(!Scenario::filter_by_tag(&scenarios, "smoke").is_empty());
}
