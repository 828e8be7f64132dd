//! Lifecycle fan-out and inspection tests

mod common;

use common::{host, lab1, network, template, Lab};
use vnlab::backend::simulated::SimOp;
use vnlab::backend::{HostHandle, VirtBackend};
use vnlab::catalog::Catalog;
use vnlab::models::kind::ResourceKind;
use vnlab::models::state::HostState;
use vnlab::orchestrator::{Inspector, Target, Verb};

async fn built_lab3(lab: &Lab) {
    let lab3 = template(
        "lab3",
        vec![network("net1", 0)],
        vec![
            host("vm1", &["net1"]),
            host("vm2", &["net1"]),
            host("vm3", &["net1"]),
        ],
    );
    lab.orchestrator().build(&lab3).await.unwrap();
}

fn inspector(lab: &Lab) -> Inspector {
    Inspector::new(lab.catalog.clone(), lab.backend.clone())
}

#[tokio::test]
async fn test_start_and_stop_deployment() {
    let lab = Lab::new();
    built_lab3(&lab).await;
    let target = Target::new(ResourceKind::Deployment, "lab3");

    let report = lab.fanout().apply(Verb::Start, &target).await.unwrap();
    assert_eq!(report.hosts, vec!["vm1", "vm2", "vm3"]);
    assert_eq!(
        report.summary(Verb::Start, &target),
        "deployment lab3 started (3 hosts, 0 networks)"
    );
    for name in ["vm1", "vm2", "vm3"] {
        assert_eq!(inspector(&lab).host_state(name).await.unwrap(), HostState::Running);
    }

    lab.fanout().apply(Verb::Stop, &target).await.unwrap();
    for name in ["vm1", "vm2", "vm3"] {
        assert_eq!(inspector(&lab).host_state(name).await.unwrap(), HostState::Off);
    }
}

#[tokio::test]
async fn test_fanout_stops_at_first_failure() {
    let lab = Lab::new();
    built_lab3(&lab).await;
    let target = Target::new(ResourceKind::Deployment, "lab3");
    lab.fanout().apply(Verb::Start, &target).await.unwrap();
    lab.backend.fail_on(SimOp::StopHost, "vm2");

    let err = lab.fanout().apply(Verb::Stop, &target).await.unwrap_err();

    assert!(err
        .to_string()
        .starts_with("failed to stop host vm2 (1 of 3 hosts already stopped)"));
    let inspector = inspector(&lab);
    assert_eq!(inspector.host_state("vm1").await.unwrap(), HostState::Off);
    assert_eq!(inspector.host_state("vm2").await.unwrap(), HostState::Running);
    assert_eq!(inspector.host_state("vm3").await.unwrap(), HostState::Running);
    assert!(!lab.backend.journal().contains(&"stop_host vm3".to_string()));
}

#[tokio::test]
async fn test_destroy_deployment_removes_everything() {
    let lab = Lab::new();
    built_lab3(&lab).await;
    let target = Target::new(ResourceKind::Deployment, "lab3");

    let report = lab.fanout().apply(Verb::Destroy, &target).await.unwrap();

    assert!(report.deployment_removed);
    assert_eq!(report.networks, vec!["net1"]);
    assert!(lab.backend.host_names().is_empty());
    assert!(lab.backend.network_names().is_empty());
    assert!(lab.catalog.list_deployments().await.unwrap().is_empty());
    assert!(lab.catalog.list_hosts().await.unwrap().is_empty());
    assert!(lab.catalog.list_networks().await.unwrap().is_empty());
    assert_eq!(lab.provisioner.cleaned(), vec!["vm1", "vm2", "vm3"]);

    let err = lab.fanout().apply(Verb::Destroy, &target).await.unwrap_err();
    assert!(err.is_not_found());

    // The names are free again
    lab.orchestrator().build(&lab1()).await.unwrap();
}

#[tokio::test]
async fn test_destroy_single_host_keeps_deployment() {
    let lab = Lab::new();
    built_lab3(&lab).await;

    lab.fanout()
        .apply(Verb::Destroy, &Target::new(ResourceKind::Host, "vm2"))
        .await
        .unwrap();

    assert_eq!(lab.backend.host_names(), vec!["vm1", "vm3"]);
    assert!(lab.catalog.find_host_by_name("vm2").await.unwrap().is_none());
    assert!(lab
        .catalog
        .find_deployment_by_name("lab3")
        .await
        .unwrap()
        .is_some());
    assert_eq!(lab.provisioner.cleaned(), vec!["vm2"]);
}

#[tokio::test]
async fn test_destroy_tolerates_host_missing_from_backend() {
    let lab = Lab::new();
    lab.orchestrator().build(&lab1()).await.unwrap();
    // Removed behind the catalog's back
    lab.backend.destroy_host(&HostHandle::new("vm1")).await.unwrap();

    let report = lab
        .fanout()
        .apply(Verb::Destroy, &Target::new(ResourceKind::Deployment, "lab1"))
        .await
        .unwrap();

    assert!(report.deployment_removed);
    assert!(lab.backend.network_names().is_empty());
    assert!(lab.catalog.list_hosts().await.unwrap().is_empty());
    assert_eq!(lab.provisioner.cleaned(), vec!["vm1"]);
}

#[tokio::test]
async fn test_destroy_network_in_use_fails_and_keeps_record() {
    let lab = Lab::new();
    lab.orchestrator().build(&lab1()).await.unwrap();

    let err = lab
        .fanout()
        .apply(Verb::Destroy, &Target::new(ResourceKind::Network, "net1"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("in use"));
    assert!(lab.catalog.find_network_by_name("net1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_networks_only_support_destroy() {
    let lab = Lab::new();
    lab.orchestrator().build(&lab1()).await.unwrap();

    let err = lab
        .fanout()
        .apply(Verb::Start, &Target::new(ResourceKind::Network, "net1"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        "Validation error: networks only support destroy, not start"
    );
}

#[tokio::test]
async fn test_unknown_target_is_not_found() {
    let lab = Lab::new();

    for kind in [ResourceKind::Host, ResourceKind::Deployment, ResourceKind::Network] {
        let err = lab
            .fanout()
            .apply(Verb::Destroy, &Target::new(kind, "ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{kind}: {err}");
    }
    assert!(lab.backend.journal().is_empty());
}

#[tokio::test]
async fn test_host_state_is_stable_without_changes() {
    let lab = Lab::new();
    lab.orchestrator().build(&lab1()).await.unwrap();
    let inspector = inspector(&lab);

    let first = inspector.host_state("vm1").await.unwrap();
    let second = inspector.host_state("vm1").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, HostState::Off);

    lab.backend.set_host_state("vm1", "paused");
    assert_eq!(
        inspector.host_state("vm1").await.unwrap(),
        HostState::Unknown("paused".into())
    );
}

#[tokio::test]
async fn test_details_and_addresses_of_running_host() {
    let lab = Lab::new();
    lab.orchestrator().build(&lab1()).await.unwrap();
    let inspector = inspector(&lab);

    assert!(inspector.host_ipv4("vm1").await.unwrap().is_empty());

    lab.fanout()
        .apply(Verb::Start, &Target::new(ResourceKind::Host, "vm1"))
        .await
        .unwrap();

    let details = inspector.host_details("vm1").await.unwrap();
    assert_eq!(details.state, HostState::Running);
    assert_eq!(details.deployment, "lab1");
    assert_eq!(details.record.ram, 1024);

    let addresses = inspector.host_ipv4("vm1").await.unwrap();
    assert_eq!(addresses["vnet0"].addresses, vec!["10.0.0.10"]);

    let deployments = inspector.deployments().await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].hosts, vec!["vm1"]);
}
