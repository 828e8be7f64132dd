//! File-backed catalog tests

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{lab1, Lab, EMULATOR};
use vnlab::catalog::{Catalog, FileCatalog};
use vnlab::errors::LabError;
use vnlab::filesys::file::File;
use vnlab::models::records::{BuildIntent, NewDeployment, NewHost};
use vnlab::orchestrator::Orchestrator;

fn catalog_in(dir: &TempDir) -> FileCatalog {
    FileCatalog::new(File::new(dir.path().join("catalog.json")))
}

fn new_host(name: &str) -> NewHost {
    NewHost {
        name: name.into(),
        image: "ubuntu".into(),
        ram: 512,
        cpus: 1,
        username: "u".into(),
        password: "p".into(),
        hd_space: "5G".into(),
    }
}

#[tokio::test]
async fn test_migrate_creates_empty_catalog() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);

    catalog.migrate().await.unwrap();
    catalog.migrate().await.unwrap();

    assert!(catalog.file().exists().await);
    assert!(catalog.list_deployments().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let lab = Lab::new();
    let catalog = Arc::new(catalog_in(&dir));
    let orchestrator = Orchestrator::new(
        catalog.clone(),
        lab.backend.clone(),
        lab.provisioner.clone(),
        EMULATOR,
    );
    let built = orchestrator.build(&lab1()).await.unwrap();
    catalog.put_intent(BuildIntent::for_template(&lab1())).await.unwrap();

    let reopened = catalog_in(&dir);
    reopened.migrate().await.unwrap();

    let record = reopened.find_deployment_by_name("lab1").await.unwrap().unwrap();
    assert_eq!(record, built.record);
    let host = reopened.find_host_by_name("vm1").await.unwrap().unwrap();
    assert_eq!(host, built.hosts[0]);
    let network = reopened
        .find_network_by_address("10.0.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(network.name, "net1");
    assert_eq!(reopened.list_intents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_conflicting_commit_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .create_deployment(NewDeployment {
            name: "lab1".into(),
            hosts: vec![new_host("vm1")],
            networks: vec![],
        })
        .await
        .unwrap();
    let before = catalog.file().read_bytes().await.unwrap();

    let err = catalog
        .create_deployment(NewDeployment {
            name: "lab2".into(),
            hosts: vec![new_host("vm2"), new_host("vm1")],
            networks: vec![],
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(catalog.file().read_bytes().await.unwrap(), before);
    assert!(catalog.find_host_by_name("vm2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_deployment_with_members_is_refused() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .create_deployment(NewDeployment {
            name: "lab1".into(),
            hosts: vec![new_host("vm1")],
            networks: vec![],
        })
        .await
        .unwrap();

    let err = catalog.delete_deployment("lab1").await.unwrap_err();
    assert!(matches!(err.root(), LabError::Persistence(_)));

    catalog.delete_host("vm1").await.unwrap();
    catalog.delete_deployment("lab1").await.unwrap();
    assert!(catalog.delete_deployment("lab1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unsupported_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = File::new(dir.path().join("catalog.json"));
    file.write_string(
        r#"{"schema_version":99,"next_id":1,"deployments":[],"hosts":[],"networks":[],"intents":[]}"#,
    )
    .await
    .unwrap();

    let err = catalog_in(&dir).migrate().await.unwrap_err();

    assert!(matches!(err.root(), LabError::Persistence(_)));
    assert!(err.to_string().contains("schema version 99"));
}
