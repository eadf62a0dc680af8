mod common;

use aapctl_core::{Cleaner, Manifest};
use common::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &str = r#"
organizations: [{ name: Acme }]
teams: [{ name: Ops, organization: Acme }]
users:
  - { username: bob, password: x, organization: Acme, teams: [Ops] }
projects:
  - { name: Playbooks, organization: Acme, scm_url: "https://example.com/p.git" }
inventories: [{ name: Lab, organization: Acme }]
job_templates:
  - { name: Deploy, project: Playbooks, inventory: Lab, playbook: site.yml }
"#;

async fn mock_delete(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(method("DELETE"))
        .and(path(format!("{API}/{endpoint}")))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn manifest_cleanup_deletes_dependents_first() {
    let server = MockServer::start().await;
    let none = json!([]);

    mock_lookup(&server, "job_templates/", "name", "Deploy", json!([{"id": 10}])).await;
    mock_lookup(&server, "inventories/", "name", "Lab", json!([{"id": 7}])).await;
    // Someone already removed the project
    mock_lookup(&server, "projects/", "name", "Playbooks", none.clone()).await;
    mock_lookup(&server, "users/", "username", "bob", json!([{"id": 3}])).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/teams/"))
        .and(query_param("name", "Ops"))
        .and(query_param("organization__name", "Acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([{"id": 2}]))))
        .mount(&server)
        .await;
    mock_lookup(&server, "organizations/", "name", "Acme", json!([{"id": 1}])).await;

    mock_delete(&server, "job_templates/10/", 204).await;
    mock_delete(&server, "inventories/7/", 202).await;
    mock_delete(&server, "users/3/", 204).await;
    mock_delete(&server, "teams/2/", 404).await;
    mock_delete(&server, "organizations/1/", 409).await;

    let client = client_for(&server);
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
    let summary = Cleaner::new(&client, false)
        .remove_manifest_assets(&manifest)
        .await
        .unwrap();

    assert_eq!(summary.deleted, 3);
    // missing project plus the team that vanished mid-run
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.dry_run);

    let deletes = requests_with_method(&server, "DELETE").await;
    assert_eq!(
        deletes,
        vec![
            "/api/v2/job_templates/10/",
            "/api/v2/inventories/7/",
            "/api/v2/users/3/",
            "/api/v2/teams/2/",
            "/api/v2/organizations/1/",
        ]
    );
}

#[tokio::test]
async fn purge_spares_defaults_and_managed_objects() {
    let server = MockServer::start().await;

    mock_get(&server, "job_templates/", page(json!([{"id": 10, "name": "Deploy"}]))).await;
    mock_get(
        &server,
        "inventories/",
        page(json!([
            {"id": 1, "name": "Demo Inventory"},
            {"id": 7, "name": "Lab"}
        ])),
    )
    .await;
    mock_get(
        &server,
        "credentials/",
        page(json!([
            {"id": 1, "name": "Demo Credential"},
            {"id": 4, "name": "Ansible Galaxy", "managed": true},
            {"id": 5, "name": "Acme SSH"}
        ])),
    )
    .await;
    mock_get(&server, "organizations/", page(json!([{"id": 1, "name": "Default"}]))).await;
    // workflow_job_templates/, projects/ and execution_environments/ answer 404

    mock_delete(&server, "job_templates/10/", 204).await;
    mock_delete(&server, "inventories/7/", 204).await;
    mock_delete(&server, "credentials/5/", 204).await;

    let client = client_for(&server);
    let summary = Cleaner::new(&client, false).purge_non_default().await.unwrap();

    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.skipped, 4);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn dry_run_sends_no_deletes() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "projects/",
        page(json!([
            {"id": 1, "name": "Demo Project"},
            {"id": 6, "name": "Playbooks"}
        ])),
    )
    .await;
    mock_lookup(&server, "organizations/", "name", "Acme", json!([{"id": 1}])).await;

    let client = client_for(&server);
    let summary = Cleaner::new(&client, true).purge_non_default().await.unwrap();
    assert!(summary.dry_run);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.skipped, 1);

    let manifest = Manifest::from_yaml_str("organizations: [{ name: Acme }]\n").unwrap();
    let summary = Cleaner::new(&client, true)
        .remove_manifest_assets(&manifest)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);

    assert!(requests_with_method(&server, "DELETE").await.is_empty());
}
