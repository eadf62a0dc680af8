mod common;

use std::fs;
use std::path::Path;

use aapctl_core::Downloader;
use assert_json_diff::assert_json_include;
use common::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

async fn mock_get_once(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{API}/{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

fn jt_node(id: i64, jt: i64) -> Value {
    json!({
        "id": id,
        "unified_job_template": jt,
        "related": {"unified_job_template": format!("/api/v2/job_templates/{jt}/")}
    })
}

#[tokio::test]
async fn exports_workflows_with_their_dependencies_once() {
    let server = MockServer::start().await;

    mock_get(
        &server,
        "workflow_job_templates/",
        page(json!([{"id": 1, "name": "Release"}, {"id": 2, "name": "Hotfix/Urgent"}])),
    )
    .await;
    mock_get(&server, "workflow_job_templates/1/", json!({"id": 1, "name": "Release"})).await;
    mock_get(&server, "workflow_job_templates/2/", json!({"id": 2, "name": "Hotfix/Urgent"})).await;
    mock_get(&server, "workflow_job_templates/1/workflow_nodes/", page(json!([jt_node(20, 10)]))).await;
    mock_get(
        &server,
        "workflow_job_templates/2/workflow_nodes/",
        page(json!([
            jt_node(30, 10),
            {"id": 31, "unified_job_template": null, "related": {}}
        ])),
    )
    .await;

    mock_get_once(
        &server,
        "job_templates/10/",
        json!({
            "id": 10,
            "name": "Deploy",
            "project": 6,
            "inventory": 7,
            "execution_environment": 3,
            "summary_fields": {"credentials": [{"id": 5, "name": "Acme SSH"}]}
        }),
    )
    .await;
    mock_get(
        &server,
        "job_templates/10/survey_spec/",
        json!({"name": "", "spec": [{"variable": "version"}]}),
    )
    .await;

    mock_get_once(
        &server,
        "projects/6/",
        json!({
            "id": 6,
            "name": "Playbooks",
            "organization": 1,
            "summary_fields": {"credential": {"id": 5}}
        }),
    )
    .await;
    mock_get_once(&server, "inventories/7/", json!({"id": 7, "name": "Lab", "organization": 1})).await;
    mock_get(&server, "inventories/7/inventory_sources/", page(json!([]))).await;
    mock_get_once(
        &server,
        "execution_environments/3/",
        json!({"id": 3, "name": "Default execution environment", "organization": null}),
    )
    .await;
    mock_get_once(
        &server,
        "credentials/5/",
        json!({
            "id": 5,
            "name": "Acme SSH",
            "organization": 1,
            "inputs": {"username": "ansible", "password": "$encrypted$"}
        }),
    )
    .await;
    mock_get_once(&server, "organizations/1/", json!({"id": 1, "name": "Acme"})).await;

    let out = tempfile::tempdir().unwrap();
    let client = client_for(&server);
    let report = Downloader::new(&client, out.path().join("aap_assets"))
        .run()
        .await
        .unwrap();

    assert_eq!(report.counts["workflow_job_templates"], 2);
    assert_eq!(report.counts["job_templates"], 1);
    assert_eq!(report.counts["projects"], 1);
    assert_eq!(report.counts["inventories"], 1);
    assert_eq!(report.counts["credentials"], 1);
    assert_eq!(report.counts["execution_environments"], 1);
    assert_eq!(report.counts["organizations"], 1);
    assert_eq!(report.total_files, 12);

    let root = out.path().join("aap_assets");
    let all = read_json(&root.join("workflow_job_templates/_all_workflows.json"));
    assert_eq!(all["count"], 2);
    assert!(root.join("workflow_job_templates/001_Release_details.json").exists());
    assert!(root.join("workflow_job_templates/002_Hotfix_Urgent_nodes.json").exists());
    assert!(!root.join("workflow_job_templates/001_Release_survey.json").exists());
    assert!(root.join("job_templates/010_Deploy_survey.json").exists());
    assert!(!root.join("inventories/007_Lab_sources.json").exists());

    let cred = read_json(&root.join("credentials/005_Acme SSH.json"));
    assert_eq!(cred["inputs"], json!({"_note": "Sensitive data removed"}));
    assert!(!cred.to_string().contains("$encrypted$"));

    let jt = read_json(&root.join("job_templates/010_Deploy_details.json"));
    assert_json_include!(actual: jt, expected: json!({"project": 6, "inventory": 7}));
}

#[tokio::test]
async fn broken_dependency_is_skipped() {
    let server = MockServer::start().await;
    mock_get(&server, "workflow_job_templates/", page(json!([{"id": 1, "name": "Release"}]))).await;
    mock_get(&server, "workflow_job_templates/1/", json!({"id": 1, "name": "Release"})).await;
    mock_get(&server, "workflow_job_templates/1/workflow_nodes/", page(json!([jt_node(20, 99)]))).await;
    // job_templates/99/ is not mocked and answers 404

    let out = tempfile::tempdir().unwrap();
    let client = client_for(&server);
    let report = Downloader::new(&client, out.path()).run().await.unwrap();

    assert_eq!(report.counts["workflow_job_templates"], 1);
    assert!(!report.counts.contains_key("job_templates"));
    assert_eq!(report.total_files, 3);
}

#[tokio::test]
async fn no_workflows_still_writes_the_index() {
    let server = MockServer::start().await;
    mock_get(&server, "workflow_job_templates/", page(json!([]))).await;

    let out = tempfile::tempdir().unwrap();
    let client = client_for(&server);
    let report = Downloader::new(&client, out.path()).run().await.unwrap();

    assert_eq!(report.counts["workflow_job_templates"], 0);
    assert_eq!(report.total_files, 1);
    assert!(out.path().join("projects").is_dir());
}

#[tokio::test]
async fn follows_every_page_of_workflow_nodes() {
    let server = MockServer::start().await;
    mock_get(&server, "workflow_job_templates/", page(json!([{"id": 1, "name": "Release"}]))).await;
    mock_get(&server, "workflow_job_templates/1/", json!({"id": 1, "name": "Release"})).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/workflow_job_templates/1/workflow_nodes/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "results": [jt_node(21, 11)]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    mock_get(
        &server,
        "workflow_job_templates/1/workflow_nodes/",
        json!({
            "count": 2,
            "next": "/api/v2/workflow_job_templates/1/workflow_nodes/?page=2",
            "results": [jt_node(20, 10)]
        }),
    )
    .await;
    mock_get_once(&server, "job_templates/10/", json!({"id": 10, "name": "Deploy"})).await;
    mock_get_once(&server, "job_templates/11/", json!({"id": 11, "name": "Verify"})).await;

    let out = tempfile::tempdir().unwrap();
    let client = client_for(&server);
    let report = Downloader::new(&client, out.path()).run().await.unwrap();

    assert_eq!(report.counts["job_templates"], 2);
    let nodes = read_json(&out.path().join("workflow_job_templates/001_Release_nodes.json"));
    assert_eq!(nodes["count"], 2);
    assert_eq!(nodes["results"][1]["id"], 21);
    assert!(out.path().join("job_templates/011_Verify_details.json").exists());
}

#[tokio::test]
async fn total_files_ignores_leftovers_from_earlier_runs() {
    let server = MockServer::start().await;
    mock_get(&server, "workflow_job_templates/", page(json!([]))).await;

    let out = tempfile::tempdir().unwrap();
    fs::create_dir_all(out.path().join("projects")).unwrap();
    fs::write(out.path().join("projects/006_Old.json"), "{}").unwrap();

    let client = client_for(&server);
    let report = Downloader::new(&client, out.path()).run().await.unwrap();
    assert_eq!(report.total_files, 1);
}
