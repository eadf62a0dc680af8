#![allow(dead_code)]

use aapctl_core::{ApiFlavor, Auth, ClientConfig, ControllerClient};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API: &str = "/api/v2";

pub fn client_for(server: &MockServer) -> ControllerClient {
    ControllerClient::new(
        ClientConfig::new(server.uri())
            .with_flavor(ApiFlavor::Awx)
            .with_auth(Auth::Basic {
                username: "admin".into(),
                password: "changeme".into(),
            }),
    )
    .expect("client")
}

pub fn page(results: Value) -> Value {
    let count = results.as_array().map(|r| r.len()).unwrap_or(0);
    json!({ "count": count, "next": null, "previous": null, "results": results })
}

/// GET `<api>/<endpoint>` filtered by one query parameter
pub async fn mock_lookup(server: &MockServer, endpoint: &str, key: &str, value: &str, results: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{API}/{endpoint}")))
        .and(query_param(key, value))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(results)))
        .mount(server)
        .await;
}

pub async fn mock_get(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{API}/{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mock_create(server: &MockServer, endpoint: &str, id: i64) {
    Mock::given(method("POST"))
        .and(path(format!("{API}/{endpoint}")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": id })))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mock_associate(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("{API}/{endpoint}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn requests_with_method(server: &MockServer, verb: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb)
        .map(|r| r.url.path().to_string())
        .collect()
}
