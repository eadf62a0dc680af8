use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{AapError, Result};

/// Which API root the Controller is served under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// AWX or a standalone Controller: `/api/v2`
    Awx,
    /// AAP 2.5+ behind the platform gateway: `/api/controller/v2`
    #[default]
    Gateway,
}

impl ApiFlavor {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Awx => "/api/v2",
            Self::Gateway => "/api/controller/v2",
        }
    }
}

/// How requests authenticate against the Controller
#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Token { token: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub flavor: ApiFlavor,
    pub auth: Option<Auth>,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            flavor: ApiFlavor::default(),
            auth: None,
            insecure: false,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Thin JSON client over the Controller REST API
pub struct ControllerClient {
    http: reqwest::Client,
    host: Url,
    api_base: String,
    auth: Option<Auth>,
}

impl ControllerClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let host = Url::parse(config.host.trim_end_matches('/'))?;
        let api_base = format!(
            "{}{}",
            host.as_str().trim_end_matches('/'),
            config.flavor.prefix()
        );
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            host,
            api_base,
            auth: config.auth,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn host(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        match &self.auth {
            Some(Auth::Basic { username, password }) => {
                req = req.basic_auth(username, Some(password));
            }
            Some(Auth::Token { token }) => {
                req = req.bearer_auth(token);
            }
            None => {}
        }
        req.header("Accept", "application/json")
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        req.send().await.map_err(|source| AapError::Connect {
            url: url.to_string(),
            source,
        })
    }

    /// Unauthenticated liveness check; answers version and node details
    pub async fn ping(&self) -> Result<Value> {
        self.get("ping/", &[]).await
    }

    /// The user the credentials belong to
    pub async fn me(&self) -> Result<Value> {
        let page = self.get("me/", &[]).await?;
        page.pointer("/results/0")
            .cloned()
            .ok_or_else(|| AapError::unexpected("me/", "no user in response"))
    }

    pub fn has_auth(&self) -> bool {
        self.auth.is_some()
    }

    pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.api_url(endpoint);
        tracing::debug!(method = "GET", %url, ?query, "controller request");
        let resp = self
            .send(self.request(Method::GET, &url).query(query), &url)
            .await?;
        handle_response(resp).await
    }

    /// Fetch an absolute URL or a host-relative path such as a `next` link
    pub async fn get_url(&self, url: &str) -> Result<Value> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.host.join(url)?.to_string()
        };
        tracing::debug!(method = "GET", %url, "controller request");
        let resp = self.send(self.request(Method::GET, &url), &url).await?;
        handle_response(resp).await
    }

    /// Collect `results` across every page of a list endpoint
    pub async fn list_all(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut page = self.get(endpoint, query).await?;
        let mut results = Vec::new();
        loop {
            if let Some(items) = page.get_mut("results").and_then(|v| v.as_array_mut()) {
                results.append(items);
            }
            match page.get("next").and_then(|v| v.as_str()) {
                Some(next) if !next.is_empty() => {
                    let next = next.to_string();
                    page = self.get_url(&next).await?;
                }
                _ => break,
            }
        }
        Ok(results)
    }

    /// First object matching the filter, if any
    pub async fn find_one(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let mut page = self.get(endpoint, query).await?;
        Ok(page
            .get_mut("results")
            .and_then(|v| v.as_array_mut())
            .and_then(|items| {
                if items.is_empty() {
                    None
                } else {
                    Some(items.swap_remove(0))
                }
            }))
    }

    pub async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let url = self.api_url(endpoint);
        tracing::debug!(method = "POST", %url, "controller request");
        let resp = self
            .send(self.request(Method::POST, &url).json(payload), &url)
            .await?;
        handle_response(resp).await
    }

    /// Attach an object to a related sub-list (`POST {"id": id}`)
    pub async fn associate(&self, endpoint: &str, id: i64) -> Result<()> {
        self.post(endpoint, &json!({ "id": id })).await.map(|_| ())
    }

    pub async fn delete(&self, endpoint: &str) -> Result<DeleteOutcome> {
        let url = self.api_url(endpoint);
        tracing::debug!(method = "DELETE", %url, "controller request");
        let resp = self.send(self.request(Method::DELETE, &url), &url).await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AapError::Http {
                status: status.as_u16(),
                message: summarize_error(&body),
            });
        }
        Ok(DeleteOutcome::Deleted)
    }
}

/// Numeric `id` of an API object
pub fn object_id(value: &Value, context: &str) -> Result<i64> {
    value
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AapError::unexpected(context, "object has no numeric id"))
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(AapError::Http {
            status: status.as_u16(),
            message: summarize_error(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}

/// Condense a Controller error body into one line.
///
/// Validation failures come back as `{"field": ["msg", ...]}`, permission and
/// lookup failures as `{"detail": "msg"}`.
pub(crate) fn summarize_error(body: &str) -> String {
    const MAX_RAW: usize = 500;

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = map.get("detail").and_then(|v| v.as_str()) {
            return detail.to_string();
        }
        let msgs: Vec<String> = map
            .iter()
            .filter_map(|(field, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    Value::Array(items) => items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => return None,
                };
                if field == "__all__" {
                    Some(text)
                } else {
                    Some(format!("{field}: {text}"))
                }
            })
            .collect();
        if !msgs.is_empty() {
            return msgs.join("; ");
        }
    }

    let trimmed = body.trim();
    if trimmed.len() > MAX_RAW {
        let mut end = MAX_RAW;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_follows_flavor() {
        let awx = ControllerClient::new(
            ClientConfig::new("http://awx.lab.local:32000/").with_flavor(ApiFlavor::Awx),
        )
        .unwrap();
        assert_eq!(awx.api_base(), "http://awx.lab.local:32000/api/v2");
        assert_eq!(awx.api_url("/organizations/"), "http://awx.lab.local:32000/api/v2/organizations/");

        let gw = ControllerClient::new(ClientConfig::new("https://aap.lab.local")).unwrap();
        assert_eq!(gw.api_base(), "https://aap.lab.local/api/controller/v2");
        assert_eq!(gw.host(), "https://aap.lab.local");
    }

    #[test]
    fn rejects_unparseable_host() {
        let err = ControllerClient::new(ClientConfig::new("not a url")).err().unwrap();
        assert!(matches!(err, AapError::InvalidUrl(_)));
    }

    #[test]
    fn summarize_detail_body() {
        let body = r#"{"detail": "Authentication credentials were not provided."}"#;
        assert_eq!(
            summarize_error(body),
            "Authentication credentials were not provided."
        );
    }

    #[test]
    fn summarize_field_errors() {
        let body = r#"{"name": ["Organization with this Name already exists."], "__all__": ["Bad."]}"#;
        let msg = summarize_error(body);
        assert!(msg.contains("name: Organization with this Name already exists."));
        assert!(msg.contains("Bad."));
        assert!(!msg.contains("__all__"));
    }

    #[test]
    fn summarize_truncates_raw_bodies() {
        let body = "x".repeat(800);
        let msg = summarize_error(&body);
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), 503);
    }

    #[test]
    fn object_id_requires_number() {
        assert_eq!(object_id(&json!({"id": 7}), "teams/").unwrap(), 7);
        assert!(object_id(&json!({"name": "x"}), "teams/").is_err());
    }
}
