//! Export workflow job templates together with everything they reference.
//!
//! Each asset lands as pretty-printed JSON in a per-kind directory. Assets
//! are fetched at most once per run, and a dependency that cannot be fetched
//! is logged and skipped so one broken reference does not stop the export.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};

use crate::client::{ControllerClient, object_id};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    WorkflowJobTemplate,
    JobTemplate,
    Project,
    Inventory,
    Credential,
    ExecutionEnvironment,
    Organization,
}

impl AssetKind {
    pub const ALL: [AssetKind; 7] = [
        Self::WorkflowJobTemplate,
        Self::JobTemplate,
        Self::Project,
        Self::Inventory,
        Self::Credential,
        Self::ExecutionEnvironment,
        Self::Organization,
    ];

    /// Directory name, also the API list endpoint without the slash
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::WorkflowJobTemplate => "workflow_job_templates",
            Self::JobTemplate => "job_templates",
            Self::Project => "projects",
            Self::Inventory => "inventories",
            Self::Credential => "credentials",
            Self::ExecutionEnvironment => "execution_environments",
            Self::Organization => "organizations",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub counts: BTreeMap<String, usize>,
    pub output_dir: PathBuf,
    pub total_files: usize,
}

pub struct Downloader<'a> {
    client: &'a ControllerClient,
    output_dir: PathBuf,
    downloaded: HashMap<AssetKind, HashSet<i64>>,
    counts: BTreeMap<String, usize>,
    files_written: usize,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a ControllerClient, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            downloaded: HashMap::new(),
            counts: BTreeMap::new(),
            files_written: 0,
        }
    }

    fn dir(&self, kind: AssetKind) -> PathBuf {
        self.output_dir.join(kind.dir_name())
    }

    fn seen(&self, kind: AssetKind, id: i64) -> bool {
        self.downloaded.get(&kind).is_some_and(|ids| ids.contains(&id))
    }

    fn save(&mut self, value: &Value, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        self.files_written += 1;
        Ok(())
    }

    fn mark(&mut self, kind: AssetKind, id: i64) {
        self.downloaded.entry(kind).or_default().insert(id);
        *self.counts.entry(kind.dir_name().to_string()).or_default() += 1;
    }

    pub async fn run(mut self) -> Result<DownloadReport> {
        for kind in AssetKind::ALL {
            fs::create_dir_all(self.dir(kind))?;
        }

        tracing::info!("Downloading workflow job templates");
        let workflows = self
            .client
            .list_all("workflow_job_templates/", &[])
            .await?;
        tracing::info!(count = workflows.len(), "found workflows");
        let index = self.dir(AssetKind::WorkflowJobTemplate).join("_all_workflows.json");
        self.save(&listing(&workflows), &index)?;

        for wf in &workflows {
            let id = object_id(wf, "workflow_job_templates/")?;
            if self.seen(AssetKind::WorkflowJobTemplate, id) {
                continue;
            }
            self.download_workflow(id).await?;
        }

        self.counts
            .entry(AssetKind::WorkflowJobTemplate.dir_name().to_string())
            .or_insert(0);
        Ok(DownloadReport {
            counts: self.counts,
            output_dir: self.output_dir,
            total_files: self.files_written,
        })
    }

    async fn download_workflow(&mut self, wf_id: i64) -> Result<()> {
        let detail = self
            .client
            .get(&format!("workflow_job_templates/{wf_id}/"), &[])
            .await?;
        let name = asset_name(&detail);
        tracing::info!(workflow = %name, id = wf_id, "workflow job template");

        let nodes = self
            .client
            .list_all(&format!("workflow_job_templates/{wf_id}/workflow_nodes/"), &[])
            .await?;
        let survey = self.optional_survey("workflow_job_templates", wf_id).await;

        let dir = self.dir(AssetKind::WorkflowJobTemplate);
        let base = safe_filename(&name, wf_id);
        self.save(&detail, &dir.join(format!("{base}_details.json")))?;
        self.save(&listing(&nodes), &dir.join(format!("{base}_nodes.json")))?;
        if let Some(survey) = survey {
            self.save(&survey, &dir.join(format!("{base}_survey.json")))?;
        }
        self.mark(AssetKind::WorkflowJobTemplate, wf_id);

        let job_template_ids: Vec<i64> = nodes.iter().filter_map(node_job_template_id).collect();
        for jt_id in job_template_ids {
            self.download_job_template(jt_id).await;
        }
        Ok(())
    }

    /// Surveys are optional; a missing one answers 404
    async fn optional_survey(&self, endpoint: &str, id: i64) -> Option<Value> {
        match self
            .client
            .get(&format!("{endpoint}/{id}/survey_spec/"), &[])
            .await
        {
            Ok(v) if has_content(&v) => Some(v),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(endpoint, id, error = %e, "no survey");
                None
            }
        }
    }

    async fn download_job_template(&mut self, jt_id: i64) {
        if self.seen(AssetKind::JobTemplate, jt_id) {
            return;
        }
        if let Err(e) = self.try_download_job_template(jt_id).await {
            tracing::warn!(id = jt_id, error = %e, "could not download job template");
        }
    }

    async fn try_download_job_template(&mut self, jt_id: i64) -> Result<()> {
        tracing::info!(id = jt_id, "job template");
        let detail = self.client.get(&format!("job_templates/{jt_id}/"), &[]).await?;
        let dir = self.dir(AssetKind::JobTemplate);
        let base = safe_filename(&asset_name(&detail), jt_id);
        self.save(&detail, &dir.join(format!("{base}_details.json")))?;
        if let Some(survey) = self.optional_survey("job_templates", jt_id).await {
            self.save(&survey, &dir.join(format!("{base}_survey.json")))?;
        }
        self.mark(AssetKind::JobTemplate, jt_id);

        if let Some(id) = related_id(&detail, "project") {
            self.download_simple(AssetKind::Project, id).await;
        }
        if let Some(id) = related_id(&detail, "inventory") {
            self.download_simple(AssetKind::Inventory, id).await;
        }
        if let Some(id) = related_id(&detail, "execution_environment") {
            self.download_simple(AssetKind::ExecutionEnvironment, id).await;
        }
        let cred_ids: Vec<i64> = detail
            .pointer("/summary_fields/credentials")
            .and_then(|v| v.as_array())
            .map(|creds| {
                creds
                    .iter()
                    .filter_map(|c| c.get("id").and_then(|v| v.as_i64()))
                    .collect()
            })
            .unwrap_or_default();
        for id in cred_ids {
            self.download_simple(AssetKind::Credential, id).await;
        }
        Ok(())
    }

    /// Project, inventory, credential, execution environment or organization
    async fn download_simple(&mut self, kind: AssetKind, id: i64) {
        if self.seen(kind, id) {
            return;
        }
        if let Err(e) = self.try_download_simple(kind, id).await {
            tracing::warn!(kind = kind.dir_name(), id, error = %e, "could not download asset");
        }
    }

    async fn try_download_simple(&mut self, kind: AssetKind, id: i64) -> Result<()> {
        tracing::info!(kind = kind.dir_name(), id, "asset");
        let mut record = self
            .client
            .get(&format!("{}/{id}/", kind.dir_name()), &[])
            .await?;
        if kind == AssetKind::Credential && record.get("inputs").is_some() {
            record["inputs"] = json!({ "_note": "Sensitive data removed" });
        }

        let dir = self.dir(kind);
        let base = safe_filename(&asset_name(&record), id);
        self.save(&record, &dir.join(format!("{base}.json")))?;

        if kind == AssetKind::Inventory {
            match self
                .client
                .get(&format!("inventories/{id}/inventory_sources/"), &[])
                .await
            {
                Ok(sources) if has_results(&sources) => {
                    self.save(&sources, &dir.join(format!("{base}_sources.json")))?;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(id, error = %e, "no inventory sources"),
            }
        }
        self.mark(kind, id);

        // Organizations have no further dependencies, so this never recurses
        if kind != AssetKind::Organization
            && let Some(org_id) = related_id(&record, "organization")
        {
            Box::pin(self.download_simple(AssetKind::Organization, org_id)).await;
        }
        if kind == AssetKind::Project
            && let Some(cred_id) = record
                .pointer("/summary_fields/credential/id")
                .and_then(|v| v.as_i64())
        {
            Box::pin(self.download_simple(AssetKind::Credential, cred_id)).await;
        }
        Ok(())
    }
}

/// `<id padded to 3>_<name>` with anything but alphanumerics, space, `-`, `_` replaced
pub fn safe_filename(name: &str, id: i64) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{id:03}_{safe}")
}

/// Job template id behind a workflow node, read from its related URL
fn node_job_template_id(node: &Value) -> Option<i64> {
    node.get("unified_job_template")?.as_i64()?;
    let url = node.pointer("/related/unified_job_template")?.as_str()?;
    if !url.contains("/job_templates/") || url.contains("/workflow_job_templates/") {
        return None;
    }
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn related_id(record: &Value, field: &str) -> Option<i64> {
    record.get(field).and_then(|v| v.as_i64())
}

fn asset_name(record: &Value) -> String {
    record
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unnamed")
        .to_string()
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn has_results(value: &Value) -> bool {
    value
        .get("results")
        .and_then(|v| v.as_array())
        .is_some_and(|r| !r.is_empty())
}

/// Full list in the Controller's page shape
fn listing(results: &[Value]) -> Value {
    json!({ "count": results.len(), "results": results })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_pads_and_sanitizes() {
        assert_eq!(safe_filename("Deploy App (Dev)", 7), "007_Deploy App _Dev_");
        assert_eq!(safe_filename("ops/net-audit_v2", 1234), "1234_ops_net-audit_v2");
        assert_eq!(safe_filename("Übersicht", 12), "012_Übersicht");
    }

    #[test]
    fn node_points_at_job_template() {
        let node = json!({
            "unified_job_template": 42,
            "related": {"unified_job_template": "/api/v2/job_templates/42/"}
        });
        assert_eq!(node_job_template_id(&node), Some(42));

        let nested = json!({
            "unified_job_template": 9,
            "related": {"unified_job_template": "/api/v2/workflow_job_templates/9/"}
        });
        assert_eq!(node_job_template_id(&nested), None);

        let approval = json!({"unified_job_template": null, "related": {}});
        assert_eq!(node_job_template_id(&approval), None);
    }

    #[test]
    fn empty_survey_is_not_content() {
        assert!(!has_content(&json!({})));
        assert!(!has_content(&Value::Null));
        assert!(has_content(&json!({"name": "", "spec": []})));
    }

    #[test]
    fn listing_matches_page_shape() {
        let value = listing(&[json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(value["count"], 2);
        assert_eq!(value["results"][1]["id"], 2);
    }
}
