//! Tear down Controller objects, dependents first.

use serde::Serialize;
use serde_json::Value;

use crate::client::{ControllerClient, DeleteOutcome, object_id};
use crate::error::{AapError, Result};
use crate::manifest::Manifest;

/// Objects every install ships with; purge never touches them
pub const DEFAULT_ORGANIZATIONS: &[&str] = &["Default"];
pub const DEFAULT_PROJECTS: &[&str] = &["Demo Project"];
pub const DEFAULT_INVENTORIES: &[&str] = &["Demo Inventory"];
pub const DEFAULT_CREDENTIALS: &[&str] = &["Demo Credential"];
pub const DEFAULT_EXECUTION_ENVIRONMENTS: &[&str] = &[
    "Control Plane Execution Environment",
    "Default execution environment",
    "Ansible Engine 2.9 Execution Environment",
    "Minimal execution environment",
];

const PURGE_ORDER: [(&str, &str, &[&str]); 7] = [
    ("workflow job templates", "workflow_job_templates/", &[]),
    ("job templates", "job_templates/", &[]),
    ("inventories", "inventories/", DEFAULT_INVENTORIES),
    ("projects", "projects/", DEFAULT_PROJECTS),
    ("credentials", "credentials/", DEFAULT_CREDENTIALS),
    ("execution environments", "execution_environments/", DEFAULT_EXECUTION_ENVIRONMENTS),
    ("organizations", "organizations/", DEFAULT_ORGANIZATIONS),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub deleted: usize,
    /// Not found, default or managed objects
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,
}

pub struct Cleaner<'a> {
    client: &'a ControllerClient,
    summary: CleanupSummary,
}

impl<'a> Cleaner<'a> {
    pub fn new(client: &'a ControllerClient, dry_run: bool) -> Self {
        Self {
            client,
            summary: CleanupSummary {
                dry_run,
                ..CleanupSummary::default()
            },
        }
    }

    /// Delete every object a manifest names, in reverse creation order
    pub async fn remove_manifest_assets(mut self, manifest: &Manifest) -> Result<CleanupSummary> {
        let total = 9;

        step(1, total, "Deleting workflow job templates");
        for wf in &manifest.workflow_job_templates {
            self.delete_named("workflow_job_templates/", &[("name", wf.name.as_str())], &wf.name)
                .await?;
        }

        step(2, total, "Deleting job templates");
        for jt in &manifest.job_templates {
            self.delete_named("job_templates/", &[("name", jt.name.as_str())], &jt.name)
                .await?;
        }

        step(3, total, "Deleting inventories (cascades hosts and groups)");
        for inv in &manifest.inventories {
            self.delete_named("inventories/", &[("name", inv.name.as_str())], &inv.name)
                .await?;
        }

        step(4, total, "Deleting projects");
        for project in &manifest.projects {
            self.delete_named("projects/", &[("name", project.name.as_str())], &project.name)
                .await?;
        }

        step(5, total, "Deleting credentials");
        for cred in &manifest.credentials {
            self.delete_named("credentials/", &[("name", cred.name.as_str())], &cred.name)
                .await?;
        }

        step(6, total, "Deleting custom credential types");
        for ct in &manifest.credential_types {
            self.delete_named("credential_types/", &[("name", ct.name.as_str())], &ct.name)
                .await?;
        }

        step(7, total, "Deleting users");
        for user in &manifest.users {
            self.delete_named("users/", &[("username", user.username.as_str())], &user.username)
                .await?;
        }

        step(8, total, "Deleting teams");
        for team in &manifest.teams {
            self.delete_named(
                "teams/",
                &[
                    ("name", team.name.as_str()),
                    ("organization__name", team.organization.as_str()),
                ],
                &team.name,
            )
            .await?;
        }

        step(9, total, "Deleting organizations");
        for org in &manifest.organizations {
            self.delete_named("organizations/", &[("name", org.name.as_str())], &org.name)
                .await?;
        }

        Ok(self.summary)
    }

    /// Delete every object that is neither a shipped default nor managed
    pub async fn purge_non_default(mut self) -> Result<CleanupSummary> {
        for (n, (label, endpoint, defaults)) in PURGE_ORDER.iter().enumerate() {
            step(n + 1, PURGE_ORDER.len(), &format!("Deleting {label}"));
            let objects = match self.client.list_all(endpoint, &[]).await {
                Ok(objects) => objects,
                Err(AapError::Http { status, message }) => {
                    tracing::warn!(endpoint, status, %message, "could not list objects");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if objects.is_empty() {
                tracing::info!(endpoint, "none found");
                continue;
            }

            for obj in &objects {
                let id = object_id(obj, endpoint)?;
                let name = display_name(obj, id);
                if defaults.contains(&name.as_str()) {
                    tracing::info!(%name, id, "default object, skipping");
                    self.summary.skipped += 1;
                    continue;
                }
                if obj.get("managed").and_then(|v| v.as_bool()).unwrap_or(false) {
                    tracing::info!(%name, id, "managed object, skipping");
                    self.summary.skipped += 1;
                    continue;
                }
                self.delete_object(endpoint, id, &name).await?;
            }
        }
        Ok(self.summary)
    }

    async fn delete_named(&mut self, endpoint: &str, query: &[(&str, &str)], name: &str) -> Result<()> {
        match self.client.find_one(endpoint, query).await? {
            Some(obj) => {
                let id = object_id(&obj, endpoint)?;
                self.delete_object(endpoint, id, name).await
            }
            None => {
                tracing::info!(endpoint, name, "not found, skipping");
                self.summary.skipped += 1;
                Ok(())
            }
        }
    }

    async fn delete_object(&mut self, endpoint: &str, id: i64, name: &str) -> Result<()> {
        if self.summary.dry_run {
            tracing::info!(endpoint, name, id, "would delete");
            self.summary.deleted += 1;
            return Ok(());
        }
        match self.client.delete(&format!("{endpoint}{id}/")).await {
            Ok(DeleteOutcome::Deleted) => {
                tracing::info!(endpoint, name, id, "deleted");
                self.summary.deleted += 1;
            }
            Ok(DeleteOutcome::NotFound) => {
                tracing::info!(endpoint, name, id, "already gone, skipping");
                self.summary.skipped += 1;
            }
            Err(AapError::Http { status, message }) => {
                tracing::warn!(endpoint, name, id, status, %message, "delete failed");
                self.summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

fn display_name(obj: &Value, id: i64) -> String {
    obj.get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("id={id}"))
}

fn step(n: usize, total: usize, label: &str) {
    tracing::info!("[{n}/{total}] {label}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(display_name(&json!({"name": "Ops"}), 3), "Ops");
        assert_eq!(display_name(&json!({}), 3), "id=3");
    }

    #[test]
    fn purge_protects_shipped_defaults() {
        let orgs = PURGE_ORDER
            .iter()
            .find(|(_, endpoint, _)| *endpoint == "organizations/")
            .unwrap();
        assert!(orgs.2.contains(&"Default"));
        assert_eq!(PURGE_ORDER[0].1, "workflow_job_templates/");
        assert_eq!(PURGE_ORDER[6].1, "organizations/");
    }
}
