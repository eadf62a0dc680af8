//! Create-or-reuse every object of a manifest, in dependency order.
//!
//! Existing objects are looked up by name and reused as they are; nothing is
//! updated in place. Sub-list associations (users into teams, credentials
//! onto job templates, ...) that the Controller rejects are taken to be
//! present already.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::time::{Instant, sleep};

use crate::client::{ControllerClient, object_id};
use crate::error::{AapError, Result};
use crate::manifest::{
    CredentialType, Group, Host, Inventory, JobTemplate, Manifest, RoleObjectType, TeamRole,
    WorkflowJobTemplate,
};

const STEPS: usize = 10;

/// Project statuses that mean an SCM update is still in flight
const SYNC_IN_PROGRESS: [&str; 4] = ["new", "pending", "waiting", "running"];

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    /// How long to wait for project syncs; zero skips the wait
    pub sync_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Per-kind counts of a populate run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    pub counts: BTreeMap<String, usize>,
    /// Projects still syncing when the wait ran out
    pub unsynced_projects: Vec<String>,
}

impl PopulateReport {
    pub fn get(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    fn set(&mut self, kind: &str, n: usize) {
        self.counts.insert(kind.to_string(), n);
    }

    fn bump(&mut self, kind: &str) {
        *self.counts.entry(kind.to_string()).or_default() += 1;
    }
}

pub struct Populator<'a> {
    client: &'a ControllerClient,
    options: PopulateOptions,
    org_ids: HashMap<String, i64>,
    /// (organization, team, id) in manifest order
    team_ids: Vec<(String, String, i64)>,
    cred_type_ids: HashMap<String, i64>,
    cred_ids: HashMap<String, i64>,
    project_ids: HashMap<String, i64>,
    inventory_ids: HashMap<String, i64>,
    jt_ids: HashMap<String, i64>,
    wfjt_ids: HashMap<String, i64>,
    report: PopulateReport,
}

impl<'a> Populator<'a> {
    pub fn new(client: &'a ControllerClient, options: PopulateOptions) -> Self {
        Self {
            client,
            options,
            org_ids: HashMap::new(),
            team_ids: Vec::new(),
            cred_type_ids: HashMap::new(),
            cred_ids: HashMap::new(),
            project_ids: HashMap::new(),
            inventory_ids: HashMap::new(),
            jt_ids: HashMap::new(),
            wfjt_ids: HashMap::new(),
            report: PopulateReport::default(),
        }
    }

    pub async fn run(mut self, manifest: &Manifest) -> Result<PopulateReport> {
        manifest.validate()?;

        self.create_organizations(manifest).await?;
        self.create_teams(manifest).await?;
        self.create_users(manifest).await?;
        self.create_credential_types(&manifest.credential_types).await?;
        self.create_credentials(manifest).await?;
        self.create_projects(manifest).await?;
        self.create_inventories(&manifest.inventories).await?;
        self.create_job_templates(&manifest.job_templates).await?;
        self.create_workflow_job_templates(&manifest.workflow_job_templates)
            .await?;
        self.assign_team_roles(&manifest.team_roles).await?;

        Ok(self.report)
    }

    /// Reuse the first object matching `query`, or create it from `payload`
    async fn ensure(&self, endpoint: &str, query: &[(&str, &str)], payload: &Value) -> Result<i64> {
        if let Some(existing) = self.client.find_one(endpoint, query).await? {
            let id = object_id(&existing, endpoint)?;
            tracing::info!(endpoint, id, "already exists");
            return Ok(id);
        }
        let created = self.client.post(endpoint, payload).await?;
        let id = object_id(&created, endpoint)?;
        tracing::debug!(endpoint, id, "created");
        Ok(id)
    }

    async fn associate_quietly(&self, endpoint: &str, id: i64) -> Result<bool> {
        match self.client.associate(endpoint, id).await {
            Ok(()) => Ok(true),
            Err(AapError::Http { status, message }) => {
                tracing::debug!(endpoint, id, status, %message, "association already present");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_organizations(&mut self, manifest: &Manifest) -> Result<()> {
        step(1, "Creating organizations");
        for org in &manifest.organizations {
            tracing::info!(name = %org.name, "organization");
            let payload = json!({ "name": org.name, "description": org.description });
            let id = self
                .ensure("organizations/", &[("name", org.name.as_str())], &payload)
                .await?;
            self.org_ids.insert(org.name.clone(), id);
        }
        self.report.set("organizations", manifest.organizations.len());
        Ok(())
    }

    async fn create_teams(&mut self, manifest: &Manifest) -> Result<()> {
        step(2, "Creating teams");
        for team in &manifest.teams {
            tracing::info!(name = %team.name, organization = %team.organization, "team");
            let org_id = lookup(&self.org_ids, &team.organization, "organization")?;
            let org = org_id.to_string();
            let payload = json!({
                "name": team.name,
                "description": team.description,
                "organization": org_id,
            });
            let id = self
                .ensure("teams/", &[("name", team.name.as_str()), ("organization", org.as_str())], &payload)
                .await?;
            self.team_ids
                .push((team.organization.clone(), team.name.clone(), id));
        }
        self.report.set("teams", manifest.teams.len());
        Ok(())
    }

    async fn create_users(&mut self, manifest: &Manifest) -> Result<()> {
        step(3, "Creating users");
        for user in &manifest.users {
            tracing::info!(
                username = %user.username,
                name = %format!("{} {}", user.first_name, user.last_name),
                organization = %user.organization,
                "user"
            );
            let payload = json!({
                "username": user.username,
                "first_name": user.first_name,
                "last_name": user.last_name,
                "email": user.email,
                "password": user.password,
                "is_superuser": user.is_superuser,
            });
            let user_id = self
                .ensure("users/", &[("username", user.username.as_str())], &payload)
                .await?;

            let org_id = lookup(&self.org_ids, &user.organization, "organization")?;
            self.associate_quietly(&format!("organizations/{org_id}/users/"), user_id)
                .await?;

            for team in &user.teams {
                if let Some(team_id) = self.find_team(Some(user.organization.as_str()), team) {
                    self.associate_quietly(&format!("teams/{team_id}/users/"), user_id)
                        .await?;
                }
            }
        }
        self.report.set("users", manifest.users.len());
        Ok(())
    }

    async fn create_credential_types(&mut self, types: &[CredentialType]) -> Result<()> {
        step(4, "Creating custom credential types");
        for ct in types {
            tracing::info!(name = %ct.name, kind = %ct.kind, "credential type");
            let payload = json!({
                "name": ct.name,
                "description": ct.description,
                "kind": ct.kind,
                "inputs": non_null(&ct.inputs),
                "injectors": non_null(&ct.injectors),
            });
            let id = self
                .ensure("credential_types/", &[("name", ct.name.as_str())], &payload)
                .await?;
            self.cred_type_ids.insert(ct.name.clone(), id);
        }
        self.report.set("credential_types", types.len());
        Ok(())
    }

    /// Custom types first, then the Controller's built-in types by name
    async fn resolve_credential_type(&mut self, name: &str) -> Result<i64> {
        if let Some(id) = self.cred_type_ids.get(name) {
            return Ok(*id);
        }
        let found = self
            .client
            .find_one("credential_types/", &[("name", name)])
            .await?
            .ok_or_else(|| AapError::not_found("credential type", name))?;
        let id = object_id(&found, "credential_types/")?;
        self.cred_type_ids.insert(name.to_string(), id);
        Ok(id)
    }

    async fn create_credentials(&mut self, manifest: &Manifest) -> Result<()> {
        step(5, "Creating credentials");
        for cred in &manifest.credentials {
            tracing::info!(
                name = %cred.name,
                credential_type = %cred.credential_type,
                organization = %cred.organization,
                "credential"
            );
            let type_id = self.resolve_credential_type(&cred.credential_type).await?;
            let payload = json!({
                "name": cred.name,
                "description": cred.description,
                "organization": lookup(&self.org_ids, &cred.organization, "organization")?,
                "credential_type": type_id,
                "inputs": cred.inputs,
            });
            let id = self
                .ensure("credentials/", &[("name", cred.name.as_str())], &payload)
                .await?;
            self.cred_ids.insert(cred.name.clone(), id);
        }
        self.report.set("credentials", manifest.credentials.len());
        Ok(())
    }

    async fn create_projects(&mut self, manifest: &Manifest) -> Result<()> {
        step(6, "Creating projects");
        for project in &manifest.projects {
            tracing::info!(name = %project.name, organization = %project.organization, "project");
            let mut payload = json!({
                "name": project.name,
                "description": project.description,
                "organization": lookup(&self.org_ids, &project.organization, "organization")?,
                "scm_type": project.scm_type,
                "scm_url": project.scm_url,
                "scm_branch": project.scm_branch,
                "scm_update_on_launch": project.scm_update_on_launch,
            });
            if let Some(cred) = &project.credential {
                payload["credential"] = json!(lookup(&self.cred_ids, cred, "credential")?);
            }
            let id = self
                .ensure("projects/", &[("name", project.name.as_str())], &payload)
                .await?;
            self.project_ids.insert(project.name.clone(), id);
        }
        self.report.set("projects", manifest.projects.len());

        self.wait_for_project_syncs().await
    }

    /// Playbook lists are only available once a project has synced
    async fn wait_for_project_syncs(&mut self) -> Result<()> {
        if self.project_ids.is_empty() || self.options.sync_timeout.is_zero() {
            return Ok(());
        }
        tracing::info!(
            timeout_secs = self.options.sync_timeout.as_secs(),
            "waiting for project sync"
        );
        let deadline = Instant::now() + self.options.sync_timeout;
        let mut pending: Vec<(String, i64)> = self
            .project_ids
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        pending.sort();

        while !pending.is_empty() && Instant::now() < deadline {
            let mut still_pending = Vec::new();
            for (name, id) in pending {
                let project = self.client.get(&format!("projects/{id}/"), &[]).await?;
                let status = project
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                if SYNC_IN_PROGRESS.contains(&status) {
                    still_pending.push((name, id));
                } else if status == "successful" {
                    tracing::info!(project = %name, "project synced");
                } else {
                    tracing::warn!(project = %name, status, "project sync did not succeed");
                }
            }
            pending = still_pending;
            if !pending.is_empty() {
                sleep(self.options.poll_interval).await;
            }
        }

        if !pending.is_empty() {
            tracing::warn!(
                count = pending.len(),
                timeout_secs = self.options.sync_timeout.as_secs(),
                "projects did not finish syncing in time"
            );
            self.report.unsynced_projects = pending.into_iter().map(|(name, _)| name).collect();
        }
        Ok(())
    }

    async fn create_inventories(&mut self, inventories: &[Inventory]) -> Result<()> {
        step(7, "Creating inventories");
        for inv in inventories {
            tracing::info!(name = %inv.name, organization = %inv.organization, "inventory");
            let mut payload = json!({
                "name": inv.name,
                "description": inv.description,
                "organization": lookup(&self.org_ids, &inv.organization, "organization")?,
            });
            if let Some(vars) = encoded_variables(&inv.variables)? {
                payload["variables"] = json!(vars);
            }
            let inv_id = self
                .ensure("inventories/", &[("name", inv.name.as_str())], &payload)
                .await?;
            self.inventory_ids.insert(inv.name.clone(), inv_id);

            let mut host_ids = HashMap::new();
            for host in &inv.hosts {
                let id = self.create_host(inv_id, host).await?;
                host_ids.insert(host.name.as_str(), id);
            }
            for group in &inv.groups {
                self.create_group(inv_id, group, &host_ids).await?;
            }
        }
        self.report.set("inventories", inventories.len());
        Ok(())
    }

    async fn create_host(&mut self, inv_id: i64, host: &Host) -> Result<i64> {
        tracing::info!(host = %host.name, "inventory host");
        let mut payload = json!({ "name": host.name });
        if let Some(vars) = encoded_variables(&host.variables)? {
            payload["variables"] = json!(vars);
        }
        let id = self
            .ensure(
                &format!("inventories/{inv_id}/hosts/"),
                &[("name", host.name.as_str())],
                &payload,
            )
            .await?;
        self.report.bump("hosts");
        Ok(id)
    }

    async fn create_group(
        &mut self,
        inv_id: i64,
        group: &Group,
        host_ids: &HashMap<&str, i64>,
    ) -> Result<()> {
        tracing::info!(group = %group.name, "inventory group");
        let mut payload = json!({ "name": group.name, "description": group.description });
        if let Some(vars) = encoded_variables(&group.variables)? {
            payload["variables"] = json!(vars);
        }
        let group_id = self
            .ensure(
                &format!("inventories/{inv_id}/groups/"),
                &[("name", group.name.as_str())],
                &payload,
            )
            .await?;
        self.report.bump("groups");

        for host in &group.hosts {
            if let Some(host_id) = host_ids.get(host.as_str()) {
                self.associate_quietly(&format!("groups/{group_id}/hosts/"), *host_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_job_templates(&mut self, templates: &[JobTemplate]) -> Result<()> {
        step(8, "Creating job templates");
        for jt in templates {
            tracing::info!(name = %jt.name, playbook = %jt.playbook, "job template");
            let mut payload = json!({
                "name": jt.name,
                "description": jt.description,
                "job_type": "run",
                "project": lookup(&self.project_ids, &jt.project, "project")?,
                "inventory": lookup(&self.inventory_ids, &jt.inventory, "inventory")?,
                "playbook": jt.playbook,
                "verbosity": jt.verbosity,
                "ask_variables_on_launch": jt.ask_variables_on_launch,
            });
            if let Some(vars) = encoded_variables(&jt.extra_vars)? {
                payload["extra_vars"] = json!(vars);
            }
            if let Some(limit) = jt.limit.as_deref().filter(|s| !s.is_empty()) {
                payload["limit"] = json!(limit);
            }
            if let Some(tags) = jt.job_tags.as_deref().filter(|s| !s.is_empty()) {
                payload["job_tags"] = json!(tags);
            }
            let jt_id = self
                .ensure("job_templates/", &[("name", jt.name.as_str())], &payload)
                .await?;
            self.jt_ids.insert(jt.name.clone(), jt_id);

            for cred in &jt.credentials {
                if let Some(cred_id) = self.cred_ids.get(cred) {
                    self.associate_quietly(&format!("job_templates/{jt_id}/credentials/"), *cred_id)
                        .await?;
                }
            }
        }
        self.report.set("job_templates", templates.len());
        Ok(())
    }

    async fn create_workflow_job_templates(
        &mut self,
        workflows: &[WorkflowJobTemplate],
    ) -> Result<()> {
        step(9, "Creating workflow job templates");
        for wf in workflows {
            tracing::info!(name = %wf.name, "workflow job template");
            let payload = json!({
                "name": wf.name,
                "description": wf.description,
                "organization": lookup(&self.org_ids, &wf.organization, "organization")?,
            });
            let wfjt_id = self
                .ensure("workflow_job_templates/", &[("name", wf.name.as_str())], &payload)
                .await?;
            self.wfjt_ids.insert(wf.name.clone(), wfjt_id);
            self.create_workflow_nodes(wfjt_id, wf).await?;
        }
        self.report
            .set("workflow_job_templates", workflows.len());
        Ok(())
    }

    async fn create_workflow_nodes(&mut self, wfjt_id: i64, wf: &WorkflowJobTemplate) -> Result<()> {
        let nodes_endpoint = format!("workflow_job_templates/{wfjt_id}/workflow_nodes/");
        let existing = self.client.list_all(&nodes_endpoint, &[]).await?;
        let mut claimed: HashSet<i64> = HashSet::new();
        let mut node_ids: HashMap<&str, i64> = HashMap::new();

        for node in &wf.nodes {
            let Some(jt_id) = self.jt_ids.get(&node.job_template).copied() else {
                tracing::warn!(
                    node = %node.identifier,
                    job_template = %node.job_template,
                    "job template not found, skipping node"
                );
                continue;
            };

            // A re-run reuses the node already pointing at the same template
            let reused = existing.iter().find_map(|n| {
                let id = n.get("id").and_then(|v| v.as_i64())?;
                let ujt = n.get("unified_job_template").and_then(|v| v.as_i64())?;
                (ujt == jt_id && !claimed.contains(&id)).then_some(id)
            });
            let node_id = match reused {
                Some(id) => {
                    tracing::info!(node = %node.identifier, id, "workflow node already exists");
                    id
                }
                None => {
                    tracing::info!(node = %node.identifier, job_template = %node.job_template, "workflow node");
                    let created = self
                        .client
                        .post(&nodes_endpoint, &json!({ "unified_job_template": jt_id }))
                        .await?;
                    object_id(&created, &nodes_endpoint)?
                }
            };
            claimed.insert(node_id);
            node_ids.insert(node.identifier.as_str(), node_id);
        }

        for node in &wf.nodes {
            let Some(source) = node_ids.get(node.identifier.as_str()) else {
                continue;
            };
            for (relation, targets) in node.edges() {
                for target in targets {
                    if let Some(target_id) = node_ids.get(target.as_str()) {
                        self.associate_quietly(
                            &format!("workflow_job_template_nodes/{source}/{relation}/"),
                            *target_id,
                        )
                        .await?;
                    }
                }
            }
        }
        Ok(())
    }

    fn object_ids(&self, object_type: RoleObjectType) -> &HashMap<String, i64> {
        match object_type {
            RoleObjectType::JobTemplates => &self.jt_ids,
            RoleObjectType::WorkflowJobTemplates => &self.wfjt_ids,
            RoleObjectType::Inventories => &self.inventory_ids,
            RoleObjectType::Credentials => &self.cred_ids,
            RoleObjectType::Projects => &self.project_ids,
        }
    }

    /// Without an organization the first team of that name in the manifest wins
    fn find_team(&self, organization: Option<&str>, team: &str) -> Option<i64> {
        self.team_ids
            .iter()
            .find(|(org, name, _)| name == team && organization.is_none_or(|o| o == org.as_str()))
            .map(|(_, _, id)| *id)
    }

    async fn assign_team_roles(&mut self, roles: &[TeamRole]) -> Result<()> {
        step(10, "Assigning team roles");
        let mut assigned = 0;
        for role in roles {
            let endpoint = role.object_type.endpoint();
            let Some(obj_id) = self.object_ids(role.object_type).get(&role.object_name).copied()
            else {
                tracing::warn!(object_type = endpoint, object = %role.object_name, "object not found, skipping role");
                continue;
            };
            let Some(team_id) = self.find_team(role.organization.as_deref(), &role.team) else {
                tracing::warn!(team = %role.team, "team not found, skipping role");
                continue;
            };

            let detail = self.client.get(&format!("{endpoint}{obj_id}/"), &[]).await?;
            let Some(role_info) = detail
                .pointer(&format!("/summary_fields/object_roles/{}", role.role_field))
            else {
                tracing::warn!(
                    role = %role.role_field,
                    object = %role.object_name,
                    "role not offered by object, skipping"
                );
                continue;
            };
            let role_id = object_id(role_info, &role.role_field)?;
            let label = role_info
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(&role.role_field);
            tracing::info!(team = %role.team, role = label, object = %role.object_name, "team role");

            if self
                .associate_quietly(&format!("roles/{role_id}/teams/"), team_id)
                .await?
            {
                assigned += 1;
            }
        }
        self.report.set("role_assignments", assigned);
        Ok(())
    }
}

fn step(n: usize, label: &str) {
    tracing::info!("[{n}/{STEPS}] {label}");
}

fn lookup(ids: &HashMap<String, i64>, name: &str, kind: &'static str) -> Result<i64> {
    ids.get(name)
        .copied()
        .ok_or_else(|| AapError::not_found(kind, name))
}

/// The Controller takes `variables` and `extra_vars` as JSON text
fn encoded_variables(vars: &Option<Value>) -> Result<Option<String>> {
    match vars {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
    }
}

fn non_null(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value.clone()
    }
}
