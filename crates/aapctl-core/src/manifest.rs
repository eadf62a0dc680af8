//! Declarative description of the Controller objects a run should create.
//!
//! A manifest is a YAML document with one list per object kind. Records refer
//! to each other by name; [`Manifest::validate`] checks those references
//! before anything is sent to the Controller.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AapError, Result};

const SAMPLE_MANIFEST: &str = include_str!("../assets/migrateme.yml");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub organizations: Vec<Organization>,
    pub teams: Vec<Team>,
    pub users: Vec<User>,
    pub credential_types: Vec<CredentialType>,
    pub credentials: Vec<Credential>,
    pub projects: Vec<Project>,
    pub inventories: Vec<Inventory>,
    pub job_templates: Vec<JobTemplate>,
    pub workflow_job_templates: Vec<WorkflowJobTemplate>,
    pub team_roles: Vec<TeamRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub organization: String,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Custom credential type; `inputs` and `injectors` are passed through verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: String,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub injectors: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: String,
    /// Name of a built-in type (Machine, Vault, ...) or of a custom type
    pub credential_type: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: String,
    #[serde(default = "default_scm_type")]
    pub scm_type: String,
    pub scm_url: String,
    #[serde(default = "default_scm_branch")]
    pub scm_branch: String,
    #[serde(default)]
    pub scm_update_on_launch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

fn default_scm_type() -> String {
    "git".to_string()
}

fn default_scm_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Names of hosts of the same inventory
    #[serde(default)]
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project: String,
    pub inventory: String,
    pub playbook: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default)]
    pub ask_variables_on_launch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_vars: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_tags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJobTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization: String,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Manifest-local key used by edges
    pub identifier: String,
    pub job_template: String,
    #[serde(default)]
    pub success_nodes: Vec<String>,
    #[serde(default)]
    pub failure_nodes: Vec<String>,
    #[serde(default)]
    pub always_nodes: Vec<String>,
}

impl WorkflowNode {
    /// Edges as `(relation endpoint, target identifiers)`
    pub fn edges(&self) -> [(&'static str, &[String]); 3] {
        [
            ("success_nodes", self.success_nodes.as_slice()),
            ("failure_nodes", self.failure_nodes.as_slice()),
            ("always_nodes", self.always_nodes.as_slice()),
        ]
    }
}

/// Objects a team role can be granted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleObjectType {
    JobTemplates,
    WorkflowJobTemplates,
    Inventories,
    Projects,
    Credentials,
}

impl RoleObjectType {
    /// API list endpoint, which is also the serialized name
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::JobTemplates => "job_templates/",
            Self::WorkflowJobTemplates => "workflow_job_templates/",
            Self::Inventories => "inventories/",
            Self::Projects => "projects/",
            Self::Credentials => "credentials/",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRole {
    pub team: String,
    /// Disambiguates teams with the same name in several organizations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub object_type: RoleObjectType,
    pub object_name: String,
    /// Key under `summary_fields.object_roles`, e.g. `execute_role`
    pub role_field: String,
}

impl Manifest {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Pick the variable file for an environment.
    ///
    /// A directory selects `<env>.yml` (or `<env>.yaml`) inside it; a file is
    /// used as given.
    pub fn resolve_path(path: &Path, env: &str) -> Result<PathBuf> {
        if !path.is_dir() {
            return Ok(path.to_path_buf());
        }
        for ext in ["yml", "yaml"] {
            let candidate = path.join(format!("{env}.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(AapError::not_found(
            "environment file",
            format!("{env}.yml in {}", path.display()),
        ))
    }

    /// Built-in MigrateMe sample data set
    pub fn sample() -> Result<Self> {
        Self::from_yaml_str(SAMPLE_MANIFEST)
    }

    pub fn sample_yaml() -> &'static str {
        SAMPLE_MANIFEST
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("organizations", self.organizations.len()),
            ("teams", self.teams.len()),
            ("users", self.users.len()),
            ("credential_types", self.credential_types.len()),
            ("credentials", self.credentials.len()),
            ("projects", self.projects.len()),
            ("inventories", self.inventories.len()),
            ("hosts", self.inventories.iter().map(|i| i.hosts.len()).sum()),
            ("groups", self.inventories.iter().map(|i| i.groups.len()).sum()),
            ("job_templates", self.job_templates.len()),
            ("workflow_job_templates", self.workflow_job_templates.len()),
            ("team_roles", self.team_roles.len()),
        ])
    }

    /// Check every cross reference, collecting all problems
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let orgs = unique_names(
            "organization",
            self.organizations.iter().map(|o| o.name.as_str()),
            &mut problems,
        );
        unique_names(
            "user",
            self.users.iter().map(|u| u.username.as_str()),
            &mut problems,
        );
        unique_names(
            "credential type",
            self.credential_types.iter().map(|c| c.name.as_str()),
            &mut problems,
        );
        let creds = unique_names(
            "credential",
            self.credentials.iter().map(|c| c.name.as_str()),
            &mut problems,
        );
        let projects = unique_names(
            "project",
            self.projects.iter().map(|p| p.name.as_str()),
            &mut problems,
        );
        let inventories = unique_names(
            "inventory",
            self.inventories.iter().map(|i| i.name.as_str()),
            &mut problems,
        );
        let job_templates = unique_names(
            "job template",
            self.job_templates.iter().map(|j| j.name.as_str()),
            &mut problems,
        );
        let workflows = unique_names(
            "workflow job template",
            self.workflow_job_templates.iter().map(|w| w.name.as_str()),
            &mut problems,
        );

        // Team names only need to be unique inside one organization
        let mut teams_by_org: HashMap<&str, HashSet<&str>> = HashMap::new();
        for team in &self.teams {
            check_ref(&orgs, &team.organization, "team", &team.name, "organization", &mut problems);
            if !teams_by_org
                .entry(team.organization.as_str())
                .or_default()
                .insert(team.name.as_str())
            {
                problems.push(format!(
                    "duplicate team '{}' in organization '{}'",
                    team.name, team.organization
                ));
            }
        }

        for user in &self.users {
            check_ref(&orgs, &user.organization, "user", &user.username, "organization", &mut problems);
            let org_teams = teams_by_org.get(user.organization.as_str());
            for team in &user.teams {
                if !org_teams.is_some_and(|t| t.contains(team.as_str())) {
                    problems.push(format!(
                        "user '{}': unknown team '{}' in organization '{}'",
                        user.username, team, user.organization
                    ));
                }
            }
        }

        for cred in &self.credentials {
            check_ref(&orgs, &cred.organization, "credential", &cred.name, "organization", &mut problems);
        }

        for project in &self.projects {
            check_ref(&orgs, &project.organization, "project", &project.name, "organization", &mut problems);
            if let Some(cred) = &project.credential {
                check_ref(&creds, cred, "project", &project.name, "credential", &mut problems);
            }
        }

        for inv in &self.inventories {
            check_ref(&orgs, &inv.organization, "inventory", &inv.name, "organization", &mut problems);
            let hosts: HashSet<&str> = inv.hosts.iter().map(|h| h.name.as_str()).collect();
            for group in &inv.groups {
                for host in &group.hosts {
                    if !hosts.contains(host.as_str()) {
                        problems.push(format!(
                            "inventory '{}' group '{}': unknown host '{}'",
                            inv.name, group.name, host
                        ));
                    }
                }
            }
        }

        for jt in &self.job_templates {
            check_ref(&projects, &jt.project, "job template", &jt.name, "project", &mut problems);
            check_ref(&inventories, &jt.inventory, "job template", &jt.name, "inventory", &mut problems);
            for cred in &jt.credentials {
                check_ref(&creds, cred, "job template", &jt.name, "credential", &mut problems);
            }
        }

        for wf in &self.workflow_job_templates {
            check_ref(&orgs, &wf.organization, "workflow job template", &wf.name, "organization", &mut problems);
            let ids: HashSet<&str> = wf.nodes.iter().map(|n| n.identifier.as_str()).collect();
            if ids.len() != wf.nodes.len() {
                problems.push(format!(
                    "workflow job template '{}': duplicate node identifiers",
                    wf.name
                ));
            }
            for node in &wf.nodes {
                check_ref(
                    &job_templates,
                    &node.job_template,
                    "workflow node",
                    &node.identifier,
                    "job template",
                    &mut problems,
                );
                for (_, targets) in node.edges() {
                    for target in targets {
                        if !ids.contains(target.as_str()) {
                            problems.push(format!(
                                "workflow job template '{}' node '{}': unknown target node '{}'",
                                wf.name, node.identifier, target
                            ));
                        }
                    }
                }
            }
        }

        for role in &self.team_roles {
            let team_known = match &role.organization {
                Some(org) => teams_by_org
                    .get(org.as_str())
                    .is_some_and(|t| t.contains(role.team.as_str())),
                None => teams_by_org.values().any(|t| t.contains(role.team.as_str())),
            };
            if !team_known {
                problems.push(format!("team role: unknown team '{}'", role.team));
            }
            let names = match role.object_type {
                RoleObjectType::JobTemplates => &job_templates,
                RoleObjectType::WorkflowJobTemplates => &workflows,
                RoleObjectType::Inventories => &inventories,
                RoleObjectType::Projects => &projects,
                RoleObjectType::Credentials => &creds,
            };
            if !names.contains(role.object_name.as_str()) {
                problems.push(format!(
                    "team role for '{}': unknown {} '{}'",
                    role.team,
                    role.object_type.endpoint().trim_end_matches('/'),
                    role.object_name
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AapError::InvalidManifest(problems))
        }
    }
}

fn unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
    problems: &mut Vec<String>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            problems.push(format!("duplicate {kind} '{name}'"));
        }
    }
    seen
}

fn check_ref(
    known: &HashSet<&str>,
    target: &str,
    kind: &str,
    name: &str,
    field: &str,
    problems: &mut Vec<String>,
) {
    if !known.contains(target) {
        problems.push(format!("{kind} '{name}': unknown {field} '{target}'"));
    }
}
