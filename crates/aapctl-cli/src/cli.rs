use std::path::PathBuf;

use aapctl_core::ApiFlavor;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "aapctl")]
#[command(about = "aapctl: apply, export and clean Ansible Automation Platform assets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Controller base URL (overrides config and AAP_HOST env var)
    #[arg(long, global = true, env = "AAP_HOST")]
    pub host: Option<String>,

    /// Environment to run against; selects the config profile and variable file
    #[arg(short, long, global = true, env = "AAP_ENV", default_value = "dev")]
    pub env: String,

    /// API layout of the Controller
    #[arg(long, global = true)]
    pub flavor: Option<Flavor>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Username for Basic Auth
    #[arg(short, long, global = true, env = "AAP_USERNAME")]
    pub username: Option<String>,

    /// Password for Basic Auth
    #[arg(long, global = true, env = "AAP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// OAuth2 / personal access token (takes precedence over username and password)
    #[arg(long, global = true, env = "AAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Table,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq, Debug)]
pub enum Flavor {
    /// AWX / standalone Controller (`/api/v2`)
    Awx,
    /// AAP 2.5+ platform gateway (`/api/controller/v2`)
    Gateway,
}

impl From<Flavor> for ApiFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Awx => ApiFlavor::Awx,
            Flavor::Gateway => ApiFlavor::Gateway,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store credentials for the selected environment
    Login,
    /// Logout (remove stored credentials)
    Logout,
    /// Show current auth info
    Whoami,
    /// Check that the Controller is reachable and accepts the credentials
    Ping,
    /// List objects of one kind
    List(ListArgs),
    /// Create every object of a manifest that does not exist yet
    Populate(PopulateArgs),
    /// Delete the objects a manifest names
    Cleanup(CleanupArgs),
    /// Delete every non-default object on the Controller
    Purge(PurgeArgs),
    /// Export workflows and their dependencies as JSON files
    Download(DownloadArgs),
    /// Inspect manifests
    Manifest(ManifestArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    Organizations,
    Teams,
    Users,
    CredentialTypes,
    Credentials,
    Projects,
    Inventories,
    JobTemplates,
    WorkflowJobTemplates,
    ExecutionEnvironments,
}

impl ObjectKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Organizations => "organizations/",
            Self::Teams => "teams/",
            Self::Users => "users/",
            Self::CredentialTypes => "credential_types/",
            Self::Credentials => "credentials/",
            Self::Projects => "projects/",
            Self::Inventories => "inventories/",
            Self::JobTemplates => "job_templates/",
            Self::WorkflowJobTemplates => "workflow_job_templates/",
            Self::ExecutionEnvironments => "execution_environments/",
        }
    }
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Kind of object
    pub kind: ObjectKind,
    /// Filters as key=value pairs (e.g. name=DevOps organization__name=Acme)
    pub filters: Vec<String>,
}

#[derive(clap::Args)]
pub struct ManifestSource {
    /// Manifest file, or a directory holding one `<env>.yml` per environment
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct PopulateArgs {
    #[command(flatten)]
    pub source: ManifestSource,
    /// Seconds to wait for project syncs (0 disables the wait)
    #[arg(long, default_value_t = 120)]
    pub sync_timeout: u64,
}

#[derive(clap::Args)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub source: ManifestSource,
    /// Report what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct PurgeArgs {
    /// Report what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
    /// Confirm deleting every non-default object
    #[arg(long)]
    pub yes: bool,
}

#[derive(clap::Args)]
pub struct DownloadArgs {
    /// Output directory
    #[arg(short, long, default_value = "aap_assets")]
    pub output: PathBuf,
}

#[derive(clap::Args)]
pub struct ManifestArgs {
    #[command(subcommand)]
    pub command: ManifestCommands,
}

#[derive(Subcommand)]
pub enum ManifestCommands {
    /// Print the built-in sample manifest
    Sample,
    /// Check a manifest's cross references
    Validate(ManifestSource),
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (host, flavor, insecure, format, manifest)
    pub key: String,
    /// Value
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "aapctl", "cleanup", "--dry-run", "--env", "prod", "--flavor", "awx", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.env, "prod");
        assert_eq!(cli.flavor, Some(Flavor::Awx));
        assert_eq!(cli.verbose, 2);
        let Commands::Cleanup(args) = cli.command else {
            panic!("expected cleanup");
        };
        assert!(args.dry_run);
        assert!(args.source.manifest.is_none());
    }

    #[test]
    fn list_kind_uses_kebab_case() {
        let cli = Cli::try_parse_from(["aapctl", "list", "job-templates", "name=Deploy"]).unwrap();
        let Commands::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.kind.endpoint(), "job_templates/");
        assert_eq!(args.filters, vec!["name=Deploy".to_string()]);
    }
}
