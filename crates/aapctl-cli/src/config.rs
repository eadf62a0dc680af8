use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aapctl_core::ApiFlavor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::OutputFormat;

/// Settings of one environment (`[dev]`, `[prod]`, ...) in config.toml
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ProfileConfig {
    pub host: Option<String>,
    pub flavor: Option<ApiFlavor>,
    pub insecure: Option<bool>,
    pub format: Option<String>,
    /// Manifest file or directory of per-environment files
    pub manifest: Option<String>,
}

impl ProfileConfig {
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self.format.as_deref() {
            Some("json") => Some(OutputFormat::Json),
            Some("yaml") => Some(OutputFormat::Yaml),
            Some("table") => Some(OutputFormat::Table),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "host" => self.host = Some(value.trim_end_matches('/').to_string()),
            "flavor" => {
                let flavor = match value {
                    "awx" => ApiFlavor::Awx,
                    "gateway" => ApiFlavor::Gateway,
                    other => anyhow::bail!("Unknown flavor: {other}. Valid values: awx, gateway"),
                };
                self.flavor = Some(flavor);
            }
            "insecure" => {
                let insecure = value
                    .parse::<bool>()
                    .with_context(|| format!("insecure must be true or false, got {value}"))?;
                self.insecure = Some(insecure);
            }
            "format" => {
                if !matches!(value, "json" | "yaml" | "table") {
                    anyhow::bail!("Unknown format: {value}. Valid values: json, yaml, table");
                }
                self.format = Some(value.to_string());
            }
            "manifest" => self.manifest = Some(value.to_string()),
            other => anyhow::bail!(
                "Unknown config key: {other}. Valid keys: host, flavor, insecure, format, manifest"
            ),
        }
        Ok(())
    }
}

pub type ConfigFile = BTreeMap<String, ProfileConfig>;

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".aapctl");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn save_to(path: &Path, all: &ConfigFile) -> Result<()> {
    let content = toml::to_string_pretty(all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(env: &str) -> Result<ProfileConfig> {
    let mut all = load_from(&config_path()?)?;
    Ok(all.remove(env).unwrap_or_default())
}

pub fn save_profile(env: &str, config: &ProfileConfig) -> Result<()> {
    let path = config_path()?;
    let mut all = load_from(&path)?;
    all.insert(env.to_string(), config.clone());
    save_to(&path, &all)
}

pub fn resolve_host(cli_host: &Option<String>, env: &str, profile: &ProfileConfig) -> Result<String> {
    // 1. --host flag / AAP_HOST env
    if let Some(h) = cli_host {
        return Ok(h.clone());
    }
    // 2. config.toml profile
    if let Some(h) = &profile.host {
        return Ok(h.clone());
    }
    // 3. Stored credentials for this environment
    if let Ok(Some(creds)) = crate::auth::load_credentials(env) {
        return Ok(creds.host().to_string());
    }
    anyhow::bail!(
        "No Controller URL configured for environment \"{env}\". Use --host, set AAP_HOST, or run: aapctl config set host <url> --env {env}"
    )
}
