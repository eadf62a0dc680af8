use std::path::PathBuf;

use aapctl_core::Manifest;
use anyhow::{Context, Result};

use crate::config::ProfileConfig;
use crate::output::{print_counts, print_success};

/// `--manifest`, then the profile's `manifest` key, then the built-in sample
pub fn load(cli_path: Option<&PathBuf>, profile: &ProfileConfig, env: &str) -> Result<Manifest> {
    let configured = profile.manifest.as_ref().map(PathBuf::from);
    let Some(path) = cli_path.cloned().or(configured) else {
        tracing::info!("no manifest given, using the built-in sample");
        return Manifest::sample().context("Built-in sample manifest is invalid");
    };
    let path = Manifest::resolve_path(&path, env)?;
    tracing::info!(path = %path.display(), env, "loading manifest");
    Manifest::from_path(&path).with_context(|| format!("Failed to load manifest {}", path.display()))
}

pub fn sample() {
    print!("{}", Manifest::sample_yaml());
}

pub fn validate(manifest: &Manifest) -> Result<()> {
    manifest.validate()?;
    let counts = manifest
        .counts()
        .into_iter()
        .map(|(kind, n)| (kind.to_string(), n))
        .collect();
    print_counts("Manifest", &counts);
    print_success("Manifest is valid");
    Ok(())
}
