use std::path::Path;
use std::time::Duration;

use aapctl_core::{
    Cleaner, CleanupSummary, ControllerClient, Downloader, Manifest, PopulateOptions, Populator,
};
use anyhow::{Context, Result};
use colored::Colorize;

use crate::output::{print_counts, print_success, print_warning};

pub async fn populate(client: &ControllerClient, manifest: &Manifest, sync_timeout: u64) -> Result<()> {
    let options = PopulateOptions {
        sync_timeout: Duration::from_secs(sync_timeout),
        ..PopulateOptions::default()
    };
    let report = Populator::new(client, options)
        .run(manifest)
        .await
        .context("Populate failed")?;

    for project in &report.unsynced_projects {
        print_warning(&format!("Project {} had not finished syncing", project.cyan()));
    }
    print_counts("Populate Summary", &report.counts);
    print_success("Done");
    Ok(())
}

pub async fn cleanup(client: &ControllerClient, manifest: &Manifest, dry_run: bool) -> Result<()> {
    let summary = Cleaner::new(client, dry_run)
        .remove_manifest_assets(manifest)
        .await
        .context("Cleanup failed")?;
    print_summary(&summary);
    Ok(())
}

pub async fn purge(client: &ControllerClient, dry_run: bool, yes: bool) -> Result<()> {
    if !dry_run && !yes {
        anyhow::bail!(
            "purge deletes every non-default object on {}; re-run with --yes (or --dry-run to preview)",
            client.api_base()
        );
    }
    let summary = Cleaner::new(client, dry_run)
        .purge_non_default()
        .await
        .context("Purge failed")?;
    print_summary(&summary);
    Ok(())
}

pub async fn download(client: &ControllerClient, output: &Path) -> Result<()> {
    let report = Downloader::new(client, output)
        .run()
        .await
        .context("Download failed")?;
    print_counts("Download Summary", &report.counts);
    println!(
        "{}: {} ({} files)",
        "Output".cyan(),
        report.output_dir.display(),
        report.total_files
    );
    Ok(())
}

fn print_summary(summary: &CleanupSummary) {
    let title = if summary.dry_run {
        "Cleanup Summary (dry run)"
    } else {
        "Cleanup Summary"
    };
    let deleted_label = if summary.dry_run { "would_delete" } else { "deleted" };
    let counts = [
        (deleted_label.to_string(), summary.deleted),
        ("skipped".to_string(), summary.skipped),
        ("failed".to_string(), summary.failed),
    ]
    .into_iter()
    .collect();
    print_counts(title, &counts);
    if summary.failed > 0 {
        print_warning(&format!("{} object(s) could not be deleted", summary.failed));
    } else {
        print_success("Done");
    }
}
