use aapctl_core::ControllerClient;
use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

use crate::cli::{ObjectKind, OutputFormat};
use crate::output::print_value;

pub async fn ping(client: &ControllerClient) -> Result<()> {
    let info = client.ping().await?;
    let version = info
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    println!(
        "{} {} is {} (version {})",
        "✓".green(),
        client.api_base().cyan(),
        "reachable".green(),
        version
    );
    if let Some(node) = info.get("active_node").and_then(|v| v.as_str()) {
        println!("  active node: {node}");
    }
    if client.has_auth() {
        let me = client.me().await?;
        let username = me.get("username").and_then(|v| v.as_str()).unwrap_or("?");
        println!("  authenticated as: {}", username.cyan());
    }
    Ok(())
}

pub async fn list(
    client: &ControllerClient,
    kind: ObjectKind,
    raw_filters: &[String],
    format: OutputFormat,
) -> Result<()> {
    let filters = parse_filters(raw_filters)?;
    let query: Vec<(&str, &str)> = filters
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let objects = client.list_all(kind.endpoint(), &query).await?;
    print_value(&Value::Array(objects), format)
}

fn parse_filters(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|p| match p.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => anyhow::bail!("Invalid filter \"{p}\". Expected format: key=value"),
        })
        .collect()
}
