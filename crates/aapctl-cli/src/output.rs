use std::collections::BTreeMap;

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Table => print_as_table(value)?,
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn print_as_table(value: &Value) -> Result<()> {
    let Some(objects) = value.as_array() else {
        println!("{}", serde_json::to_string_pretty(value)?);
        return Ok(());
    };
    if objects.is_empty() {
        println!("No objects found.");
        return Ok(());
    }
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Organization", "Description"]);
    for obj in objects {
        let id = obj
            .get("id")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let name = obj
            .get("name")
            .or_else(|| obj.get("username"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let org = obj
            .pointer("/summary_fields/organization/name")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let description = obj
            .get("description")
            .and_then(|v| v.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or("-");
        builder.push_record([id.as_str(), name, org, description]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("Total: {}", objects.len());
    Ok(())
}

/// Two-column summary such as per-kind counts
pub fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("{}", title.cyan().bold());
    let mut builder = Builder::default();
    builder.push_record(["Asset", "Count"]);
    for (kind, count) in counts {
        builder.push_record([title_case(kind), count.to_string()]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

/// `workflow_job_templates` -> `Workflow Job Templates`
fn title_case(kind: &str) -> String {
    kind.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
