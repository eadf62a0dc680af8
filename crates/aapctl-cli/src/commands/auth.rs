use anyhow::{Context, Result};
use colored::Colorize;

use crate::auth::{self, StoredCredentials};
use crate::cli::Cli;
use crate::output::{print_error, print_success};

pub fn login(host: &str, cli: &Cli) -> Result<()> {
    let creds = if let Some(token) = &cli.token {
        StoredCredentials::Token {
            host: host.to_string(),
            token: token.clone(),
        }
    } else {
        let username = cli
            .username
            .as_deref()
            .context("--username (or --token) is required")?;
        let password = cli
            .password
            .as_deref()
            .context("--password is required")?;
        StoredCredentials::Basic {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    };
    auth::save_credentials(&cli.env, &creds)?;

    let who = match &creds {
        StoredCredentials::Basic { username, .. } => format!("user: {}", username.cyan()),
        StoredCredentials::Token { .. } => "token".to_string(),
    };
    print_success(&format!(
        "Saved credentials for {} ({who}, env: {})",
        host.cyan(),
        cli.env.cyan()
    ));
    println!("Run `aapctl ping --env {}` to verify them.", cli.env);
    Ok(())
}

pub fn logout(env: &str) -> Result<()> {
    if auth::remove_credentials(env)? {
        print_success("Logged out (credentials removed)");
    } else {
        println!("No credentials found for environment \"{env}\"");
    }
    Ok(())
}

pub fn whoami(env: &str) -> Result<()> {
    match auth::load_credentials(env)? {
        Some(creds) => {
            println!("{}: {}", "Environment".cyan(), env);
            println!("{}: {}", "Host".cyan(), creds.host().cyan());
            match &creds {
                StoredCredentials::Basic { username, .. } => {
                    println!("{}: Basic (user: {})", "Auth".cyan(), username);
                }
                StoredCredentials::Token { token, .. } => {
                    println!("{}: Token ({})", "Auth".cyan(), token_preview(token));
                }
            }
        }
        None => {
            print_error(&format!("Not logged in (environment: \"{env}\")"));
        }
    }
    Ok(())
}

fn token_preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "*".repeat(chars.len())
    }
}
