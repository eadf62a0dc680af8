mod auth;
mod cli;
mod commands;
mod config;
mod logging;
mod output;

use aapctl_core::{ClientConfig, ControllerClient};
use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use config::ProfileConfig;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let env = cli.env.as_str();
    let profile = config::load_profile(env)?;
    let format = cli
        .format
        .or_else(|| profile.output_format())
        .unwrap_or_default();

    match &cli.command {
        Commands::Login => {
            let host = config::resolve_host(&cli.host, env, &profile)?;
            commands::auth::login(&host, &cli)?;
        }
        Commands::Logout => {
            commands::auth::logout(env)?;
        }
        Commands::Whoami => {
            commands::auth::whoami(env)?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                println!("{}: {}", "Environment".cyan(), env);
                println!(
                    "{}: {}",
                    "Host".cyan(),
                    profile.host.as_deref().unwrap_or("(not set)")
                );
                let flavor = profile.flavor.unwrap_or_default();
                println!("{}: {:?} ({})", "Flavor".cyan(), flavor, flavor.prefix());
                println!(
                    "{}: {}",
                    "Insecure".cyan(),
                    profile.insecure.unwrap_or(false)
                );
                println!(
                    "{}: {}",
                    "Format".cyan(),
                    profile.format.as_deref().unwrap_or("json")
                );
                println!(
                    "{}: {}",
                    "Manifest".cyan(),
                    profile.manifest.as_deref().unwrap_or("(built-in sample)")
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = profile.clone();
                cfg.set(&set_args.key, &set_args.value)?;
                config::save_profile(env, &cfg)?;
                output::print_success(&format!(
                    "Set {} = {} (env: {env})",
                    set_args.key, set_args.value
                ));
            }
        },
        Commands::Ping => {
            let client = make_client(&cli, &profile)?;
            commands::server::ping(&client).await?;
        }
        Commands::List(args) => {
            let client = make_client(&cli, &profile)?;
            commands::server::list(&client, args.kind, &args.filters, format).await?;
        }
        Commands::Populate(args) => {
            let manifest =
                commands::manifest::load(args.source.manifest.as_ref(), &profile, env)?;
            let client = make_client(&cli, &profile)?;
            commands::server::ping(&client).await?;
            commands::assets::populate(&client, &manifest, args.sync_timeout).await?;
        }
        Commands::Cleanup(args) => {
            let manifest =
                commands::manifest::load(args.source.manifest.as_ref(), &profile, env)?;
            let client = make_client(&cli, &profile)?;
            commands::server::ping(&client).await?;
            commands::assets::cleanup(&client, &manifest, args.dry_run).await?;
        }
        Commands::Purge(args) => {
            let client = make_client(&cli, &profile)?;
            commands::server::ping(&client).await?;
            commands::assets::purge(&client, args.dry_run, args.yes).await?;
        }
        Commands::Download(args) => {
            let client = make_client(&cli, &profile)?;
            commands::assets::download(&client, &args.output).await?;
        }
        Commands::Manifest(args) => match &args.command {
            cli::ManifestCommands::Sample => commands::manifest::sample(),
            cli::ManifestCommands::Validate(source) => {
                let manifest = commands::manifest::load(source.manifest.as_ref(), &profile, env)?;
                commands::manifest::validate(&manifest)?;
            }
        },
    }

    Ok(())
}

fn make_client(cli: &Cli, profile: &ProfileConfig) -> Result<ControllerClient> {
    let host = config::resolve_host(&cli.host, &cli.env, profile)?;
    let flavor = cli
        .flavor
        .map(Into::into)
        .or(profile.flavor)
        .unwrap_or_default();
    let mut client_config = ClientConfig::new(host)
        .with_flavor(flavor)
        .with_insecure(cli.insecure || profile.insecure.unwrap_or(false));
    if let Some(auth) = auth::resolve_auth(cli)? {
        client_config = client_config.with_auth(auth);
    }
    Ok(ControllerClient::new(client_config)?)
}
