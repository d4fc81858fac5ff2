//! kubectl-login - OIDC login into per-cluster kubeconfigs
//!
//! Resolves a cluster alias, runs the OIDC login for that cluster and writes
//! the credentials into a copy of the active kubeconfig dedicated to it.

mod cli;
mod commands;
mod config;
mod error;
mod kubeconfig;
mod kubectl;
mod oidc;
mod state;
mod terminal;
mod token;

use crate::cli::{Cli, Command};
use crate::commands::login::{LoginOutcome, LoginRequest};
use crate::config::ProfileStore;
use crate::error::{LoginError, Result};
use crate::kubectl::Kubectl;
use crate::oidc::HttpConnector;
use crate::state::LoginEnv;
use crate::terminal::TerminalInput;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Timeout for requests to the identity provider
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize tracing subscriber based on verbosity level
fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let env = LoginEnv::from_env();

    match cli.command {
        Some(Command::List { json }) => {
            let store = load_profiles(&env, cli.config.as_deref())?;
            commands::profiles::list(&store, json)?;
        }
        Some(Command::Completions { ref shell }) => generate_completions(shell)?,
        Some(Command::ShellInit { ref shell }) => commands::shell::run(shell)?,
        None => match login(&cli, &env) {
            // Ctrl-C at the token prompt exits like a shell-interrupted command
            Err(LoginError::Interrupted) => std::process::exit(130),
            other => other?,
        },
    }
    Ok(())
}

fn load_profiles(env: &LoginEnv, override_path: Option<&Path>) -> Result<ProfileStore> {
    ProfileStore::load(&config::profiles_path(env, override_path)?)
}

fn login(cli: &Cli, env: &LoginEnv) -> Result<()> {
    let store = load_profiles(env, cli.config.as_deref())?;
    let alias = match cli.alias {
        Some(ref a) => a.clone(),
        None => commands::profiles::pick_alias(&store)?,
    };
    let active = match cli.kubeconfig {
        Some(ref p) => p.clone(),
        None => env.active_kubeconfig()?,
    };

    let kubectl = Kubectl::detect(Duration::from_secs(cli.request_timeout))?;
    let connector = HttpConnector::new(HTTP_TIMEOUT)?;
    let mut input = TerminalInput::detect();

    let request = LoginRequest {
        alias: &alias,
        active_kubeconfig: &active,
        open_browser: !cli.no_browser,
    };
    let outcome = commands::login::run(&request, env, &store, &kubectl, &connector, &mut input)?;

    let cluster = outcome.cluster().bold();
    match outcome {
        LoginOutcome::AlreadyAuthenticated { .. } => {
            eprintln!("{} {}", "Already logged in to cluster".green(), cluster);
        }
        LoginOutcome::LoggedIn { mode, .. } => {
            eprintln!(
                "{} {} {}",
                "Logged in to cluster".green(),
                cluster,
                format!("({})", mode).dimmed()
            );
            eprintln!(
                "\n  Try:\n    {}\n    {}",
                "kubectl config get-contexts".bright_white(),
                "kubectl get pods".bright_white()
            );
        }
    }

    // the only line on stdout, picked up by the shell-init wrapper
    println!("{}", outcome.kubeconfig().display());
    Ok(())
}

fn generate_completions(shell: &str) -> Result<()> {
    let shell: Shell = shell.parse().map_err(|_| {
        LoginError::Other(format!(
            "unsupported shell '{}'. Supported: bash, zsh, fish, elvish, powershell",
            shell
        ))
    })?;
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kubectl-login", &mut io::stdout());
    Ok(())
}
