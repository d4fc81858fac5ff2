//! The login sequence: alias to a per-cluster kubeconfig holding live credentials

use crate::config::{self, ProfileStore};
use crate::error::{LoginError, Result};
use crate::kubeconfig::{self, ConfigPath};
use crate::kubectl::{self, HostCli};
use crate::oidc::{OidcClient, ProviderConnector, AUTH_STATE};
use crate::state::LoginEnv;
use crate::terminal::SecretReader;
use crate::token;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prompt shown while waiting for the pasted login output
const TOKEN_PROMPT: &str = "Paste the token shown after login: ";

/// What the operator asked for
#[derive(Debug, Clone)]
pub struct LoginRequest<'a> {
    pub alias: &'a str,
    /// The kubeconfig currently in use (master or derived)
    pub active_kubeconfig: &'a Path,
    /// Hand the authorization URL to the system browser
    pub open_browser: bool,
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The derived kubeconfig already held a live session
    AlreadyAuthenticated { cluster: String, kubeconfig: PathBuf },
    /// Fresh credentials were written
    LoggedIn {
        cluster: String,
        kubeconfig: PathBuf,
        mode: &'static str,
    },
}

impl LoginOutcome {
    /// The derived kubeconfig to export as KUBECONFIG
    pub fn kubeconfig(&self) -> &Path {
        match self {
            LoginOutcome::AlreadyAuthenticated { kubeconfig, .. }
            | LoginOutcome::LoggedIn { kubeconfig, .. } => kubeconfig,
        }
    }

    pub fn cluster(&self) -> &str {
        match self {
            LoginOutcome::AlreadyAuthenticated { cluster, .. }
            | LoginOutcome::LoggedIn { cluster, .. } => cluster,
        }
    }
}

/// Run one login attempt. Nothing is retried; once credentials are being
/// written a later failure leaves the derived file as it is and re-running
/// is the way to recover.
pub fn run(
    request: &LoginRequest<'_>,
    env: &LoginEnv,
    profiles: &ProfileStore,
    cli: &dyn HostCli,
    connector: &dyn ProviderConnector,
    input: &mut dyn SecretReader,
) -> Result<LoginOutcome> {
    let resolved = profiles.resolve(request.alias)?;
    let cluster = resolved.cluster;
    let profile = resolved.profile;
    debug!(alias = request.alias, cluster, "Resolved alias");

    let active = ConfigPath::classify(request.active_kubeconfig)?;
    if active.is_derived() {
        debug!(
            active = %request.active_kubeconfig.display(),
            master = %active.master().display(),
            "Active kubeconfig is a derived one, using its master"
        );
    }
    let master = active.master();
    let derived = kubeconfig::derive_config_path(master, cluster);

    if kubectl::is_authenticated(cli, &derived, cluster) {
        info!(cluster, path = %derived.display(), "Session still valid");
        return Ok(LoginOutcome::AlreadyAuthenticated {
            cluster: cluster.to_string(),
            kubeconfig: derived,
        });
    }

    kubeconfig::materialize(master, &derived)?;

    let secret = config::resolve_secret(env, cluster, profile)?;

    let client = OidcClient {
        issuer: profile.issuer.clone(),
        redirect_url: profile.redirect_url.clone(),
    };
    let provider = connector.connect(&client)?;
    let auth_url = provider.authorization_url(AUTH_STATE)?;

    eprintln!(
        "{}\n  {}\n",
        "Open the following URL in your browser to log in:".bold(),
        auth_url.as_str().cyan()
    );
    if request.open_browser {
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("cannot open a browser: {}", e);
        }
    }

    let raw = input.read_secret(TOKEN_PROMPT)?;
    let tokens = token::extract(&raw);
    debug!(?tokens, "Captured login output");
    if tokens.id_token.is_empty() {
        return Err(LoginError::TokenInvalid("no ID token was entered".into()));
    }

    provider.verify(&tokens.id_token)?;

    let credential = tokens.into_credential(&secret, &profile.issuer);
    kubectl::inject_credential(cli, &derived, &credential)?;
    kubectl::switch_context(cli, &derived, cluster)?;

    // switch_context has already checked the binding; only the session is left
    if let Err(e) = cli.probe(&derived) {
        return Err(LoginError::PostLoginVerificationFailed {
            path: derived,
            reason: e.to_string(),
        });
    }

    Ok(LoginOutcome::LoggedIn {
        cluster: cluster.to_string(),
        kubeconfig: derived,
        mode: credential.mode(),
    })
}
