//! Custom error types for kubectl-login

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kubectl-login operations
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("cannot read cluster profiles at {path}: {source}\n\n  Create it with one entry per cluster:\n    {{\"my-cluster\": {{\"issuer\": \"https://dex.example.com\", \"redirectUrl\": \"https://login.example.com/callback\", \"aliases\": [\"dev\"]}}}}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster profiles at {path}: {reason}")]
    ConfigMalformed { path: PathBuf, reason: String },

    #[error("alias '{0}' not found\n\n  Run 'kubectl-login list' to see configured aliases")]
    AliasNotFound(String),

    #[error("alias '{alias}' is claimed by both '{first}' and '{second}'\n\n  Aliases must be unique across clusters; edit your cluster profiles")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    #[error("an alias is required\n\n  Usage: kubectl-login <ALIAS>\n  Run 'kubectl-login list' to see configured aliases")]
    AliasMissing,

    #[error("no login secret for cluster '{0}'\n\n  Set KUBELOGIN or add \"loginSecret\" to the cluster profile")]
    SecretMissing(String),

    #[error("cannot initialize OIDC provider for issuer {issuer}: {reason}")]
    ProviderDiscoveryFailed { issuer: String, reason: String },

    #[error("token is invalid: {0}")]
    TokenInvalid(String),

    #[error("could not copy kubeconfig {from} to {to}: {reason}")]
    ConfigCopyFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("cannot set kubectl credentials: {0}")]
    CredentialInjectionFailed(String),

    #[error("cannot switch to the login context: {0}")]
    ContextSwitchFailed(String),

    #[error("login reported success but subsequent verification failed for {path}: {reason}\n\n  The kubeconfig may be half-updated; re-run kubectl-login to recover")]
    PostLoginVerificationFailed { path: PathBuf, reason: String },

    #[error("no kubeconfig found\n\n  Set KUBECONFIG or create ~/.kube/config")]
    NoKubeconfig,

    #[error("invalid kubeconfig path: '{0}'")]
    InvalidKubeconfigPath(String),

    #[error("neither 'kubectl' nor 'oc' found on PATH\n\n  Install kubectl:\n    https://kubernetes.io/docs/tasks/tools/")]
    NoK8sCli,

    #[error("cannot read token from terminal: {0}")]
    InputFailed(#[source] std::io::Error),

    #[error("interactive selection requires a TTY\n\n  Pass the alias directly:\n    kubectl-login <ALIAS>")]
    NoTty,

    #[error("selection cancelled")]
    Cancelled,

    #[error("interrupted")]
    Interrupted,

    #[error("cannot resolve home directory\n\n  HOME environment variable may not be set")]
    NoHomeDir,

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for LoginError {
    fn from(s: &str) -> Self {
        LoginError::Other(s.to_string())
    }
}

impl From<String> for LoginError {
    fn from(s: String) -> Self {
        LoginError::Other(s)
    }
}

/// Result type alias for kubectl-login operations
pub type Result<T> = std::result::Result<T, LoginError>;
