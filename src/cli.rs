//! Command line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kubectl-login",
    version,
    about = "Log in to a Kubernetes cluster through OIDC with an isolated kubeconfig per cluster",
    long_about = "kubectl-login resolves a cluster alias, runs the OIDC login for that cluster and \
                  writes the credentials into a per-cluster copy of your kubeconfig.\n\n\
                  The path of that copy is the only line printed on stdout, so a shell \
                  wrapper can export it as KUBECONFIG (see 'kubectl-login shell-init').\n\n\
                  Examples:\n  \
                  kubectl-login dev           # Log in to the cluster aliased 'dev'\n  \
                  kubectl-login               # Pick a cluster interactively\n  \
                  kubectl-login list          # Show configured clusters and aliases\n  \
                  eval \"$(kubectl-login shell-init bash)\"",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Cluster alias to log in to (prompted for when omitted)
    #[arg(value_name = "ALIAS")]
    pub alias: Option<String>,

    /// Override the active kubeconfig path (defaults to $KUBECONFIG or ~/.kube/config)
    #[arg(long, value_name = "PATH", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Cluster profile file (defaults to $KUBECTL_LOGIN_CONFIG or ~/.kubectl-login.json)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Timeout in seconds for the session liveness check
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub request_timeout: u64,

    /// Enable verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured clusters and their aliases
    #[command(visible_alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell: bash, zsh, fish, elvish, powershell
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Print a shell function that exports KUBECONFIG after login
    #[command(after_help = "Examples:\n  \
        eval \"$(kubectl-login shell-init bash)\"\n  \
        eval \"$(kubectl-login shell-init zsh)\"\n  \
        kubectl-login shell-init fish | source")]
    ShellInit {
        /// Shell: bash, zsh, fish
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}
