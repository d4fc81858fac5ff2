//! Host CLI (kubectl/oc) invocations against a derived kubeconfig

use crate::error::{LoginError, Result};
use crate::kubeconfig::{self, KubeConfig};
use crate::oidc::CLIENT_ID;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;
use tracing::{debug, info};

/// Context created in every derived kubeconfig
pub const LOGIN_CONTEXT: &str = "kubectl-login-context";
/// Namespace bound to [`LOGIN_CONTEXT`]
pub const LOGIN_NAMESPACE: &str = "default";

/// Auth-provider settings enabling refresh by the host CLI
#[derive(Clone, PartialEq, Eq)]
pub struct OidcCredential {
    pub client_secret: String,
    pub id_token: String,
    pub refresh_token: String,
    pub issuer_url: String,
}

/// Credential written to the fixed login user
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static bearer token
    Token(String),
    /// OIDC auth-provider entry
    Oidc(OidcCredential),
}

impl Credential {
    pub fn mode(&self) -> &'static str {
        match self {
            Credential::Token(_) => "token",
            Credential::Oidc(_) => "oidc",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Token(<redacted>)"),
            Credential::Oidc(c) => f
                .debug_struct("Oidc")
                .field("issuer_url", &c.issuer_url)
                .finish_non_exhaustive(),
        }
    }
}

/// The `kubectl config` subcommands kubectl-login relies on
pub trait HostCli {
    /// Privileged read-only query; `Ok` means the session is live
    fn probe(&self, kubeconfig: &Path) -> Result<()>;

    /// Replace the credentials of `user`
    fn set_credentials(&self, kubeconfig: &Path, user: &str, credential: &Credential)
        -> Result<()>;

    /// Create or overwrite a context binding
    fn set_context(
        &self,
        kubeconfig: &Path,
        context: &str,
        cluster: &str,
        user: &str,
        namespace: &str,
    ) -> Result<()>;

    /// Make `context` current
    fn use_context(&self, kubeconfig: &Path, context: &str) -> Result<()>;
}

/// Find the kubernetes CLI (prefers kubectl over oc)
pub fn find_k8s_cli() -> Result<PathBuf> {
    which::which("kubectl")
        .or_else(|_| which::which("oc"))
        .map_err(|_| LoginError::NoK8sCli)
}

/// [`HostCli`] backed by a kubectl-compatible binary
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: PathBuf,
    request_timeout: Duration,
}

impl Kubectl {
    pub fn new(program: impl Into<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            request_timeout,
        }
    }

    /// Locate kubectl or oc on PATH
    pub fn detect(request_timeout: Duration) -> Result<Self> {
        Ok(Self::new(find_k8s_cli()?, request_timeout))
    }

    fn command(&self, kubeconfig: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--kubeconfig").arg(kubeconfig);
        cmd
    }

    fn run(&self, mut cmd: Command, what: &str) -> Result<Output> {
        debug!(program = %self.program.display(), what, "Running host CLI");
        let output = cmd.output()?;
        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(LoginError::CommandFailed(format!(
                "{} failed: {}",
                what,
                stderr.trim()
            )))
        }
    }
}

impl HostCli for Kubectl {
    fn probe(&self, kubeconfig: &Path) -> Result<()> {
        use indicatif::{ProgressBar, ProgressStyle};
        use std::io::IsTerminal;

        let mut cmd = self.command(kubeconfig);
        cmd.arg(format!(
            "--request-timeout={}s",
            self.request_timeout.as_secs().max(1)
        ))
        .args(["get", "configmaps"]);

        let spinner = if std::io::stderr().is_terminal() {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.set_message("Checking session...");
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let result = self.run(cmd, "get configmaps");

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result.map(|_| ())
    }

    fn set_credentials(
        &self,
        kubeconfig: &Path,
        user: &str,
        credential: &Credential,
    ) -> Result<()> {
        // Drop the old entry so token and auth-provider never coexist
        let mut unset = self.command(kubeconfig);
        unset.args(["config", "unset", &format!("users.{}", user)]);
        if let Err(e) = self.run(unset, "config unset") {
            debug!("no previous credentials to clear: {}", e);
        }

        let mut cmd = self.command(kubeconfig);
        cmd.args(["config", "set-credentials", user]);
        match credential {
            Credential::Token(token) => {
                cmd.arg(format!("--token={}", token));
            }
            Credential::Oidc(c) => {
                cmd.arg("--auth-provider=oidc");
                for (key, value) in [
                    ("client-id", CLIENT_ID),
                    ("client-secret", c.client_secret.as_str()),
                    ("id-token", c.id_token.as_str()),
                    ("refresh-token", c.refresh_token.as_str()),
                    ("idp-issuer-url", c.issuer_url.as_str()),
                ] {
                    cmd.arg(format!("--auth-provider-arg={}={}", key, value));
                }
            }
        }
        self.run(cmd, "config set-credentials").map(|_| ())
    }

    fn set_context(
        &self,
        kubeconfig: &Path,
        context: &str,
        cluster: &str,
        user: &str,
        namespace: &str,
    ) -> Result<()> {
        let mut cmd = self.command(kubeconfig);
        cmd.args(["config", "set-context", context])
            .arg(format!("--cluster={}", cluster))
            .arg(format!("--user={}", user))
            .arg(format!("--namespace={}", namespace));
        self.run(cmd, "config set-context").map(|_| ())
    }

    fn use_context(&self, kubeconfig: &Path, context: &str) -> Result<()> {
        let mut cmd = self.command(kubeconfig);
        cmd.args(["config", "use-context", context]);
        self.run(cmd, "config use-context").map(|_| ())
    }
}

/// Whether `kubeconfig` holds a live session for `cluster`: the login
/// context must be current and bound to `cluster`, and the probe must pass.
/// A plain copy of the master only carries the master's own context, so it
/// never counts.
pub fn is_authenticated(cli: &dyn HostCli, kubeconfig: &Path, cluster: &str) -> bool {
    if !kubeconfig.exists() {
        return false;
    }
    if let Err(e) = check_login_context(kubeconfig, cluster) {
        debug!(path = %kubeconfig.display(), "no login session: {}", e);
        return false;
    }
    match cli.probe(kubeconfig) {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %kubeconfig.display(), "session probe failed: {}", e);
            false
        }
    }
}

/// Check that [`LOGIN_CONTEXT`] is current, points at `cluster` and uses
/// the login user
pub fn check_login_context(kubeconfig: &Path, cluster: &str) -> Result<()> {
    let cfg = KubeConfig::load(kubeconfig)?;
    if cfg.current_context.as_deref() != Some(LOGIN_CONTEXT) {
        return Err(LoginError::Other(format!(
            "current-context is {:?}, expected '{}'",
            cfg.current_context, LOGIN_CONTEXT
        )));
    }
    let ctx = cfg
        .find_context(LOGIN_CONTEXT)
        .ok_or_else(|| LoginError::Other(format!("context '{}' missing", LOGIN_CONTEXT)))?;
    let (bound_cluster, user) = kubeconfig::extract_context_refs(&ctx.rest)?;
    if bound_cluster != cluster {
        return Err(LoginError::Other(format!(
            "context bound to cluster '{}', expected '{}'",
            bound_cluster, cluster
        )));
    }
    if user != CLIENT_ID || cfg.find_user(CLIENT_ID).is_none() {
        return Err(LoginError::Other(format!(
            "context does not use the '{}' user",
            CLIENT_ID
        )));
    }
    Ok(())
}

/// Write `credential` to the fixed login user of `kubeconfig`
pub fn inject_credential(
    cli: &dyn HostCli,
    kubeconfig: &Path,
    credential: &Credential,
) -> Result<()> {
    cli.set_credentials(kubeconfig, CLIENT_ID, credential)
        .map_err(|e| LoginError::CredentialInjectionFailed(e.to_string()))?;
    info!(mode = credential.mode(), path = %kubeconfig.display(), "Credentials written");
    Ok(())
}

/// Bind [`LOGIN_CONTEXT`] to `cluster` and make it current
pub fn switch_context(cli: &dyn HostCli, kubeconfig: &Path, cluster: &str) -> Result<()> {
    let switch_failed = |e: LoginError| LoginError::ContextSwitchFailed(e.to_string());

    cli.set_context(kubeconfig, LOGIN_CONTEXT, cluster, CLIENT_ID, LOGIN_NAMESPACE)
        .map_err(switch_failed)?;
    cli.use_context(kubeconfig, LOGIN_CONTEXT)
        .map_err(switch_failed)?;

    // Read back what the host CLI wrote
    check_login_context(kubeconfig, cluster).map_err(switch_failed)?;

    info!(context = LOGIN_CONTEXT, cluster, "Switched context");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const KUBECONFIG: &str = r#"
apiVersion: v1
clusters:
- cluster:
    certificate-authority-data: ""
    server: https://test-delivery.example.com
  name: k8s-test-delivery-cluster
- cluster:
    server: https://test-publishing.example.com
  name: k8s-test-publishing-cluster
contexts:
- context:
    cluster: k8s-test-delivery-cluster
    namespace: default
    user: ""
  name: k8s-test-delivery-context
current-context: k8s-test-delivery-context
kind: Config
preferences: {}
users:
- name: kubectl-login
  user:
    token: foobar
"#;

    const LOGGED_IN: &str = r#"
apiVersion: v1
clusters:
- cluster:
    server: https://test-delivery.example.com
  name: k8s-test-delivery-cluster
contexts:
- context:
    cluster: k8s-test-delivery-cluster
    namespace: default
    user: kubectl-login
  name: kubectl-login-context
- context:
    cluster: k8s-test-delivery-cluster
    user: kubectl-login
  name: k8s-test-delivery-context
current-context: kubectl-login-context
kind: Config
preferences: {}
users:
- name: kubectl-login
  user:
    token: foobar
"#;

    /// Probe that always passes, like kubectl with working master credentials
    struct AlwaysLive;

    impl HostCli for AlwaysLive {
        fn probe(&self, _kubeconfig: &Path) -> Result<()> {
            Ok(())
        }

        fn set_credentials(&self, _: &Path, _: &str, _: &Credential) -> Result<()> {
            Ok(())
        }

        fn set_context(&self, _: &Path, _: &str, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn use_context(&self, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn kubectl() -> Option<Kubectl> {
        match which::which("kubectl") {
            Ok(p) => Some(Kubectl::new(p, Duration::from_secs(1))),
            Err(_) => {
                eprintln!("skipping: kubectl is not available");
                None
            }
        }
    }

    fn user_map(cfg: &KubeConfig) -> serde_yaml_ng::Mapping {
        let user = cfg.find_user(CLIENT_ID).expect("login user present");
        match user.rest.get("user") {
            Some(serde_yaml_ng::Value::Mapping(m)) => m.clone(),
            other => panic!("unexpected user entry: {:?}", other),
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let token = Credential::Token("s3cr3t".to_string());
        assert!(!format!("{:?}", token).contains("s3cr3t"));

        let oidc = Credential::Oidc(OidcCredential {
            client_secret: "s3cr3t".to_string(),
            id_token: "idtok".to_string(),
            refresh_token: "reftok".to_string(),
            issuer_url: "https://dex.example.com".to_string(),
        });
        let shown = format!("{:?}", oidc);
        assert!(!shown.contains("s3cr3t"));
        assert!(!shown.contains("idtok"));
        assert!(!shown.contains("reftok"));
        assert!(shown.contains("https://dex.example.com"));
    }

    #[test]
    fn test_is_authenticated_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Kubectl::new("/nonexistent/kubectl", Duration::from_secs(1));
        assert!(!is_authenticated(
            &cli,
            &dir.path().join("config_dev"),
            "k8s-test-delivery-cluster"
        ));
    }

    #[test]
    fn test_is_authenticated_cli_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_dev");
        fs::write(&path, LOGGED_IN).unwrap();
        let cli = Kubectl::new("/nonexistent/kubectl", Duration::from_secs(1));
        assert!(!is_authenticated(&cli, &path, "k8s-test-delivery-cluster"));
    }

    #[test]
    fn test_is_authenticated_requires_login_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_k8s-test-delivery-cluster");

        // plain copy of a master whose own context works
        fs::write(&path, KUBECONFIG).unwrap();
        assert!(!is_authenticated(&AlwaysLive, &path, "k8s-test-delivery-cluster"));

        fs::write(&path, LOGGED_IN).unwrap();
        assert!(is_authenticated(&AlwaysLive, &path, "k8s-test-delivery-cluster"));
        assert!(!is_authenticated(&AlwaysLive, &path, "k8s-test-publishing-cluster"));
    }

    #[test]
    fn test_check_login_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_dev");

        fs::write(&path, LOGGED_IN).unwrap();
        assert!(check_login_context(&path, "k8s-test-delivery-cluster").is_ok());
        assert!(check_login_context(&path, "k8s-test-publishing-cluster").is_err());

        fs::write(
            &path,
            LOGGED_IN.replace(
                "current-context: kubectl-login-context",
                "current-context: k8s-test-delivery-context",
            ),
        )
        .unwrap();
        assert!(check_login_context(&path, "k8s-test-delivery-cluster").is_err());

        fs::write(&path, LOGGED_IN.replace("- name: kubectl-login\n", "- name: someone\n")).unwrap();
        assert!(check_login_context(&path, "k8s-test-delivery-cluster").is_err());
    }

    #[test]
    fn test_kubectl_set_token_credentials() {
        let Some(cli) = kubectl() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_dev");
        fs::write(&path, KUBECONFIG).unwrap();

        let token = "WQ1NDZiOGZkMTA4NWFkMzExZ";
        inject_credential(&cli, &path, &Credential::Token(token.to_string())).unwrap();

        let cfg = KubeConfig::load(&path).unwrap();
        let user = user_map(&cfg);
        assert_eq!(user.get("token").and_then(|v| v.as_str()), Some(token));
        assert!(user.get("auth-provider").is_none());
    }

    #[test]
    fn test_kubectl_set_oidc_credentials_replaces_token() {
        let Some(cli) = kubectl() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_dev");
        fs::write(&path, KUBECONFIG).unwrap();

        let credential = Credential::Oidc(OidcCredential {
            client_secret: "llldGgadfgkKjadfllj".to_string(),
            id_token: "WQ1NDZiOGZkMTA4NWFkMzExZ".to_string(),
            refresh_token: "GHHHDLKJLKJDOIIKL".to_string(),
            issuer_url: "https://dex.example.com".to_string(),
        });
        inject_credential(&cli, &path, &credential).unwrap();

        let cfg = KubeConfig::load(&path).unwrap();
        let user = user_map(&cfg);
        assert!(user.get("token").is_none(), "static token must be gone");

        let provider = user.get("auth-provider").expect("auth-provider entry");
        assert_eq!(provider.get("name").and_then(|v| v.as_str()), Some("oidc"));
        let config = provider.get("config").expect("auth-provider config");
        let field = |k: &str| config.get(k).and_then(|v| v.as_str()).map(str::to_string);
        assert_eq!(field("client-id").as_deref(), Some(CLIENT_ID));
        assert_eq!(field("client-secret").as_deref(), Some("llldGgadfgkKjadfllj"));
        assert_eq!(field("id-token").as_deref(), Some("WQ1NDZiOGZkMTA4NWFkMzExZ"));
        assert_eq!(field("refresh-token").as_deref(), Some("GHHHDLKJLKJDOIIKL"));
        assert_eq!(field("idp-issuer-url").as_deref(), Some("https://dex.example.com"));
    }

    #[test]
    fn test_kubectl_switch_context() {
        let Some(cli) = kubectl() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config_dev");
        fs::write(&path, KUBECONFIG).unwrap();

        switch_context(&cli, &path, "k8s-test-publishing-cluster").unwrap();

        let cfg = KubeConfig::load(&path).unwrap();
        assert_eq!(cfg.current_context.as_deref(), Some(LOGIN_CONTEXT));
        let ctx = cfg.find_context(LOGIN_CONTEXT).unwrap();
        let (cluster, user) = kubeconfig::extract_context_refs(&ctx.rest).unwrap();
        assert_eq!(cluster, "k8s-test-publishing-cluster");
        assert_eq!(user, CLIENT_ID);
        // the pre-existing context is left alone
        assert!(cfg.find_context("k8s-test-delivery-context").is_some());
    }
}
