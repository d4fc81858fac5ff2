//! Process environment captured once at startup

use crate::error::{LoginError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the active kubeconfig
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";
/// Environment variable overriding the profile's login secret
pub const SECRET_ENV: &str = "KUBELOGIN";
/// Environment variable overriding the profile store location
pub const PROFILES_ENV: &str = "KUBECTL_LOGIN_CONFIG";

/// Everything kubectl-login reads from the process environment.
///
/// Components receive this explicitly instead of calling `std::env`
/// themselves, so tests can build one by hand.
#[derive(Debug, Clone, Default)]
pub struct LoginEnv {
    /// Home directory of the operator
    pub home: Option<PathBuf>,
    /// Raw value of $KUBECONFIG
    pub kubeconfig: Option<String>,
    /// Login secret override ($KUBELOGIN)
    pub secret_override: Option<String>,
    /// Profile store override ($KUBECTL_LOGIN_CONFIG)
    pub profiles_path: Option<PathBuf>,
}

impl LoginEnv {
    /// Load from environment variables, treating empty values as unset
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            home: dirs_next::home_dir(),
            kubeconfig: non_empty(KUBECONFIG_ENV),
            secret_override: non_empty(SECRET_ENV),
            profiles_path: non_empty(PROFILES_ENV).map(PathBuf::from),
        }
    }

    pub fn require_home(&self) -> Result<&Path> {
        self.home.as_deref().ok_or(LoginError::NoHomeDir)
    }

    /// The active kubeconfig: first entry of $KUBECONFIG, else ~/.kube/config
    pub fn active_kubeconfig(&self) -> Result<PathBuf> {
        if let Some(first) = self
            .kubeconfig
            .as_deref()
            .and_then(|kc| kc.split(':').find(|s| !s.is_empty()))
        {
            return Ok(PathBuf::from(first));
        }

        let default = self.require_home()?.join(".kube").join("config");
        if default.exists() {
            Ok(default)
        } else {
            Err(LoginError::NoKubeconfig)
        }
    }
}
