//! Cluster profile store and alias resolution

use crate::error::{LoginError, Result};
use crate::state::LoginEnv;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// File name of the profile store in the home directory
pub const PROFILES_FILE: &str = ".kubectl-login.json";

/// Login settings for one cluster
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterProfile {
    pub issuer: String,
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    #[serde(rename = "loginSecret", default, skip_serializing_if = "Option::is_none")]
    pub login_secret: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ClusterProfile {
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }
}

/// All cluster profiles, keyed by cluster name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileStore {
    pub profiles: BTreeMap<String, ClusterProfile>,
}

/// A profile selected by alias
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub cluster: &'a str,
    pub profile: &'a ClusterProfile,
}

/// Location of the profile store
pub fn profiles_path(env: &LoginEnv, override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = override_path {
        return Ok(p.to_path_buf());
    }
    if let Some(ref p) = env.profiles_path {
        return Ok(p.clone());
    }
    Ok(env.require_home()?.join(PROFILES_FILE))
}

impl ProfileStore {
    /// Read, parse and validate the profile store at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| LoginError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&content).map_err(|err| match err {
            LoginError::ConfigMalformed { reason, .. } => LoginError::ConfigMalformed {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        debug!(path = %path.display(), clusters = store.profiles.len(), "Loaded cluster profiles");
        Ok(store)
    }

    /// Parse and validate profile JSON (errors carry an empty path)
    pub fn parse(content: &str) -> Result<Self> {
        let malformed = |reason: String| LoginError::ConfigMalformed {
            path: PathBuf::new(),
            reason,
        };

        let profiles: BTreeMap<String, ClusterProfile> =
            serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

        for (cluster, profile) in &profiles {
            if cluster.is_empty() || cluster.contains(['/', '\\']) {
                return Err(malformed(format!(
                    "cluster name '{}' cannot be used in a file name",
                    cluster
                )));
            }
            Url::parse(&profile.issuer)
                .map_err(|e| malformed(format!("cluster '{}': bad issuer: {}", cluster, e)))?;
            Url::parse(&profile.redirect_url)
                .map_err(|e| malformed(format!("cluster '{}': bad redirectUrl: {}", cluster, e)))?;
            if profile.aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(malformed(format!("cluster '{}' has no aliases", cluster)));
            }
        }

        let store = Self { profiles };
        store.check_unique_aliases()?;
        Ok(store)
    }

    /// Fail on any alias shared by two clusters
    fn check_unique_aliases(&self) -> Result<()> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for (cluster, profile) in &self.profiles {
            for alias in &profile.aliases {
                if let Some(first) = owners.insert(alias.as_str(), cluster.as_str()) {
                    if first != cluster.as_str() {
                        return Err(LoginError::DuplicateAlias {
                            alias: alias.clone(),
                            first: first.to_string(),
                            second: cluster.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Find the single profile claiming `alias`
    pub fn resolve(&self, alias: &str) -> Result<Resolved<'_>> {
        self.profiles
            .iter()
            .find(|(_, profile)| profile.has_alias(alias))
            .map(|(cluster, profile)| Resolved {
                cluster: cluster.as_str(),
                profile,
            })
            .ok_or_else(|| LoginError::AliasNotFound(alias.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// The login secret: $KUBELOGIN wins over the profile's loginSecret
pub fn resolve_secret(env: &LoginEnv, cluster: &str, profile: &ClusterProfile) -> Result<String> {
    env.secret_override
        .clone()
        .or_else(|| profile.login_secret.clone())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LoginError::SecretMissing(cluster.to_string()))
}
