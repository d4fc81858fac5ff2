//! Per-cluster kubeconfig derivation and parsing
//!
//! A derived kubeconfig lives next to the master file and is named
//! `<master file name>_<cluster>`. The master is only ever read.

use crate::error::{LoginError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value as Yaml;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator between the master file name and the cluster name
pub const SEPARATOR: char = '_';

/// Kubeconfig file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KubeConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub preferences: Option<Yaml>,
    #[serde(default)]
    pub clusters: Vec<NamedItem>,
    #[serde(default, rename = "current-context")]
    pub current_context: Option<String>,
    #[serde(default)]
    pub contexts: Vec<NamedItem>,
    #[serde(default)]
    pub users: Vec<NamedItem>,
    #[serde(default)]
    pub extensions: Option<Yaml>,
}

/// Named item in kubeconfig (context, cluster, user)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NamedItem {
    pub name: String,
    #[serde(default, flatten)]
    pub rest: Yaml,
}

impl KubeConfig {
    /// Read and parse a kubeconfig file
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&s)?)
    }

    /// Find a context by name
    pub fn find_context(&self, name: &str) -> Option<&NamedItem> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Find a user by name
    pub fn find_user(&self, name: &str) -> Option<&NamedItem> {
        self.users.iter().find(|u| u.name == name)
    }
}

/// Extract cluster and user references from a context
pub fn extract_context_refs(rest: &Yaml) -> Result<(String, String)> {
    let Yaml::Mapping(map) = rest else {
        return Err(LoginError::Other("invalid context object".into()));
    };
    let Some(Yaml::Mapping(inner)) = map.get(Yaml::from("context")) else {
        return Err(LoginError::Other("missing context field".into()));
    };
    let cluster = match inner.get(Yaml::from("cluster")) {
        Some(Yaml::String(s)) => s.clone(),
        _ => return Err(LoginError::Other("missing cluster name".into())),
    };
    let user = match inner.get(Yaml::from("user")) {
        Some(Yaml::String(s)) => s.clone(),
        _ => return Err(LoginError::Other("missing user name".into())),
    };
    Ok((cluster, user))
}

/// A kubeconfig path, classified once by its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    /// The operator's own kubeconfig
    Master(PathBuf),
    /// A per-cluster copy created by kubectl-login
    Derived {
        path: PathBuf,
        master: PathBuf,
        cluster: String,
    },
}

impl ConfigPath {
    /// Classify `path`. Only the file name is inspected, so separators in
    /// parent directories do not matter.
    pub fn classify(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| LoginError::InvalidKubeconfigPath(path.display().to_string()))?;

        match file_name.split_once(SEPARATOR) {
            Some((prefix, cluster)) if !prefix.is_empty() && !cluster.is_empty() => {
                Ok(ConfigPath::Derived {
                    path: path.to_path_buf(),
                    master: path.with_file_name(prefix),
                    cluster: cluster.to_string(),
                })
            }
            _ => Ok(ConfigPath::Master(path.to_path_buf())),
        }
    }

    /// The master kubeconfig this path belongs to
    pub fn master(&self) -> &Path {
        match self {
            ConfigPath::Master(p) => p,
            ConfigPath::Derived { master, .. } => master,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, ConfigPath::Derived { .. })
    }
}

/// Path of the per-cluster kubeconfig for `cluster`
pub fn derive_config_path(master: &Path, cluster: &str) -> PathBuf {
    let mut s = OsString::from(master.as_os_str());
    s.push(SEPARATOR.to_string());
    s.push(cluster);
    PathBuf::from(s)
}

/// Outcome of [`materialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Created,
    Reused,
}

/// Make sure `derived` exists, copying it from `master` when absent.
///
/// An existing derived file that is empty or does not parse is replaced,
/// so an interrupted copy is never reused.
pub fn materialize(master: &Path, derived: &Path) -> Result<Materialized> {
    if derived.exists() {
        if is_usable(derived) {
            debug!(path = %derived.display(), "Reusing derived kubeconfig");
            return Ok(Materialized::Reused);
        }
        warn!(
            "derived kubeconfig {} is empty or invalid, recreating it from {}",
            derived.display(),
            master.display()
        );
    }

    copy_config(master, derived)?;
    debug!(from = %master.display(), to = %derived.display(), "Created derived kubeconfig");
    Ok(Materialized::Created)
}

/// A derived file is usable when it is non-empty and parses as a kubeconfig
pub fn is_usable(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => serde_yaml_ng::from_str::<KubeConfig>(&s).is_ok(),
        _ => false,
    }
}

/// Byte-copy `src` to `dst` through a temp file in the destination directory
pub fn copy_config(src: &Path, dst: &Path) -> Result<()> {
    let fail = |reason: String| LoginError::ConfigCopyFailed {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        reason,
    };

    let mut input = File::open(src).map_err(|e| fail(format!("cannot open source: {}", e)))?;
    let len = input
        .metadata()
        .map_err(|e| fail(format!("cannot stat source: {}", e)))?
        .len();
    if len == 0 {
        return Err(fail("source kubeconfig is empty".into()));
    }

    let dir = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| fail(format!("cannot create destination: {}", e)))?;

    let copied =
        io::copy(&mut input, &mut tmp).map_err(|e| fail(format!("copy failed: {}", e)))?;
    if copied != len {
        return Err(fail(format!("short copy: {} of {} bytes", copied, len)));
    }
    tmp.flush()
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| fail(format!("cannot flush destination: {}", e)))?;

    tmp.persist(dst)
        .map_err(|e| fail(format!("cannot replace destination: {}", e.error)))?;
    Ok(())
}
