use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("profile `{0}` is not defined in the config file")]
    UnknownProfile(String),
    #[error("`default_profile` is not set and no profile was given")]
    NoDefaultProfile,
    #[error("scope list must not be empty")]
    EmptyScope,
    #[error("invalid redaction pattern: {0}")]
    InvalidRedactionPattern(#[from] crate::policy::redact::RedactorError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostEntry {
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterEntry {
    pub kubeconfig: String,
    pub context: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerEndpointEntry {
    pub socket: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, untagged)]
pub enum AllowlistVerbs {
    Wildcard(WildcardMarker),
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WildcardMarker(String);

impl AllowlistVerbs {
    pub fn admits(&self, verb: &str) -> bool {
        match self {
            AllowlistVerbs::Wildcard(marker) => marker.0 == "*",
            AllowlistVerbs::Explicit(verbs) => verbs.iter().any(|v| v == verb),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub ssh_bastion: Option<String>,
    pub k8s_context: Option<String>,
    #[serde(default = "default_namespace")]
    pub k8s_namespace: String,
    pub docker_endpoint: Option<String>,
    #[serde(default)]
    pub compose_files: Vec<String>,
    #[serde(default)]
    pub allowlist: HashMap<String, AllowlistVerbs>,
    #[serde(default)]
    pub dangerous_flags: Vec<String>,
    #[serde(default)]
    pub dangerous_allowed: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionConfig {
    #[serde(default)]
    pub sensitive_substrings: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub hosts: HashMap<String, HostEntry>,
    #[serde(default)]
    pub clusters: HashMap<String, ClusterEntry>,
    #[serde(default)]
    pub docker_endpoints: HashMap<String, DockerEndpointEntry>,
    #[serde(default)]
    pub redaction: RedactionConfig,
    pub audit: AuditConfig,
    pub default_profile: String,
}

impl ConfigFile {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: ConfigFile =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed)
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

/// Values resolved from the environment that govern process-level behavior,
/// independent of the declarative profile file (`TOOLS_SCOPE`, `CONFIG_PATH`,
/// `AUDIT_LOG_PATH`; §6.5).
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub tools_scope: ScopeSetting,
    pub audit_log_override: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ScopeSetting {
    Named(crate::registry::Scope),
    Explicit(Vec<String>),
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_path = std::env::var_os("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        let tools_scope = match std::env::var("TOOLS_SCOPE") {
            Ok(raw) => parse_scope_setting(&raw)?,
            Err(_) => ScopeSetting::Named(crate::registry::Scope::Core),
        };

        let audit_log_override = std::env::var_os("AUDIT_LOG_PATH").map(PathBuf::from);

        Ok(Self { config_path, tools_scope, audit_log_override })
    }
}

fn parse_scope_setting(raw: &str) -> Result<ScopeSetting, ConfigError> {
    use crate::registry::Scope;
    match raw {
        "core" => Ok(ScopeSetting::Named(Scope::Core)),
        "standard" => Ok(ScopeSetting::Named(Scope::Standard)),
        "all" => Ok(ScopeSetting::Named(Scope::All)),
        other => {
            let names: Vec<String> = other
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                return Err(ConfigError::EmptyScope);
            }
            Ok(ScopeSetting::Explicit(names))
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/ops-core/config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allowlist_admits_any_verb() {
        let verbs: AllowlistVerbs = serde_yaml::from_str("\"*\"").unwrap();
        assert!(verbs.admits("delete"));
    }

    #[test]
    fn explicit_allowlist_admits_only_listed_verbs() {
        let verbs: AllowlistVerbs = serde_yaml::from_str("[\"get\", \"describe\"]").unwrap();
        assert!(verbs.admits("get"));
        assert!(!verbs.admits("delete"));
    }

    #[test]
    fn parses_comma_separated_explicit_scope() {
        match parse_scope_setting("ssh_execute, query_logs").unwrap() {
            ScopeSetting::Explicit(names) => {
                assert_eq!(names, vec!["ssh_execute", "query_logs"]);
            }
            _ => panic!("expected explicit scope"),
        }
    }

    #[test]
    fn rejects_empty_explicit_scope() {
        assert!(matches!(parse_scope_setting(" , "), Err(ConfigError::EmptyScope)));
    }
}
