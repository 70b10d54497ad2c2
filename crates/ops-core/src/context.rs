use std::collections::HashSet;

use ops_adapters::{docker::DockerAdapter, k8s::K8sAdapter, ssh::SshAdapter};
use ops_events::EventBus;

use crate::config::{ConfigError, ConfigFile, ScopeSetting, Settings};
use crate::policy::audit::AuditLogger;
use crate::policy::redact::Redactor;
use crate::registry::{Registry, Scope};

/// Everything a tool handler needs, threaded explicitly through every
/// invocation instead of living behind a global (§9's "global singletons"
/// re-architecture note).
pub struct ServerContext {
    pub config: ConfigFile,
    pub settings: Settings,
    pub ssh: SshAdapter,
    pub docker: DockerAdapter,
    pub k8s: K8sAdapter,
    pub redactor: Redactor,
    pub audit: AuditLogger,
    pub events: EventBus,
}

impl ServerContext {
    pub fn new(config: ConfigFile, settings: Settings, audit: AuditLogger) -> Result<Self, ConfigError> {
        let redactor = Redactor::new(
            &config.redaction.patterns,
            &config.redaction.sensitive_substrings,
        )?;

        Ok(Self {
            config,
            settings,
            ssh: SshAdapter::new(4, std::time::Duration::from_secs(10)),
            docker: DockerAdapter::default(),
            k8s: K8sAdapter::default(),
            redactor,
            audit,
            events: EventBus::default(),
        })
    }

    /// Computes the scope filter for a session: either a named tier (`core`
    /// / `standard` / `all`) expanded against the registry, or an explicit
    /// tool-name list intersected with what's actually registered.
    pub fn resolve_scope(&self, registry: &Registry) -> HashSet<String> {
        match &self.settings.tools_scope {
            ScopeSetting::Named(tier) => registry
                .all()
                .filter(|tool| tier.includes(tool.scope))
                .map(|tool| tool.name.to_string())
                .collect(),
            ScopeSetting::Explicit(names) => {
                let known: HashSet<&str> = registry.names().collect();
                names.iter().filter(|n| known.contains(n.as_str())).cloned().collect()
            }
        }
    }

    /// Scope filter for a *named* tier, used by `profile_set` style
    /// operations that don't change `TOOLS_SCOPE` itself but need the
    /// current tier's membership recomputed against the registry.
    pub fn scope_for_tier(&self, tier: Scope, registry: &Registry) -> HashSet<String> {
        registry
            .all()
            .filter(|tool| tier.includes(tool.scope))
            .map(|tool| tool.name.to_string())
            .collect()
    }
}
