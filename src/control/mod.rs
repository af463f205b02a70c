//! Service control context
//!
//! [`ServiceControl`] owns every piece of process-wide state the resolver and
//! facade need: the selected init system, the existence and discovery caches,
//! the single-flight gate and the alias store. Create one per process with
//! [`ServiceControl::init`] and clone it freely; clones share state.
//!
//! Lifecycle: `init` detects the manager once (with retries) and restores the
//! persisted alias table. `reload_manager` re-probes for tests and operators.
//! `shutdown` flushes pending alias writes; an unchanged table is never rewritten.

mod aliases;
mod cache;
mod facade;
mod handle;
mod resolver;
mod singleflight;

pub use aliases::{AliasStore, AliasTable, PREDEFINED_ALIASES};
pub use cache::TtlCache;
pub use facade::{ConfigOptions, LogOptions, SafeRestart};
pub use handle::{ServiceHandle, ServiceResult, ServiceStatus};
pub use resolver::{normalize_name, select_best_match};
pub use singleflight::SingleFlight;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::exec::{CommandError, CommandRunner, SystemRunner};
use crate::managers::{join_kinds, ManagerError, ManagerKind, ManagerRegistry, ServiceManager};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Nothing installed matches the keyword
    #[error("service not found: {keyword}")]
    NotFound { keyword: String },

    #[error("service discovery timeout for: {keyword}")]
    DiscoveryTimeout { keyword: String },

    #[error("service discovery failed for {keyword}: {reason}")]
    DiscoveryFailed { keyword: String, reason: String },

    #[error("{action} operation failed for {service}: {source}")]
    CommandFailed {
        service: String,
        action: String,
        source: CommandError,
    },

    /// No init system could be detected; nothing can work
    #[error("no available service manager found (tried: {})", join_kinds(.tried))]
    ManagerUnavailable { tried: Vec<ManagerKind> },

    #[error(transparent)]
    Manager(ManagerError),

    #[error("service path not found for {0}")]
    PathNotFound(String),

    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    #[error("config file missing: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("config test failed: {0}")]
    ConfigTest(CommandError),

    #[error("{0} not active after restart")]
    NotActiveAfterRestart(String),

    #[error("log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

impl ServiceError {
    /// Resolution failed because nothing matched (caller may offer to install)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Worth retrying later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DiscoveryTimeout { .. } | Self::DiscoveryFailed { .. })
    }

    /// The process cannot control services at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ManagerUnavailable { .. })
    }
}

impl From<ManagerError> for ServiceError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::Unavailable { tried } => Self::ManagerUnavailable { tried },
            other => Self::Manager(other),
        }
    }
}

struct Inner {
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    registry: ManagerRegistry,
    existence: TtlCache<bool>,
    discovery: TtlCache<Vec<String>>,
    inflight: SingleFlight<Result<Vec<String>, ServiceError>>,
    aliases: AliasStore,
}

/// Process-scoped service control context
#[derive(Clone)]
pub struct ServiceControl {
    inner: Arc<Inner>,
}

impl ServiceControl {
    /// Detect the init system and restore learned aliases, using real processes
    pub async fn init(settings: Settings) -> Result<Self, ServiceError> {
        let runner = Arc::new(SystemRunner::new(settings.default_timeout));
        Self::with_runner(settings, runner).await
    }

    /// Like [`ServiceControl::init`] with a caller-provided command runner
    pub async fn with_runner(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ServiceError> {
        let registry = ManagerRegistry::with_builtin(runner.clone(), &settings);
        Self::with_registry(settings, runner, registry).await
    }

    /// Fully explicit construction (custom backends, test doubles)
    pub async fn with_registry(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        registry: ManagerRegistry,
    ) -> Result<Self, ServiceError> {
        registry.initialize().await?;

        let aliases = AliasStore::new(Some(settings.alias_file()), settings.persist_debounce);
        let control = Self {
            inner: Arc::new(Inner {
                existence: TtlCache::new(settings.existence_ttl),
                discovery: TtlCache::new(settings.discovery_ttl),
                inflight: SingleFlight::new(),
                settings,
                runner,
                registry,
                aliases,
            }),
        };

        control.restore_aliases().await;
        Ok(control)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.inner.runner
    }

    pub fn registry(&self) -> &ManagerRegistry {
        &self.inner.registry
    }

    pub fn aliases(&self) -> &AliasStore {
        &self.inner.aliases
    }

    /// The process-wide init system
    pub fn manager(&self) -> Result<Arc<dyn ServiceManager>, ServiceError> {
        self.inner
            .registry
            .active()
            .ok_or_else(|| ServiceError::ManagerUnavailable {
                tried: self.inner.registry.priority(),
            })
    }

    /// Re-probe the init system. Cached lookups are dropped since they were
    /// answered by the previous manager.
    pub fn reload_manager(&self) -> Result<ManagerKind, ServiceError> {
        let mgr = self.inner.registry.reload().map_err(|e| {
            log::error!("Failed to reload service manager: {}", e);
            ServiceError::from(e)
        })?;
        self.inner.existence.clear();
        self.inner.discovery.clear();
        log::info!("Service manager reloaded: {}", mgr.kind());
        Ok(mgr.kind())
    }

    /// Flush learned aliases now instead of waiting for the quiet period
    pub async fn shutdown(&self) {
        if let Err(e) = self.inner.aliases.flush().await {
            log::warn!("Failed to persist service aliases: {}", e);
        }
    }
}
