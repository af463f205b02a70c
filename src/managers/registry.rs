//! Active init system selection
//!
//! Backends are probed in priority order and the first usable one becomes the
//! process-wide manager. Detection normally runs once at startup; `reload`
//! forces a fresh probe.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{
    Action, ManagerError, ManagerKind, OpenRc, ServiceConfig, ServiceManager, SysVinit, Systemd,
};
use crate::config::Settings;
use crate::exec::CommandRunner;

pub struct ManagerRegistry {
    managers: Vec<Arc<dyn ServiceManager>>,
    priority: RwLock<Vec<ManagerKind>>,
    active: RwLock<Option<Arc<dyn ServiceManager>>>,
    retries: u32,
    backoff: Duration,
}

impl ManagerRegistry {
    pub fn new(managers: Vec<Arc<dyn ServiceManager>>, settings: &Settings) -> Self {
        Self {
            managers,
            priority: RwLock::new(settings.priority.clone()),
            active: RwLock::new(None),
            retries: settings.init_retries.max(1),
            backoff: settings.init_backoff,
        }
    }

    /// Registry holding all built-in backends
    pub fn with_builtin(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        let managers: Vec<Arc<dyn ServiceManager>> = vec![
            Arc::new(Systemd::new(runner.clone(), settings)),
            Arc::new(OpenRc::new(runner.clone(), settings)),
            Arc::new(SysVinit::new(runner, settings)),
        ];
        Self::new(managers, settings)
    }

    pub fn get(&self, kind: ManagerKind) -> Option<Arc<dyn ServiceManager>> {
        self.managers.iter().find(|m| m.kind() == kind).cloned()
    }

    pub fn priority(&self) -> Vec<ManagerKind> {
        self.priority.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Change the probe order; takes effect on the next detection
    pub fn set_priority(&self, order: Vec<ManagerKind>) {
        *self.priority.write().unwrap_or_else(|e| e.into_inner()) = order;
    }

    /// Currently selected manager, if detection has succeeded
    pub fn active(&self) -> Option<Arc<dyn ServiceManager>> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// One pass over the priority list
    pub fn detect(&self) -> Result<Arc<dyn ServiceManager>, ManagerError> {
        let order = self.priority();
        for kind in &order {
            let Some(mgr) = self.get(*kind) else {
                continue;
            };
            if mgr.is_available() && smoke_test(mgr.as_ref()) {
                log::info!("Initialized service manager: {}", kind);
                *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(mgr.clone());
                return Ok(mgr);
            }
            log::debug!("Service manager {} not usable", kind);
        }
        Err(ManagerError::Unavailable { tried: order })
    }

    /// Return the active manager, detecting it with exponential backoff if needed.
    ///
    /// Boot races can leave the control tool briefly unavailable, so a failed
    /// pass is retried. Exhausting every attempt is fatal for the caller.
    pub async fn initialize(&self) -> Result<Arc<dyn ServiceManager>, ManagerError> {
        if let Some(mgr) = self.active() {
            return Ok(mgr);
        }

        let mut backoff = self.backoff;
        let mut last_err = None;
        for attempt in 1..=self.retries {
            match self.detect() {
                Ok(mgr) => return Ok(mgr),
                Err(e) => {
                    log::warn!(
                        "Manager init attempt {}/{} failed: {}",
                        attempt,
                        self.retries,
                        e
                    );
                    last_err = Some(e);
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        log::error!("All manager initialization attempts failed");
        Err(last_err.unwrap_or(ManagerError::Unavailable {
            tried: self.priority(),
        }))
    }

    /// Drop the current selection and probe again (single pass)
    pub fn reload(&self) -> Result<Arc<dyn ServiceManager>, ManagerError> {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.detect()
    }
}

/// The backend can at least produce a status command line
fn smoke_test(mgr: &dyn ServiceManager) -> bool {
    let config = ServiceConfig::for_manager(mgr.kind(), "test-service");
    mgr.build_command(&Action::Status, &config).is_ok()
}
