//! Per-request service handle
//!
//! A [`ServiceHandle`] pairs one resolved service name with the active manager.
//! It is built for a single request and never mutated.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::{ServiceControl, ServiceError};
use crate::managers::{Action, ManagerKind, ServiceConfig, ServiceManager, StatusKind};

/// Derived, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub is_active: bool,
    pub is_enabled: bool,
    pub is_exists: bool,
    pub output: String,
}

/// Outcome of a control action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResult {
    pub success: bool,
    pub message: String,
    pub output: String,
}

pub struct ServiceHandle {
    control: ServiceControl,
    manager: Arc<dyn ServiceManager>,
    config: ServiceConfig,
}

impl ServiceHandle {
    pub fn new(control: ServiceControl, manager: Arc<dyn ServiceManager>, name: &str) -> Self {
        let config = ServiceConfig::for_manager(manager.kind(), name);
        Self {
            control,
            manager,
            config,
        }
    }

    pub fn manager_kind(&self) -> ManagerKind {
        self.manager.kind()
    }

    pub fn service_name(&self) -> &str {
        self.config.name(self.manager.kind()).unwrap_or_default()
    }

    fn command_failed(&self, action: &Action, source: crate::exec::CommandError) -> ServiceError {
        ServiceError::CommandFailed {
            service: self.service_name().to_string(),
            action: action.to_string(),
            source,
        }
    }

    /// Run a control action and report its output
    pub async fn execute(&self, action: &Action) -> Result<ServiceResult, ServiceError> {
        let argv = self.manager.build_command(action, &self.config)?;
        let settings = self.control.settings();
        let timeout = if action.is_probe() {
            settings.probe_timeout
        } else {
            settings.action_timeout
        };

        match self.control.runner().run(&argv, Some(timeout)).await {
            Ok(out) => {
                let message = format!("{} : {} completed", action, self.service_name());
                log::info!("[{}]: {}", self.manager.name(), message);
                Ok(ServiceResult {
                    success: true,
                    message,
                    output: String::from_utf8_lossy(&out).into_owned(),
                })
            }
            Err(e) => {
                log::error!("{} operation failed: {}", action, e);
                Err(self.command_failed(action, e))
            }
        }
    }

    pub async fn start(&self) -> Result<ServiceResult, ServiceError> {
        self.execute(&Action::Start).await
    }

    pub async fn stop(&self) -> Result<ServiceResult, ServiceError> {
        self.execute(&Action::Stop).await
    }

    pub async fn restart(&self) -> Result<ServiceResult, ServiceError> {
        self.execute(&Action::Restart).await
    }

    pub async fn enable(&self) -> Result<ServiceResult, ServiceError> {
        self.execute(&Action::Enable).await
    }

    pub async fn disable(&self) -> Result<ServiceResult, ServiceError> {
        self.execute(&Action::Disable).await
    }

    /// Run a query whose non-zero exit still carries a meaningful answer
    async fn query(&self, action: Action, kind: StatusKind) -> Result<(bool, String), ServiceError> {
        let argv = self.manager.build_command(&action, &self.config)?;
        let timeout = self.control.settings().probe_timeout;

        let output = match self.control.runner().run(&argv, Some(timeout)).await {
            Ok(out) => String::from_utf8_lossy(&out).into_owned(),
            // Inactive units and disabled units exit non-zero
            Err(e) if e.is_exit() => e.output,
            Err(e) => return Err(self.command_failed(&action, e)),
        };

        let flag = self.manager.parse_status(&output, &self.config, kind);
        Ok((flag, output))
    }

    pub async fn is_active(&self) -> Result<ServiceStatus, ServiceError> {
        let (is_active, output) = self.query(Action::Status, StatusKind::Active).await?;
        Ok(ServiceStatus {
            is_active,
            output,
            ..ServiceStatus::default()
        })
    }

    pub async fn is_enabled(&self) -> Result<ServiceStatus, ServiceError> {
        let (is_enabled, output) = self.query(Action::IsEnabled, StatusKind::Enabled).await?;
        Ok(ServiceStatus {
            is_enabled,
            output,
            ..ServiceStatus::default()
        })
    }

    pub async fn is_exists(&self) -> Result<bool, ServiceError> {
        self.control.confirm_exists(self.service_name()).await
    }

    /// Active, enabled and exists, probed concurrently
    pub async fn status(&self) -> Result<ServiceStatus, ServiceError> {
        let (active, enabled, exists) =
            tokio::try_join!(self.is_active(), self.is_enabled(), self.is_exists())?;
        Ok(ServiceStatus {
            is_active: active.is_active,
            is_enabled: enabled.is_enabled,
            is_exists: exists,
            output: active.output,
        })
    }

    /// On-disk unit file or init script
    pub fn path(&self) -> Result<PathBuf, ServiceError> {
        let name = self.service_name();
        if name.is_empty() {
            return Err(ServiceError::PathNotFound(name.to_string()));
        }
        if name.contains("..") || name.contains('/') {
            log::error!("Refusing service path lookup for {:?}", name);
            return Err(ServiceError::InvalidPath(name.to_string()));
        }

        let settings = self.control.settings();
        let found = match self.manager.kind() {
            ManagerKind::Systemd => settings
                .unit_paths
                .iter()
                .map(|dir| dir.join(name))
                .find(|path| path.exists()),
            ManagerKind::OpenRc | ManagerKind::SysVinit => {
                Some(settings.init_dir.join(name)).filter(|path| path.exists())
            }
        };

        found.ok_or_else(|| {
            log::error!("Service path not found for {}", name);
            ServiceError::PathNotFound(name.to_string())
        })
    }
}
