//! Keyword-level service operations
//!
//! Everything here takes a logical keyword ("docker", "fail2ban"), never a
//! manager-specific unit name.

use std::path::{Path, PathBuf};

use super::{ServiceControl, ServiceError, ServiceHandle, ServiceResult, ServiceStatus};
use crate::exec::CommandError;
use crate::managers::Action;

/// How much of a log file to show
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Passed to `tail -n`; "+1" is read as a single line
    pub tail_lines: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            tail_lines: "100".into(),
        }
    }
}

/// How much of a config file to show
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Empty or "0" shows the whole file
    pub tail_lines: String,
}

/// Preconditions for a restart that must not leave the service down
#[derive(Debug, Clone, Default)]
pub struct SafeRestart {
    /// Files that must exist before restarting
    pub config_paths: Vec<PathBuf>,
    /// Self-test command (e.g. `nginx -t`) that must succeed first
    pub check: Option<Vec<String>>,
}

impl ServiceControl {
    /// Resolve `keyword` and bind it to the active manager
    pub async fn handle(&self, keyword: &str) -> Result<ServiceHandle, ServiceError> {
        let name = self.resolve(keyword).await?;
        let manager = self.manager()?;
        Ok(ServiceHandle::new(self.clone(), manager, &name))
    }

    pub async fn get_service_name(&self, keyword: &str) -> Result<String, ServiceError> {
        self.resolve(keyword).await
    }

    pub async fn service_path(&self, keyword: &str) -> Result<PathBuf, ServiceError> {
        self.handle(keyword).await?.path()
    }

    /// Run any verb the manager's control tool accepts
    pub async fn custom_action(&self, action: &str, keyword: &str) -> Result<ServiceResult, ServiceError> {
        let action: Action = action.parse()?;
        let handle = self.handle(keyword).await.map_err(|e| {
            log::error!("CustomAction handler init failed for {}: {}", keyword, e);
            e
        })?;
        handle.execute(&action).await
    }

    /// Never fails: anything that does not resolve simply does not exist
    pub async fn is_exist(&self, keyword: &str) -> bool {
        match self.handle(keyword).await {
            Ok(handle) => handle.is_exists().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn start(&self, keyword: &str) -> Result<ServiceResult, ServiceError> {
        self.handle(keyword).await?.start().await
    }

    pub async fn stop(&self, keyword: &str) -> Result<ServiceResult, ServiceError> {
        self.handle(keyword).await?.stop().await
    }

    pub async fn restart(&self, keyword: &str) -> Result<ServiceResult, ServiceError> {
        self.handle(keyword).await?.restart().await
    }

    pub async fn enable(&self, keyword: &str) -> Result<ServiceResult, ServiceError> {
        self.handle(keyword).await?.enable().await
    }

    pub async fn disable(&self, keyword: &str) -> Result<ServiceResult, ServiceError> {
        self.handle(keyword).await?.disable().await
    }

    pub async fn status(&self, keyword: &str) -> Result<ServiceStatus, ServiceError> {
        let handle = self.handle(keyword).await?;
        handle.status().await.map_err(|e| {
            log::error!("Status check failed for {}: {}", keyword, e);
            e
        })
    }

    /// Display helper: unresolvable or unreadable means inactive
    pub async fn is_active(&self, keyword: &str) -> bool {
        let Ok(handle) = self.handle(keyword).await else {
            return false;
        };
        match handle.is_active().await {
            Ok(status) => status.is_active,
            Err(e) => {
                log::debug!("is-active probe for {} failed: {}", keyword, e);
                false
            }
        }
    }

    /// Display helper: unresolvable or unreadable means disabled
    pub async fn is_enabled(&self, keyword: &str) -> bool {
        let Ok(handle) = self.handle(keyword).await else {
            return false;
        };
        match handle.is_enabled().await {
            Ok(status) => status.is_enabled,
            Err(e) => {
                log::debug!("is-enabled probe for {} failed: {}", keyword, e);
                false
            }
        }
    }

    /// Restart only if the configuration looks sane, then verify it came back.
    ///
    /// Nothing is rolled back here; a failure is reported so the caller can.
    pub async fn safe_restart(&self, keyword: &str, opts: &SafeRestart) -> Result<(), ServiceError> {
        for path in &opts.config_paths {
            if !path.exists() {
                log::error!("Config file missing: {}", path.display());
                return Err(ServiceError::ConfigMissing(path.clone()));
            }
        }

        let handle = self.handle(keyword).await?;

        if let Some(check) = opts.check.as_deref().filter(|c| !c.is_empty()) {
            let timeout = self.settings().probe_timeout;
            if let Err(e) = self.runner().run(check, Some(timeout)).await {
                log::error!("Config test failed: {}", e);
                return Err(ServiceError::ConfigTest(e));
            }
        }

        handle.restart().await?;

        let status = handle.is_active().await?;
        if !status.is_active {
            log::error!("{} not active after safe restart", handle.service_name());
            return Err(ServiceError::NotActiveAfterRestart(
                handle.service_name().to_string(),
            ));
        }
        Ok(())
    }

    /// Tail a log file
    pub async fn view_log(&self, path: &Path, opts: &LogOptions) -> Result<String, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::LogNotFound(path.to_path_buf()));
        }
        let lines = match opts.tail_lines.trim() {
            "" => LogOptions::default().tail_lines,
            "+1" => "1".to_string(),
            n => n.to_string(),
        };
        let argv = vec![
            "tail".to_string(),
            "-n".to_string(),
            lines,
            path.display().to_string(),
        ];
        self.read_with(&argv, self.settings().action_timeout).await
    }

    /// Print a config file, whole or its last lines
    pub async fn view_config(&self, path: &Path, opts: &ConfigOptions) -> Result<String, ServiceError> {
        let argv = match opts.tail_lines.trim() {
            "" | "0" => vec!["cat".to_string(), path.display().to_string()],
            n => vec![
                "tail".to_string(),
                "-n".to_string(),
                n.to_string(),
                path.display().to_string(),
            ],
        };
        self.read_with(&argv, self.settings().probe_timeout).await
    }

    async fn read_with(&self, argv: &[String], timeout: std::time::Duration) -> Result<String, ServiceError> {
        self.runner()
            .run(argv, Some(timeout))
            .await
            .map(|out| String::from_utf8_lossy(&out).into_owned())
            .map_err(|e: CommandError| ServiceError::CommandFailed {
                service: argv.last().cloned().unwrap_or_default(),
                action: argv[0].clone(),
                source: e,
            })
    }
}
