//! SysV init backend (`service` + /etc/init.d scripts)
//!
//! There is no query tool for enablement, so `is-enabled` and `is-active` are
//! synthesized with small shell tests that print a single word.

use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use super::{is_valid_service_name, pattern, Action, Base, ManagerError, ManagerKind, ServiceConfig, ServiceManager, StatusKind};
use crate::config::Settings;
use crate::exec::CommandRunner;

const NOT_FOUND: &[&str] = &["not found", "no such file"];

pub struct SysVinit {
    base: Base,
    /// Phrases that mean stopped even though they contain "running"/"active"
    inactive: Regex,
    init_dir: PathBuf,
    rc_root: PathBuf,
}

impl SysVinit {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self {
            base: Base::new(
                ManagerKind::SysVinit,
                "service",
                NOT_FOUND,
                pattern(r"(?i)\b(running|active)\b"),
                pattern(r"(?i)(?:^|\s)\b(enabled)\b(?:$|\s)"),
                runner,
                settings.elevation_tool.clone(),
                settings.probe_timeout,
            ),
            inactive: pattern(r"(?i)\b(inactive|not running|stopped|dead)\b"),
            init_dir: settings.init_dir.clone(),
            rc_root: settings.rc_root.clone(),
        }
    }

    fn shell(script: String) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script]
    }

    fn quoted(path: &std::path::Path) -> String {
        let raw = path.to_string_lossy();
        shlex::try_quote(&raw)
            .map(|q| q.into_owned())
            .unwrap_or_else(|_| raw.into_owned())
    }
}

#[async_trait]
impl ServiceManager for SysVinit {
    fn kind(&self) -> ManagerKind {
        ManagerKind::SysVinit
    }

    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    async fn service_exists(&self, config: &ServiceConfig) -> Result<bool, ManagerError> {
        let Some(name) = config.name(ManagerKind::SysVinit) else {
            return Ok(false);
        };
        // The name becomes a path component under init_dir
        if !is_valid_service_name(name) {
            return Ok(false);
        }
        let path = self.init_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ManagerError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn build_command(&self, action: &Action, config: &ServiceConfig) -> Result<Vec<String>, ManagerError> {
        let service = self.base.service_name(config)?;
        let argv = match action {
            Action::IsEnabled => Self::shell(format!(
                "if ls {}/rc*.d/S*{} >/dev/null 2>&1; then echo 'enabled'; else echo 'disabled'; fi",
                Self::quoted(&self.rc_root),
                service
            )),
            Action::IsActive => Self::shell(format!(
                "if service {} status >/dev/null 2>&1; then echo 'active'; else echo 'inactive'; fi",
                service
            )),
            _ => {
                let mut argv = self.base.control_command();
                argv.extend([service.to_string(), action.as_str().to_string()]);
                argv
            }
        };
        Ok(argv)
    }

    fn parse_status(&self, output: &str, config: &ServiceConfig, kind: StatusKind) -> bool {
        if self.base.reports_missing(output) {
            log::debug!(
                "[sysvinit] {:?} reported missing: {:?}",
                config.name(ManagerKind::SysVinit),
                output.trim()
            );
            return false;
        }
        let text = output.trim();
        match kind {
            // The enable check prints "enabled" or "disabled"; any other
            // non-empty output means the rc symlink search found something.
            StatusKind::Enabled => !text.is_empty() && !text.eq_ignore_ascii_case("disabled"),
            StatusKind::Active => !self.inactive.is_match(text) && self.base.parse_status(text, kind),
        }
    }

    async fn find_services(&self, keyword: &str) -> Result<Vec<String>, ManagerError> {
        let io_err = |e: std::io::Error| ManagerError::Io {
            path: self.init_dir.display().to_string(),
            message: e.to_string(),
        };
        let mut entries = tokio::fs::read_dir(&self.init_dir).await.map_err(io_err)?;

        let mut services = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(keyword) {
                services.push(name);
            }
        }
        Ok(services)
    }
}
