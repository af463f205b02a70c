//! systemd backend (`systemctl`)

use async_trait::async_trait;
use std::sync::Arc;

use super::{pattern, Action, Base, ManagerError, ManagerKind, ServiceConfig, ServiceManager, StatusKind};
use crate::config::Settings;
use crate::exec::CommandRunner;

/// `systemctl` only; journal lines in `status` output may say anything else
const NOT_FOUND: &[&str] = &["could not be found"];

pub struct Systemd {
    base: Base,
}

impl Systemd {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self {
            base: Base::new(
                ManagerKind::Systemd,
                "systemctl",
                NOT_FOUND,
                // `status` prints "Active: active (running)", `is-active` prints a bare "active"
                pattern(r"(?mi)(Active:\s+active\b|^\s*active\s*$)"),
                pattern(r"(?i)^\s*enabled\s*$"),
                runner,
                settings.elevation_tool.clone(),
                settings.probe_timeout,
            ),
        }
    }
}

#[async_trait]
impl ServiceManager for Systemd {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Systemd
    }

    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    async fn service_exists(&self, config: &ServiceConfig) -> Result<bool, ManagerError> {
        let Some(name) = config.name(ManagerKind::Systemd) else {
            return Ok(false);
        };
        let argv = vec![
            self.base.tool().to_string(),
            "list-unit-files".to_string(),
            name.to_string(),
        ];
        // No match exits non-zero with "0 unit files listed."
        let out = self.base.probe(&argv).await?;
        Ok(out.contains(name))
    }

    fn build_command(&self, action: &Action, config: &ServiceConfig) -> Result<Vec<String>, ManagerError> {
        let service = self.base.service_name(config)?;
        let mut argv = self.base.control_command();
        argv.push(action.as_str().to_string());
        argv.push(service.to_string());
        Ok(argv)
    }

    fn parse_status(&self, output: &str, _config: &ServiceConfig, kind: StatusKind) -> bool {
        self.base.parse_status(output, kind)
    }

    async fn find_services(&self, keyword: &str) -> Result<Vec<String>, ManagerError> {
        let argv = vec![
            self.base.tool().to_string(),
            "list-unit-files".to_string(),
            "--type=service".to_string(),
            "--no-legend".to_string(),
        ];
        let out = self.base.list(&argv).await?;

        Ok(out
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|unit| unit.contains(keyword))
            .map(str::to_string)
            .collect())
    }
}
