//! OpenRC backend (`rc-service`, `rc-update`)

use async_trait::async_trait;
use std::sync::Arc;

use super::{pattern, Action, Base, ManagerError, ManagerKind, ServiceConfig, ServiceManager, StatusKind};
use crate::config::Settings;
use crate::exec::CommandRunner;

const NOT_FOUND: &[&str] = &["does not exist"];

pub struct OpenRc {
    base: Base,
}

impl OpenRc {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self {
            base: Base::new(
                ManagerKind::OpenRc,
                "rc-service",
                NOT_FOUND,
                // rc-service prefixes its lines with " * "
                pattern(r"(?mi)^\s*(\*\s*)?status:\s+(started|running|active)\s*$"),
                pattern(r"(?mi)^[^|\n]+\|\s*(default|enabled)\b.*$"),
                runner,
                settings.elevation_tool.clone(),
                settings.probe_timeout,
            ),
        }
    }

    async fn list_all(&self) -> Result<String, ManagerError> {
        self.base
            .list(&[self.base.tool().to_string(), "-l".to_string()])
            .await
    }
}

#[async_trait]
impl ServiceManager for OpenRc {
    fn kind(&self) -> ManagerKind {
        ManagerKind::OpenRc
    }

    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    async fn service_exists(&self, config: &ServiceConfig) -> Result<bool, ManagerError> {
        let Some(name) = config.name(ManagerKind::OpenRc) else {
            return Ok(false);
        };
        let out = self.list_all().await?;
        Ok(out.contains(name))
    }

    fn build_command(&self, action: &Action, config: &ServiceConfig) -> Result<Vec<String>, ManagerError> {
        let service = self.base.service_name(config)?.to_string();
        let argv = match action {
            Action::IsEnabled => vec!["rc-update".to_string(), "check".to_string(), service],
            Action::IsActive => {
                let mut argv = self.base.control_command();
                argv.extend([service, "status".to_string()]);
                argv
            }
            _ => {
                let mut argv = self.base.control_command();
                argv.extend([service, action.as_str().to_string()]);
                argv
            }
        };
        Ok(argv)
    }

    fn parse_status(&self, output: &str, _config: &ServiceConfig, kind: StatusKind) -> bool {
        self.base.parse_status(output, kind)
    }

    async fn find_services(&self, keyword: &str) -> Result<Vec<String>, ManagerError> {
        let out = self.list_all().await?;
        Ok(out
            .lines()
            .filter(|line| line.contains(keyword))
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}
