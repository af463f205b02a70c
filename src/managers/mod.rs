//! Init system backends
//!
//! Each supported init system is a flat struct implementing [`ServiceManager`].
//! Shared behaviour (control-tool prefix, compiled status patterns, the
//! "not found" short-circuit) lives in [`Base`], which every backend embeds.

mod openrc;
mod registry;
mod systemd;
mod sysvinit;

pub use openrc::OpenRc;
pub use registry::ManagerRegistry;
pub use systemd::Systemd;
pub use sysvinit::SysVinit;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::{CommandError, CommandRunner};


/// Supported init systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Systemd,
    #[serde(rename = "openrc")]
    OpenRc,
    #[serde(rename = "sysvinit")]
    SysVinit,
}

impl ManagerKind {
    /// Default detection order
    pub const PRIORITY: [ManagerKind; 3] = [Self::Systemd, Self::OpenRc, Self::SysVinit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Systemd => "systemd",
            Self::OpenRc => "openrc",
            Self::SysVinit => "sysvinit",
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "systemd" => Ok(Self::Systemd),
            "openrc" => Ok(Self::OpenRc),
            "sysvinit" | "sysv" => Ok(Self::SysVinit),
            other => Err(format!("unknown service manager: {}", other)),
        }
    }
}

/// Something to do to (or ask about) a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Status,
    IsEnabled,
    IsActive,
    /// Any other verb, passed through to the control tool (e.g. "reload")
    Custom(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Status => "status",
            Self::IsEnabled => "is-enabled",
            Self::IsActive => "is-active",
            Self::Custom(verb) => verb,
        }
    }

    /// Read-only queries get the shorter probe deadline
    pub fn is_probe(&self) -> bool {
        matches!(self, Self::Status | Self::IsEnabled | Self::IsActive)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let verb = s.trim().to_lowercase();
        Ok(match verb.as_str() {
            "" => return Err(ManagerError::InvalidAction(s.to_string())),
            "start" => Self::Start,
            "stop" => Self::Stop,
            "restart" => Self::Restart,
            "enable" => Self::Enable,
            "disable" => Self::Disable,
            "status" => Self::Status,
            "is-enabled" => Self::IsEnabled,
            "is-active" => Self::IsActive,
            _ if verb.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => Self::Custom(verb),
            _ => return Err(ManagerError::InvalidAction(s.to_string())),
        })
    }
}

/// Which boolean to extract from status output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Active,
    Enabled,
}

/// Concrete service name per manager
///
/// A logical service can be called differently under each init system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    names: HashMap<ManagerKind, String>,
}

impl ServiceConfig {
    pub fn for_manager(kind: ManagerKind, name: impl Into<String>) -> Self {
        Self::default().with(kind, name)
    }

    pub fn with(mut self, kind: ManagerKind, name: impl Into<String>) -> Self {
        self.names.insert(kind, name.into());
        self
    }

    pub fn name(&self, kind: ManagerKind) -> Option<&str> {
        self.names
            .get(&kind)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("no service name configured for {0}")]
    MissingName(ManagerKind),

    #[error("invalid service name: {0:?}")]
    InvalidName(String),

    #[error("invalid action: {0:?}")]
    InvalidAction(String),

    #[error("no available service manager found (tried: {})", join_kinds(.tried))]
    Unavailable { tried: Vec<ManagerKind> },
}

impl ManagerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Command(e) if e.is_timeout())
    }
}

pub(crate) fn join_kinds(kinds: &[ManagerKind]) -> String {
    kinds.iter().map(ManagerKind::as_str).collect::<Vec<_>>().join(", ")
}

/// Capability set every init system backend provides
#[async_trait]
pub trait ServiceManager: Send + Sync {
    fn kind(&self) -> ManagerKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Control tool resolves on the executable search path
    fn is_available(&self) -> bool;

    /// Whether the configured unit is installed
    async fn service_exists(&self, config: &ServiceConfig) -> Result<bool, ManagerError>;

    /// Literal argv for `action`
    fn build_command(&self, action: &Action, config: &ServiceConfig) -> Result<Vec<String>, ManagerError>;

    /// Extract an active/enabled flag from raw tool output.
    ///
    /// "Not found" style output is an expected state and yields `false`.
    fn parse_status(&self, output: &str, config: &ServiceConfig, kind: StatusKind) -> bool;

    /// Every installed service whose name contains `keyword`, in tool order
    async fn find_services(&self, keyword: &str) -> Result<Vec<String>, ManagerError>;
}

/// State and helpers shared by all backends
pub(crate) struct Base {
    kind: ManagerKind,
    tool: &'static str,
    /// Lower-case phrases this backend's tools print for a missing unit
    not_found: &'static [&'static str],
    active: Regex,
    enabled: Regex,
    runner: Arc<dyn CommandRunner>,
    elevation: Option<String>,
    probe_timeout: Duration,
}

impl Base {
    pub(crate) fn new(
        kind: ManagerKind,
        tool: &'static str,
        not_found: &'static [&'static str],
        active: Regex,
        enabled: Regex,
        runner: Arc<dyn CommandRunner>,
        elevation: Option<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            tool,
            not_found,
            active,
            enabled,
            runner,
            elevation,
            probe_timeout,
        }
    }

    pub(crate) fn tool(&self) -> &'static str {
        self.tool
    }

    pub(crate) fn is_available(&self) -> bool {
        self.runner.has_program(self.tool)
    }

    /// `[elevation] tool`
    pub(crate) fn control_command(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(4);
        if let Some(tool) = &self.elevation {
            argv.push(tool.clone());
        }
        argv.push(self.tool.to_string());
        argv
    }

    /// Configured name for this backend, rejected if unsafe to hand to a shell
    pub(crate) fn service_name<'a>(&self, config: &'a ServiceConfig) -> Result<&'a str, ManagerError> {
        let name = config
            .name(self.kind)
            .ok_or(ManagerError::MissingName(self.kind))?;
        if !is_valid_service_name(name) {
            return Err(ManagerError::InvalidName(name.to_string()));
        }
        Ok(name)
    }

    /// Run a read-only probe and return its output.
    ///
    /// A non-zero exit still yields the captured text; the caller decides
    /// what it means. Timeouts and spawn failures are errors.
    pub(crate) async fn probe(&self, argv: &[String]) -> Result<String, ManagerError> {
        match self.runner.run(argv, Some(self.probe_timeout)).await {
            Ok(out) => Ok(String::from_utf8_lossy(&out).into_owned()),
            Err(e) if e.is_exit() => Ok(e.output),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`Base::probe`] but a non-zero exit is an error
    pub(crate) async fn list(&self, argv: &[String]) -> Result<String, ManagerError> {
        let out = self.runner.run(argv, Some(self.probe_timeout)).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Output carries one of this backend's "no such unit" phrases
    pub(crate) fn reports_missing(&self, output: &str) -> bool {
        has_not_found_marker(output, self.not_found)
    }

    /// Pattern-based status parsing
    pub(crate) fn parse_status(&self, output: &str, kind: StatusKind) -> bool {
        if output.trim().is_empty() || self.reports_missing(output) {
            return false;
        }
        match kind {
            StatusKind::Active => self.active.is_match(output),
            StatusKind::Enabled => self.enabled.is_match(output),
        }
    }
}

pub(crate) fn has_not_found_marker(output: &str, markers: &[&str]) -> bool {
    let lower = output.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

/// Unit names may carry instance and type suffixes but nothing a shell would interpret
pub fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.chars().all(|c| c == '.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | ':' | '+'))
}

/// Compile a pattern that is known at build time
pub(crate) fn pattern(re: &str) -> Regex {
    match Regex::new(re) {
        Ok(r) => r,
        Err(e) => unreachable!("built-in status pattern {:?} is invalid: {}", re, e),
    }
}
