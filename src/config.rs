//! Runtime settings
//!
//! Defaults mirror the timing budgets the resolver was tuned for. Environment
//! variables and CLI flags override them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::managers::ManagerKind;

/// Name of the persisted alias table inside `resource_dir`
pub const ALIAS_FILE_NAME: &str = "svcaliases.json";

/// Environment variable overriding the resource directory
pub const ENV_RESOURCE_DIR: &str = "SVCCTL_RESOURCE_DIR";

/// Environment variable forcing a single manager (systemd, openrc, sysvinit)
pub const ENV_MANAGER: &str = "SVCCTL_MANAGER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the persisted alias table
    pub resource_dir: PathBuf,
    /// Manager probe order
    pub priority: Vec<ManagerKind>,
    /// Prefix for control actions when not running as root
    pub elevation_tool: Option<String>,

    /// Status, existence and enumeration probes
    #[serde(with = "secs")]
    pub probe_timeout: Duration,
    /// start/stop/restart/enable/disable
    #[serde(with = "secs")]
    pub action_timeout: Duration,
    /// Anything run without an explicit deadline
    #[serde(with = "secs")]
    pub default_timeout: Duration,
    /// How long concurrent alias candidates may race before discovery kicks in
    #[serde(with = "secs")]
    pub candidate_window: Duration,
    /// Quiet period before the alias table is written to disk
    #[serde(with = "secs")]
    pub persist_debounce: Duration,
    #[serde(with = "secs")]
    pub existence_ttl: Duration,
    #[serde(with = "secs")]
    pub discovery_ttl: Duration,
    /// Upper bound on simultaneous existence probes during the candidate race
    pub probe_concurrency: usize,

    /// Manager detection attempts before giving up
    pub init_retries: u32,
    /// First backoff delay, doubled after every failed attempt
    #[serde(with = "secs")]
    pub init_backoff: Duration,

    /// SysV and OpenRC init scripts
    pub init_dir: PathBuf,
    /// Root holding the rc?.d runlevel directories
    pub rc_root: PathBuf,
    /// systemd unit search paths, in lookup order
    pub unit_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resource_dir: default_resource_dir(),
            priority: ManagerKind::PRIORITY.to_vec(),
            elevation_tool: if is_root() { None } else { Some("sudo".into()) },
            probe_timeout: Duration::from_secs(5),
            action_timeout: Duration::from_secs(10),
            default_timeout: Duration::from_secs(30),
            candidate_window: Duration::from_secs(1),
            persist_debounce: Duration::from_secs(20),
            existence_ttl: Duration::from_secs(30),
            discovery_ttl: Duration::from_secs(5 * 60),
            probe_concurrency: 8,
            init_retries: 5,
            init_backoff: Duration::from_secs(1),
            init_dir: PathBuf::from("/etc/init.d"),
            rc_root: PathBuf::from("/etc"),
            unit_paths: vec![
                PathBuf::from("/etc/systemd/system"),
                PathBuf::from("/usr/lib/systemd/system"),
                PathBuf::from("/usr/share/systemd/system"),
                PathBuf::from("/usr/local/lib/systemd/system"),
            ],
        }
    }
}

impl Settings {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(dir) = std::env::var(ENV_RESOURCE_DIR) {
            if !dir.is_empty() {
                settings.resource_dir = PathBuf::from(dir);
            }
        }

        if let Ok(name) = std::env::var(ENV_MANAGER) {
            match name.parse::<ManagerKind>() {
                Ok(kind) => settings.priority = vec![kind],
                Err(e) => log::warn!("Ignoring {}: {}", ENV_MANAGER, e),
            }
        }

        settings
    }

    /// Full path of the persisted alias table
    pub fn alias_file(&self) -> PathBuf {
        self.resource_dir.join(ALIAS_FILE_NAME)
    }
}

fn default_resource_dir() -> PathBuf {
    if is_root() {
        return PathBuf::from("/var/lib/svcctl");
    }
    dirs::data_dir()
        .map(|d| d.join("svcctl"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/svcctl"))
}

/// Effective uid is 0
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Durations are written as (fractional) seconds
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let s = Settings::default();
        assert_eq!(s.probe_timeout, Duration::from_secs(5));
        assert_eq!(s.action_timeout, Duration::from_secs(10));
        assert_eq!(s.default_timeout, Duration::from_secs(30));
        assert_eq!(s.existence_ttl, Duration::from_secs(30));
        assert_eq!(s.discovery_ttl, Duration::from_secs(300));
        assert_eq!(s.persist_debounce, Duration::from_secs(20));
        assert_eq!(
            s.priority,
            vec![ManagerKind::Systemd, ManagerKind::OpenRc, ManagerKind::SysVinit]
        );
    }

    #[test]
    fn test_alias_file_location() {
        let s = Settings {
            resource_dir: PathBuf::from("/tmp/res"),
            ..Settings::default()
        };
        assert_eq!(s.alias_file(), PathBuf::from("/tmp/res/svcaliases.json"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"probe_timeout": 2.5, "priority": ["openrc"]}"#).unwrap();
        assert_eq!(s.probe_timeout, Duration::from_millis(2500));
        assert_eq!(s.priority, vec![ManagerKind::OpenRc]);
        assert_eq!(s.action_timeout, Duration::from_secs(10));
    }
}
