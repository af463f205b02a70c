//! svcctl - uniform service control across init systems
//!
//! Callers name services by a logical keyword ("docker", "fail2ban", "ssh")
//! and this crate works out what the host's init system actually calls them:
//! - Detects systemd, OpenRC or SysV init once per process
//! - Resolves keywords through direct probes, learned aliases and discovery
//! - Persists learned aliases so later runs skip discovery
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 ServiceControl                   │
//! ├─────────────────────────────────────────────────┤
//! │  Resolver  │  Alias Store  │  Caches / Flights  │
//! ├─────────────────────────────────────────────────┤
//! │   systemd   │    OpenRC     │       SysV         │
//! ├─────────────────────────────────────────────────┤
//! │               Command Runner                     │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod control;
pub mod exec;
pub mod managers;

pub use config::Settings;
pub use control::{
    AliasStore, AliasTable, ConfigOptions, LogOptions, SafeRestart, ServiceControl, ServiceError,
    ServiceHandle, ServiceResult, ServiceStatus,
};
pub use exec::{CommandError, CommandRunner, ScriptedRunner, SystemRunner};
pub use managers::{Action, ManagerError, ManagerKind, ManagerRegistry, ServiceManager};
