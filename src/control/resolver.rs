//! Keyword → concrete service name resolution
//!
//! Resolution order, stopping at the first confirmed hit:
//!
//! 1. normalize the keyword for the active manager's naming convention
//! 2. probe the normalized name directly
//! 3. race the known aliases (predefined and learned) concurrently
//! 4. enumerate installed services containing the keyword
//! 5. pick an exact match, else the first substring match
//! 6. confirm the pick still exists
//!
//! Every success is remembered in the alias store. A failure prunes aliases
//! of the keyword that no longer exist.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{ServiceControl, ServiceError};
use crate::managers::{is_valid_service_name, ManagerError, ManagerKind, ServiceConfig};

/// Adapt a keyword to the manager's naming convention
pub fn normalize_name(kind: ManagerKind, keyword: &str) -> String {
    let mut name = keyword.trim().to_lowercase();
    if let Some(stem) = name.strip_suffix(".service.socket") {
        name = format!("{}.socket", stem);
    }

    if kind != ManagerKind::Systemd {
        return match name.strip_suffix(".service") {
            Some(stem) => stem.to_string(),
            None => name,
        };
    }

    if !name.ends_with(".service") && !name.ends_with(".socket") {
        name.push_str(".service");
    }
    name
}

/// Exact (case-insensitive) match first, then the first entry containing the
/// keyword. Ties go to list order, which is whatever order the init system
/// enumerated in.
pub fn select_best_match<'a>(keyword: &str, candidates: &'a [String]) -> Option<&'a str> {
    let keyword = keyword.to_lowercase();
    candidates
        .iter()
        .find(|name| name.to_lowercase() == keyword)
        .or_else(|| candidates.iter().find(|name| name.to_lowercase().contains(&keyword)))
        .map(String::as_str)
}

/// Aliases are keyed by the trimmed, lower-cased keyword
fn alias_key(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

impl ServiceControl {
    /// Resolve a logical keyword to a confirmed, installed service name
    pub async fn resolve(&self, keyword: &str) -> Result<String, ServiceError> {
        let key = alias_key(keyword);
        let not_found = || ServiceError::NotFound {
            keyword: keyword.to_string(),
        };

        let manager = self.manager()?;
        let normalized = normalize_name(manager.kind(), &key);
        if !is_valid_service_name(&normalized) {
            return Err(not_found());
        }

        if self.exists_quietly(&normalized).await {
            self.aliases().learn(&key, &normalized);
            return Ok(normalized);
        }

        let mut candidates = vec![normalized];
        for alias in self.aliases().candidates(&key) {
            if !candidates.contains(&alias) {
                candidates.push(alias);
            }
        }
        if let Some(name) = self.race_candidates(candidates).await {
            self.aliases().learn(&key, &name);
            return Ok(name);
        }

        match self.discover_and_select(&key).await {
            Ok(name) => {
                self.aliases().learn(&key, &name);
                Ok(name)
            }
            Err(e) => {
                log::debug!("[{}] resolution of {:?} failed: {}", manager.name(), keyword, e);
                self.cleanup_keyword(&key).await;
                match e {
                    ServiceError::NotFound { .. } => Err(not_found()),
                    other => Err(other),
                }
            }
        }
    }

    /// First keyword of `keywords` that resolves
    pub async fn resolve_first(&self, keywords: &[&str]) -> Result<String, ServiceError> {
        let mut last = None;
        for keyword in keywords {
            match self.resolve(keyword).await {
                Ok(name) => return Ok(name),
                Err(e) if e.is_not_found() => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| ServiceError::NotFound {
            keyword: keywords.join(","),
        }))
    }

    /// Existence of a concrete name, memoized for the existence TTL
    pub async fn confirm_exists(&self, name: &str) -> Result<bool, ServiceError> {
        if let Some(exists) = self.inner.existence.get(name) {
            log::debug!("Existence cache hit: {} = {}", name, exists);
            return Ok(exists);
        }

        let manager = self.manager()?;
        let config = ServiceConfig::for_manager(manager.kind(), name);
        let exists = manager.service_exists(&config).await?;
        self.inner.existence.insert(name, exists);
        Ok(exists)
    }

    /// [`ServiceControl::confirm_exists`] with probe faults treated as absence
    pub(crate) async fn exists_quietly(&self, name: &str) -> bool {
        match self.confirm_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                log::debug!("Existence probe for {} failed: {}", name, e);
                false
            }
        }
    }

    /// Probe candidates in parallel; the first one confirmed wins.
    ///
    /// Gives up after the candidate window. Probes still running when a
    /// winner is found (or the window closes) are aborted.
    async fn race_candidates(&self, candidates: Vec<String>) -> Option<String> {
        let permits = Arc::new(Semaphore::new(self.settings().probe_concurrency.max(1)));
        let mut probes = JoinSet::new();

        for candidate in candidates {
            let control = self.clone();
            let permits = permits.clone();
            probes.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                control
                    .exists_quietly(&candidate)
                    .await
                    .then_some(candidate)
            });
        }

        let window = self.settings().candidate_window;
        let winner = tokio::time::timeout(window, async {
            while let Some(joined) = probes.join_next().await {
                if let Ok(Some(name)) = joined {
                    return Some(name);
                }
            }
            None
        })
        .await
        .unwrap_or_else(|_| {
            log::debug!("Candidate probes did not finish within {:?}", window);
            None
        });

        probes.abort_all();
        winner
    }

    /// Installed services whose name contains `keyword`.
    ///
    /// Concurrent calls for the same keyword share one enumeration, and
    /// successful results are cached for the discovery TTL.
    pub async fn discover(&self, keyword: &str) -> Result<Vec<String>, ServiceError> {
        let control = self.clone();
        let key = keyword.to_string();

        self.inner
            .inflight
            .run(keyword, || async move {
                if let Some(hit) = control.inner.discovery.get(&key) {
                    log::debug!("Discovery cache hit for {}", key);
                    return Ok(hit);
                }

                let manager = control.manager()?;
                match manager.find_services(&key).await {
                    Ok(found) => {
                        control.inner.discovery.insert(key.as_str(), found.clone());
                        Ok(found)
                    }
                    Err(e) => {
                        log::error!("Find services failed for {}: {}", key, e);
                        Err(discovery_error(&key, e))
                    }
                }
            })
            .await
    }

    async fn discover_and_select(&self, keyword: &str) -> Result<String, ServiceError> {
        let not_found = || ServiceError::NotFound {
            keyword: keyword.to_string(),
        };

        let discovered = self.discover(keyword).await?;
        if discovered.is_empty() {
            return Err(not_found());
        }

        let Some(selected) = select_best_match(keyword, &discovered) else {
            log::debug!("{:?}: no exact or partial match in {:?}", keyword, discovered);
            return Err(not_found());
        };
        log::debug!("{:?}: selected {} from discovery", keyword, selected);

        // Enumeration can list units that are not actually installed
        if self.confirm_exists(selected).await? {
            Ok(selected.to_string())
        } else {
            Err(not_found())
        }
    }
}

fn discovery_error(keyword: &str, e: ManagerError) -> ServiceError {
    if e.is_timeout() {
        ServiceError::DiscoveryTimeout {
            keyword: keyword.to_string(),
        }
    } else {
        ServiceError::DiscoveryFailed {
            keyword: keyword.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_systemd() {
        let k = ManagerKind::Systemd;
        assert_eq!(normalize_name(k, "Fail2Ban"), "fail2ban.service");
        assert_eq!(normalize_name(k, "docker.service"), "docker.service");
        assert_eq!(normalize_name(k, "docker.socket"), "docker.socket");
        assert_eq!(normalize_name(k, "docker.service.socket"), "docker.socket");
        assert_eq!(normalize_name(k, " ssh "), "ssh.service");
    }

    #[test]
    fn test_normalize_other_managers() {
        for k in [ManagerKind::OpenRc, ManagerKind::SysVinit] {
            assert_eq!(normalize_name(k, "docker.service"), "docker");
            assert_eq!(normalize_name(k, "Supervisord"), "supervisord");
            assert_eq!(normalize_name(k, "docker.service.socket"), "docker.socket");
        }
    }

    #[test]
    fn test_best_match_prefers_exact() {
        let found = names(&["dockerd", "Docker", "docker.service"]);
        assert_eq!(select_best_match("docker", &found), Some("Docker"));
    }

    #[test]
    fn test_best_match_first_substring_in_list_order() {
        let found = names(&["dockerd", "docker.service"]);
        assert_eq!(select_best_match("docker", &found), Some("dockerd"));

        let found = names(&["docker.service", "dockerd"]);
        assert_eq!(select_best_match("docker", &found), Some("docker.service"));
    }

    #[test]
    fn test_best_match_none() {
        assert_eq!(select_best_match("docker", &names(&["podman.service"])), None);
        assert_eq!(select_best_match("docker", &[]), None);
    }
}
