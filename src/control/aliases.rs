//! Learned service-name aliases
//!
//! Maps a logical keyword to the concrete names that were confirmed to exist
//! for it. Mutations apply in memory at once; a background task writes the
//! whole table to disk after a quiet period, so a burst of resolutions ends
//! up as a single write.
//!
//! ```text
//!  learn() ──► table ──► Changed ──► [persister] ──(quiet period)──► tmp ─rename─► svcaliases.json
//!                                      ▲    │
//!              another Changed ────────┘    └ timer restarts
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::ServiceControl;

/// Keyword → ordered concrete names
pub type AliasTable = BTreeMap<String, Vec<String>>;

/// Known distribution-specific names for common keywords
pub const PREDEFINED_ALIASES: &[(&str, &[&str])] = &[
    ("clam", &["clamav-daemon.service", "clamd@scan.service", "clamd"]),
    ("freshclam", &["clamav-freshclam.service", "freshclam.service"]),
    ("fail2ban", &["fail2ban.service", "fail2ban"]),
    ("supervisor", &["supervisord.service", "supervisor.service", "supervisord", "supervisor"]),
    ("ssh", &["sshd.service", "ssh.service", "sshd", "ssh"]),
    ("docker", &["docker.service", "dockerd"]),
];

enum Signal {
    Changed,
    Flush(oneshot::Sender<io::Result<()>>),
}

pub struct AliasStore {
    table: Arc<Mutex<AliasTable>>,
    path: Option<PathBuf>,
    persister: Option<mpsc::UnboundedSender<Signal>>,
}

impl AliasStore {
    /// Store persisting to `path` (if any) after `debounce` of quiet.
    ///
    /// Must be called from within a tokio runtime when `path` is set.
    pub fn new(path: Option<PathBuf>, debounce: Duration) -> Self {
        let table = Arc::new(Mutex::new(AliasTable::new()));
        let persister = path.clone().map(|path| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(persist_loop(table.clone(), path, debounce, rx));
            tx
        });
        Self {
            table,
            path,
            persister,
        }
    }

    /// In-memory only
    pub fn ephemeral() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AliasTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn changed(&self) {
        if let Some(tx) = &self.persister {
            let _ = tx.send(Signal::Changed);
        }
    }

    /// Built-in aliases for `keyword`
    pub fn predefined(keyword: &str) -> &'static [&'static str] {
        PREDEFINED_ALIASES
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, names)| *names)
            .unwrap_or(&[])
    }

    /// Aliases learned at runtime (or restored from disk)
    pub fn learned(&self, keyword: &str) -> Vec<String> {
        self.lock().get(keyword).cloned().unwrap_or_default()
    }

    /// Predefined followed by learned aliases, without duplicates
    pub fn candidates(&self, keyword: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let learned = self.learned(keyword);
        for name in Self::predefined(keyword)
            .iter()
            .map(|s| s.to_string())
            .chain(learned)
        {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Record that `name` exists for `keyword`. Returns false if nothing changed.
    pub fn learn(&self, keyword: &str, name: &str) -> bool {
        if keyword == name {
            return false;
        }
        {
            let mut table = self.lock();
            let names = table.entry(keyword.to_string()).or_default();
            if names.iter().any(|n| n == name) {
                return false;
            }
            names.push(name.to_string());
        }
        log::debug!("Learned alias {} -> {}", keyword, name);
        self.changed();
        true
    }

    /// Replace `keyword`'s aliases with `valid`, dropping the entry if empty
    pub fn retain(&self, keyword: &str, valid: Vec<String>) -> bool {
        let changed = {
            let mut table = self.lock();
            let current = table.get(keyword);
            if current == Some(&valid) || (current.is_none() && valid.is_empty()) {
                false
            } else if valid.is_empty() {
                table.remove(keyword);
                true
            } else {
                table.insert(keyword.to_string(), valid);
                true
            }
        };
        if changed {
            self.changed();
        }
        changed
    }

    /// Merge a whole table in (append-if-absent per keyword). Does not persist.
    pub fn register(&self, aliases: AliasTable) {
        let mut table = self.lock();
        for (keyword, names) in aliases {
            let existing = table.entry(keyword).or_default();
            for name in names {
                if !existing.contains(&name) {
                    existing.push(name);
                }
            }
        }
        table.retain(|_, names| !names.is_empty());
    }

    /// Like [`AliasStore::register`] but schedules a write
    pub fn import(&self, aliases: AliasTable) {
        self.register(aliases);
        self.changed();
    }

    pub fn snapshot(&self) -> AliasTable {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write pending changes now, cancelling any pending debounce.
    ///
    /// Nothing is written if the table has not changed since the last write.
    pub async fn flush(&self) -> io::Result<()> {
        let Some(tx) = &self.persister else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Signal::Flush(done_tx)).is_err() {
            return Err(io::Error::other("alias persister stopped"));
        }
        done_rx
            .await
            .unwrap_or_else(|_| Err(io::Error::other("alias persister stopped")))
    }

    /// Read a persisted table; a missing file is an empty table
    pub async fn load(path: &Path) -> io::Result<AliasTable> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AliasTable::new()),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Serialize `table` and atomically replace `path` with it
pub async fn save(table: &AliasTable, path: &Path) -> io::Result<()> {
    let data = serde_json::to_vec_pretty(table)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &data).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn write_snapshot(table: &Mutex<AliasTable>, path: &Path) -> io::Result<()> {
    let snapshot = table.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let result = save(&snapshot, path).await;
    match &result {
        Ok(()) => log::debug!("Saved {} alias entries to {}", snapshot.len(), path.display()),
        Err(e) => log::warn!("Failed to save aliases to {}: {}", path.display(), e),
    }
    result
}

async fn persist_loop(
    table: Arc<Mutex<AliasTable>>,
    path: PathBuf,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Signal>,
) {
    // Set by mutations, cleared by a successful write
    let mut dirty = false;

    while let Some(signal) = rx.recv().await {
        match signal {
            Signal::Flush(done) => {
                let _ = done.send(write_if_dirty(&table, &path, &mut dirty).await);
                continue;
            }
            Signal::Changed => dirty = true,
        }

        // Something changed: wait until nothing has changed for `debounce`
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(Signal::Changed) => continue,
                    Some(Signal::Flush(done)) => {
                        let _ = done.send(write_if_dirty(&table, &path, &mut dirty).await);
                        break;
                    }
                    None => {
                        let _ = write_if_dirty(&table, &path, &mut dirty).await;
                        return;
                    }
                },
                _ = tokio::time::sleep(debounce) => {
                    let _ = write_if_dirty(&table, &path, &mut dirty).await;
                    break;
                }
            }
        }
    }
}

async fn write_if_dirty(table: &Mutex<AliasTable>, path: &Path, dirty: &mut bool) -> io::Result<()> {
    if !*dirty {
        return Ok(());
    }
    write_snapshot(table, path).await?;
    *dirty = false;
    Ok(())
}

impl ServiceControl {
    /// Load the persisted table and keep only names that still exist
    pub(crate) async fn restore_aliases(&self) {
        let Some(path) = self.aliases().path().map(Path::to_path_buf) else {
            return;
        };
        let stored = match AliasStore::load(&path).await {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Ignoring alias file {}: {}", path.display(), e);
                return;
            }
        };

        let mut valid = AliasTable::new();
        for (keyword, names) in stored {
            let mut kept = Vec::new();
            for name in names {
                if self.exists_quietly(&name).await {
                    kept.push(name);
                } else {
                    log::debug!("Dropping stale alias {} -> {}", keyword, name);
                }
            }
            if !kept.is_empty() {
                valid.insert(keyword, kept);
            }
        }

        log::debug!("Restored {} alias entries", valid.len());
        self.aliases().register(valid);
    }

    /// Drop aliases for `keyword` that no longer resolve
    pub(crate) async fn cleanup_keyword(&self, keyword: &str) {
        let current = self.aliases().learned(keyword);
        if current.is_empty() {
            return;
        }

        let mut valid = Vec::new();
        for name in current {
            if self.exists_quietly(&name).await {
                valid.push(name);
            } else {
                self.inner.existence.remove(&name);
            }
        }
        if self.aliases().retain(keyword, valid) {
            log::info!("Pruned stale aliases for {}", keyword);
        }
    }
}
