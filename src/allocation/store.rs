use super::info::{normalize_directory, normalize_name, AllocationInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

/// All current port assignments plus the round-robin cursor.
///
/// Pure in-memory state: nothing here touches the filesystem. Read-modify-write
/// cycles go through [`with_store`](super::with_store).
///
/// Directory and name arguments are normalized on every call, so callers may
/// pass raw `cwd` strings and empty names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(default)]
    pub last_issued_port: u16,

    #[serde(default)]
    pub allocations: BTreeMap<u16, AllocationInfo>,
}

/// Most recently active allocation, lowest port on ties.
fn most_recent<'a>(
    candidates: impl Iterator<Item = &'a AllocationInfo>,
) -> Option<&'a AllocationInfo> {
    candidates.max_by(|a, b| {
        a.last_activity()
            .cmp(&b.last_activity())
            .then_with(|| b.port.cmp(&a.port))
    })
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Allocations in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = &AllocationInfo> {
        self.allocations.values()
    }

    pub fn find_by_port(&self, port: u16) -> Option<&AllocationInfo> {
        self.allocations.get(&port)
    }

    /// Canonical allocation for `(dir, name)`.
    pub fn find_by_directory_and_name(&self, dir: &str, name: &str) -> Option<&AllocationInfo> {
        let dir = normalize_directory(dir);
        let name = normalize_name(name);
        most_recent(self.iter().filter(|a| a.matches(&dir, name)))
    }

    /// Canonical allocation for `dir` regardless of name.
    pub fn find_by_directory(&self, dir: &str) -> Option<&AllocationInfo> {
        let dir = normalize_directory(dir);
        most_recent(self.iter().filter(|a| a.directory == dir))
    }

    /// Every allocation for `(dir, name)`, ascending by port.
    pub fn find_all_by_directory_and_name(&self, dir: &str, name: &str) -> Vec<&AllocationInfo> {
        let dir = normalize_directory(dir);
        let name = normalize_name(name);
        self.iter().filter(|a| a.matches(&dir, name)).collect()
    }

    /// Record `port` for `(dir, name)`, dropping superseded unlocked entries
    /// of the same pair. Locked entries are never dropped.
    pub fn set_allocation_with_name(&mut self, dir: &str, port: u16, name: &str) -> &mut AllocationInfo {
        self.set_allocation_with_port_check_and_name(dir, port, None, name, None)
    }

    /// Like [`set_allocation_with_name`](Self::set_allocation_with_name), but a
    /// superseded entry is only dropped when `is_port_free` says its port is
    /// free, so a still-running service on the old port stays tracked.
    /// `None` treats every old port as free.
    pub fn set_allocation_with_port_check_and_name(
        &mut self,
        dir: &str,
        port: u16,
        process_name: Option<&str>,
        name: &str,
        is_port_free: Option<&dyn Fn(u16) -> bool>,
    ) -> &mut AllocationInfo {
        let dir = normalize_directory(dir);
        let name = normalize_name(name).to_string();

        let superseded: Vec<u16> = self
            .iter()
            .filter(|a| a.port != port && a.matches(&dir, &name) && !a.locked)
            .map(|a| a.port)
            .collect();
        for old in superseded {
            let free = is_port_free.map_or(true, |check| check(old));
            if free {
                debug!("Dropping superseded allocation {} for {} ({})", old, dir, name);
                self.allocations.remove(&old);
            } else {
                debug!(
                    "Keeping superseded allocation {} for {} ({}): port still in use",
                    old, dir, name
                );
            }
        }

        let entry = match self.allocations.remove(&port) {
            // Same owner re-recorded: keep history and lock state
            Some(mut existing) if existing.matches(&dir, &name) => {
                existing.touch();
                existing
            }
            _ => AllocationInfo::new(port, dir, name),
        };
        let entry = self.allocations.entry(port).or_insert(entry);
        if let Some(process) = process_name {
            entry.process_name = Some(process.to_string());
        }
        entry
    }

    /// Refresh `last_used_at`. Returns whether the port was allocated.
    pub fn touch(&mut self, port: u16) -> bool {
        match self.allocations.get_mut(&port) {
            Some(info) => {
                info.touch();
                true
            }
            None => false,
        }
    }

    /// Record best-effort provenance for an allocated port.
    pub fn set_provenance(
        &mut self,
        port: u16,
        process_name: Option<String>,
        container_id: Option<String>,
    ) -> bool {
        let Some(info) = self.allocations.get_mut(&port) else {
            return false;
        };
        if process_name.is_some() {
            info.process_name = process_name;
        }
        if container_id.is_some() {
            info.container_id = container_id;
        }
        true
    }

    /// Remove every allocation for `(dir, name)`, locked ones included.
    pub fn remove_by_directory_and_name(&mut self, dir: &str, name: &str) -> Vec<AllocationInfo> {
        let dir = normalize_directory(dir);
        let name = normalize_name(name).to_string();
        self.remove_where(|a| a.matches(&dir, &name))
    }

    /// Remove every allocation for `dir` under any name.
    pub fn remove_by_directory(&mut self, dir: &str) -> Vec<AllocationInfo> {
        let dir = normalize_directory(dir);
        self.remove_where(|a| a.directory == dir)
    }

    pub fn remove_by_port(&mut self, port: u16) -> Option<AllocationInfo> {
        self.allocations.remove(&port)
    }

    pub fn remove_all(&mut self) -> Vec<AllocationInfo> {
        std::mem::take(&mut self.allocations).into_values().collect()
    }

    /// Drop unlocked allocations idle for longer than `ttl`. Locked allocations
    /// are kept regardless of age. A zero TTL removes nothing.
    pub fn remove_expired(&mut self, ttl: Duration) -> usize {
        if ttl.is_zero() {
            return 0;
        }
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return 0;
        };
        self.remove_expired_before(cutoff)
    }

    /// Drop unlocked allocations whose last activity is older than `cutoff`.
    pub fn remove_expired_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let removed = self.remove_where(|a| !a.locked && a.last_activity() < cutoff);
        for info in &removed {
            debug!(
                "Expired allocation {} for {} ({}), last active {}",
                info.port,
                info.directory,
                info.name,
                info.last_activity()
            );
        }
        removed.len()
    }

    fn remove_where(&mut self, pred: impl Fn(&AllocationInfo) -> bool) -> Vec<AllocationInfo> {
        let ports: Vec<u16> = self.iter().filter(|a| pred(a)).map(|a| a.port).collect();
        ports
            .into_iter()
            .filter_map(|port| self.allocations.remove(&port))
            .collect()
    }

    /// Lock the canonical allocation of `(dir, name)`, or unlock all of them.
    pub fn set_locked_by_directory_and_name(&mut self, dir: &str, name: &str, locked: bool) -> bool {
        let targets: Vec<u16> = if locked {
            self.find_by_directory_and_name(dir, name)
                .map(|a| vec![a.port])
                .unwrap_or_default()
        } else {
            self.find_all_by_directory_and_name(dir, name)
                .iter()
                .map(|a| a.port)
                .collect()
        };
        for port in &targets {
            self.set_locked_by_port(*port, locked);
        }
        !targets.is_empty()
    }

    pub fn set_locked_by_port(&mut self, port: u16, locked: bool) -> bool {
        match self.allocations.get_mut(&port) {
            Some(info) => {
                info.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Toggle the lock on `port` only when it is allocated under `name`.
    pub fn set_locked_by_port_and_name(&mut self, port: u16, name: &str, locked: bool) -> bool {
        let name = normalize_name(name);
        match self.allocations.get_mut(&port) {
            Some(info) if info.name == name => {
                info.locked = locked;
                true
            }
            _ => false,
        }
    }

    /// Clear the lock on every other port held by `(dir, name)`.
    pub fn unlock_other_locked_ports(&mut self, dir: &str, name: &str, except_port: u16) -> usize {
        let dir = normalize_directory(dir);
        let name = normalize_name(name);
        let mut unlocked = 0;
        for info in self.allocations.values_mut() {
            if info.port != except_port && info.locked && info.matches(&dir, name) {
                info.locked = false;
                unlocked += 1;
                debug!("Released previous lock on {} for {} ({})", info.port, dir, name);
            }
        }
        unlocked
    }

    /// Ports locked by any directory other than `current_dir`.
    pub fn get_locked_ports_for_exclusion(&self, current_dir: &str) -> BTreeSet<u16> {
        let current_dir = normalize_directory(current_dir);
        self.iter()
            .filter(|a| a.locked && a.directory != current_dir)
            .map(|a| a.port)
            .collect()
    }

    /// Ports active within the last `freeze_minutes`, whoever owns them.
    pub fn get_frozen_ports(&self, freeze_minutes: u64) -> BTreeSet<u16> {
        if freeze_minutes == 0 {
            return BTreeSet::new();
        }
        // Windows too large to represent freeze everything
        let cutoff = i64::try_from(freeze_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.iter()
            .filter(|a| a.last_activity() > cutoff)
            .map(|a| a.port)
            .collect()
    }
}
