use super::{normalize_directory, normalize_name, AllocationInfo, Store};
use crate::error::{Error, Result};
use crate::port::PortProber;
use std::cmp::Reverse;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info};

/// Range and time windows the selection algorithm works within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub port_start: u16,
    pub port_end: u16,
    pub freeze_period_minutes: u64,
    /// `None` disables expiration.
    pub ttl: Option<Duration>,
}

impl Policy {
    pub fn range(&self) -> RangeInclusive<u16> {
        self.port_start..=self.port_end
    }

    pub fn contains(&self, port: u16) -> bool {
        self.range().contains(&port)
    }
}

/// How good an existing allocation is for reuse. Lower is better; unlocked
/// busy allocations have no priority and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    LockedFree,
    /// The owner's service is presumably already running on it.
    LockedBusy,
    UnlockedFree,
}

impl Priority {
    pub fn classify(info: &AllocationInfo, is_free: bool) -> Option<Self> {
        match (info.locked, is_free) {
            (true, true) => Some(Priority::LockedFree),
            (true, false) => Some(Priority::LockedBusy),
            (false, true) => Some(Priority::UnlockedFree),
            (false, false) => None,
        }
    }
}

/// Best reusable allocation for `(dir, name)`: by priority, then most recent
/// activity, then lowest port.
pub fn find_by_directory_and_name_with_priority<'a>(
    store: &'a Store,
    dir: &str,
    name: &str,
    prober: &dyn PortProber,
) -> Option<(&'a AllocationInfo, Priority)> {
    store
        .find_all_by_directory_and_name(dir, name)
        .into_iter()
        .filter_map(|info| {
            let priority = Priority::classify(info, prober.is_free(info.port));
            if priority.is_none() {
                debug!(
                    "Skipping allocation {} for {} ({}): unlocked and busy",
                    info.port, info.directory, info.name
                );
            }
            priority.map(|p| (info, p))
        })
        .min_by_key(|(info, priority)| (*priority, Reverse(info.last_activity()), info.port))
}

/// Ports of the range in round-robin order, starting just after `last_issued`.
pub fn scan_order(policy: &Policy, last_issued: u16) -> impl Iterator<Item = u16> {
    let (start, end) = (policy.port_start, policy.port_end);
    let first = if last_issued >= start && last_issued < end {
        last_issued + 1
    } else {
        start
    };
    (first..=end).chain(start..first)
}

/// First port after the round-robin cursor that is not frozen, not locked by
/// another directory or another name of `dir`, and free according to the
/// prober.
pub fn find_free_port(
    store: &Store,
    dir: &str,
    name: &str,
    policy: &Policy,
    prober: &dyn PortProber,
) -> Result<u16> {
    let frozen = store.get_frozen_ports(policy.freeze_period_minutes);
    let locked_by_others = store.get_locked_ports_for_exclusion(dir);
    let dir_key = normalize_directory(dir);
    let name_key = normalize_name(name);

    for port in scan_order(policy, store.last_issued_port) {
        // Cheap exclusions first; probing binds sockets
        if locked_by_others.contains(&port) {
            debug!("Port {} skipped: locked by another directory", port);
            continue;
        }
        if store
            .find_by_port(port)
            .is_some_and(|a| a.locked && !a.matches(&dir_key, name_key))
        {
            debug!("Port {} skipped: locked under another name", port);
            continue;
        }
        if frozen.contains(&port) {
            debug!("Port {} skipped: frozen", port);
            continue;
        }
        if !prober.is_free(port) {
            debug!("Port {} skipped: busy", port);
            continue;
        }
        return Ok(port);
    }

    Err(Error::PortsExhausted {
        start: policy.port_start,
        end: policy.port_end,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Reused(Priority),
    Issued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub port: u16,
    pub source: SelectionSource,
    /// Allocations reclaimed by the TTL pass that ran first.
    pub expired: usize,
}

/// Pick the port for `(dir, name)` and apply the matching store mutation.
///
/// Expired allocations are reclaimed first. An existing allocation is reused
/// when one qualifies; otherwise a fresh port is issued and the round-robin
/// cursor advances to it.
pub fn select_port(
    store: &mut Store,
    dir: &str,
    name: &str,
    policy: &Policy,
    prober: &dyn PortProber,
) -> Result<Selection> {
    let expired = policy.ttl.map_or(0, |ttl| store.remove_expired(ttl));
    if expired > 0 {
        debug!("Reclaimed {} expired allocation(s)", expired);
    }

    let reusable = find_by_directory_and_name_with_priority(store, dir, name, prober)
        .map(|(info, priority)| (info.port, priority));
    if let Some((port, priority)) = reusable {
        store.touch(port);
        debug!("Reusing port {} for {} ({:?})", port, dir, priority);
        return Ok(Selection {
            port,
            source: SelectionSource::Reused(priority),
            expired,
        });
    }

    let port = find_free_port(store, dir, name, policy, prober)?;
    let is_free = |p: u16| prober.is_free(p);
    let entry = store.set_allocation_with_port_check_and_name(dir, port, None, name, Some(&is_free));
    info!("Issued port {} to {} ({})", port, entry.directory, entry.name);
    store.last_issued_port = port;

    Ok(Selection {
        port,
        source: SelectionSource::Issued,
        expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::StaticProber;
    use chrono::Utc;

    fn policy(start: u16, end: u16, freeze: u64) -> Policy {
        Policy {
            port_start: start,
            port_end: end,
            freeze_period_minutes: freeze,
            ttl: None,
        }
    }

    fn insert(store: &mut Store, port: u16, dir: &str, locked: bool, minutes_ago: i64) {
        let mut info = AllocationInfo::new(port, dir, "main");
        let ts = Utc::now() - chrono::Duration::minutes(minutes_ago);
        info.assigned_at = ts;
        info.last_used_at = ts;
        info.locked = locked;
        store.allocations.insert(port, info);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::LockedFree < Priority::LockedBusy);
        assert!(Priority::LockedBusy < Priority::UnlockedFree);
    }

    #[test]
    fn locked_busy_beats_newer_unlocked_free() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", true, 60);
        insert(&mut store, 3001, "/a", false, 1);
        let prober = StaticProber::new().with_busy(3000);

        let (info, priority) =
            find_by_directory_and_name_with_priority(&store, "/a", "main", &prober).unwrap();
        assert_eq!(info.port, 3000);
        assert_eq!(priority, Priority::LockedBusy);
    }

    #[test]
    fn unlocked_busy_is_never_reused() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", false, 1);
        let prober = StaticProber::new().with_busy(3000);

        assert!(find_by_directory_and_name_with_priority(&store, "/a", "main", &prober).is_none());
    }

    #[test]
    fn equal_priority_prefers_recent_then_lowest_port() {
        let mut store = Store::new();
        insert(&mut store, 3005, "/a", false, 10);
        insert(&mut store, 3004, "/a", false, 10);
        insert(&mut store, 3009, "/a", false, 20);
        let ts = store.allocations[&3005].last_used_at;
        store.allocations.get_mut(&3004).unwrap().last_used_at = ts;
        store.allocations.get_mut(&3004).unwrap().assigned_at = ts;

        let prober = StaticProber::new();
        let (info, _) =
            find_by_directory_and_name_with_priority(&store, "/a", "main", &prober).unwrap();
        assert_eq!(info.port, 3004);
    }

    #[test]
    fn scan_order_wraps() {
        let p = policy(3000, 3002, 0);
        assert_eq!(scan_order(&p, 3000).collect::<Vec<_>>(), vec![3001, 3002, 3000]);
        assert_eq!(scan_order(&p, 3002).collect::<Vec<_>>(), vec![3000, 3001, 3002]);
        assert_eq!(scan_order(&p, 0).collect::<Vec<_>>(), vec![3000, 3001, 3002]);
        assert_eq!(scan_order(&p, 9000).collect::<Vec<_>>(), vec![3000, 3001, 3002]);
    }

    #[test]
    fn scan_order_handles_top_of_port_space() {
        let p = policy(65534, 65535, 0);
        assert_eq!(scan_order(&p, 65535).collect::<Vec<_>>(), vec![65534, 65535]);
        assert_eq!(scan_order(&p, 65534).collect::<Vec<_>>(), vec![65535, 65534]);
    }

    #[test]
    fn fresh_allocation_skips_frozen_port() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", false, 5);
        let prober = StaticProber::new();

        let port = find_free_port(&store, "/b", "main", &policy(3000, 3001, 60), &prober).unwrap();
        assert_eq!(port, 3001);
    }

    #[test]
    fn fresh_allocation_skips_ports_locked_by_others() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", true, 600);
        store.last_issued_port = 3001;
        let prober = StaticProber::new().with_busy(3001);

        let port = find_free_port(&store, "/b", "main", &policy(3000, 3002, 0), &prober).unwrap();
        assert_eq!(port, 3002);

        // The owner itself is not excluded
        let port = find_free_port(&store, "/a", "main", &policy(3000, 3001, 0), &prober).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn fresh_allocation_skips_own_port_locked_under_another_name() {
        let mut store = Store::new();
        let mut web = AllocationInfo::new(3000, "/a", "web");
        web.locked = true;
        web.last_used_at = Utc::now() - chrono::Duration::hours(2);
        web.assigned_at = web.last_used_at;
        store.allocations.insert(3000, web);
        store.last_issued_port = 3001;
        let prober = StaticProber::new();
        let p = policy(3000, 3001, 60);

        let selection = select_port(&mut store, "/a", "api", &p, &prober).unwrap();

        assert_eq!(selection.port, 3001);
        let web = store.find_by_directory_and_name("/a", "web").unwrap();
        assert_eq!(web.port, 3000);
        assert!(web.locked);

        // Nothing else left: the locked port is not handed out
        let err = select_port(&mut store, "/a", "db", &policy(3000, 3000, 60), &prober).unwrap_err();
        assert!(matches!(err, Error::PortsExhausted { .. }));
        assert!(store.find_by_port(3000).unwrap().locked);
    }

    #[test]
    fn freeze_applies_to_own_previous_port() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", false, 5);
        let p = policy(3000, 3002, 60);

        let busy = StaticProber::new().with_busy(3000);
        let mut reissue = store.clone();
        let selection = select_port(&mut reissue, "/a", "main", &p, &busy).unwrap();
        assert_ne!(selection.port, 3000);
        assert_eq!(selection.source, SelectionSource::Issued);

        // Frozen but free: reuse wins over the freeze window
        let free = StaticProber::new();
        let selection = select_port(&mut store, "/a", "main", &p, &free).unwrap();
        assert_eq!(selection.port, 3000);
        assert_eq!(selection.source, SelectionSource::Reused(Priority::UnlockedFree));
    }

    #[test]
    fn exhausted_range_is_reported() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", false, 1);
        let prober = StaticProber::new().with_busy(3001);

        let err = find_free_port(&store, "/b", "main", &policy(3000, 3001, 60), &prober).unwrap_err();
        assert!(matches!(err, Error::PortsExhausted { start: 3000, end: 3001 }));
    }

    #[test]
    fn select_is_idempotent() {
        let mut store = Store::new();
        let prober = StaticProber::new();
        let p = policy(3000, 3010, 60);

        let first = select_port(&mut store, "/a", "main", &p, &prober).unwrap();
        let second = select_port(&mut store, "/a", "main", &p, &prober).unwrap();

        assert_eq!(first.source, SelectionSource::Issued);
        assert_eq!(second.source, SelectionSource::Reused(Priority::UnlockedFree));
        assert_eq!(first.port, second.port);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn select_reissues_when_own_port_is_taken() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/a", false, 1);
        let prober = StaticProber::new().with_busy(3000);

        let selection = select_port(&mut store, "/a", "main", &policy(3000, 3005, 0), &prober).unwrap();

        assert_eq!(selection.port, 3001);
        assert_eq!(selection.source, SelectionSource::Issued);
        // The busy old port stays tracked
        assert!(store.find_by_port(3000).is_some());
        assert_eq!(store.last_issued_port, 3001);
    }

    #[test]
    fn select_runs_ttl_first() {
        let mut store = Store::new();
        insert(&mut store, 3000, "/old", false, 60 * 24 * 60);
        let prober = StaticProber::new();
        let p = Policy {
            ttl: Some(Duration::from_secs(86400)),
            ..policy(3000, 3005, 0)
        };

        let selection = select_port(&mut store, "/a", "main", &p, &prober).unwrap();
        assert_eq!(selection.expired, 1);
        assert!(store.find_by_directory("/old").is_none());
    }

    #[test]
    fn failed_selection_leaves_cursor_alone() {
        let mut store = Store::new();
        store.last_issued_port = 3000;
        let prober = StaticProber::new().with_busy(3000).with_busy(3001);

        assert!(select_port(&mut store, "/a", "main", &policy(3000, 3001, 0), &prober).is_err());
        assert_eq!(store.last_issued_port, 3000);
        assert!(store.is_empty());
    }
}
