use super::info::{normalize_directory, unknown_directory, DEFAULT_NAME};
use super::select::Policy;
use super::Store;
use crate::port::PortProber;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Busy ports that had no record and were registered.
    pub registered: Vec<u16>,
    /// Busy ports whose existing record got fresh provenance.
    pub refreshed: Vec<u16>,
    /// Ports found free.
    pub free: usize,
}

/// Reconcile the store with what is actually listening in the range.
///
/// A busy port without a record is attributed to its owner's working
/// directory, or to the unknown marker when the owner cannot be resolved.
/// Free ports are left alone; recorded ones are not removed.
pub fn scan_range(store: &mut Store, policy: &Policy, prober: &dyn PortProber) -> ScanReport {
    let mut report = ScanReport::default();

    for port in policy.range() {
        if prober.is_free(port) {
            report.free += 1;
            continue;
        }

        let owner = prober.owner_of(port);
        let process_name = owner.as_ref().map(|o| o.name.clone());
        let container_id = owner.as_ref().and_then(|o| o.container_id.clone());

        if store.find_by_port(port).is_some() {
            store.set_provenance(port, process_name, container_id);
            report.refreshed.push(port);
            continue;
        }

        let directory = owner
            .as_ref()
            .and_then(|o| o.cwd.as_ref())
            .map(|cwd| normalize_directory(&cwd.to_string_lossy()))
            .unwrap_or_else(|| unknown_directory(port));
        debug!("Registering busy port {} for {}", port, directory);

        let is_free = |p: u16| prober.is_free(p);
        let entry = store.set_allocation_with_port_check_and_name(
            &directory,
            port,
            process_name.as_deref(),
            DEFAULT_NAME,
            Some(&is_free),
        );
        entry.container_id = container_id;
        report.registered.push(port);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ProcessInfo, StaticProber};
    use std::path::PathBuf;

    fn policy() -> Policy {
        Policy {
            port_start: 3000,
            port_end: 3004,
            freeze_period_minutes: 0,
            ttl: None,
        }
    }

    #[test]
    fn registers_busy_ports_by_owner_directory() {
        let mut store = Store::new();
        let prober = StaticProber::new()
            .with_busy(3001)
            .with_owner(
                3001,
                ProcessInfo {
                    pid: 10,
                    name: "node".to_string(),
                    cwd: Some(PathBuf::from("/home/dev/web/")),
                    ..Default::default()
                },
            )
            .with_busy(3003);

        let report = scan_range(&mut store, &policy(), &prober);

        assert_eq!(report.registered, vec![3001, 3003]);
        assert_eq!(report.free, 3);

        let web = store.find_by_port(3001).unwrap();
        assert_eq!(web.directory, "/home/dev/web");
        assert_eq!(web.process_name.as_deref(), Some("node"));
        assert!(!web.locked);

        assert!(store.find_by_port(3003).unwrap().is_external());
    }

    #[test]
    fn refreshes_provenance_without_touching_ownership() {
        let mut store = Store::new();
        store.set_allocation_with_name("/a", 3002, "api").locked = true;
        let prober = StaticProber::new().with_busy(3002).with_owner(
            3002,
            ProcessInfo {
                pid: 7,
                name: "docker-proxy".to_string(),
                container_id: Some("feedbeef".to_string()),
                ..Default::default()
            },
        );

        let report = scan_range(&mut store, &policy(), &prober);

        assert_eq!(report.refreshed, vec![3002]);
        assert!(report.registered.is_empty());
        let info = store.find_by_port(3002).unwrap();
        assert_eq!(info.directory, "/a");
        assert_eq!(info.name, "api");
        assert!(info.locked);
        assert_eq!(info.container_id.as_deref(), Some("feedbeef"));
    }

    #[test]
    fn free_ports_keep_their_records() {
        let mut store = Store::new();
        store.set_allocation_with_name("/a", 3000, "main");
        let report = scan_range(&mut store, &policy(), &StaticProber::new());

        assert_eq!(report.free, 5);
        assert!(store.find_by_port(3000).is_some());
    }
}
