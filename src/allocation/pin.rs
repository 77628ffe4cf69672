//! Operator-driven locking and unlocking of allocations.

use super::info::{normalize_directory, normalize_name, unknown_directory, DEFAULT_NAME};
use super::select::{find_by_directory_and_name_with_priority, select_port, Policy};
use super::Store;
use crate::error::{Error, Result};
use crate::port::{PortProber, ProcessInfo};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LockRequest<'a> {
    pub directory: &'a str,
    pub name: &'a str,
    /// Lock this exact port instead of the directory's current allocation.
    pub port: Option<u16>,
    /// Take the port over from another directory.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The requesting directory now holds a lock on `port`.
    Locked { port: u16, newly_allocated: bool },
    /// `port` was taken over from `previous_directory`.
    Reassigned {
        port: u16,
        previous_directory: String,
    },
    /// `port` was busy with no record and is now tracked as external.
    External {
        port: u16,
        owner: Option<ProcessInfo>,
    },
}

impl LockOutcome {
    pub fn port(&self) -> u16 {
        match self {
            LockOutcome::Locked { port, .. }
            | LockOutcome::Reassigned { port, .. }
            | LockOutcome::External { port, .. } => *port,
        }
    }
}

pub fn lock(
    store: &mut Store,
    request: &LockRequest<'_>,
    policy: &Policy,
    prober: &dyn PortProber,
) -> Result<LockOutcome> {
    let directory = normalize_directory(request.directory);
    let name = normalize_name(request.name);

    match request.port {
        Some(port) => lock_port(store, &directory, name, port, request.force, policy, prober),
        None => lock_current(store, &directory, name, policy, prober),
    }
}

/// Lock whatever port the directory is using, allocating one first if needed.
fn lock_current(
    store: &mut Store,
    directory: &str,
    name: &str,
    policy: &Policy,
    prober: &dyn PortProber,
) -> Result<LockOutcome> {
    let current = find_by_directory_and_name_with_priority(store, directory, name, prober)
        .map(|(info, _)| info.port);

    let (port, newly_allocated) = match current {
        Some(port) => (port, false),
        None => (select_port(store, directory, name, policy, prober)?.port, true),
    };

    store.set_locked_by_port(port, true);
    store.unlock_other_locked_ports(directory, name, port);
    info!("Locked port {} for {} ({})", port, directory, name);

    Ok(LockOutcome::Locked {
        port,
        newly_allocated,
    })
}

fn lock_port(
    store: &mut Store,
    directory: &str,
    name: &str,
    port: u16,
    force: bool,
    policy: &Policy,
    prober: &dyn PortProber,
) -> Result<LockOutcome> {
    let existing = store
        .find_by_port(port)
        .map(|info| (info.directory.clone(), info.name.clone(), info.locked));

    match existing {
        Some((owner_dir, owner_name, _)) if owner_dir == directory => {
            store.set_locked_by_port(port, true);
            store.unlock_other_locked_ports(directory, &owner_name, port);
            debug!("Port {} already belongs to {} ({})", port, directory, owner_name);
            Ok(LockOutcome::Locked {
                port,
                newly_allocated: false,
            })
        }
        Some((owner_dir, _, owner_locked)) => {
            if owner_locked && !prober.is_free(port) {
                return Err(Error::LockHeldByLiveService {
                    port,
                    directory: owner_dir,
                });
            }
            if !force {
                return Err(Error::LockRequiresForce {
                    port,
                    directory: owner_dir,
                });
            }

            store.set_allocation_with_name(directory, port, name).locked = true;
            store.unlock_other_locked_ports(directory, name, port);
            warn!(
                "Port {} reassigned from {} to {} ({})",
                port, owner_dir, directory, name
            );
            Ok(LockOutcome::Reassigned {
                port,
                previous_directory: owner_dir,
            })
        }
        None => {
            if !policy.contains(port) {
                return Err(Error::PortOutOfRange {
                    port,
                    start: policy.port_start,
                    end: policy.port_end,
                });
            }

            if prober.is_free(port) {
                store.set_allocation_with_name(directory, port, name).locked = true;
                store.unlock_other_locked_ports(directory, name, port);
                info!("Locked new port {} for {} ({})", port, directory, name);
                return Ok(LockOutcome::Locked {
                    port,
                    newly_allocated: true,
                });
            }

            let owner = prober.owner_of(port);
            let entry = store.set_allocation_with_name(&unknown_directory(port), port, DEFAULT_NAME);
            if let Some(owner) = &owner {
                entry.process_name = Some(owner.name.clone());
                entry.container_id = owner.container_id.clone();
            }
            warn!(
                "Port {} is in use by {}; recorded as external",
                port,
                owner
                    .as_ref()
                    .map_or_else(|| "an unknown process".to_string(), |o| format!("{} (pid {})", o.name, o.pid))
            );
            Ok(LockOutcome::External { port, owner })
        }
    }
}

/// Unlock `port`, or every allocation of `(directory, name)` when no port is
/// given. Returns the ports whose lock was cleared.
pub fn unlock(store: &mut Store, directory: &str, name: &str, port: Option<u16>) -> Result<Vec<u16>> {
    match port {
        Some(port) => {
            let was_locked = match store.find_by_port(port) {
                Some(info) => info.locked,
                None => return Err(Error::AllocationNotFound(format!("port {}", port))),
            };
            store.set_locked_by_port(port, false);
            Ok(if was_locked { vec![port] } else { Vec::new() })
        }
        None => {
            let locked: Vec<u16> = store
                .find_all_by_directory_and_name(directory, name)
                .iter()
                .filter(|a| a.locked)
                .map(|a| a.port)
                .collect();
            if !store.set_locked_by_directory_and_name(directory, name, false) {
                return Err(Error::AllocationNotFound(format!(
                    "{} ({})",
                    normalize_directory(directory),
                    normalize_name(name)
                )));
            }
            Ok(locked)
        }
    }
}
