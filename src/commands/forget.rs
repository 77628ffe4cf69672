use crate::output::UserOutput;
use port_selector::allocation::{normalize_directory, normalize_name, AllocationInfo};
use port_selector::{Context, Error};

/// Which allocations `forget` removes. Locked allocations are removed too.
#[derive(Debug, Clone, Copy)]
pub enum ForgetTarget<'a> {
    All,
    Port(u16),
    Name { directory: &'a str, name: &'a str },
}

pub fn run_forget(ctx: &Context, target: ForgetTarget<'_>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let removed: Vec<AllocationInfo> = ctx.with_store(|store| match target {
        ForgetTarget::All => Ok(store.remove_all()),
        ForgetTarget::Port(port) => store
            .remove_by_port(port)
            .map(|info| vec![info])
            .ok_or_else(|| Error::AllocationNotFound(format!("port {}", port))),
        ForgetTarget::Name { directory, name } => {
            Ok(store.remove_by_directory_and_name(directory, name))
        }
    })?;

    if removed.is_empty() {
        if let ForgetTarget::Name { directory, name } = target {
            out.success(&format!(
                "No allocations for {} ({})",
                normalize_directory(directory),
                normalize_name(name)
            ));
        } else {
            out.success("No allocations to remove");
        }
        return Ok(());
    }

    for info in &removed {
        let lock = if info.locked { " [locked]" } else { "" };
        out.status(&format!("  {:>5}  {} ({}){}", info.port, info.directory, info.name, lock));
    }
    out.success(&format!("Removed {} allocation(s)", removed.len()));
    Ok(())
}
