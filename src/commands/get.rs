use crate::output::UserOutput;
use port_selector::allocation::{self, Priority, SelectionSource};
use port_selector::Context;

pub fn run_get(ctx: &Context, directory: &str, name: &str, out: &dyn UserOutput) -> anyhow::Result<()> {
    let policy = ctx.policy();
    let selection = ctx.with_store(|store| {
        allocation::select_port(store, directory, name, &policy, ctx.prober())
    })?;

    if selection.expired > 0 {
        tracing::info!("Reclaimed {} expired allocation(s)", selection.expired);
    }
    if selection.source == SelectionSource::Reused(Priority::LockedBusy) {
        tracing::info!(
            "Port {} is locked to {} and already in use",
            selection.port,
            directory
        );
    }

    out.status(&selection.port.to_string());
    Ok(())
}
