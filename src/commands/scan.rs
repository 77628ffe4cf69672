use crate::output::UserOutput;
use port_selector::allocation;
use port_selector::Context;

pub fn run_scan(ctx: &Context, out: &dyn UserOutput) -> anyhow::Result<()> {
    let policy = ctx.policy();
    let (report, store) = ctx.with_store(|store| {
        let report = allocation::scan_range(store, &policy, ctx.prober());
        Ok((report, store.clone()))
    })?;

    for port in &report.registered {
        if let Some(info) = store.find_by_port(*port) {
            let process = info.process_name.as_deref().unwrap_or("unknown process");
            out.status(&format!("  {:>5}  {:<24} {}", port, process, info.directory));
        }
    }

    out.success(&format!(
        "Scanned {}-{}: {} registered, {} refreshed, {} free",
        policy.port_start,
        policy.port_end,
        report.registered.len(),
        report.refreshed.len(),
        report.free
    ));
    Ok(())
}
