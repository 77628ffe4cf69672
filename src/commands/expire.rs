use crate::output::UserOutput;
use port_selector::Context;

pub fn run_expire(ctx: &Context, out: &dyn UserOutput) -> anyhow::Result<()> {
    let Some(ttl) = ctx.config.ttl() else {
        out.success("Expiration is disabled (allocationTTL is 0)");
        return Ok(());
    };

    let removed = ctx.with_store(|store| Ok(store.remove_expired(ttl)))?;
    out.success(&format!(
        "Removed {} expired allocation(s) (allocationTTL {})",
        removed, ctx.config.allocation_ttl
    ));
    Ok(())
}
