use crate::output::UserOutput;
use port_selector::allocation::{self, LockOutcome, LockRequest};
use port_selector::Context;

pub fn run_lock(
    ctx: &Context,
    directory: &str,
    name: &str,
    port: Option<u16>,
    force: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let policy = ctx.policy();
    let request = LockRequest {
        directory,
        name,
        port,
        force,
    };
    let outcome = ctx.with_store(|store| allocation::lock(store, &request, &policy, ctx.prober()))?;

    match outcome {
        LockOutcome::Locked {
            port,
            newly_allocated,
        } => {
            let note = if newly_allocated { " (newly allocated)" } else { "" };
            out.success(&format!("Locked port {} for {} ({}){}", port, directory, name, note));
        }
        LockOutcome::Reassigned {
            port,
            previous_directory,
        } => {
            out.warning(&format!(
                "Port {} was allocated to {}; reassigned by --force",
                port, previous_directory
            ));
            out.success(&format!("Locked port {} for {} ({})", port, directory, name));
        }
        LockOutcome::External { port, owner } => {
            let owner = owner
                .map(|o| format!("{} (pid {})", o.name, o.pid))
                .unwrap_or_else(|| "an unknown process".to_string());
            out.warning(&format!(
                "Port {} is in use by {}; recorded as an external allocation, not locked",
                port, owner
            ));
        }
    }
    Ok(())
}

pub fn run_unlock(
    ctx: &Context,
    directory: &str,
    name: &str,
    port: Option<u16>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let unlocked = ctx.with_store(|store| allocation::unlock(store, directory, name, port))?;

    if unlocked.is_empty() {
        out.success("Nothing was locked");
    } else {
        let ports: Vec<String> = unlocked.iter().map(u16::to_string).collect();
        out.success(&format!("Unlocked port {}", ports.join(", ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CapturedOutput;
    use port_selector::{Config, Error, StaticProber};

    fn context(dir: &std::path::Path) -> Context {
        let config = Config {
            port_start: 3000,
            port_end: 3010,
            ..Config::default()
        };
        Context::new(dir.to_path_buf(), config, false).with_prober(StaticProber::new())
    }

    #[test]
    fn takeover_requires_force_and_warns() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let out = CapturedOutput::default();

        run_lock(&ctx, "/a", "main", Some(3002), false, &out).unwrap();
        let err = run_lock(&ctx, "/b", "main", Some(3002), false, &out).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::LockRequiresForce { port: 3002, .. })
        ));

        run_lock(&ctx, "/b", "main", Some(3002), true, &out).unwrap();
        assert!(out.of("warning")[0].contains("was allocated to /a"));

        let store = ctx.read_store().unwrap();
        assert_eq!(store.find_by_port(3002).unwrap().directory, "/b");
    }

    #[test]
    fn unlock_reports_cleared_ports() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let out = CapturedOutput::default();

        run_lock(&ctx, "/a", "main", Some(3004), false, &out).unwrap();
        run_unlock(&ctx, "/a", "main", None, &out).unwrap();
        run_unlock(&ctx, "/a", "main", None, &out).unwrap();

        let messages = out.of("success");
        assert_eq!(messages[1], "Unlocked port 3004");
        assert_eq!(messages[2], "Nothing was locked");
    }
}
