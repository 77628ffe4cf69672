use crate::output::UserOutput;
use chrono::{DateTime, Local, Utc};
use port_selector::allocation::{normalize_directory, AllocationInfo};
use port_selector::{Context, PortProber};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Row<'a> {
    port: u16,
    directory: &'a str,
    name: &'a str,
    status: &'static str,
    locked: bool,
    assigned_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    container_id: Option<&'a str>,
    current: bool,
}

impl<'a> Row<'a> {
    fn new(info: &'a AllocationInfo, current_dir: &str, prober: &dyn PortProber) -> Self {
        let status = if info.is_external() {
            "external"
        } else if prober.is_free(info.port) {
            "free"
        } else {
            "busy"
        };
        Self {
            port: info.port,
            directory: &info.directory,
            name: &info.name,
            status,
            locked: info.locked,
            assigned_at: info.assigned_at,
            last_used_at: info.last_activity(),
            process_name: info.process_name.as_deref(),
            container_id: info.container_id.as_deref(),
            current: info.directory == current_dir,
        }
    }
}

pub fn run_list(
    ctx: &Context,
    current_dir: &str,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let store = ctx.read_store()?;
    let current_dir = normalize_directory(current_dir);
    let rows: Vec<Row<'_>> = store
        .iter()
        .map(|info| Row::new(info, &current_dir, ctx.prober()))
        .collect();

    if json {
        out.status(&serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        out.status("No ports are currently allocated.");
        out.status("Run `port-selector` in a project directory to allocate one.");
        return Ok(());
    }

    out.status(&format!(
        "  {:>5}  {:<8} {:<6} {:<12} {:<16}  {}",
        "PORT", "STATUS", "LOCK", "NAME", "LAST USED", "DIRECTORY"
    ));
    out.status(&format!("  {:-<78}", ""));
    for row in &rows {
        let marker = if row.current { "*" } else { " " };
        let lock = if row.locked { "yes" } else { "" };
        let last_used = row
            .last_used_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        let directory = match row.process_name {
            Some(process) => format!("{} [{}]", row.directory, process),
            None => row.directory.to_string(),
        };
        out.status(&format!(
            "{} {:>5}  {:<8} {:<6} {:<12} {:<16}  {}",
            marker, row.port, row.status, lock, row.name, last_used, directory
        ));
    }
    Ok(())
}
