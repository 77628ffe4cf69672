use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Process holding a port, as far as the OS lets us see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub user: Option<String>,
    pub container_id: Option<String>,
}

/// Answers "is this port free?" and "who holds it?".
///
/// The selection algorithm treats the prober as a black box; everything
/// platform-specific (socket tables, `/proc`, Docker) lives behind it.
pub trait PortProber {
    fn is_free(&self, port: u16) -> bool;

    /// Owning process of a busy port. `None` when the port is free or the
    /// owner cannot be resolved.
    fn owner_of(&self, port: u16) -> Option<ProcessInfo>;
}

/// Prober backed by the host's TCP stack.
#[derive(Debug, Clone, Default)]
pub struct SystemProber;

impl SystemProber {
    pub fn new() -> Self {
        SystemProber
    }

    /// Find ALL processes listening on a port (cross-platform)
    fn find_processes_on_port(port: u16) -> Vec<ProcessInfo> {
        #[cfg(target_os = "macos")]
        {
            parse_lsof_output(&run_lsof(port))
        }

        #[cfg(target_os = "linux")]
        {
            // Combine results from ss and lsof for completeness
            let mut processes = find_processes_linux_ss(port);
            let seen: HashSet<u32> = processes.iter().map(|p| p.pid).collect();
            for p in parse_lsof_output(&run_lsof(port)) {
                if !seen.contains(&p.pid) {
                    processes.push(p);
                }
            }
            processes
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = port;
            Vec::new()
        }
    }

    fn enrich(mut info: ProcessInfo, port: u16) -> ProcessInfo {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::fs::MetadataExt;

            let proc_dir = PathBuf::from(format!("/proc/{}", info.pid));
            if info.name.is_empty() || info.name == "unknown" {
                if let Ok(comm) = std::fs::read_to_string(proc_dir.join("comm")) {
                    info.name = comm.trim().to_string();
                }
            }
            info.cwd = std::fs::read_link(proc_dir.join("cwd")).ok();
            info.user = std::fs::metadata(&proc_dir)
                .ok()
                .and_then(|m| user_name(m.uid()));
            info.container_id = std::fs::read_to_string(proc_dir.join("cgroup"))
                .ok()
                .and_then(|cgroup| container_id_from_cgroup(&cgroup));
        }

        #[cfg(target_os = "macos")]
        {
            info.cwd = macos_cwd(info.pid);
        }

        if info.container_id.is_none() && info.name.starts_with("docker-proxy") {
            if let Some(container) = docker_container_for_port(port) {
                if let Some(dir) = docker_compose_working_dir(&container) {
                    info.cwd = Some(dir);
                }
                info.container_id = Some(container);
            }
        }

        info
    }
}

impl PortProber for SystemProber {
    fn is_free(&self, port: u16) -> bool {
        // On macOS, binding to 127.0.0.1 can succeed even when 0.0.0.0 is in use,
        // so we need to check both. The first listener must be dropped before
        // the second bind or the two would collide with each other.
        let loopback_free = TcpListener::bind(("127.0.0.1", port)).is_ok();
        loopback_free && TcpListener::bind(("0.0.0.0", port)).is_ok()
    }

    fn owner_of(&self, port: u16) -> Option<ProcessInfo> {
        if self.is_free(port) {
            return None;
        }
        let first = Self::find_processes_on_port(port).into_iter().next()?;
        let info = Self::enrich(first, port);
        debug!(
            "Port {} owned by {} (PID {}, cwd {:?})",
            port, info.name, info.pid, info.cwd
        );
        Some(info)
    }
}

/// Prober with a fixed view of the world: every port not marked busy is free.
#[derive(Debug, Clone, Default)]
pub struct StaticProber {
    busy: BTreeSet<u16>,
    owners: HashMap<u16, ProcessInfo>,
}

impl StaticProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(mut self, port: u16) -> Self {
        self.busy.insert(port);
        self
    }

    /// Mark `port` busy and attribute it to `owner`.
    pub fn with_owner(mut self, port: u16, owner: ProcessInfo) -> Self {
        self.busy.insert(port);
        self.owners.insert(port, owner);
        self
    }
}

impl PortProber for StaticProber {
    fn is_free(&self, port: u16) -> bool {
        !self.busy.contains(&port)
    }

    fn owner_of(&self, port: u16) -> Option<ProcessInfo> {
        self.owners.get(&port).cloned()
    }
}

#[cfg(target_os = "linux")]
fn user_name(uid: u32) -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name)
}

/// Extract a 64-hex container id from a cgroup file
/// (`/docker/<id>`, `docker-<id>.scope`, `/kubepods/.../<id>`).
pub fn container_id_from_cgroup(cgroup: &str) -> Option<String> {
    for line in cgroup.lines() {
        let path = line.rsplit(':').next().unwrap_or("");
        for segment in path.split('/').rev() {
            let segment = segment
                .trim_start_matches("docker-")
                .trim_start_matches("cri-containerd-")
                .trim_end_matches(".scope");
            if segment.len() == 64 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
                return Some(segment.to_string());
            }
        }
    }
    None
}

fn run_lsof(port: u16) -> String {
    let output = match Command::new("lsof")
        .args(["-i", &format!("TCP:{}", port), "-sTCP:LISTEN", "-P", "-n", "-F", "pc"])
        .output()
    {
        Ok(o) => o,
        Err(_) => return String::new(),
    };

    if !output.status.success() {
        return String::new();
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Parse lsof field output (pPID, cCOMMAND). Each process block starts with a `p` line.
pub fn parse_lsof_output(stdout: &str) -> Vec<ProcessInfo> {
    let mut processes = Vec::new();
    let mut seen_pids = HashSet::new();
    let mut current_pid: Option<u32> = None;
    let mut current_command: Option<String> = None;

    let mut flush = |pid: Option<u32>, command: Option<String>, out: &mut Vec<ProcessInfo>| {
        if let Some(pid) = pid {
            if seen_pids.insert(pid) {
                out.push(ProcessInfo {
                    pid,
                    name: command.clone().unwrap_or_else(|| "unknown".to_string()),
                    command,
                    ..ProcessInfo::default()
                });
            }
        }
    };

    for line in stdout.lines() {
        if let Some(stripped) = line.strip_prefix('p') {
            flush(current_pid, current_command.take(), &mut processes);
            current_pid = stripped.parse::<u32>().ok();
        } else if let Some(stripped) = line.strip_prefix('c') {
            current_command = Some(stripped.to_string());
        }
    }
    flush(current_pid, current_command, &mut processes);

    processes
}

#[cfg(target_os = "linux")]
fn find_processes_linux_ss(port: u16) -> Vec<ProcessInfo> {
    let output = match Command::new("ss")
        .args(["-tlnpH", &format!("sport = :{}", port)])
        .output()
    {
        Ok(o) => o,
        Err(_) => return Vec::new(),
    };

    if !output.status.success() {
        return Vec::new();
    }

    parse_ss_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `ss -tlnp` lines: `users:(("node",pid=1234,fd=20))`
pub fn parse_ss_output(stdout: &str) -> Vec<ProcessInfo> {
    let mut processes = Vec::new();
    let mut seen_pids = HashSet::new();

    for line in stdout.lines() {
        let Some(users_part) = line.split_whitespace().last() else {
            continue;
        };
        let mut name: Option<String> = None;
        // ss can report multiple processes per line
        for part in users_part.split(',') {
            if let Some(quoted) = part.split("((\"").nth(1).or_else(|| part.strip_prefix("(\"")) {
                name = Some(quoted.trim_end_matches('"').to_string());
            } else if let Some(pid_str) = part.strip_prefix("pid=") {
                if let Ok(pid) = pid_str.parse::<u32>() {
                    if seen_pids.insert(pid) {
                        processes.push(ProcessInfo {
                            pid,
                            name: name.clone().unwrap_or_else(|| "unknown".to_string()),
                            ..ProcessInfo::default()
                        });
                    }
                }
            }
        }
    }

    processes
}

#[cfg(target_os = "macos")]
fn macos_cwd(pid: u32) -> Option<PathBuf> {
    let output = Command::new("lsof")
        .args(["-a", "-p", &pid.to_string(), "-d", "cwd", "-F", "n"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(|l| l.strip_prefix('n').map(PathBuf::from))
}

/// Run a docker command synchronously, returning trimmed stdout on exit 0.
fn docker_output(args: &[&str]) -> Option<String> {
    let output = Command::new("docker").args(args).output().ok()?;
    if !output.status.success() {
        debug!(
            "docker {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn docker_container_for_port(port: u16) -> Option<String> {
    let filter = format!("publish={}", port);
    docker_output(&["ps", "--filter", &filter, "--format", "{{.ID}}"])
        .and_then(|ids| ids.lines().next().map(str::to_string))
}

fn docker_compose_working_dir(container: &str) -> Option<PathBuf> {
    docker_output(&[
        "inspect",
        "--format",
        "{{ index .Config.Labels \"com.docker.compose.project.working_dir\" }}",
        container,
    ])
    .filter(|dir| dir != "<no value>")
    .map(PathBuf::from)
}
