use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Allocation name used when the caller does not ask for one.
pub const DEFAULT_NAME: &str = "main";

const UNKNOWN_PREFIX: &str = "(unknown:";

/// One recorded binding between a port and a `(directory, name)` pair.
///
/// The port doubles as the key of [`Store::allocations`](super::Store);
/// it is not written inside the record on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationInfo {
    #[serde(default, skip_serializing)]
    pub port: u16,

    pub directory: String,

    #[serde(default = "default_name")]
    pub name: String,

    pub assigned_at: DateTime<Utc>,

    #[serde(default = "epoch", skip_serializing_if = "is_epoch")]
    pub last_used_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

fn is_epoch(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0
}

impl AllocationInfo {
    /// Fresh allocation stamped with the current time.
    pub fn new(port: u16, directory: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            port,
            directory: directory.into(),
            name: name.into(),
            assigned_at: now,
            last_used_at: now,
            locked: false,
            process_name: None,
            container_id: None,
        }
    }

    /// Recency key: `last_used_at`, or `assigned_at` when never used.
    pub fn last_activity(&self) -> DateTime<Utc> {
        if is_epoch(&self.last_used_at) {
            self.assigned_at
        } else {
            self.last_used_at
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    /// Busy port whose owner could not be attributed to a directory.
    pub fn is_external(&self) -> bool {
        is_unknown_directory(&self.directory)
    }

    pub fn matches(&self, directory: &str, name: &str) -> bool {
        self.directory == directory && self.name == name
    }
}

/// Synthetic directory for a busy port with no attributable owner.
pub fn unknown_directory(port: u16) -> String {
    format!("{}{})", UNKNOWN_PREFIX, port)
}

pub fn is_unknown_directory(directory: &str) -> bool {
    directory.starts_with(UNKNOWN_PREFIX) && directory.ends_with(')')
}

/// Empty names fall back to [`DEFAULT_NAME`].
pub fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_NAME
    } else {
        name
    }
}

/// Lexically clean a directory: resolves `.`, `..` and repeated separators
/// without touching the filesystem, so symlinked checkouts keep their own key.
/// Unknown markers pass through unchanged.
pub fn normalize_directory(directory: &str) -> String {
    if is_unknown_directory(directory) {
        return directory.to_string();
    }
    clean_path(Path::new(directory)).to_string_lossy().into_owned()
}

fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}
