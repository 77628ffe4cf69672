// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(port_selector::config::validation),
        help("Check portStart, portEnd and allocationTTL in your config.yaml")
    )]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(port_selector::filesystem::error))]
    Filesystem(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Allocations file '{}' is corrupted: {reason}", .path.display())]
    #[diagnostic(
        code(port_selector::store::corrupted),
        help("Fix or move the file aside; port-selector will not overwrite it while it is unreadable")
    )]
    CorruptedStore { path: PathBuf, reason: String },

    #[error("Failed to lock allocations: {0}")]
    #[diagnostic(code(port_selector::store::lock))]
    LockAcquisition(String),

    #[error("All ports in range {start}-{end} are busy, frozen or locked by other directories")]
    #[diagnostic(
        code(port_selector::port::exhausted),
        help("Widen portStart/portEnd, lower freezePeriodMinutes, or run `port-selector forget` in unused projects")
    )]
    PortsExhausted { start: u16, end: u16 },

    #[error("Port {port} is outside the configured range {start}-{end}")]
    #[diagnostic(code(port_selector::port::out_of_range))]
    PortOutOfRange { port: u16, start: u16, end: u16 },

    #[error("Port {port} is allocated to '{directory}'; use --force to take it over")]
    #[diagnostic(
        code(port_selector::lock::requires_force),
        help("Re-run with --force to reassign the port to this directory")
    )]
    LockRequiresForce { port: u16, directory: String },

    #[error("Port {port} is locked by '{directory}' and its service is running")]
    #[diagnostic(
        code(port_selector::lock::live_service),
        help("--force cannot evict a running locked service. Stop it first or unlock it from its own directory")
    )]
    LockHeldByLiveService { port: u16, directory: String },

    #[error("No allocation found for {0}")]
    AllocationNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::CorruptedStore { path, .. } => Some(format!(
                "Inspect {} by hand. To start over, move it away:\n  mv {} {}.bak",
                path.display(),
                path.display(),
                path.display()
            )),
            Error::PortsExhausted { start, end } => Some(format!(
                "Every port in {}-{} is taken. See `port-selector list` for current allocations, \
                 free some with `port-selector forget`, or widen the range in config.yaml.",
                start, end
            )),
            Error::PortOutOfRange { start, end, .. } => Some(format!(
                "Pick a port between {} and {}, or change portStart/portEnd in config.yaml.",
                start, end
            )),
            Error::LockRequiresForce { port, .. } => Some(format!(
                "Run `port-selector lock {} --force` to take the port over.",
                port
            )),
            Error::LockHeldByLiveService { port, directory } => Some(format!(
                "This cannot be resolved with --force. Stop the service on port {} or run \
                 `port-selector unlock {}` inside {}.",
                port, port, directory
            )),
            Error::LockAcquisition(_) => Some(
                "Check permissions on the port-selector config directory".to_string(),
            ),
            Error::Config(_) | Error::Validation(_) | Error::Parse(_) => Some(
                "Check config.yaml in the port-selector config directory".to_string(),
            ),
            Error::AllocationNotFound(_) => Some(
                "List allocations with: port-selector list".to_string(),
            ),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
