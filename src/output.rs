/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!`. Only
/// `status` writes to stdout, so `PORT=$(port-selector)` captures nothing but
/// the port.
pub trait UserOutput: Send + Sync {
    /// Primary result (the port, a table, JSON)
    fn status(&self, message: &str);

    /// Confirmation of a state change (e.g., "Locked port 3002 for /app (main)")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Port 3002 reassigned from /other")
    fn warning(&self, message: &str);
}

/// Standard CLI output: results to stdout, everything else to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }
}

/// Collects messages in memory so command tests can assert on them.
#[cfg(test)]
#[derive(Default)]
pub struct CapturedOutput {
    lines: std::sync::Mutex<Vec<(&'static str, String)>>,
}

#[cfg(test)]
impl CapturedOutput {
    fn push(&self, kind: &'static str, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((kind, message.to_string()));
        }
    }

    /// Messages of one kind: "status", "success" or "warning".
    pub fn of(&self, kind: &str) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| {
                lines
                    .iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl UserOutput for CapturedOutput {
    fn status(&self, message: &str) {
        self.push("status", message);
    }

    fn success(&self, message: &str) {
        self.push("success", message);
    }

    fn warning(&self, message: &str) {
        self.push("warning", message);
    }
}
