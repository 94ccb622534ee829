//! Build console output
//!
//! Operators read the build console, not the process log, so every skip and
//! failure is echoed there too with a fixed prefix.

use parking_lot::Mutex;

/// Prefix of every console line
pub const CONSOLE_PREFIX: &str = "[InfluxDB Plugin] ";

/// Sink for lines shown in the build console
pub trait Console: Send + Sync {
    /// Write one line, the prefix is added here
    fn line(&self, message: &str);
}

/// Stdout console
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn line(&self, message: &str) {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{CONSOLE_PREFIX}{message}").ok();
    }
}

/// Console that keeps its lines in memory
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far, prefix included
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

impl Console for MemoryConsole {
    fn line(&self, message: &str) {
        self.lines.lock().push(format!("{CONSOLE_PREFIX}{message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_console_prefixes_lines() {
        let console = MemoryConsole::new();
        console.line("Collecting data");
        console.line("Publishing to primary");

        let lines = console.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[InfluxDB Plugin] Collecting data");
        assert!(console.contains("primary"));
        assert!(!console.contains("secondary"));
    }
}
