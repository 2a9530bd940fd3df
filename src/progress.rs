//! Harvest progress reporting.
//!
//! Reports observable progress during `harvest run` so users see which page
//! is being fetched and how many records have been dispatched. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a harvest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarvestProgressEvent {
    /// A history page (1-based) arrived with `messages` messages.
    Paging {
        channel: String,
        page: u64,
        messages: u64,
    },
    /// `n` records dispatched out of `total` seen so far.
    Dispatching { channel: String, n: u64, total: u64 },
}

/// Reports harvest progress. Implementations write to stderr (human or JSON).
pub trait HarvestProgressReporter: Send + Sync {
    fn report(&self, event: HarvestProgressEvent);
}

/// Human-friendly progress on stderr: "harvest C0123  dispatching  50 / 75 records".
pub struct StderrProgress;

impl HarvestProgressReporter for StderrProgress {
    fn report(&self, event: HarvestProgressEvent) {
        let line = match &event {
            HarvestProgressEvent::Paging {
                channel,
                page,
                messages,
            } => format!(
                "harvest {}  page {}  {} messages\n",
                channel,
                page,
                format_number(*messages)
            ),
            HarvestProgressEvent::Dispatching { channel, n, total } => format!(
                "harvest {}  dispatching  {} / {} records\n",
                channel,
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl HarvestProgressReporter for JsonProgress {
    fn report(&self, event: HarvestProgressEvent) {
        let obj = match &event {
            HarvestProgressEvent::Paging {
                channel,
                page,
                messages,
            } => serde_json::json!({
                "event": "progress",
                "channel": channel,
                "phase": "paging",
                "page": page,
                "messages": messages
            }),
            HarvestProgressEvent::Dispatching { channel, n, total } => serde_json::json!({
                "event": "progress",
                "channel": channel,
                "phase": "dispatching",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl HarvestProgressReporter for NoProgress {
    fn report(&self, _event: HarvestProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn HarvestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
