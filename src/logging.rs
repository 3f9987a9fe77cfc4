use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record};

pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Leveled logger that keeps the newest `capacity` records in memory for the
/// diagnostics view, optionally echoing each one to stderr.
pub struct RingLogger {
    capacity: usize,
    echo: bool,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl RingLogger {
    pub fn new(capacity: usize, echo: bool) -> Self {
        Self {
            capacity: capacity.max(1),
            echo,
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        if self.echo {
            eprintln!("{}", format_entry(&entry));
        }
        self.push(entry);
    }

    fn flush(&self) {}
}

pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "{} {:<5} [{}] {}",
        entry.timestamp, entry.level, entry.target, entry.message
    )
}

static LOGGER: OnceLock<RingLogger> = OnceLock::new();

/// Install the process-wide logger. Later calls are no-ops.
pub fn init(capacity: usize, verbose: bool) {
    let logger = LOGGER.get_or_init(|| RingLogger::new(capacity, verbose));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
    }
}

/// Records currently held by the process-wide logger, oldest first.
pub fn snapshot() -> Vec<LogEntry> {
    LOGGER.get().map(RingLogger::snapshot).unwrap_or_default()
}

/// Warnings and errors among `entries`, oldest first.
pub fn warnings(entries: &[LogEntry]) -> impl Iterator<Item = &LogEntry> {
    entries.iter().filter(|e| e.level <= Level::Warn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: "2024-01-01 00:00:00.000".into(),
            level: Level::Info,
            target: "test".into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_ring_keeps_newest() {
        let logger = RingLogger::new(3, false);
        for i in 0..5 {
            logger.push(entry(&format!("m{i}")));
        }
        let msgs: Vec<String> = logger.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(msgs, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let logger = RingLogger::new(0, false);
        logger.push(entry("a"));
        logger.push(entry("b"));
        assert_eq!(logger.snapshot().len(), 1);
        assert_eq!(logger.snapshot()[0].message, "b");
    }

    #[test]
    fn test_warnings_filter() {
        let logger = RingLogger::new(10, false);
        logger.push(entry("imported"));
        logger.push(LogEntry {
            level: Level::Warn,
            ..entry("could not remove stored object")
        });
        logger.push(LogEntry {
            level: Level::Error,
            ..entry("upload failed")
        });
        let all = logger.snapshot();
        let msgs: Vec<&str> = warnings(&all).map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, vec!["could not remove stored object", "upload failed"]);
    }

    #[test]
    fn test_format_entry() {
        let line = format_entry(&entry("hello"));
        assert_eq!(line, "2024-01-01 00:00:00.000 INFO  [test] hello");
    }
}
