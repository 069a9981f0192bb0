use chrono::Utc;
use std::fmt::{self, Write as _};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Append-only transition log. A logger without a path is a no-op.
#[derive(Debug)]
pub(crate) struct Logger {
    path: Option<PathBuf>,
    disabled: AtomicBool,
}

impl Logger {
    pub(crate) fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            disabled: AtomicBool::new(false),
        }
    }

    /// Appends `<timestamp> <event> key=value ...` as one line. Values are
    /// sanitized here and nowhere else.
    pub(crate) fn log_event(&self, event: &str, fields: &[(&str, &str)]) {
        let Some(path) = &self.path else {
            return;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        let line = format_record(&Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), event, fields);
        if let Err(err) = append_line(path, &line) {
            self.disable_with_warning(path, &err);
        }
    }

    fn disable_with_warning(&self, path: &Path, err: &io::Error) {
        if self.disabled.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = writeln!(
            io::stderr().lock(),
            "Warning: taskprep logging disabled log_path={} io_error={}",
            path.display(),
            err
        );
    }
}

fn format_record(timestamp: &dyn fmt::Display, event: &str, fields: &[(&str, &str)]) -> String {
    let mut line = format!("{} {}", timestamp, sanitize_log_value(event));
    for (key, value) in fields {
        let _ = write!(line, " {}={}", key, sanitize_log_value(value));
    }
    line.push('\n');
    line
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?
        .write_all(line.as_bytes())
}

pub(crate) fn sanitize_log_value(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_escapes_control_whitespace() {
        assert_eq!(sanitize_log_value("a\nb\tc\rd"), "a\\nb\\tc\\rd");
    }

    #[test]
    fn events_are_appended_with_timestamp_and_fields() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("taskprep.log");
        let logger = Logger::new(Some(path.clone()));

        logger.log_event("classify", &[("kind", "task")]);
        logger.log_event("allocate", &[("id", "3"), ("path", "/tmp/x\ny")]);

        let contents = fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" classify kind=task"), "got: {}", lines[0]);
        assert!(
            lines[1].ends_with(" allocate id=3 path=/tmp/x\\ny"),
            "got: {}",
            lines[1]
        );
        assert!(lines[0].contains('T') && lines[0].split(' ').next().unwrap_or("").ends_with('Z'));
    }

    #[test]
    fn record_escapes_each_value_once() {
        let line = format_record(&"2026-01-01T00:00:00Z", "skip", &[("reason", "a\\nb\tc")]);
        assert_eq!(line, "2026-01-01T00:00:00Z skip reason=a\\nb\\tc\n");
    }

    #[test]
    fn logger_without_path_writes_nothing() {
        let logger = Logger::new(None);
        logger.log_event("ignored", &[]);
        assert!(!logger.disabled.load(Ordering::Relaxed));
    }

    #[test]
    fn unwritable_path_disables_logger() {
        let temp = TempDir::new().expect("temp dir");
        let logger = Logger::new(Some(temp.path().join("missing").join("log")));
        logger.log_event("first", &[]);
        assert!(logger.disabled.load(Ordering::Relaxed));
    }
}
