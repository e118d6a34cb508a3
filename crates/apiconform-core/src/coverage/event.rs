//! Coverage event log - cross-process coverage as append-only JSONL
//!
//! Worker processes append one line per tracked outcome; the coordinating
//! process replays the log into its own plans to produce the authoritative
//! report.
//!
//! ```text
//! .apiconform/
//! └── coverage-events.jsonl
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LocalTracker, TaskKey, Tracker};

/// Which side of the exchange an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Request,
    Response,
}

/// One tracked validation outcome, as written to the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageEvent {
    /// Document identifier the task belongs to
    pub document: String,
    pub kind: EventKind,
    pub key: TaskKey,
    /// Whether validation produced no failure
    pub valid: bool,
}

/// Append-only JSONL file shared by writer processes.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    /// Open (creating if needed) the log for appending.
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory or file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EventLogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EventLogError::Io(format!("create {}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EventLogError::Io(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line.
    ///
    /// # Errors
    ///
    /// Returns error if the event cannot be serialized or written.
    pub fn append(&self, event: &CoverageEvent) -> Result<(), EventLogError> {
        let mut line =
            serde_json::to_string(event).map_err(|e| EventLogError::Serialize(e.to_string()))?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())
            .map_err(|e| EventLogError::Io(format!("write {}: {e}", self.path.display())))
    }

    /// Remove any previous log so a new run starts from zero.
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be removed.
    pub fn reset(path: &Path) -> Result<(), EventLogError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EventLogError::Io(format!("remove {}: {e}", path.display()))),
        }
    }

    /// Read every event in the log. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure or a malformed line.
    pub fn read(path: &Path) -> Result<Vec<CoverageEvent>, EventLogError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EventLogError::Io(format!("open {}: {e}", path.display()))),
        };

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.map_err(|e| EventLogError::Io(format!("read {}: {e}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| EventLogError::Parse {
                line: index + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

/// Tracker that writes events instead of updating plans.
#[derive(Debug, Clone)]
pub struct EventLogTracker {
    log: Arc<EventLog>,
}

impl EventLogTracker {
    #[must_use]
    pub const fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    fn record(&self, document: &str, kind: EventKind, key: &TaskKey, valid: bool) {
        let event = CoverageEvent {
            document: document.to_string(),
            kind,
            key: key.clone(),
            valid,
        };
        if let Err(e) = self.log.append(&event) {
            tracing::warn!(error = %e, "failed to record coverage event");
        }
    }
}

impl Tracker for EventLogTracker {
    fn track_request(&self, document: &str, key: &TaskKey, valid: bool) {
        self.record(document, EventKind::Request, key, valid);
    }

    fn track_response(&self, document: &str, key: &TaskKey, valid: bool) {
        self.record(document, EventKind::Response, key, valid);
    }
}

/// Outcome of replaying a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    /// Events naming a document or task absent from the plans
    pub unmatched: usize,
}

/// Fold recorded events into the coordinator's plans.
pub fn replay(events: &[CoverageEvent], tracker: &LocalTracker) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for event in events {
        if tracker.apply(event) {
            stats.applied += 1;
        } else {
            stats.unmatched += 1;
        }
    }
    if stats.unmatched > 0 {
        tracing::debug!(unmatched = stats.unmatched, "coverage events outside plan");
    }
    stats
}

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Malformed event on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::Plan;

    fn key() -> TaskKey {
        TaskKey::request("/pets", "POST", Some("application/json"))
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let log = Arc::new(EventLog::open(&path).unwrap());
        let tracker = EventLogTracker::new(Arc::clone(&log));
        tracker.track_request("pets.yaml", &key(), false);
        tracker.track_request("pets.yaml", &key(), true);

        let events = EventLog::read(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].valid);
        assert!(events[1].valid);
        assert_eq!(events[1].kind, EventKind::Request);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventLog::read(&dir.path().join("absent.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "\n{not json}\n").unwrap();
        match EventLog::read(&path) {
            Err(EventLogError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn reset_removes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = EventLog::open(&path).unwrap();
        log.append(&CoverageEvent {
            document: "d".into(),
            kind: EventKind::Request,
            key: key(),
            valid: true,
        })
        .unwrap();
        drop(log);
        EventLog::reset(&path).unwrap();
        assert!(EventLog::read(&path).unwrap().is_empty());
        EventLog::reset(&path).unwrap();
    }

    #[test]
    fn replay_produces_same_state_as_direct_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = Arc::new(EventLog::open(&path).unwrap());

        // two "workers" writing to the same file
        let handles: Vec<_> = (0..2)
            .map(|worker| {
                let tracker = EventLogTracker::new(Arc::clone(&log));
                std::thread::spawn(move || {
                    for i in 0..50 {
                        tracker.track_request("pets.yaml", &key(), worker == 1 && i == 49);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let coordinator = LocalTracker::new([Plan::new(
            "pets.yaml",
            vec![key(), TaskKey::request("/pets", "GET", None)],
        )]);
        let events = EventLog::read(&path).unwrap();
        assert_eq!(events.len(), 100);
        let stats = replay(&events, &coordinator);
        assert_eq!(stats, ReplayStats { applied: 100, unmatched: 0 });
        assert_eq!(coordinator.plan("pets.yaml").unwrap().coverage(), Some(50));
    }
}
