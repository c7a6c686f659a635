use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::merge::diff_json;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Full,
    Diffed,
}

struct JournalState {
    file: File,
    previous: HashMap<(String, &'static str), Value>,
}

/// NDJSON record of realtime traffic and outbound commands. Write failures
/// are logged and swallowed.
pub struct MessageJournal {
    mode: JournalMode,
    state: Mutex<JournalState>,
}

impl MessageJournal {
    pub fn open(mode: JournalMode, path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            state: Mutex::new(JournalState {
                file,
                previous: HashMap::new(),
            }),
        })
    }

    pub fn mode(&self) -> JournalMode {
        self.mode
    }

    pub fn log_command(&self, operation: &str, serial: &str, variables: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "operation": operation,
            "serial": serial,
            "variables": variables,
        });
        self.write_line(&entry);
    }

    pub fn log_frame(&self, raw: &str) {
        let entry = match self.mode {
            JournalMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "frame",
                "body": raw,
            }),
            JournalMode::Diffed => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "frame",
                "bytes": raw.len(),
            }),
        };
        self.write_line(&entry);
    }

    /// Records a merged `document` ("status" or "config") of one system.
    /// In diffed mode the first record per document is written in full.
    pub fn log_merge(&self, serial: &str, document: &'static str, state: &Value) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = match self.mode {
            JournalMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "merge",
                "serial": serial,
                "document": document,
                "body": state,
            }),
            JournalMode::Diffed => {
                let key = (serial.to_string(), document);
                let entry = match guard.previous.get(&key) {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "merge",
                        "serial": serial,
                        "document": document,
                        "full": true,
                        "body": state,
                    }),
                    Some(prev) => {
                        let mut changes = Vec::new();
                        diff_json(prev, state, "", &mut changes);
                        let change_entries: Vec<Value> = changes
                            .iter()
                            .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                            .collect();
                        json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "merge",
                            "serial": serial,
                            "document": document,
                            "changes": change_entries,
                        })
                    }
                };
                guard.previous.insert(key, state.clone());
                entry
            }
        };
        write_entry(&mut guard.file, &entry);
    }

    fn write_line(&self, entry: &Value) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        write_entry(&mut guard.file, entry);
    }
}

fn write_entry(file: &mut File, entry: &Value) {
    if let Ok(line) = serde_json::to_string(entry)
        && let Err(e) = writeln!(file, "{line}")
    {
        warn!("failed to write journal entry: {e}");
    }
}
