use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::diff::diff_json;

/// How response bodies are written to the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Every response body in full.
    Full,
    /// The first response per path in full, later ones as leaf changes.
    Diffed,
}

/// NDJSON log of the traffic with the vendor cloud.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: HashMap<String, Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    /// Errors and empty bodies are always written in full so a failing
    /// exchange can be read without its predecessors.
    pub fn log_response(&mut self, path: &str, status: u16, body: &Value) {
        let diffable = self.mode == MessageLogMode::Diffed
            && !body.is_null()
            && (200..300).contains(&status);
        if !diffable {
            let entry = response_entry(path, status, "body", body.clone());
            self.write_line(&entry);
            return;
        }

        let entry = match self.previous.get(path) {
            None => {
                let mut entry = response_entry(path, status, "body", body.clone());
                entry["full"] = Value::Bool(true);
                entry
            }
            Some(prev) => {
                let mut changes = Vec::new();
                diff_json(prev, body, "", &mut changes);
                let changes = changes
                    .into_iter()
                    .map(|c| json!({ "path": c.path, "old": c.old, "new": c.new }))
                    .collect();
                response_entry(path, status, "changes", Value::Array(changes))
            }
        };
        self.write_line(&entry);
        self.previous.insert(path.to_string(), body.clone());
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

fn response_entry(path: &str, status: u16, key: &str, payload: Value) -> Value {
    let mut entry = json!({
        "ts": Utc::now().to_rfc3339(),
        "dir": "resp",
        "path": path,
        "status": status,
    });
    entry[key] = payload;
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, tmp.path()).unwrap();
        logger.log_request("GET", "setup", None);

        let lines = read_lines(tmp.path());
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert_eq!(lines[0]["path"], "setup");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, tmp.path()).unwrap();

        logger.log_response("setup", 200, &json!({"gateways": [{"alive": true}]}));
        logger.log_response("setup", 200, &json!({"gateways": [{"alive": false}]}));

        let lines = read_lines(tmp.path());
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 1);
        assert_eq!(lines[1]["changes"][0]["path"], "gateways");
    }

    #[test]
    fn diffed_mode_tracks_paths_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, tmp.path()).unwrap();

        logger.log_response("setup", 200, &json!({"devices": []}));
        logger.log_response("actionGroups", 200, &json!([]));
        logger.log_response("setup", 200, &json!({"devices": []}));

        let lines = read_lines(tmp.path());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn error_responses_are_logged_in_full() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, tmp.path()).unwrap();
        logger.log_response("login", 401, &json!({"error": "Bad credentials"}));

        let lines = read_lines(tmp.path());
        assert_eq!(lines[0]["status"], 401);
        assert_eq!(lines[0]["body"]["error"], "Bad credentials");
    }
}
