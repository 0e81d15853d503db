//! JSONL file writer for script diagnostics.
//!
//! Each [`ScriptDiagnostic`] is serialized as a single JSON line with a
//! `type` field and `timestamp`, appended to the file via a buffered writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tactica_application::DiagnosticSink;
use tactica_domain::ScriptDiagnostic;
use tracing::warn;

/// JSONL diagnostic logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlDiagnosticLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlDiagnosticLogger {
    /// Create a new logger appending to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create diagnostic log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "Could not open diagnostic log file {}: {}",
                    path.display(),
                    e
                );
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiagnosticSink for JsonlDiagnosticLogger {
    fn report(&self, diagnostic: &ScriptDiagnostic) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let Ok(serde_json::Value::Object(mut map)) = serde_json::to_value(diagnostic) else {
            return;
        };
        map.insert(
            "type".to_string(),
            serde_json::Value::String(format!("{}_error", diagnostic.kind.as_str())),
        );
        map.insert(
            "timestamp".to_string(),
            serde_json::Value::String(timestamp),
        );

        let Ok(line) = serde_json::to_string(&map) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // JSONL is append-only; flush each record so a crash keeps earlier ones
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlDiagnosticLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tactica_domain::{DiagnosticKind, MemberAccess, SourceLocation};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        let mut content = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
            .trim()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_jsonl_logger_writes_valid_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/diagnostics.jsonl");
        let logger = JsonlDiagnosticLogger::new(&path).unwrap();

        logger.report(
            &ScriptDiagnostic::member_access("Entity", "xyz", MemberAccess::Read)
                .at(Some(SourceLocation::new("entry.lua", Some(4)))),
        );
        logger.report(
            &ScriptDiagnostic::new(DiagnosticKind::Callback, "boom").with_context("collision #2"),
        );

        // Flush
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for value in &lines {
            assert!(value.get("type").is_some());
            assert!(value.get("timestamp").is_some());
        }

        assert_eq!(lines[0]["type"], "access_error");
        assert_eq!(lines[0]["location"]["file"], "entry.lua");
        assert_eq!(lines[0]["location"]["line"], 4);
        assert_eq!(lines[1]["type"], "callback_error");
        assert_eq!(lines[1]["context"], "collision #2");
    }

    #[test]
    fn test_jsonl_logger_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostics.jsonl");

        for _ in 0..2 {
            let logger = JsonlDiagnosticLogger::new(&path).unwrap();
            logger.report(&ScriptDiagnostic::new(DiagnosticKind::Load, "bad chunk"));
        }

        assert_eq!(read_lines(&path).len(), 2);
    }
}
