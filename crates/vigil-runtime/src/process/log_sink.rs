//! File-backed process log.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;
use vigil_core::ProcessLogSink;

/// Appends `<timestamp> [<stream>] <line>` records to a file.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Open (or create) the file in append mode, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProcessLogSink for FileLogSink {
    fn append(&self, stream_type: &str, line: &str) {
        let record = format!(
            "{} [{stream_type}] {line}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ")
        );
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = file.write_all(record.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "Failed to write process log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("process.log");

        let sink = FileLogSink::open(&path).unwrap();
        sink.append("stdout", "hello");
        sink.append("stderr", "oops");

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[stdout] hello"));
        assert!(lines[1].ends_with("[stderr] oops"));
    }
}
