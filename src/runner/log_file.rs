//! Per-stage log file.
//!
//! Every raw line from both streams is appended with a single `write_all`, so
//! an interrupted stage leaves a valid prefix and the handle stays usable.

use chrono::Local;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct StageLog {
    file: File,
    path: PathBuf,
}

impl StageLog {
    /// Open (append) the log and write a header for this run.
    pub fn open(path: &Path, stage: &str, command: &str) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let header = format!("=== {} started {} ===\n$ {}\n", stage, Local::now().to_rfc3339(), command);
        file.write_all(header.as_bytes())?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one raw line verbatim, terminating it if the stream did not.
    pub fn write_raw(&mut self, data: &[u8]) {
        let result = if data.ends_with(b"\n") {
            self.file.write_all(data)
        } else {
            let mut line = data.to_vec();
            line.push(b'\n');
            self.file.write_all(&line)
        };
        if let Err(e) = result {
            warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }

    /// Append a footer describing how the run ended.
    pub fn finish(&mut self, stage: &str, status: &str) {
        let footer = format!("=== {} finished {}: {} ===\n", stage, Local::now().to_rfc3339(), status);
        self.write_raw(footer.as_bytes());
    }
}
