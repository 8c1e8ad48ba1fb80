//! Line-delimited JSON output file

use crate::output::traits::OutputResult;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one JSON document per line to a file
///
/// Every line is flushed as soon as it is written, so an interrupted run
/// leaves a file of complete lines.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl JsonlWriter {
    /// Opens the output file
    ///
    /// # Arguments
    ///
    /// * `path` - Output file path, created if missing
    /// * `append` - Keep existing lines instead of truncating
    pub fn create(path: &Path, append: bool) -> OutputResult<Self> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };

        tracing::debug!(path = %path.display(), append, "opened jsonl output");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Writes `value` as a single line and flushes
    pub fn write_line<T: Serialize>(&mut self, value: &T) -> OutputResult<()> {
        let line = serde_json::to_string(value)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written through this writer
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
