use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;

/// Append-only error log for subsystem and sink failures. One line per
/// failure: `<UTC timestamp>\t<subsystem>\t<message>`. Transient per-process
/// errors never reach this file.
pub struct ErrorLog {
    file: File,
}

impl ErrorLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(ErrorLog { file })
    }

    pub fn record(&mut self, subsystem: &str, message: &str) {
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        // A failure to write the error log itself is not worth stopping the
        // loop for.
        let _ = writeln!(self.file, "{ts}\t{subsystem}\t{message}");
    }
}
