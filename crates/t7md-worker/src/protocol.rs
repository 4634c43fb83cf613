//! Line protocol spoken on stdout to the host application.
//!
//! ```text
//! PROGRESS|42
//! SUCCESS|/path/to/analysis.json
//! ERROR|reason
//! ```

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolLine {
    Progress(u8),
    Success(PathBuf),
    Error(String),
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolLine::Progress(pct) => write!(f, "PROGRESS|{}", pct),
            ProtocolLine::Success(path) => write!(f, "SUCCESS|{}", path.display()),
            // One line per message
            ProtocolLine::Error(reason) => write!(f, "ERROR|{}", reason.replace(['\r', '\n'], " ")),
        }
    }
}

/// Writes protocol lines, suppressing progress that does not advance.
pub struct ProtocolWriter<W: Write> {
    out: W,
    last_percent: Option<u8>,
}

impl<W: Write> ProtocolWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_percent: None,
        }
    }

    /// Emit `PROGRESS|pct` only when `pct` is above the last one sent.
    pub fn progress(&mut self, percent: u8) -> std::io::Result<()> {
        let percent = percent.min(100);
        if self.last_percent.is_some_and(|last| percent <= last) {
            return Ok(());
        }
        self.last_percent = Some(percent);
        self.line(&ProtocolLine::Progress(percent))
    }

    pub fn success(&mut self, metadata_path: &Path) -> std::io::Result<()> {
        self.line(&ProtocolLine::Success(metadata_path.to_path_buf()))
    }

    pub fn error(&mut self, reason: &str) -> std::io::Result<()> {
        self.line(&ProtocolLine::Error(reason.to_string()))
    }

    fn line(&mut self, line: &ProtocolLine) -> std::io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
