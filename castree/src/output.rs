//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use castree_core::{ContentId, DirectoryRecord};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an intermediate line in text mode. JSON mode reports everything
    /// in the final document instead.
    pub fn progress(&self, text_fn: impl FnOnce() -> String) -> Result<()> {
        if self.format == OutputFormat::Text {
            writeln!(&self.stdout, "{}", text_fn())?;
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message and its causes.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

/// One line per directory record: content id, size, path.
pub fn record_line(record: &DirectoryRecord) -> String {
    format!("{} {:>12} {}", record.cid, record.size, record.path)
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// Output for `add` and `import` commands.
#[derive(Debug, Serialize)]
pub struct FlushOutput {
    pub success: bool,
    pub result_code: u8,
    pub source: String,
    pub files: usize,
    pub dry_run: bool,
    /// Root directory id, absent when no entry had a containing directory.
    pub root: Option<ContentId>,
    pub directories: Vec<DirectoryRecord>,
}

/// Link information for `ls` command.
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub name: String,
    pub size: u64,
    pub cid: ContentId,
}

/// Output for `ls` command.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: ContentId,
    pub links: Vec<LinkInfo>,
}

/// Directory statistics for `stat` command.
#[derive(Debug, Serialize)]
pub struct DirectoryStatInfo {
    pub cid: ContentId,
    pub link_count: usize,
    pub cumulative_size: u64,
    pub size_on_disk: u64,
    pub path: String,
}

/// Blob statistics for `stat` command.
#[derive(Debug, Serialize)]
pub struct BlobStatInfo {
    pub cid: ContentId,
    pub size: u64,
    pub size_on_disk: u64,
    pub path: String,
}

/// Data variants for `stat` command.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatData {
    Directory(DirectoryStatInfo),
    Blob(BlobStatInfo),
}

/// Output for `stat` command.
#[derive(Debug, Serialize)]
pub struct StatOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub data: StatData,
}
