use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaxrunError {
    #[error("plan file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("plan name is empty after stripping the extension of {path}")]
    InvalidName { path: PathBuf },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot create output directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr_tail: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl MaxrunError {
    /// Process exit code for this failure. The planning tool's own code is
    /// mirrored verbatim; provisioner errors use a small distinct range.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidName { .. } | Self::InvalidParameter { .. } | Self::Config(_) => 2,
            Self::InputNotFound { .. } => 3,
            Self::DirectoryCreation { .. } => 4,
            Self::Launch { .. } => 5,
            Self::ToolFailed { code, .. } => *code,
            Self::Other(_) => 1,
        }
    }

    /// Render a diagnostic for the terminal. For tool failures this appends
    /// a bounded excerpt of the child's stderr.
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolFailed {
                tool,
                code,
                stderr_tail,
            } => {
                if stderr_tail.trim().is_empty() {
                    format!("{tool} exited with code {code}")
                } else {
                    // Take the tail (last 400 chars); the tool logs progress
                    // banners first and the actual error at the end.
                    let preview: String = stderr_tail
                        .chars()
                        .rev()
                        .take(400)
                        .collect::<Vec<_>>()
                        .into_iter()
                        .rev()
                        .collect();
                    let prefix = if preview.len() < stderr_tail.len() {
                        "..."
                    } else {
                        ""
                    };
                    format!("{tool} exited with code {code}: {prefix}{preview}")
                }
            }
            other => other.to_string(),
        }
    }
}
