//! Error taxonomy for fix application.
//!
//! Validation failures (`AttributeNotFound`, `AttributeConversion`,
//! `ExistingAttribute`) are always raised before any external command runs
//! for the fix, so the file on disk is untouched when they occur.
use std::fmt;
use std::path::PathBuf;

use crate::netcdf::AttrType;

/// An external command exited nonzero or could not be spawned.
#[derive(Debug, Clone, thiserror::Error)]
#[error("command failed ({status}): {command}")]
pub struct CommandFailed {
    /// Rendered command line, shell-quoted for copy/paste.
    pub command: String,
    /// Exit status, or the spawn error when the program never started.
    pub status: String,
    /// Captured stdout followed by stderr, one entry per line.
    pub output: Vec<String>,
}

/// Which external tool a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    AttributeEdit,
    Arithmetic,
    Permute,
    Kitchen,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolKind::AttributeEdit => "attribute edit",
            ToolKind::Arithmetic => "arithmetic",
            ToolKind::Permute => "permute",
            ToolKind::Kitchen => "extract/append",
        };
        f.write_str(label)
    }
}

/// Failure reading metadata or coordinate data from a file.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Command(#[from] CommandFailed),
    #[error("metadata JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("variable {0} not present")]
    MissingVariable(String),
    #[error("variable {variable} has no numeric data")]
    NoData { variable: String },
}

/// A fix failed on one file. Carries the fix name and target so failures are
/// traceable to "which fix, which file, which tool".
#[derive(Debug, thiserror::Error)]
#[error("{fix} failed on {}: {kind}", file.display())]
pub struct FixError {
    pub fix: String,
    pub file: PathBuf,
    pub kind: FixErrorKind,
}

impl FixError {
    pub fn new(fix: &str, file: impl Into<PathBuf>, kind: FixErrorKind) -> Self {
        Self {
            fix: fix.to_string(),
            file: file.into(),
            kind,
        }
    }

    /// True when the failure happened before the file could have been touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            FixErrorKind::AttributeNotFound { .. }
                | FixErrorKind::AttributeConversion { .. }
                | FixErrorKind::ExistingAttribute { .. }
                | FixErrorKind::InstanceVariableNotDefined { .. }
                | FixErrorKind::Inspection(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FixErrorKind {
    #[error("attribute {attribute} not found")]
    AttributeNotFound { attribute: String },
    #[error("cannot convert {attribute} value {value:?} to {target}")]
    AttributeConversion {
        attribute: String,
        value: String,
        target: AttrType,
    },
    #[error("existing {attribute} {detail}")]
    ExistingAttribute { attribute: String, detail: String },
    #[error("{field} is not defined")]
    InstanceVariableNotDefined { field: &'static str },
    #[error("{tool} command failed: {source}")]
    ExternalCommand {
        tool: ToolKind,
        #[source]
        source: CommandFailed,
    },
    #[error("cannot inspect file: {0}")]
    Inspection(#[source] InspectError),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file name does not follow `<variable>_<table>_<model>_<experiment>_...`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("path {0} has no UTF-8 file name")]
    NoFileName(String),
    #[error("file name {file_name} has {found} underscore-delimited fields, need at least 4")]
    TooFewFields { file_name: String, found: usize },
    #[error("file name {file_name} has an empty {field} field")]
    EmptyField {
        file_name: String,
        field: &'static str,
    },
}
