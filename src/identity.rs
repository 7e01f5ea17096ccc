//! File identity used for fix selection and targeting.
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::IdentityError;

/// The (model, experiment, table, variable) tuple for a file.
///
/// Parsed from `<variable>_<table>_<model>_<experiment>_<variant>_<grid>_<period>.nc`;
/// only the first four fields are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIdentity {
    pub model: String,
    pub experiment: String,
    pub table: String,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

impl FileIdentity {
    pub fn new(model: &str, experiment: &str, table: &str, variable: &str) -> Self {
        Self {
            model: model.to_string(),
            experiment: experiment.to_string(),
            table: table.to_string(),
            variable: variable.to_string(),
            institution: None,
        }
    }

    pub fn with_institution(mut self, institution: Option<String>) -> Self {
        self.institution = institution;
        self
    }

    pub fn from_file_name(file_name: &str) -> Result<Self, IdentityError> {
        let stem = file_name.strip_suffix(".nc").unwrap_or(file_name);
        let fields: Vec<&str> = stem.split('_').collect();
        if fields.len() < 4 {
            return Err(IdentityError::TooFewFields {
                file_name: file_name.to_string(),
                found: fields.len(),
            });
        }
        let labels = ["variable", "table", "model", "experiment"];
        for (field, label) in fields.iter().zip(labels) {
            if field.is_empty() {
                return Err(IdentityError::EmptyField {
                    file_name: file_name.to_string(),
                    field: label,
                });
            }
        }
        Ok(Self::new(fields[2], fields[3], fields[1], fields[0]))
    }

    pub fn from_path(path: &Path) -> Result<Self, IdentityError> {
        let file_name = file_name_of(path)?;
        Self::from_file_name(file_name)
    }
}

fn file_name_of(path: &Path) -> Result<&str, IdentityError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IdentityError::NoFileName(path.display().to_string()))
}

/// The file a fix is bound to, plus its lead variable.
///
/// The lead variable is taken from the identity once and handed to every fix,
/// so variable-scoped edits never re-derive it from the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixTarget {
    pub directory: PathBuf,
    pub file_name: String,
    pub variable: String,
}

impl FixTarget {
    pub fn new(file_name: &str, directory: &Path, identity: &FileIdentity) -> Self {
        Self {
            directory: directory.to_path_buf(),
            file_name: file_name.to_string(),
            variable: identity.variable.clone(),
        }
    }

    /// Bind to a path on disk, parsing its identity.
    pub fn from_path(path: &Path) -> Result<(Self, FileIdentity), IdentityError> {
        let file_name = file_name_of(path)?;
        let identity = FileIdentity::from_file_name(file_name)?;
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        Ok((Self::new(file_name, directory, &identity), identity))
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Sibling path in the same directory, used for scratch outputs.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self.file_name.strip_suffix(".nc").unwrap_or(&self.file_name);
        self.directory.join(format!("{stem}.{suffix}.nc"))
    }
}
