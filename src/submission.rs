//! Submission orchestrator: select, apply and record fixes for one file or a
//! batch of files.
//!
//! Within a file fixes run strictly in order and the first failure stops the
//! file. Across a batch each file is isolated; a failed file is recorded and
//! the next one is processed.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::fixes::{FixCatalog, FixContext};
use crate::identity::{FileIdentity, FixTarget};
use crate::provenance::{append_audit_line, format_timestamp};
use crate::rules::{RulesStore, Selection};

/// Global attribute holding the institution used by institution rules.
const INSTITUTION_ATTRIBUTE: &str = "institution_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Every selected fix applied.
    Fixed,
    /// No rule matched the file's identity.
    NoRules,
    /// Rules matched but list no fixes.
    NoFixes,
    Failed,
    /// The file name does not carry an identity.
    InvalidName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFix {
    pub fix: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixFailure {
    /// The failing fix, when the failure belongs to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<FileIdentity>,
    pub status: FileStatus,
    pub applied: Vec<AppliedFix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FixFailure>,
}

impl FileReport {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            identity: None,
            status,
            applied: Vec::new(),
            failure: None,
        }
    }

    fn fail(mut self, fix: Option<&str>, error: impl ToString) -> Self {
        self.status = FileStatus::Failed;
        self.failure = Some(FixFailure {
            fix: fix.map(str::to_string),
            error: error.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub fixed: usize,
    pub failed: usize,
    /// Files with no rules, no fixes, or an unparseable name.
    pub skipped: usize,
}

impl BatchReport {
    pub fn push(&mut self, report: FileReport) {
        match report.status {
            FileStatus::Fixed => self.fixed += 1,
            FileStatus::Failed => self.failed += 1,
            FileStatus::NoRules | FileStatus::NoFixes | FileStatus::InvalidName => {
                self.skipped += 1
            }
        }
        self.files.push(report);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct Submission<'a> {
    store: &'a dyn RulesStore,
    catalog: &'a FixCatalog,
    ctx: FixContext<'a>,
    clock: Clock,
}

impl<'a> Submission<'a> {
    pub fn new(store: &'a dyn RulesStore, catalog: &'a FixCatalog, ctx: FixContext<'a>) -> Self {
        Self {
            store,
            catalog,
            ctx,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Derive identity, select fixes, and apply them in order.
    pub fn process_file(&self, path: &Path) -> FileReport {
        let (target, identity) = match FixTarget::from_path(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping file");
                let mut report = FileReport::new(path, FileStatus::InvalidName);
                report.failure = Some(FixFailure {
                    fix: None,
                    error: err.to_string(),
                });
                return report;
            }
        };
        let identity = match self.institution(&target) {
            Ok(institution) => identity.with_institution(institution),
            Err(err) => {
                let mut report = FileReport::new(path, FileStatus::Failed);
                report.identity = Some(identity);
                return report.fail(None, err);
            }
        };
        let mut report = FileReport::new(path, FileStatus::Fixed);
        report.identity = Some(identity.clone());

        let names = match self.store.select_fixes(&identity) {
            Selection::NotFound => {
                tracing::info!(file = %target.file_name, "no matching rules");
                report.status = FileStatus::NoRules;
                return report;
            }
            Selection::Matched(names) if names.is_empty() => {
                tracing::info!(file = %target.file_name, "rules list no fixes");
                report.status = FileStatus::NoFixes;
                return report;
            }
            Selection::Matched(names) => names,
        };
        let descriptors = match self.catalog.resolve(&names) {
            Ok(descriptors) => descriptors,
            Err(unknown) => {
                tracing::warn!(file = %target.file_name, fix = %unknown, "unknown fix name");
                let message = format!("unknown fix {unknown}");
                return report.fail(Some(unknown.as_str()), message);
            }
        };

        for descriptor in descriptors {
            if let Err(err) = descriptor.bind(target.clone()).apply(&self.ctx) {
                tracing::warn!(
                    error = %err,
                    untouched = err.is_validation(),
                    "fix failed; skipping remaining fixes"
                );
                return report.fail(Some(descriptor.name), err);
            }
            let at = (self.clock)();
            if let Err(err) = append_audit_line(&self.ctx, &target, descriptor.name, at) {
                tracing::warn!(error = %err, "history update failed");
                return report.fail(Some(descriptor.name), err);
            }
            report.applied.push(AppliedFix {
                fix: descriptor.name.to_string(),
                timestamp: format_timestamp(at),
            });
        }
        report
    }

    /// Process every file; one file's failure never stops the batch.
    pub fn process_batch<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let mut batch = BatchReport::default();
        for path in paths {
            batch.push(self.process_file(path.as_ref()));
        }
        tracing::info!(
            files = batch.files.len(),
            fixed = batch.fixed,
            failed = batch.failed,
            skipped = batch.skipped,
            "batch complete"
        );
        batch
    }

    fn institution(&self, target: &FixTarget) -> Result<Option<String>, String> {
        if !self.store.needs_institution() {
            return Ok(None);
        }
        let metadata = self
            .ctx
            .reader
            .read_metadata(&target.path())
            .map_err(|err| format!("cannot read {INSTITUTION_ATTRIBUTE}: {err}"))?;
        Ok(metadata
            .global_attribute(INSTITUTION_ATTRIBUTE)
            .and_then(|value| value.as_text())
            .map(str::to_string))
    }
}

#[cfg(test)]
#[path = "submission_tests.rs"]
mod tests;
