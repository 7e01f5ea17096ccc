//! History attribute audit trail.
//!
//! Each successful fix appends `"<timestamp> <FixName>"` to the global
//! history attribute through the attribute-edit tool's append mode.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{FixError, FixErrorKind};
use crate::fixes::FixContext;
use crate::identity::FixTarget;
use crate::netcdf::{AttrType, AttrValue};
use crate::toolkit::EditMode;

/// `ncatted` expands C escapes in character values, so the separator is
/// passed as the two characters `\n`.
const LINE_SEPARATOR: &str = "\\n";

/// `2026-01-31T12:00:00Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn audit_line(fix: &str, at: DateTime<Utc>) -> String {
    format!("{} {fix}", format_timestamp(at))
}

/// Append one audit line for `fix` to the target's history attribute.
pub fn append_audit_line(
    ctx: &FixContext<'_>,
    target: &FixTarget,
    fix: &str,
    at: DateTime<Utc>,
) -> Result<(), FixError> {
    let path = target.path();
    let fail = |kind| FixError::new(fix, &path, kind);
    let metadata = ctx
        .reader
        .read_metadata(&path)
        .map_err(|err| fail(FixErrorKind::Inspection(err)))?;
    let existing = metadata
        .global_attribute(ctx.history_attribute)
        .map(AttrValue::render)
        .unwrap_or_default();

    let mut value = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        value.push_str(LINE_SEPARATOR);
    }
    value.push_str(&audit_line(fix, at));

    let command = ctx
        .toolkit
        .edit_attribute(
            ctx.history_attribute,
            "global",
            EditMode::Append,
            AttrType::Char,
            &AttrValue::text(value.clone()),
            &path,
        )
        .map_err(|err| {
            fail(FixErrorKind::AttributeConversion {
                attribute: err.attribute,
                value: value.clone(),
                target: AttrType::Char,
            })
        })?;
    ctx.runner.run(&command).map_err(|source| {
        fail(FixErrorKind::ExternalCommand {
            tool: command.tool,
            source,
        })
    })?;
    tracing::debug!(fix, file = %target.file_name, "history updated");
    Ok(())
}
