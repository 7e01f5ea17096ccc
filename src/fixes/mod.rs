//! Fix taxonomy and the per-file application lifecycle.
//!
//! Every fix is a static [`FixDescriptor`]: a name plus one [`FixOperation`]
//! variant carrying the attribute target, storage type and value rule. Binding
//! a descriptor to a file yields a [`FixApplication`], which walks
//! `read_existing -> compute_new_value -> execute`. A failed check in the
//! first two stages returns before any external command runs.
use std::fmt;

use serde::Serialize;

use crate::error::{FixError, FixErrorKind};
use crate::identity::FixTarget;
use crate::netcdf::{AttrType, AttrValue, MetadataReader};
use crate::runner::CommandRunner;
use crate::toolkit::Toolkit;

mod attribute;
pub mod catalog;
mod data;

pub use catalog::{lookup, FixCatalog};
pub use data::DataTransform;

/// The five fix kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    Add,
    Update,
    Copy,
    Delete,
    DataTransform,
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FixKind::Add => "add",
            FixKind::Update => "update",
            FixKind::Copy => "copy",
            FixKind::Delete => "delete",
            FixKind::DataTransform => "data",
        };
        f.write_str(label)
    }
}

/// Where an attribute lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    Global,
    /// The file's lead variable (first field of the file name).
    LeadVariable,
    Variable(&'static str),
}

impl ScopeRule {
    /// The scope string the attribute-edit tool expects.
    pub fn resolve(self, target: &FixTarget) -> String {
        match self {
            ScopeRule::Global => "global".to_string(),
            ScopeRule::LeadVariable => target.variable.clone(),
            ScopeRule::Variable(name) => name.to_string(),
        }
    }

    pub fn is_global(self) -> bool {
        matches!(self, ScopeRule::Global)
    }

    pub fn label(self) -> &'static str {
        match self {
            ScopeRule::Global => "global",
            ScopeRule::LeadVariable => "<variable>",
            ScopeRule::Variable(name) => name,
        }
    }
}

/// A compile-time attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Text(&'static str),
    Double(f64),
    Int(i64),
}

impl Literal {
    pub fn to_value(self) -> AttrValue {
        match self {
            Literal::Text(text) => AttrValue::text(text),
            Literal::Double(value) => AttrValue::Double(value),
            Literal::Int(value) => AttrValue::Int(value),
        }
    }
}

/// The attribute a fix edits. Fields are optional so an incompletely
/// declared fix is reported instead of producing a malformed command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeTarget {
    pub attribute: Option<&'static str>,
    pub scope: Option<ScopeRule>,
}

impl AttributeTarget {
    pub const fn global(attribute: &'static str) -> Self {
        Self {
            attribute: Some(attribute),
            scope: Some(ScopeRule::Global),
        }
    }

    pub const fn lead_variable(attribute: &'static str) -> Self {
        Self {
            attribute: Some(attribute),
            scope: Some(ScopeRule::LeadVariable),
        }
    }

    pub const fn variable(variable: &'static str, attribute: &'static str) -> Self {
        Self {
            attribute: Some(attribute),
            scope: Some(ScopeRule::Variable(variable)),
        }
    }
}

/// Value rule for [`FixKind::Add`]: no existing state is read.
#[derive(Debug, Clone, Copy)]
pub enum AddRule {
    Constant(Literal),
    /// Minted fresh on each application (tracking ids, timestamps).
    Generated(fn(&FixTarget) -> AttrValue),
}

/// Value rule for [`FixKind::Update`]: a function of the existing value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateRule {
    CoerceDouble,
    CoerceInt,
    /// Replace the leading `http:` with `https:`.
    HttpsProtocol,
    /// [`UpdateRule::HttpsProtocol`], then replace `token` with the value of
    /// the global attribute `source`.
    HttpsProtocolWithToken {
        token: &'static str,
        source: &'static str,
    },
    /// Only replace when the existing value equals `expected`.
    ReplaceExpected {
        expected: Literal,
        replacement: Literal,
    },
}

/// Value rule for [`FixKind::Copy`]: read a different attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CopyRule {
    Global { source: &'static str },
    Variable {
        variable: ScopeRule,
        source: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum FixOperation {
    Add {
        target: AttributeTarget,
        attr_type: AttrType,
        rule: AddRule,
    },
    Update {
        target: AttributeTarget,
        attr_type: AttrType,
        rule: UpdateRule,
    },
    Copy {
        target: AttributeTarget,
        attr_type: AttrType,
        rule: CopyRule,
    },
    Delete {
        target: AttributeTarget,
    },
    Data(DataTransform),
}

/// A named fix.
#[derive(Debug, Clone, Copy)]
pub struct FixDescriptor {
    pub name: &'static str,
    pub operation: FixOperation,
}

impl FixDescriptor {
    pub fn kind(&self) -> FixKind {
        match self.operation {
            FixOperation::Add { .. } => FixKind::Add,
            FixOperation::Update { .. } => FixKind::Update,
            FixOperation::Copy { .. } => FixKind::Copy,
            FixOperation::Delete { .. } => FixKind::Delete,
            FixOperation::Data(_) => FixKind::DataTransform,
        }
    }

    pub fn attribute_target(&self) -> Option<&AttributeTarget> {
        match &self.operation {
            FixOperation::Add { target, .. }
            | FixOperation::Update { target, .. }
            | FixOperation::Copy { target, .. }
            | FixOperation::Delete { target } => Some(target),
            FixOperation::Data(_) => None,
        }
    }

    /// Bind this fix to one file.
    pub fn bind(&self, target: FixTarget) -> FixApplication<'_> {
        FixApplication {
            descriptor: self,
            target,
            existing: Existing::default(),
            new_value: None,
            stage: FixStage::Created,
        }
    }
}

/// Everything a fix needs from the outside world.
#[derive(Clone, Copy)]
pub struct FixContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub reader: &'a dyn MetadataReader,
    pub toolkit: &'a Toolkit,
    pub celsius_units: &'a str,
    pub history_attribute: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStage {
    Created,
    ReadExisting,
    ComputedNewValue,
    Done,
}

/// Values read from the file before computing the new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Existing {
    /// The edited attribute (Update) or the copy source (Copy).
    pub(crate) value: Option<AttrValue>,
    /// A second attribute some update rules read at the same time.
    pub(crate) auxiliary: Option<AttrValue>,
}

/// One fix bound to one file; applied once, then discarded.
#[derive(Debug)]
pub struct FixApplication<'d> {
    descriptor: &'d FixDescriptor,
    target: FixTarget,
    existing: Existing,
    new_value: Option<AttrValue>,
    stage: FixStage,
}

impl FixApplication<'_> {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn stage(&self) -> FixStage {
        self.stage
    }

    pub fn new_value(&self) -> Option<&AttrValue> {
        self.new_value.as_ref()
    }

    fn error(&self, kind: FixErrorKind) -> FixError {
        FixError::new(self.descriptor.name, self.target.path(), kind)
    }

    /// Read the state the value rule depends on, or check a data-transform
    /// precondition. A no-op for Add and Delete.
    pub fn read_existing(&mut self, ctx: &FixContext<'_>) -> Result<(), FixError> {
        let existing = match &self.descriptor.operation {
            FixOperation::Data(transform) => {
                transform
                    .check_precondition(&self.target, ctx)
                    .map_err(|kind| self.error(kind))?;
                Existing::default()
            }
            operation => attribute::read_existing(operation, &self.target, ctx.reader)
                .map_err(|kind| self.error(kind))?,
        };
        self.existing = existing;
        self.stage = FixStage::ReadExisting;
        Ok(())
    }

    pub fn compute_new_value(&mut self) -> Result<(), FixError> {
        let new_value =
            attribute::compute_new_value(&self.descriptor.operation, &self.target, &self.existing)
                .map_err(|kind| self.error(kind))?;
        self.new_value = new_value;
        self.stage = FixStage::ComputedNewValue;
        Ok(())
    }

    /// Run the external commands. Only reached after both checks pass.
    pub fn execute(&mut self, ctx: &FixContext<'_>) -> Result<(), FixError> {
        let result = match &self.descriptor.operation {
            FixOperation::Data(transform) => transform.execute(&self.target, ctx),
            operation => {
                attribute::execute(operation, &self.target, self.new_value.as_ref(), ctx)
            }
        };
        result.map_err(|kind| self.error(kind))?;
        self.stage = FixStage::Done;
        tracing::info!(
            fix = self.descriptor.name,
            file = %self.target.file_name,
            value = ?self.new_value().map(AttrValue::render),
            "fix applied"
        );
        Ok(())
    }

    /// Run all three stages; the first failure stops the fix.
    pub fn apply(mut self, ctx: &FixContext<'_>) -> Result<(), FixError> {
        let result = self.run_stages(ctx);
        if result.is_err() {
            tracing::debug!(fix = self.name(), stage = ?self.stage(), "fix stopped");
        }
        result
    }

    fn run_stages(&mut self, ctx: &FixContext<'_>) -> Result<(), FixError> {
        self.read_existing(ctx)?;
        self.compute_new_value()?;
        self.execute(ctx)
    }
}

#[cfg(test)]
pub(crate) mod testing;
