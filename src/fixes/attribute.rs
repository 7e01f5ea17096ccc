//! Lifecycle stages for the attribute kinds (Add, Update, Copy, Delete).
use crate::error::FixErrorKind;
use crate::identity::FixTarget;
use crate::netcdf::{AttrType, AttrValue, FileMetadata, MetadataReader};
use crate::numeric::{coerce_float, coerce_int};
use crate::toolkit::EditMode;

use super::{
    AddRule, AttributeTarget, CopyRule, Existing, FixContext, FixOperation, Literal, ScopeRule,
    UpdateRule,
};

const HTTP: &str = "http:";
const HTTPS: &str = "https:";

pub(super) fn read_existing(
    operation: &FixOperation,
    target: &FixTarget,
    reader: &dyn MetadataReader,
) -> Result<Existing, FixErrorKind> {
    match operation {
        FixOperation::Update {
            target: attribute_target,
            rule,
            ..
        } => {
            let (attribute, scope) = require_target(attribute_target)?;
            let metadata = load(reader, target)?;
            let value = lookup(&metadata, scope, attribute, target)?;
            let auxiliary = match rule {
                UpdateRule::HttpsProtocolWithToken { source, .. } => {
                    Some(lookup(&metadata, ScopeRule::Global, source, target)?)
                }
                _ => None,
            };
            Ok(Existing {
                value: Some(value),
                auxiliary,
            })
        }
        FixOperation::Copy { rule, .. } => {
            let metadata = load(reader, target)?;
            let value = match *rule {
                CopyRule::Global { source } => {
                    lookup(&metadata, ScopeRule::Global, source, target)?
                }
                CopyRule::Variable { variable, source } => {
                    lookup(&metadata, variable, source, target)?
                }
            };
            Ok(Existing {
                value: Some(value),
                auxiliary: None,
            })
        }
        FixOperation::Add { .. } | FixOperation::Delete { .. } | FixOperation::Data(_) => {
            Ok(Existing::default())
        }
    }
}

pub(super) fn compute_new_value(
    operation: &FixOperation,
    target: &FixTarget,
    existing: &Existing,
) -> Result<Option<AttrValue>, FixErrorKind> {
    match operation {
        FixOperation::Add { rule, .. } => Ok(Some(match rule {
            AddRule::Constant(literal) => literal.to_value(),
            AddRule::Generated(generate) => generate(target),
        })),
        FixOperation::Update {
            target: attribute_target,
            rule,
            ..
        } => {
            let name = display_name(attribute_target, target);
            let value = existing_value(existing, &name)?;
            update_value(*rule, &name, value, existing.auxiliary.as_ref()).map(Some)
        }
        FixOperation::Copy {
            target: attribute_target,
            attr_type,
            ..
        } => {
            let name = display_name(attribute_target, target);
            let value = existing_value(existing, &name)?;
            convert_for_type(&name, value, *attr_type).map(Some)
        }
        FixOperation::Delete { .. } | FixOperation::Data(_) => Ok(None),
    }
}

pub(super) fn execute(
    operation: &FixOperation,
    target: &FixTarget,
    new_value: Option<&AttrValue>,
    ctx: &FixContext<'_>,
) -> Result<(), FixErrorKind> {
    let path = target.path();
    let command = match operation {
        FixOperation::Delete {
            target: attribute_target,
        } => {
            let (attribute, scope) = require_target(attribute_target)?;
            ctx.toolkit
                .delete_attribute(attribute, &scope.resolve(target), &path)
        }
        FixOperation::Add {
            target: attribute_target,
            attr_type,
            ..
        }
        | FixOperation::Update {
            target: attribute_target,
            attr_type,
            ..
        }
        | FixOperation::Copy {
            target: attribute_target,
            attr_type,
            ..
        } => {
            let (attribute, scope) = require_target(attribute_target)?;
            let value = new_value.ok_or(FixErrorKind::InstanceVariableNotDefined {
                field: "new_value",
            })?;
            ctx.toolkit
                .edit_attribute(
                    attribute,
                    &scope.resolve(target),
                    EditMode::Overwrite,
                    *attr_type,
                    value,
                    &path,
                )
                .map_err(|err| FixErrorKind::AttributeConversion {
                    attribute: err.attribute,
                    value: value.render(),
                    target: *attr_type,
                })?
        }
        FixOperation::Data(_) => return Ok(()),
    };
    ctx.runner
        .run(&command)
        .map_err(|source| FixErrorKind::ExternalCommand {
            tool: command.tool,
            source,
        })?;
    Ok(())
}

fn require_target(target: &AttributeTarget) -> Result<(&'static str, ScopeRule), FixErrorKind> {
    let attribute = target
        .attribute
        .ok_or(FixErrorKind::InstanceVariableNotDefined {
            field: "attribute_name",
        })?;
    let scope = target
        .scope
        .ok_or(FixErrorKind::InstanceVariableNotDefined {
            field: "attribute_visibility",
        })?;
    Ok((attribute, scope))
}

fn load(reader: &dyn MetadataReader, target: &FixTarget) -> Result<FileMetadata, FixErrorKind> {
    reader
        .read_metadata(&target.path())
        .map_err(FixErrorKind::Inspection)
}

/// `attribute` for globals, `variable.attribute` for variable scope.
fn qualified_name(scope: ScopeRule, attribute: &str, target: &FixTarget) -> String {
    if scope.is_global() {
        attribute.to_string()
    } else {
        format!("{}.{attribute}", scope.resolve(target))
    }
}

fn display_name(attribute_target: &AttributeTarget, target: &FixTarget) -> String {
    match (attribute_target.attribute, attribute_target.scope) {
        (Some(attribute), Some(scope)) => qualified_name(scope, attribute, target),
        (Some(attribute), None) => attribute.to_string(),
        (None, _) => "<undefined>".to_string(),
    }
}

fn lookup(
    metadata: &FileMetadata,
    scope: ScopeRule,
    attribute: &str,
    target: &FixTarget,
) -> Result<AttrValue, FixErrorKind> {
    let found = if scope.is_global() {
        metadata.global_attribute(attribute)
    } else {
        metadata.variable_attribute(&scope.resolve(target), attribute)
    };
    found
        .cloned()
        .ok_or_else(|| FixErrorKind::AttributeNotFound {
            attribute: qualified_name(scope, attribute, target),
        })
}

fn existing_value<'e>(existing: &'e Existing, name: &str) -> Result<&'e AttrValue, FixErrorKind> {
    existing
        .value
        .as_ref()
        .ok_or_else(|| FixErrorKind::AttributeNotFound {
            attribute: name.to_string(),
        })
}

fn update_value(
    rule: UpdateRule,
    name: &str,
    value: &AttrValue,
    auxiliary: Option<&AttrValue>,
) -> Result<AttrValue, FixErrorKind> {
    match rule {
        UpdateRule::CoerceDouble => coerce_double_value(name, value),
        UpdateRule::CoerceInt => coerce_int_value(name, value),
        UpdateRule::HttpsProtocol => https_rewrite(name, value).map(AttrValue::Text),
        UpdateRule::HttpsProtocolWithToken { token, source } => {
            let rewritten = https_rewrite(name, value)?;
            let replacement = auxiliary.ok_or_else(|| FixErrorKind::AttributeNotFound {
                attribute: source.to_string(),
            })?;
            Ok(AttrValue::Text(
                rewritten.replace(token, &replacement.render()),
            ))
        }
        UpdateRule::ReplaceExpected {
            expected,
            replacement,
        } => {
            if !matches_literal(value, expected) {
                return Err(FixErrorKind::ExistingAttribute {
                    attribute: name.to_string(),
                    detail: format!(
                        "is {:?}, expected {:?}",
                        value.render(),
                        expected.to_value().render()
                    ),
                });
            }
            Ok(replacement.to_value())
        }
    }
}

fn coerce_double_value(name: &str, value: &AttrValue) -> Result<AttrValue, FixErrorKind> {
    match value {
        AttrValue::Double(double) => Ok(AttrValue::Double(*double)),
        AttrValue::Int(int) => Ok(AttrValue::Double(*int as f64)),
        other => {
            let text = other.render();
            coerce_float(&text)
                .map(AttrValue::Double)
                .ok_or_else(|| conversion_error(name, text, AttrType::Double))
        }
    }
}

fn coerce_int_value(name: &str, value: &AttrValue) -> Result<AttrValue, FixErrorKind> {
    match value {
        AttrValue::Int(int) => Ok(AttrValue::Int(*int)),
        other => {
            let text = other.render();
            coerce_int(&text)
                .map(AttrValue::Int)
                .ok_or_else(|| conversion_error(name, text, AttrType::Int))
        }
    }
}

/// Convert a copied value to the destination attribute's storage type.
fn convert_for_type(
    name: &str,
    value: &AttrValue,
    attr_type: AttrType,
) -> Result<AttrValue, FixErrorKind> {
    match attr_type {
        AttrType::Char => Ok(AttrValue::Text(value.render())),
        AttrType::Double | AttrType::Float => coerce_double_value(name, value),
        AttrType::Int | AttrType::Short => match value {
            AttrValue::Double(double) if double.fract() == 0.0 => Ok(AttrValue::Int(*double as i64)),
            AttrValue::Double(double) => Err(conversion_error(name, format!("{double:?}"), attr_type)),
            other => coerce_int_value(name, other),
        },
    }
}

fn conversion_error(name: &str, value: String, target: AttrType) -> FixErrorKind {
    FixErrorKind::AttributeConversion {
        attribute: name.to_string(),
        value,
        target,
    }
}

/// Replace the first `http:` with `https:`; the value must start with `http:`.
fn https_rewrite(name: &str, value: &AttrValue) -> Result<String, FixErrorKind> {
    let text = value.as_text().ok_or_else(|| FixErrorKind::ExistingAttribute {
        attribute: name.to_string(),
        detail: format!("is not text ({:?})", value.render()),
    })?;
    if !text.starts_with(HTTP) {
        return Err(FixErrorKind::ExistingAttribute {
            attribute: name.to_string(),
            detail: format!("does not start with {HTTP} ({text:?})"),
        });
    }
    Ok(text.replacen(HTTP, HTTPS, 1))
}

fn matches_literal(value: &AttrValue, expected: Literal) -> bool {
    match (value, expected) {
        (AttrValue::Text(text), Literal::Text(expected)) => text == expected,
        (AttrValue::Double(double), Literal::Double(expected)) => *double == expected,
        (AttrValue::Int(int), Literal::Int(expected)) => *int == expected,
        (AttrValue::Int(int), Literal::Double(expected)) => *int as f64 == expected,
        (AttrValue::Double(double), Literal::Int(expected)) => *double == expected as f64,
        _ => false,
    }
}
