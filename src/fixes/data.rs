//! Data transforms: fixes that rewrite variable data, not just metadata.
//!
//! Each transform writes into scratch files beside the target and only the
//! final step renames a finished scratch file over the original.
use std::path::PathBuf;

use crate::error::{FixErrorKind, InspectError};
use crate::identity::FixTarget;
use crate::netcdf::{AttrType, AttrValue};
use crate::runner::ToolCommand;
use crate::scratch::ScratchFiles;
use crate::toolkit::EditMode;

use super::FixContext;

const KELVIN_OFFSET: &str = "273.15f";
const KELVIN_LABELS: [&str; 6] = ["K", "kelvin", "Kelvin", "degK", "deg_K", "degrees_K"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTransform {
    /// Flip a decreasing coordinate (and its bounds) to increasing order.
    ReverseAxis {
        axis: &'static str,
        bounds: &'static str,
        bounds_dimension: &'static str,
    },
    /// Convert the lead variable from Kelvin to Celsius.
    KelvinToCelsius,
}

/// True when a units string names Kelvin.
pub fn is_kelvin(units: &str) -> bool {
    KELVIN_LABELS.contains(&units.trim())
}

impl DataTransform {
    pub fn describe(&self) -> String {
        match self {
            DataTransform::ReverseAxis { axis, .. } => format!("reverse {axis}"),
            DataTransform::KelvinToCelsius => "K to degC".to_string(),
        }
    }

    pub(super) fn check_precondition(
        &self,
        target: &FixTarget,
        ctx: &FixContext<'_>,
    ) -> Result<(), FixErrorKind> {
        let path = target.path();
        match self {
            DataTransform::ReverseAxis { axis, .. } => {
                let values = ctx
                    .reader
                    .coordinate_values(&path, axis, 2)
                    .map_err(|err| match err {
                        InspectError::MissingVariable(_) => FixErrorKind::AttributeNotFound {
                            attribute: axis.to_string(),
                        },
                        other => FixErrorKind::Inspection(other),
                    })?;
                match values.as_slice() {
                    [first, second, ..] if first > second => Ok(()),
                    _ => Err(FixErrorKind::ExistingAttribute {
                        attribute: axis.to_string(),
                        detail: format!("is not decreasing ({values:?})"),
                    }),
                }
            }
            DataTransform::KelvinToCelsius => {
                let metadata = ctx
                    .reader
                    .read_metadata(&path)
                    .map_err(FixErrorKind::Inspection)?;
                let name = format!("{}.units", target.variable);
                let units = metadata
                    .variable_attribute(&target.variable, "units")
                    .ok_or_else(|| FixErrorKind::AttributeNotFound {
                        attribute: name.clone(),
                    })?;
                match units.as_text() {
                    Some(text) if is_kelvin(text) => Ok(()),
                    _ => Err(FixErrorKind::ExistingAttribute {
                        attribute: name,
                        detail: format!("is {:?}, not Kelvin", units.render()),
                    }),
                }
            }
        }
    }

    pub(super) fn execute(
        &self,
        target: &FixTarget,
        ctx: &FixContext<'_>,
    ) -> Result<(), FixErrorKind> {
        match *self {
            DataTransform::ReverseAxis {
                axis,
                bounds,
                bounds_dimension,
            } => reverse_axis(target, ctx, axis, bounds, bounds_dimension),
            DataTransform::KelvinToCelsius => kelvin_to_celsius(target, ctx),
        }
    }
}

fn reverse_axis(
    target: &FixTarget,
    ctx: &FixContext<'_>,
    axis: &str,
    bounds: &str,
    bounds_dimension: &str,
) -> Result<(), FixErrorKind> {
    let original = target.path();
    let reversed = target.sibling(&format!("{axis}_reversed.tmp"));
    let bounds_extract = target.sibling(&format!("{bounds}.tmp"));
    let bounds_fixed = target.sibling(&format!("{bounds}_fixed.tmp"));
    let scratch = ScratchFiles::new(
        vec![reversed.clone(), bounds_extract.clone(), bounds_fixed.clone()],
        ctx.runner.mutates(),
    );
    scratch.clear_leftovers().map_err(io_error)?;

    let kit = ctx.toolkit;
    run(ctx, kit.reverse_dimension(axis, &original, &reversed))?;
    run(ctx, kit.extract_variable(bounds, &reversed, &bounds_extract))?;
    run(
        ctx,
        kit.reverse_dimension(bounds_dimension, &bounds_extract, &bounds_fixed),
    )?;
    run(
        ctx,
        kit.delete_attribute(ctx.history_attribute, "global", &bounds_fixed),
    )?;
    run(ctx, kit.append_variable(bounds, &bounds_fixed, &reversed))?;

    scratch.publish(&reversed, &original).map_err(io_error)
}

fn kelvin_to_celsius(target: &FixTarget, ctx: &FixContext<'_>) -> Result<(), FixErrorKind> {
    let original = target.path();
    let converted = target.sibling("degC.tmp");
    let scratch = ScratchFiles::new(vec![converted.clone()], ctx.runner.mutates());
    scratch.clear_leftovers().map_err(io_error)?;

    let variable = &target.variable;
    let expression = format!("{variable}={variable}-{KELVIN_OFFSET}");
    run(ctx, ctx.toolkit.arithmetic(&expression, &original, &converted))?;
    let units = ctx
        .toolkit
        .edit_attribute(
            "units",
            variable,
            EditMode::Overwrite,
            AttrType::Char,
            &AttrValue::text(ctx.celsius_units),
            &converted,
        )
        .map_err(|err| FixErrorKind::AttributeConversion {
            attribute: err.attribute,
            value: ctx.celsius_units.to_string(),
            target: AttrType::Char,
        })?;
    run(ctx, units)?;

    scratch.publish(&converted, &original).map_err(io_error)
}

fn run(ctx: &FixContext<'_>, command: ToolCommand) -> Result<(), FixErrorKind> {
    ctx.runner
        .run(&command)
        .map(|_| ())
        .map_err(|source| FixErrorKind::ExternalCommand {
            tool: command.tool,
            source,
        })
}

fn io_error((path, source): (PathBuf, std::io::Error)) -> FixErrorKind {
    FixErrorKind::Io { path, source }
}
