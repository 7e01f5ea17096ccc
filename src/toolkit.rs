//! NCO command builders.
//!
//! Each builder returns a structured [`ToolCommand`]; nothing here runs a
//! process. Program names come from the tool configuration.
use std::path::Path;

use crate::config::ToolPaths;
use crate::error::ToolKind;
use crate::netcdf::{AttrType, AttrValue};
use crate::runner::ToolCommand;

/// Attribute-edit modes understood by `ncatted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Overwrite,
    Append,
    Delete,
}

impl EditMode {
    fn code(self) -> &'static str {
        match self {
            EditMode::Overwrite => "o",
            EditMode::Append => "a",
            EditMode::Delete => "d",
        }
    }
}

/// The value cannot be passed to the attribute-edit tool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attribute value for {attribute} contains a NUL byte")]
pub struct UnencodableValue {
    pub attribute: String,
}

#[derive(Debug, Clone)]
pub struct Toolkit {
    tools: ToolPaths,
}

impl Toolkit {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    /// `ncatted -h -a <attr>,<scope>,<mode>,<type>,<value> <path>`
    pub fn edit_attribute(
        &self,
        attribute: &str,
        scope: &str,
        mode: EditMode,
        attr_type: AttrType,
        value: &AttrValue,
        path: &Path,
    ) -> Result<ToolCommand, UnencodableValue> {
        let rendered = value.render();
        if rendered.contains('\0') {
            return Err(UnencodableValue {
                attribute: attribute.to_string(),
            });
        }
        let encoded = if attr_type.is_text() {
            escape_text_value(&rendered)
        } else {
            rendered
        };
        let spec = format!(
            "{attribute},{scope},{},{},{encoded}",
            mode.code(),
            attr_type.code()
        );
        Ok(ToolCommand::new(ToolKind::AttributeEdit, &self.tools.ncatted)
            .args(["-h", "-a"])
            .arg(spec)
            .arg(path_arg(path)))
    }

    /// `ncatted -h -a <attr>,<scope>,d,, <path>`
    pub fn delete_attribute(&self, attribute: &str, scope: &str, path: &Path) -> ToolCommand {
        ToolCommand::new(ToolKind::AttributeEdit, &self.tools.ncatted)
            .args(["-h", "-a"])
            .arg(format!("{attribute},{scope},{},,", EditMode::Delete.code()))
            .arg(path_arg(path))
    }

    /// `ncap2 -h -O -s <expression> <input> <output>`
    pub fn arithmetic(&self, expression: &str, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(ToolKind::Arithmetic, &self.tools.ncap2)
            .args(["-h", "-O", "-s", expression])
            .arg(path_arg(input))
            .arg(path_arg(output))
            .writes(output)
    }

    /// `ncpdq -h -O -a -<dimension> <input> <output>` reverses a dimension.
    pub fn reverse_dimension(&self, dimension: &str, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(ToolKind::Permute, &self.tools.ncpdq)
            .args(["-h", "-O", "-a"])
            .arg(format!("-{dimension}"))
            .arg(path_arg(input))
            .arg(path_arg(output))
            .writes(output)
    }

    /// `ncks -h -O -v <variable> <input> <output>`
    pub fn extract_variable(&self, variable: &str, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(ToolKind::Kitchen, &self.tools.ncks)
            .args(["-h", "-O", "-v", variable])
            .arg(path_arg(input))
            .arg(path_arg(output))
            .writes(output)
    }

    /// `ncks -h -A -v <variable> <input> <output>` splices a variable into an
    /// existing file, replacing any variable of the same name.
    pub fn append_variable(&self, variable: &str, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(ToolKind::Kitchen, &self.tools.ncks)
            .args(["-h", "-A", "-v", variable])
            .arg(path_arg(input))
            .arg(path_arg(output))
    }
}

/// `ncatted` splits the `-a` argument on commas; literal commas in character
/// values must be backslash-escaped.
fn escape_text_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ',' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
