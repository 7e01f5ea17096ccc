//! Attribute value model and metadata reading.
//!
//! Metadata is read through the NCO kitchen sink (`ncks --jsn`), so the crate
//! never links a netCDF library.
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{InspectError, ToolKind};
use crate::runner::{CommandRunner, ToolCommand};

/// Attribute storage type, using the attribute-edit tool's type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    Char,
    Double,
    Float,
    Int,
    Short,
}

impl AttrType {
    pub fn code(self) -> &'static str {
        match self {
            AttrType::Char => "c",
            AttrType::Double => "d",
            AttrType::Float => "f",
            AttrType::Int => "i",
            AttrType::Short => "s",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, AttrType::Char)
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttrType::Char => "char",
            AttrType::Double => "double",
            AttrType::Float => "float",
            AttrType::Int => "int",
            AttrType::Short => "short",
        };
        f.write_str(label)
    }
}

/// A single attribute value as read from, or written to, a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Double(f64),
    Int(i64),
    Doubles(Vec<f64>),
}

impl AttrValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttrValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Value as the attribute-edit tool expects it on its command line.
    pub fn render(&self) -> String {
        match self {
            AttrValue::Text(text) => text.clone(),
            // Debug keeps the fractional part: 1080.0 renders as "1080.0".
            AttrValue::Double(value) => format!("{value:?}"),
            AttrValue::Int(value) => value.to_string(),
            AttrValue::Doubles(values) => values
                .iter()
                .map(|value| format!("{value:?}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Global and per-variable attributes of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub global: BTreeMap<String, AttrValue>,
    pub variables: BTreeMap<String, BTreeMap<String, AttrValue>>,
}

impl FileMetadata {
    pub fn global_attribute(&self, name: &str) -> Option<&AttrValue> {
        self.global.get(name)
    }

    pub fn variable_attribute(&self, variable: &str, name: &str) -> Option<&AttrValue> {
        self.variables.get(variable)?.get(name)
    }

    #[cfg(test)]
    pub(crate) fn has_variable(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    #[cfg(test)]
    pub(crate) fn with_global(mut self, name: &str, value: AttrValue) -> Self {
        self.global.insert(name.to_string(), value);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_variable_attribute(mut self, variable: &str, name: &str, value: AttrValue) -> Self {
        self.variables
            .entry(variable.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self
    }
}

pub trait MetadataReader {
    fn read_metadata(&self, path: &Path) -> Result<FileMetadata, InspectError>;

    /// The first `count` values of a coordinate variable.
    fn coordinate_values(
        &self,
        path: &Path,
        variable: &str,
        count: usize,
    ) -> Result<Vec<f64>, InspectError>;
}

/// Reads metadata by running `ncks --jsn` and parsing its JSON.
pub struct NcksReader<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> NcksReader<R> {
    pub fn new(runner: R, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
        }
    }

    fn run_json(&self, command: ToolCommand) -> Result<Value, InspectError> {
        let output = self.runner.run(&command)?;
        Ok(serde_json::from_str(&output.stdout)?)
    }
}

impl<R: CommandRunner> MetadataReader for NcksReader<R> {
    fn read_metadata(&self, path: &Path) -> Result<FileMetadata, InspectError> {
        let command = ToolCommand::new(ToolKind::Kitchen, &self.program)
            .args(["--jsn", "-m", "-M"])
            .arg(path.display().to_string());
        let json = self.run_json(command)?;
        Ok(parse_metadata_json(&json))
    }

    fn coordinate_values(
        &self,
        path: &Path,
        variable: &str,
        count: usize,
    ) -> Result<Vec<f64>, InspectError> {
        let last = count.saturating_sub(1);
        let command = ToolCommand::new(ToolKind::Kitchen, &self.program)
            .args(["--jsn", "-C", "-H", "-v", variable, "-d"])
            .arg(format!("{variable},0,{last}"))
            .arg(path.display().to_string());
        let json = self.run_json(command)?;
        parse_coordinate_json(&json, variable)
    }
}

pub(crate) fn parse_metadata_json(json: &Value) -> FileMetadata {
    let mut metadata = FileMetadata::default();
    if let Some(attributes) = json.get("attributes").and_then(Value::as_object) {
        for (name, raw) in attributes {
            if let Some(value) = attr_value_from_json(raw) {
                metadata.global.insert(name.clone(), value);
            }
        }
    }
    if let Some(variables) = json.get("variables").and_then(Value::as_object) {
        for (variable, body) in variables {
            let entry = metadata.variables.entry(variable.clone()).or_default();
            let Some(attributes) = body.get("attributes").and_then(Value::as_object) else {
                continue;
            };
            for (name, raw) in attributes {
                if let Some(value) = attr_value_from_json(raw) {
                    entry.insert(name.clone(), value);
                }
            }
        }
    }
    metadata
}

pub(crate) fn parse_coordinate_json(json: &Value, variable: &str) -> Result<Vec<f64>, InspectError> {
    let body = json
        .get("variables")
        .and_then(|variables| variables.get(variable))
        .ok_or_else(|| InspectError::MissingVariable(variable.to_string()))?;
    let values = body
        .get("data")
        .and_then(Value::as_array)
        .map(|data| data.iter().filter_map(Value::as_f64).collect::<Vec<_>>())
        .unwrap_or_default();
    if values.is_empty() {
        return Err(InspectError::NoData {
            variable: variable.to_string(),
        });
    }
    Ok(values)
}

fn attr_value_from_json(raw: &Value) -> Option<AttrValue> {
    match raw {
        Value::String(text) => Some(AttrValue::Text(text.clone())),
        Value::Number(number) => Some(match number.as_i64() {
            Some(int) => AttrValue::Int(int),
            None => AttrValue::Double(number.as_f64()?),
        }),
        Value::Array(items) => array_value(items),
        Value::Object(object) => {
            let data = object.get("data")?;
            let kind = object.get("type").and_then(Value::as_str).unwrap_or("");
            typed_value(kind, data)
        }
        _ => None,
    }
}

fn typed_value(kind: &str, data: &Value) -> Option<AttrValue> {
    match kind {
        "char" | "string" => match data {
            Value::String(text) => Some(AttrValue::Text(text.clone())),
            Value::Array(items) => Some(AttrValue::Text(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            )),
            _ => None,
        },
        "float" | "double" => match data {
            Value::Array(items) => array_value(items),
            other => other.as_f64().map(AttrValue::Double),
        },
        "byte" | "short" | "int" | "int64" | "ubyte" | "ushort" | "uint" | "uint64" => match data {
            Value::Array(items) if items.len() == 1 => items[0].as_i64().map(AttrValue::Int),
            Value::Array(items) => array_value(items),
            other => other.as_i64().map(AttrValue::Int),
        },
        _ => attr_value_from_json(data),
    }
}

fn array_value(items: &[Value]) -> Option<AttrValue> {
    if items.len() == 1 {
        return attr_value_from_json(&items[0]);
    }
    let values: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
    if values.len() != items.len() {
        return None;
    }
    Some(AttrValue::Doubles(values))
}
