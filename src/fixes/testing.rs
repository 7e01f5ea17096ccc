//! Test doubles for the fix engine.
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::default_config;
use crate::error::{CommandFailed, InspectError};
use crate::identity::{FileIdentity, FixTarget};
use crate::netcdf::{FileMetadata, MetadataReader};
use crate::runner::{CommandOutput, CommandRunner, ToolCommand};
use crate::toolkit::Toolkit;

use super::FixContext;

/// Records commands; optionally fails at one index and writes each command's
/// declared output file so scratch handling can be observed.
#[derive(Default)]
pub(crate) struct FakeRunner {
    commands: RefCell<Vec<ToolCommand>>,
    fail_at: Cell<Option<usize>>,
    materialize_outputs: bool,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn materializing() -> Self {
        Self {
            materialize_outputs: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_at(self, index: usize) -> Self {
        self.fail_at.set(Some(index));
        self
    }

    pub(crate) fn commands(&self) -> Vec<ToolCommand> {
        self.commands.borrow().clone()
    }

    pub(crate) fn rendered(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToolCommand::render).collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, CommandFailed> {
        let index = self.commands.borrow().len();
        self.commands.borrow_mut().push(command.clone());
        if self.fail_at.get() == Some(index) {
            return Err(CommandFailed {
                command: command.render(),
                status: "exit status: 1".to_string(),
                output: vec![format!("{}: simulated failure", command.program)],
            });
        }
        if self.materialize_outputs {
            if let Some(output) = &command.output {
                std::fs::write(output, b"tool output").expect("materialize tool output");
            }
        }
        Ok(CommandOutput::default())
    }
}

/// Serves fixed metadata and coordinate values.
#[derive(Default)]
pub(crate) struct MemoryReader {
    pub(crate) metadata: FileMetadata,
    pub(crate) coordinates: BTreeMap<String, Vec<f64>>,
    reads: Cell<usize>,
}

impl MemoryReader {
    pub(crate) fn new(metadata: FileMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub(crate) fn with_coordinate(mut self, variable: &str, values: &[f64]) -> Self {
        self.coordinates.insert(variable.to_string(), values.to_vec());
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl MetadataReader for MemoryReader {
    fn read_metadata(&self, _path: &Path) -> Result<FileMetadata, InspectError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.metadata.clone())
    }

    fn coordinate_values(
        &self,
        _path: &Path,
        variable: &str,
        count: usize,
    ) -> Result<Vec<f64>, InspectError> {
        self.reads.set(self.reads.get() + 1);
        let values = self
            .coordinates
            .get(variable)
            .ok_or_else(|| InspectError::MissingVariable(variable.to_string()))?;
        Ok(values.iter().copied().take(count).collect())
    }
}

pub(crate) fn toolkit() -> Toolkit {
    Toolkit::new(default_config().tools)
}

pub(crate) fn context<'a>(
    runner: &'a dyn CommandRunner,
    reader: &'a dyn MetadataReader,
    toolkit: &'a Toolkit,
) -> FixContext<'a> {
    FixContext {
        runner,
        reader,
        toolkit,
        celsius_units: "degC",
        history_attribute: "history",
    }
}

pub(crate) fn target_in(directory: &Path, file_name: &str) -> FixTarget {
    let identity = FileIdentity::from_file_name(file_name).expect("valid test file name");
    FixTarget::new(file_name, directory, &identity)
}

pub(crate) fn target(file_name: &str) -> FixTarget {
    target_in(Path::new("/data"), file_name)
}
