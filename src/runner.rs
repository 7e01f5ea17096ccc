//! External command execution.
//!
//! Commands are structured argument lists, never shell strings. Rendering to a
//! single line only happens for logs and error messages.
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use crate::error::{CommandFailed, ToolKind};

/// One invocation of an external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub tool: ToolKind,
    pub program: String,
    pub args: Vec<String>,
    /// File the command writes, when it produces a new output file.
    pub output: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(tool: ToolKind, program: &str) -> Self {
        Self {
            tool,
            program: program.to_string(),
            args: Vec::new(),
            output: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn writes(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Shell-quoted command line; character values come out single-quoted.
    pub fn render(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

fn merge_lines(stdout: &str, stderr: &str) -> Vec<String> {
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::to_string)
        .collect()
}

pub trait CommandRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, CommandFailed>;

    /// False for runners that only record commands; filesystem side effects
    /// around the commands must be skipped too.
    fn mutates(&self) -> bool {
        true
    }
}

/// Runs commands as child processes and waits for each to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, CommandFailed> {
        let rendered = command.render();
        tracing::debug!(command = %rendered, "run external command");
        let start = Instant::now();
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|err| CommandFailed {
                command: rendered.clone(),
                status: format!("spawn failed: {err}"),
                output: Vec::new(),
            })?;
        let elapsed_ms = start.elapsed().as_millis();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        tracing::info!(
            elapsed_ms,
            tool = %command.tool,
            stdout_bytes = output.stdout.len(),
            "external command complete"
        );

        if !output.status.success() {
            return Err(CommandFailed {
                command: rendered,
                status: output.status.to_string(),
                output: merge_lines(&stdout, &stderr),
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    recorded: RefCell<Vec<ToolCommand>>,
}

impl DryRunRunner {
    pub fn recorded(&self) -> Vec<ToolCommand> {
        self.recorded.borrow().clone()
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, CommandFailed> {
        tracing::info!(command = %command.render(), "dry run: would run");
        self.recorded.borrow_mut().push(command.clone());
        Ok(CommandOutput::default())
    }

    fn mutates(&self) -> bool {
        false
    }
}
