use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod error;
mod fixes;
mod identity;
mod logging;
mod netcdf;
mod numeric;
mod provenance;
mod rules;
mod runner;
mod scratch;
mod submission;
mod toolkit;
mod workflow;

use cli::{Command, ConfigCommand, RootArgs, RulesCommand};

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    logging::init(logging::Verbosity::from_flags(args.verbose, args.quiet));

    match args.command {
        Command::Apply(args) => {
            if workflow::run_apply(args)? {
                return Ok(ExitCode::SUCCESS);
            }
            return Ok(ExitCode::FAILURE);
        }
        Command::Select(args) => workflow::run_select(args)?,
        Command::Fixes(args) => workflow::run_fixes(args)?,
        Command::Tools(args) => workflow::run_tools(args)?,
        Command::Rules(RulesCommand::Add(args)) => workflow::run_rules_add(args)?,
        Command::Rules(RulesCommand::Remove(args)) => workflow::run_rules_remove(args)?,
        Command::Config(ConfigCommand::Init(args)) => workflow::run_config_init(args)?,
    }
    Ok(ExitCode::SUCCESS)
}
