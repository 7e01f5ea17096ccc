//! CLI argument parsing.
//!
//! The CLI stays thin: every command maps onto one workflow function.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::identity::FileIdentity;
use crate::rules::Criteria;

#[derive(Parser, Debug)]
#[command(
    name = "ncfix",
    version,
    about = "Apply named metadata and data fixes to CMIP netCDF files",
    after_help = "Examples:\n  ncfix apply --rules rules.json tas_Amon_MPI-ESM1-2-HR_historical_r1i1p1f1_gn_185001-185412.nc\n  ncfix apply --rules rules.json --dry-run data/*.nc\n  ncfix select --rules rules.json --model MPI-ESM1-2-HR --experiment historical --table Amon --variable tas\n  ncfix rules add --rules rules.json --model MPI-ESM1-2-HR --fix ProductAdd\n  ncfix fixes --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Debug-level logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Apply(ApplyArgs),
    Select(SelectArgs),
    Fixes(FixesArgs),
    Tools(ToolsArgs),
    /// Edit fix associations in a rules book
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Manage the tool config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
#[command(about = "Select and apply fixes to each file, in order")]
pub struct ApplyArgs {
    /// Rules book mapping file identities to fix names
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// Tool config (defaults to NCFIX_CONFIG or the user config)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Write the JSON batch report here ("-" for stdout)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// netCDF files to fix
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Show which fixes the rules select for a file or identity")]
pub struct SelectArgs {
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// File whose name carries the identity
    #[arg(
        value_name = "FILE",
        required_unless_present_all = ["model", "experiment", "table", "variable"],
        conflicts_with_all = ["model", "experiment", "table", "variable"]
    )]
    pub file: Option<PathBuf>,

    #[arg(long, requires_all = ["experiment", "table", "variable"])]
    pub model: Option<String>,

    #[arg(long)]
    pub experiment: Option<String>,

    #[arg(long)]
    pub table: Option<String>,

    #[arg(long)]
    pub variable: Option<String>,

    #[arg(long)]
    pub institution: Option<String>,
}

impl SelectArgs {
    /// The identity given by flags, when no file was named.
    pub fn identity(&self) -> Option<FileIdentity> {
        let identity = FileIdentity::new(
            self.model.as_deref()?,
            self.experiment.as_deref()?,
            self.table.as_deref()?,
            self.variable.as_deref()?,
        );
        Some(identity.with_institution(self.institution.clone()))
    }
}

#[derive(Parser, Debug)]
#[command(about = "List the fix catalog")]
pub struct FixesArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Check that the configured NCO tools resolve")]
pub struct ToolsArgs {
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Associate a fix with the rule matching the given criteria
    Add(RuleEditArgs),
    /// Remove a fix from the rule matching the given criteria
    Remove(RuleEditArgs),
}

#[derive(Args, Debug)]
pub struct RuleEditArgs {
    #[arg(long, value_name = "PATH")]
    pub rules: PathBuf,

    /// Fix name from the catalog
    #[arg(long, value_name = "NAME")]
    pub fix: String,

    /// Glob patterns (`*`, `?`) over the identity fields
    #[arg(long)]
    pub institution: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub experiment: Option<String>,
    #[arg(long)]
    pub table: Option<String>,
    #[arg(long)]
    pub variable: Option<String>,
}

impl RuleEditArgs {
    pub fn criteria(&self) -> Criteria {
        Criteria {
            institution: self.institution.clone(),
            model: self.model.clone(),
            experiment: self.experiment.clone(),
            table: self.table.clone(),
            variable: self.variable.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the default config
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Destination (defaults to NCFIX_CONFIG or the user config path)
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}
