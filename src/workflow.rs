//! Command implementations behind the CLI.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::{ApplyArgs, ConfigInitArgs, FixesArgs, RuleEditArgs, SelectArgs, ToolsArgs};
use crate::config::{
    default_config, load_effective_config, resolve_config_path, user_config_path, write_atomic,
    write_config,
};
use crate::fixes::{lookup, FixCatalog, FixContext, FixDescriptor, FixOperation};
use crate::identity::FileIdentity;
use crate::netcdf::NcksReader;
use crate::rules::{load_rules, write_rules, RulesStore, Selection};
use crate::runner::{CommandRunner, DryRunRunner, ProcessRunner};
use crate::submission::{BatchReport, FileReport, FileStatus, Submission};
use crate::toolkit::Toolkit;

/// Returns false when any file failed.
pub fn run_apply(args: ApplyArgs) -> Result<bool> {
    let config = load_effective_config(args.config.as_deref())?;
    let store = load_rules(&args.rules, false)?.compile()?;
    let catalog = FixCatalog::default();
    let toolkit = Toolkit::new(config.tools.clone());
    let reader = NcksReader::new(ProcessRunner, &config.tools.ncks);
    let dry_run = DryRunRunner::default();
    let runner: &dyn CommandRunner = if args.dry_run {
        &dry_run
    } else {
        &ProcessRunner
    };
    let ctx = FixContext {
        runner,
        reader: &reader,
        toolkit: &toolkit,
        celsius_units: &config.celsius_units,
        history_attribute: &config.history_attribute,
    };

    let batch = Submission::new(&store, &catalog, ctx).process_batch(args.files.as_slice());

    if args.dry_run {
        for command in dry_run.recorded() {
            println!("would run: {}", command.render());
        }
    }
    match args.report.as_deref() {
        Some(path) if path == Path::new("-") => print_json(&batch)?,
        Some(path) => {
            let text = serde_json::to_string_pretty(&batch).context("serialize batch report")?;
            write_atomic(path, text.as_bytes())?;
            print_summary(&batch);
            println!("wrote {}", path.display());
        }
        None => print_summary(&batch),
    }
    Ok(!batch.has_failures())
}

fn print_summary(batch: &BatchReport) {
    for file in &batch.files {
        println!("{}", summary_line(file));
    }
    println!(
        "{} fixed, {} failed, {} skipped",
        batch.fixed, batch.failed, batch.skipped
    );
}

fn summary_line(file: &FileReport) -> String {
    let status = match file.status {
        FileStatus::Fixed => "fixed",
        FileStatus::NoRules => "no rules",
        FileStatus::NoFixes => "no fixes",
        FileStatus::Failed => "FAILED",
        FileStatus::InvalidName => "invalid name",
    };
    let mut line = format!("{status}: {}", file.path.display());
    if !file.applied.is_empty() {
        let names: Vec<&str> = file.applied.iter().map(|fix| fix.fix.as_str()).collect();
        line.push_str(&format!(" [{}]", names.join(", ")));
    }
    if let Some(failure) = &file.failure {
        line.push_str(&format!(" ({})", failure.error));
    }
    line
}

pub fn run_select(args: SelectArgs) -> Result<()> {
    let store = load_rules(&args.rules, false)?.compile()?;
    let identity = match (&args.file, args.identity()) {
        (Some(file), _) => FileIdentity::from_path(file)
            .with_context(|| format!("identity of {}", file.display()))?
            .with_institution(args.institution.clone()),
        (None, Some(identity)) => identity,
        (None, None) => return Err(anyhow!("provide a FILE or all identity flags")),
    };
    match store.select_fixes(&identity) {
        Selection::NotFound => println!("not found"),
        Selection::Matched(names) => {
            if names.is_empty() {
                tracing::info!("matched rules list no fixes");
            }
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FixListing {
    name: &'static str,
    kind: String,
    attribute: String,
    scope: String,
}

fn listing(fix: &FixDescriptor) -> FixListing {
    let (attribute, scope) = match (&fix.operation, fix.attribute_target()) {
        (FixOperation::Data(transform), _) => (transform.describe(), "data".to_string()),
        (_, Some(target)) => (
            target.attribute.unwrap_or("?").to_string(),
            target
                .scope
                .map(|scope| scope.label().to_string())
                .unwrap_or_else(|| "?".to_string()),
        ),
        (_, None) => ("?".to_string(), "?".to_string()),
    };
    FixListing {
        name: fix.name,
        kind: fix.kind().to_string(),
        attribute,
        scope,
    }
}

pub fn run_fixes(args: FixesArgs) -> Result<()> {
    let catalog = FixCatalog::default();
    let listings: Vec<FixListing> = catalog.all().iter().map(listing).collect();
    if args.json {
        return print_json(&listings);
    }
    for entry in listings {
        println!(
            "{:<44} {:<7} {}@{}",
            entry.name, entry.kind, entry.attribute, entry.scope
        );
    }
    Ok(())
}

pub fn run_tools(args: ToolsArgs) -> Result<()> {
    let config = load_effective_config(args.config.as_deref())?;
    let mut missing = Vec::new();
    for (label, program) in config.tools.entries() {
        match which::which(program) {
            Ok(path) => println!("{label}: {}", path.display()),
            Err(err) => {
                println!("{label}: {program} not found ({err})");
                missing.push(label);
            }
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("missing tools: {}", missing.join(", ")))
    }
}

pub fn run_rules_add(args: RuleEditArgs) -> Result<()> {
    if lookup(&args.fix).is_none() {
        return Err(anyhow!(
            "unknown fix {} (see `ncfix fixes` for the catalog)",
            args.fix
        ));
    }
    let mut book = load_rules(&args.rules, true)?;
    if book.add_fix(&args.criteria(), &args.fix)? {
        write_rules(&args.rules, &book)?;
        println!("added {} to {}", args.fix, args.rules.display());
    } else {
        println!("{} already present", args.fix);
    }
    Ok(())
}

pub fn run_rules_remove(args: RuleEditArgs) -> Result<()> {
    let mut book = load_rules(&args.rules, false)?;
    let changed = book.remove_fix(&args.criteria(), &args.fix);
    if changed > 0 {
        write_rules(&args.rules, &book)?;
    }
    println!("removed {} from {changed} rule(s)", args.fix);
    Ok(())
}

pub fn run_config_init(args: ConfigInitArgs) -> Result<()> {
    let path = config_init_path(args.path.as_deref())?;
    if path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(&path, &default_config())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn config_init_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    resolve_config_path(None)
        .or_else(user_config_path)
        .ok_or_else(|| anyhow!("no config directory on this platform; pass --path"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize JSON output")?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::{AppliedFix, FixFailure};

    #[test]
    fn listing_describes_attribute_and_data_fixes() {
        let attribute = listing(lookup("ProductAdd").expect("known fix"));
        assert_eq!(attribute.kind, "add");
        assert_eq!(attribute.attribute, "product");
        assert_eq!(attribute.scope, "global");

        let data = listing(lookup("ToDegC").expect("known fix"));
        assert_eq!(data.kind, "data");
        assert_eq!(data.scope, "data");
    }

    #[test]
    fn summary_line_lists_applied_fixes_and_failure() {
        let report = FileReport {
            path: PathBuf::from("/data/tas_Amon_M_e.nc"),
            identity: None,
            status: FileStatus::Failed,
            applied: vec![AppliedFix {
                fix: "ProductAdd".to_string(),
                timestamp: "2024-03-05T12:00:00Z".to_string(),
            }],
            failure: Some(FixFailure {
                fix: Some("ToDegC".to_string()),
                error: "boom".to_string(),
            }),
        };
        assert_eq!(
            summary_line(&report),
            "FAILED: /data/tas_Amon_M_e.nc [ProductAdd] (boom)"
        );
    }
}
