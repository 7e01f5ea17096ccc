//! Rules book: the JSON-backed store mapping file identities to fix names.
//!
//! A rule names glob criteria over the identity fields plus the fixes it
//! contributes. Selection walks the rules in file order; the result keeps
//! "no rule matched" apart from "rules matched but list no fixes".
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::write_atomic;
use crate::identity::FileIdentity;

/// Current schema version for rules files.
pub const RULES_SCHEMA_VERSION: u32 = 1;

/// Glob criteria over identity fields. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl Criteria {
    fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, pattern)| pattern.is_none())
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("institution", self.institution.as_deref()),
            ("model", self.model.as_deref()),
            ("experiment", self.experiment.as_deref()),
            ("table", self.table.as_deref()),
            ("variable", self.variable.as_deref()),
        ]
    }
}

// `deny_unknown_fields` does not combine with `flatten`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(flatten)]
    pub criteria: Criteria,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<Criteria>,
    #[serde(default)]
    pub fixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBook {
    pub schema_version: u32,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            schema_version: RULES_SCHEMA_VERSION,
            rules: Vec::new(),
        }
    }
}

/// Outcome of a fix lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No rule matched the identity.
    NotFound,
    /// At least one rule matched; its fixes in application order.
    Matched(Vec<String>),
}

/// Anything that can answer "which fixes apply to this file".
pub trait RulesStore {
    fn select_fixes(&self, identity: &FileIdentity) -> Selection;

    /// True when selection depends on the institution, which is read from
    /// file metadata rather than the file name.
    fn needs_institution(&self) -> bool {
        false
    }
}

/// Load a rules book; a missing file is an empty book when `allow_missing`.
pub fn load_rules(path: &Path, allow_missing: bool) -> Result<RuleBook> {
    if allow_missing && !path.exists() {
        tracing::debug!(path = %path.display(), "rules file absent; starting empty");
        return Ok(RuleBook::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read rules {}", path.display()))?;
    let book: RuleBook = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse rules {}", path.display()))?;
    book.validate()
        .with_context(|| format!("validate rules {}", path.display()))?;
    Ok(book)
}

/// Persist a rules book as pretty JSON, replacing any existing file atomically.
pub fn write_rules(path: &Path, book: &RuleBook) -> Result<()> {
    book.validate()?;
    let mut text = serde_json::to_string_pretty(book).context("serialize rules")?;
    text.push('\n');
    write_atomic(path, text.as_bytes())
}

impl RuleBook {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != RULES_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported rules schema_version {}",
                self.schema_version
            ));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            compile_criteria(&rule.criteria).with_context(|| format!("rules[{index}]"))?;
            for (ex_index, exclusion) in rule.exclude.iter().enumerate() {
                if exclusion.is_empty() {
                    return Err(anyhow!(
                        "rules[{index}].exclude[{ex_index}] must name at least one field"
                    ));
                }
                compile_criteria(exclusion)
                    .with_context(|| format!("rules[{index}].exclude[{ex_index}]"))?;
            }
            if let Some(name) = rule.fixes.iter().find(|name| name.trim().is_empty()) {
                return Err(anyhow!("rules[{index}] has an empty fix name {name:?}"));
            }
        }
        Ok(())
    }

    /// Associate `fix` with the rule whose criteria equal `criteria`,
    /// creating that rule when needed. Returns false when already present.
    pub fn add_fix(&mut self, criteria: &Criteria, fix: &str) -> Result<bool> {
        compile_criteria(criteria)?;
        let rule = match self
            .rules
            .iter_mut()
            .position(|rule| &rule.criteria == criteria)
        {
            Some(index) => &mut self.rules[index],
            None => {
                self.rules.push(Rule {
                    criteria: criteria.clone(),
                    ..Rule::default()
                });
                let last = self.rules.len() - 1;
                &mut self.rules[last]
            }
        };
        if rule.fixes.iter().any(|name| name == fix) {
            return Ok(false);
        }
        rule.fixes.push(fix.to_string());
        Ok(true)
    }

    /// Drop `fix` from every rule whose criteria equal `criteria`.
    /// Returns the number of rules changed.
    pub fn remove_fix(&mut self, criteria: &Criteria, fix: &str) -> usize {
        let mut changed = 0;
        for rule in self
            .rules
            .iter_mut()
            .filter(|rule| &rule.criteria == criteria)
        {
            let before = rule.fixes.len();
            rule.fixes.retain(|name| name != fix);
            if rule.fixes.len() != before {
                changed += 1;
            }
        }
        changed
    }

    /// Compile every pattern once for repeated selection.
    pub fn compile(&self) -> Result<CompiledRules> {
        self.validate()?;
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let exclude = rule
                .exclude
                .iter()
                .map(compile_criteria)
                .collect::<Result<Vec<_>>>()?;
            rules.push(CompiledRule {
                criteria: compile_criteria(&rule.criteria)?,
                exclude,
                fixes: rule.fixes.clone(),
            });
        }
        Ok(CompiledRules { rules })
    }
}

#[derive(Debug)]
struct Matcher {
    institution: Option<Regex>,
    model: Option<Regex>,
    experiment: Option<Regex>,
    table: Option<Regex>,
    variable: Option<Regex>,
}

impl Matcher {
    fn matches(&self, identity: &FileIdentity) -> bool {
        let institution_ok = match (&self.institution, identity.institution.as_deref()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(pattern), Some(value)) => pattern.is_match(value),
        };
        institution_ok
            && field_matches(&self.model, &identity.model)
            && field_matches(&self.experiment, &identity.experiment)
            && field_matches(&self.table, &identity.table)
            && field_matches(&self.variable, &identity.variable)
    }
}

fn field_matches(pattern: &Option<Regex>, value: &str) -> bool {
    match pattern {
        Some(pattern) => pattern.is_match(value),
        None => true,
    }
}

#[derive(Debug)]
struct CompiledRule {
    criteria: Matcher,
    exclude: Vec<Matcher>,
    fixes: Vec<String>,
}

/// A validated rules book with its glob patterns compiled.
#[derive(Debug)]
pub struct CompiledRules {
    rules: Vec<CompiledRule>,
}

impl RulesStore for CompiledRules {
    fn select_fixes(&self, identity: &FileIdentity) -> Selection {
        let mut matched = false;
        let mut fixes: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !rule.criteria.matches(identity)
                || rule.exclude.iter().any(|matcher| matcher.matches(identity))
            {
                continue;
            }
            matched = true;
            for name in &rule.fixes {
                if !fixes.contains(name) {
                    fixes.push(name.clone());
                }
            }
        }
        if matched {
            Selection::Matched(fixes)
        } else {
            Selection::NotFound
        }
    }

    fn needs_institution(&self) -> bool {
        self.rules.iter().any(|rule| {
            rule.criteria.institution.is_some()
                || rule.exclude.iter().any(|matcher| matcher.institution.is_some())
        })
    }
}

fn compile_criteria(criteria: &Criteria) -> Result<Matcher> {
    let compile = |label: &str, pattern: Option<&str>| -> Result<Option<Regex>> {
        pattern
            .map(|pattern| {
                if pattern.is_empty() {
                    return Err(anyhow!("{label} pattern must be non-empty"));
                }
                glob_regex(pattern).with_context(|| format!("{label} pattern {pattern:?}"))
            })
            .transpose()
    };
    let [institution, model, experiment, table, variable] = criteria.fields();
    Ok(Matcher {
        institution: compile(institution.0, institution.1)?,
        model: compile(model.0, model.1)?,
        experiment: compile(experiment.0, experiment.1)?,
        table: compile(table.0, table.1)?,
        variable: compile(variable.0, variable.1)?,
    })
}

/// `*` matches any run, `?` one character; everything else is literal.
pub(crate) fn glob_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');
    Ok(Regex::new(&source)?)
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
