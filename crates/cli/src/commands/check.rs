use anyhow::Result;
use indexmap::IndexMap;
use sigma_rules::condition::check_conditions;
use sigma_rules::validation::{SigmaValidator, ValidationIssue, ValidatorRegistry};
use sigma_rules::{CollectionError, RuleDocument, SigmaCollection};
use tracing::{debug, info};

use super::{load_rules, Outcome};
use crate::cli::CheckArgs;
use crate::config::CliConfig;
use crate::error::CliError;
use crate::plugins::Plugins;
use crate::terminal::Terminal;

/// Check rules for errors and run the validators over the valid ones.
pub fn run(args: &CheckArgs, plugins: &Plugins, terminal: &Terminal) -> Result<Outcome> {
    let mut validator = build_validator(args, &plugins.validators, terminal)?;
    debug!(validators = ?validator.validator_names(), "validators selected");

    let rules = load_rules(&args.input, &args.file_pattern)?;
    let report = CheckReport::collect(&rules, &mut validator);
    info!(
        rule_errors = report.rule_error_count(),
        condition_errors = report.condition_error_count(),
        issues = report.issues.len(),
        "check finished"
    );

    print_report(&report, terminal)?;

    if report.failed(args.fails_on_error(), args.fails_on_issues()) {
        terminal.print_failure("Check failure")?;
        return Ok(Outcome::Failure);
    }
    Ok(Outcome::Success)
}

/// Validators from the validation config, or all registered ones minus `--exclude`.
fn build_validator(args: &CheckArgs, registry: &ValidatorRegistry, terminal: &Terminal) -> Result<SigmaValidator> {
    if let Some(path) = CliConfig::locate_validation_config(args.validation_config.as_deref()) {
        if !args.exclude.is_empty() {
            terminal.print_notice(
                "A configuration file and the `--exclude` parameter was set, ignoring the `--exclude` parameter.",
            )?;
        }
        let config = CliConfig::load_validation_config(&path)?;
        let validator = SigmaValidator::from_config(&config, registry).map_err(CliError::from)?;
        return Ok(validator);
    }

    let (valid, invalid): (Vec<String>, Vec<String>) = args
        .exclude
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .partition(|name| registry.contains(name));
    if !invalid.is_empty() {
        terminal.print_notice(&format!(
            "Invalid validator names: {} (see `sigma list validators`)",
            invalid.join(", ")
        ))?;
    }
    if !valid.is_empty() {
        terminal.print_notice(&format!("Ignoring these validators: {}", valid.join(", ")))?;
    }
    Ok(SigmaValidator::excluding(registry, &valid))
}

/// Findings of one check run.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// `(rule label, error)` for every rule and input error.
    pub rule_errors: Vec<(String, String)>,
    /// Rule error category -> count.
    pub rule_error_kinds: IndexMap<String, usize>,
    /// `(rule label, error)` for every condition problem.
    pub condition_errors: Vec<(String, String)>,
    pub issues: Vec<ValidationIssue>,
}

impl CheckReport {
    /// Rules with parse errors or broken conditions are reported and not
    /// passed to the validators.
    pub fn collect(rules: &SigmaCollection, validator: &mut SigmaValidator) -> Self {
        let mut report = Self::default();

        for error in &rules.errors {
            let label = error
                .path()
                .map_or_else(|| "<input>".to_string(), |p| p.display().to_string());
            report.add_rule_error(label, collection_error_kind(error), error.to_string());
        }

        let mut checkable: Vec<&RuleDocument> = Vec::new();
        for rule in rules.iter() {
            if !rule.is_valid() {
                for error in rule.errors() {
                    report.add_rule_error(rule.label(), error.kind.as_str(), error.to_string());
                }
                continue;
            }
            match rule.detection() {
                Some(detection) => {
                    let errors = check_conditions(detection);
                    if errors.is_empty() {
                        checkable.push(rule);
                    }
                    for error in errors {
                        report.condition_errors.push((rule.label(), error.to_string()));
                    }
                }
                None => checkable.push(rule),
            }
        }

        report.issues = validator.validate_rules(checkable);
        report
    }

    fn add_rule_error(&mut self, label: String, kind: &str, message: String) {
        *self.rule_error_kinds.entry(kind.to_string()).or_default() += 1;
        self.rule_errors.push((label, message));
    }

    pub fn rule_error_count(&self) -> usize {
        self.rule_errors.len()
    }

    pub fn condition_error_count(&self) -> usize {
        self.condition_errors.len()
    }

    pub fn failed(&self, fail_on_error: bool, fail_on_issues: bool) -> bool {
        let has_errors = self.rule_error_count() > 0 || self.condition_error_count() > 0;
        (fail_on_error && has_errors) || (fail_on_issues && !self.issues.is_empty())
    }

    /// Count table rows, most frequent first.
    pub fn rule_error_rows(&self) -> Vec<Vec<String>> {
        sorted_rows(self.rule_error_kinds.iter().map(|(kind, count)| (*count, vec![kind.clone()])))
    }

    pub fn condition_error_rows(&self) -> Vec<Vec<String>> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for (_, error) in &self.condition_errors {
            *counts.entry(error.as_str()).or_default() += 1;
        }
        sorted_rows(counts.into_iter().map(|(error, count)| (count, vec![error.to_string()])))
    }

    pub fn issue_rows(&self) -> Vec<Vec<String>> {
        let mut counts: IndexMap<&str, (usize, &ValidationIssue)> = IndexMap::new();
        for issue in &self.issues {
            counts.entry(issue.issue).or_insert((0, issue)).0 += 1;
        }
        sorted_rows(counts.into_iter().map(|(name, (count, issue))| {
            (
                count,
                vec![name.to_string(), issue.severity.to_string(), issue.description.to_string()],
            )
        }))
    }
}

fn collection_error_kind(error: &CollectionError) -> &'static str {
    match error {
        CollectionError::Io { .. } => "read error",
        CollectionError::Decode { .. } => "decode error",
        CollectionError::Yaml { .. } => "YAML syntax error",
        CollectionError::UnresolvedReference { .. } => "unresolved reference",
        CollectionError::InvalidFilter { .. } => "invalid filter",
    }
}

/// Prefix each row with its count and order by descending count; ties keep
/// first-seen order.
fn sorted_rows(rows: impl Iterator<Item = (usize, Vec<String>)>) -> Vec<Vec<String>> {
    let mut rows: Vec<(usize, Vec<String>)> = rows.collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter()
        .map(|(count, cells)| std::iter::once(count.to_string()).chain(cells).collect())
        .collect()
}

fn print_report(report: &CheckReport, terminal: &Terminal) -> Result<()> {
    if !report.rule_errors.is_empty() {
        terminal.print_header("Sigma Rule Errors")?;
        for (label, error) in &report.rule_errors {
            terminal.print_line(&format!("{}: {}", label, error))?;
        }
    }
    for (label, error) in &report.condition_errors {
        terminal.print_line(&format!("Condition error in {}: {}", label, error))?;
    }

    if !report.issues.is_empty() {
        terminal.print_header("Issues")?;
        for issue in &report.issues {
            let rules: Vec<&str> = issue.rules.iter().map(|r| r.label.as_str()).collect();
            terminal.print_issue(issue, &rules.join(", "))?;
        }
    }

    terminal.print_line("")?;
    terminal.print_header("Summary")?;
    terminal.print_line(&format!(
        "Found {} errors, {} condition errors and {} issues.",
        report.rule_error_count(),
        report.condition_error_count(),
        report.issues.len()
    ))?;

    if report.rule_errors.is_empty() {
        terminal.print_line("No rule errors found.")?;
    } else {
        terminal.print_line("\nRule error summary:")?;
        terminal.print_table(&["Count", "Rule Error"], &report.rule_error_rows())?;
    }

    if report.condition_errors.is_empty() {
        terminal.print_line("No condition errors found.")?;
    } else {
        terminal.print_line("\nCondition error summary:")?;
        terminal.print_table(&["Count", "Condition Error"], &report.condition_error_rows())?;
    }

    if report.issues.is_empty() {
        terminal.print_line("No validation issues found.")?;
    } else {
        terminal.print_line("\nValidation issue summary:")?;
        terminal.print_table(&["Count", "Issue", "Severity", "Description"], &report.issue_rows())?;
    }
    Ok(())
}
