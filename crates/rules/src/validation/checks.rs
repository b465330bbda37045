//! Built-in validators.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{IssueRule, Severity, ValidationIssue, Validator};
use crate::schema::RuleDocument;

/// Titles longer than this are flagged.
pub const MAX_TITLE_LENGTH: usize = 110;

const ATTACK_TACTICS: &[&str] = &[
    "reconnaissance",
    "resource_development",
    "initial_access",
    "execution",
    "persistence",
    "privilege_escalation",
    "defense_evasion",
    "credential_access",
    "discovery",
    "lateral_movement",
    "collection",
    "command_and_control",
    "exfiltration",
    "impact",
];

static BUILTIN: [fn() -> Box<dyn Validator>; 7] = [
    || Box::new(IdentifierExistenceValidator),
    || Box::new(IdentifierUniquenessValidator::default()),
    || Box::new(TitleLengthValidator),
    || Box::new(DateExistenceValidator),
    || Box::new(StatusExistenceValidator),
    || Box::new(DuplicateTagValidator),
    || Box::new(AttackTagValidator),
];

pub(super) fn builtin_factories() -> &'static [fn() -> Box<dyn Validator>] {
    &BUILTIN
}

fn issue(
    validator: &dyn Validator,
    issue: &'static str,
    severity: Severity,
    rule: &RuleDocument,
    detail: Option<String>,
) -> ValidationIssue {
    ValidationIssue {
        issue,
        validator: validator.name(),
        severity,
        description: validator.description(),
        rules: vec![IssueRule::of(rule)],
        detail,
    }
}

// ── Single-rule validators ──────────────────────────────────────────

pub struct IdentifierExistenceValidator;

impl Validator for IdentifierExistenceValidator {
    fn name(&self) -> &'static str {
        "identifier_existence"
    }

    fn description(&self) -> &'static str {
        "Rule has no identifier"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        if rule.meta().id.is_some() {
            return Vec::new();
        }
        vec![issue(&*self, "IdentifierExistenceIssue", Severity::Medium, rule, None)]
    }
}

pub struct TitleLengthValidator;

impl Validator for TitleLengthValidator {
    fn name(&self) -> &'static str {
        "title_length"
    }

    fn description(&self) -> &'static str {
        "Rule title is longer than 110 characters"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        let length = rule.meta().title.chars().count();
        if length <= MAX_TITLE_LENGTH {
            return Vec::new();
        }
        vec![issue(
            &*self,
            "TitleLengthIssue",
            Severity::Low,
            rule,
            Some(format!("length={}", length)),
        )]
    }
}

pub struct DateExistenceValidator;

impl Validator for DateExistenceValidator {
    fn name(&self) -> &'static str {
        "date_existence"
    }

    fn description(&self) -> &'static str {
        "Rule has no creation date"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        if rule.meta().date.is_some() {
            return Vec::new();
        }
        vec![issue(&*self, "DateExistenceIssue", Severity::Low, rule, None)]
    }
}

pub struct StatusExistenceValidator;

impl Validator for StatusExistenceValidator {
    fn name(&self) -> &'static str {
        "status_existence"
    }

    fn description(&self) -> &'static str {
        "Rule has no status"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        if rule.meta().status.is_some() {
            return Vec::new();
        }
        vec![issue(&*self, "StatusExistenceIssue", Severity::Low, rule, None)]
    }
}

pub struct DuplicateTagValidator;

impl Validator for DuplicateTagValidator {
    fn name(&self) -> &'static str {
        "duplicate_tag"
    }

    fn description(&self) -> &'static str {
        "The same tag appears more than once"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut issues = Vec::new();
        for tag in &rule.meta().tags {
            if !seen.insert(tag) && reported.insert(tag) {
                issues.push(issue(
                    &*self,
                    "DuplicateTagIssue",
                    Severity::Low,
                    rule,
                    Some(format!("tag={}", tag)),
                ));
            }
        }
        issues
    }
}

/// `t1059`, `t1059.001`, `g0016`, `s0154`.
pub(super) fn is_attack_object_id(name: &str) -> bool {
    let (base, sub) = match name.split_once('.') {
        Some((base, sub)) => (base, Some(sub)),
        None => (name, None),
    };
    let mut chars = base.chars();
    let prefix_ok = matches!(chars.next(), Some('t' | 'g' | 's'));
    let digits = chars.as_str();
    let base_ok = prefix_ok && digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit());
    let sub_ok = match sub {
        None => true,
        Some(sub) => base.starts_with('t') && sub.len() == 3 && sub.chars().all(|c| c.is_ascii_digit()),
    };
    base_ok && sub_ok
}

pub struct AttackTagValidator;

impl Validator for AttackTagValidator {
    fn name(&self) -> &'static str {
        "attack_tag"
    }

    fn description(&self) -> &'static str {
        "ATT&CK tag is neither a known tactic nor a technique, group or software id"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        rule.meta()
            .tags_in("attack")
            .filter(|tag| !ATTACK_TACTICS.contains(&tag.name.as_str()) && !is_attack_object_id(&tag.name))
            .map(|tag| {
                issue(
                    &*self,
                    "InvalidAttackTagIssue",
                    Severity::Medium,
                    rule,
                    Some(format!("tag={}", tag)),
                )
            })
            .collect()
    }
}

// ── Cross-rule validators ───────────────────────────────────────────

/// Reports identifiers shared by more than one rule.
#[derive(Default)]
pub struct IdentifierUniquenessValidator {
    seen: IndexMap<String, Vec<IssueRule>>,
}

impl Validator for IdentifierUniquenessValidator {
    fn name(&self) -> &'static str {
        "identifier_uniqueness"
    }

    fn description(&self) -> &'static str {
        "Rule identifier is used by more than one rule"
    }

    fn validate(&mut self, rule: &RuleDocument) -> Vec<ValidationIssue> {
        if let Some(id) = &rule.meta().id {
            self.seen.entry(id.clone()).or_default().push(IssueRule::of(rule));
        }
        Vec::new()
    }

    fn finalize(&mut self) -> Vec<ValidationIssue> {
        let seen = std::mem::take(&mut self.seen);
        seen.into_iter()
            .filter(|(_, rules)| rules.len() > 1)
            .map(|(id, rules)| ValidationIssue {
                issue: "IdentifierCollisionIssue",
                validator: self.name(),
                severity: Severity::High,
                description: self.description(),
                rules,
                detail: Some(format!("identifier={}", id)),
            })
            .collect()
    }
}
