use super::*;
use crate::collection::SigmaCollection;
use crate::schema::SourceOrigin;

fn rules(yaml: &str) -> SigmaCollection {
    SigmaCollection::from_yaml(yaml, SourceOrigin::Stdin)
}

const COMPLETE_RULE: &str = r#"
title: Whoami Execution
id: 8f3c2a5e-0000-4000-8000-000000000001
status: test
date: 2024-02-01
tags:
  - attack.discovery
  - attack.t1033
logsource:
  category: process_creation
  product: windows
detection:
  selection:
    Image|endswith: '\whoami.exe'
  condition: selection
level: medium
"#;

fn issue_names(issues: &[ValidationIssue]) -> Vec<&'static str> {
    issues.iter().map(|i| i.issue).collect()
}

#[test]
fn complete_rule_has_no_issues() {
    let collection = rules(COMPLETE_RULE);
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    assert!(validator.validate_rules(&collection).is_empty());
}

#[test]
fn registry_lists_builtin_validators() {
    let registry = ValidatorRegistry::builtin();
    assert_eq!(
        registry.names(),
        vec![
            "identifier_existence",
            "identifier_uniqueness",
            "title_length",
            "date_existence",
            "status_existence",
            "duplicate_tag",
            "attack_tag",
        ]
    );
    assert!(registry.contains("Title_Length"));
    assert!(!registry.contains("title"));
}

#[test]
fn missing_metadata_issues() {
    let collection = rules(
        r#"
title: Bare rule
logsource:
  product: windows
detection:
  selection:
    EventID: 1
  condition: selection
"#,
    );
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    let issues = validator.validate_rules(&collection);
    assert_eq!(
        issue_names(&issues),
        vec!["IdentifierExistenceIssue", "DateExistenceIssue", "StatusExistenceIssue"]
    );
    assert_eq!(issues[0].severity, Severity::Medium);
    assert_eq!(issues[0].rules[0].label, "<stdin>");
}

#[test]
fn long_title() {
    let yaml = COMPLETE_RULE.replace("Whoami Execution", &"x".repeat(111));
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    let issues = validator.validate_rules(&rules(&yaml));
    assert_eq!(issue_names(&issues), vec!["TitleLengthIssue"]);
    assert_eq!(issues[0].detail.as_deref(), Some("length=111"));

    let yaml = COMPLETE_RULE.replace("Whoami Execution", &"x".repeat(110));
    assert!(validator.validate_rules(&rules(&yaml)).is_empty());
}

#[test]
fn tag_checks() {
    let yaml = COMPLETE_RULE.replace(
        "  - attack.t1033\n",
        "  - attack.t1033\n  - attack.T1033\n  - attack.t99\n  - attack.g0016\n",
    );
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    let issues = validator.validate_rules(&rules(&yaml));
    assert_eq!(issue_names(&issues), vec!["DuplicateTagIssue", "InvalidAttackTagIssue"]);
    assert_eq!(issues[0].detail.as_deref(), Some("tag=attack.t1033"));
    assert_eq!(issues[1].detail.as_deref(), Some("tag=attack.t99"));
}

#[test]
fn attack_object_ids() {
    assert!(checks::is_attack_object_id("t1059"));
    assert!(checks::is_attack_object_id("t1059.001"));
    assert!(checks::is_attack_object_id("s0154"));
    assert!(!checks::is_attack_object_id("g0016.001"));
    assert!(!checks::is_attack_object_id("t105"));
    assert!(!checks::is_attack_object_id("x1059"));
}

#[test]
fn identifier_collision_is_reported_once() {
    let yaml = format!("{}---{}", COMPLETE_RULE, COMPLETE_RULE);
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    let issues = validator.validate_rules(&rules(&yaml));
    assert_eq!(issue_names(&issues), vec!["IdentifierCollisionIssue"]);
    assert_eq!(issues[0].severity, Severity::High);
    assert_eq!(issues[0].rules.len(), 2);
    assert_eq!(issues[0].rules[1].label, "<stdin>#1");
}

#[test]
fn excluding_validators_by_name() {
    let collection = rules("title: t\nlogsource: {}\ndetection: {a: {b: 1}, condition: a}\n");
    let excluded = vec!["DATE_EXISTENCE".to_string(), "status_existence".to_string()];
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &excluded);
    assert!(!validator.validator_names().contains(&"date_existence"));
    let issues = validator.validate_rules(&collection);
    assert_eq!(issue_names(&issues), vec!["IdentifierExistenceIssue"]);
}

#[test]
fn config_selects_and_removes() {
    let config = ValidationConfig::from_yaml("validators:\n  - all\n  - -attack_tag\n  - -duplicate_tag\n").unwrap();
    let validator = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin()).unwrap();
    assert_eq!(
        validator.validator_names(),
        vec![
            "identifier_existence",
            "identifier_uniqueness",
            "title_length",
            "date_existence",
            "status_existence",
        ]
    );

    let config = ValidationConfig::from_yaml("validators: [title_length]\n").unwrap();
    let validator = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin()).unwrap();
    assert_eq!(validator.validator_names(), vec!["title_length"]);
}

#[test]
fn empty_config_means_all() {
    let config = ValidationConfig::default();
    let validator = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin()).unwrap();
    assert_eq!(validator.validator_names().len(), 7);
}

#[test]
fn config_unknown_validator_suggests() {
    let config = ValidationConfig::from_yaml("validators: [title_lenght]\n").unwrap();
    let err = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin())
        .err()
        .unwrap();
    assert_eq!(
        err.to_string(),
        "unknown validator 'title_lenght' (did you mean 'title_length'?)"
    );
}

#[test]
fn config_rejects_unknown_keys() {
    assert!(ValidationConfig::from_yaml("validator: [all]\n").is_err());
}

#[test]
fn config_exclusions_apply_per_rule() {
    let yaml = COMPLETE_RULE.replace("status: test\n", "");
    let config = ValidationConfig::from_yaml(
        "exclusions:\n  8f3c2a5e-0000-4000-8000-000000000001: status_existence\n",
    )
    .unwrap();
    let mut validator = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin()).unwrap();
    assert!(validator.validate_rules(&rules(&yaml)).is_empty());

    let other = yaml.replace("000000000001", "000000000002");
    let issues = validator.validate_rules(&rules(&other));
    assert_eq!(issue_names(&issues), vec!["StatusExistenceIssue"]);
}

#[test]
fn config_exclusions_silence_collisions() {
    let yaml = format!("{}---{}", COMPLETE_RULE, COMPLETE_RULE);
    let config = ValidationConfig::from_yaml(
        "exclusions:\n  8f3c2a5e-0000-4000-8000-000000000001: [identifier_uniqueness]\n",
    )
    .unwrap();
    let mut validator = SigmaValidator::from_config(&config, &ValidatorRegistry::builtin()).unwrap();
    assert!(validator.validate_rules(&rules(&yaml)).is_empty());
}
