//! End-to-end loading of a small rule tree from disk.

use std::fs;

use sigma_rules::collection::CollectionError;
use sigma_rules::validation::{SigmaValidator, ValidatorRegistry};
use sigma_rules::{RuleLoader, SourceOrigin};

const BASE_RULE: &str = r#"
title: Failed Logon
id: 0e95725d-7320-415d-80f7-004da920fc11
name: failed_logon
status: stable
date: 2022-10-01
logsource:
  product: windows
  service: security
detection:
  selection:
    EventID: 4625
  condition: selection
level: low
"#;

const CORRELATION_RULE: &str = r#"
title: Logon Brute Force
id: 0e95725d-7320-415d-80f7-004da920fc12
status: test
date: 2022-10-02
correlation:
  type: event_count
  rules:
    - failed_logon
  group-by:
    - TargetUserName
  timespan: 10m
level: high
"#;

#[test]
fn forward_reference_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let correlation = dir.path().join("a_correlation.yml");
    let base = dir.path().join("b_base.yml");
    fs::write(&correlation, CORRELATION_RULE).unwrap();
    fs::write(&base, BASE_RULE).unwrap();

    let mut collection = RuleLoader::new().load_ruleset(&[correlation, base]);
    collection.resolve_rule_references();

    assert!(collection.errors.is_empty(), "{:?}", collection.errors);
    let resolved = &collection.rules[0].as_correlation().unwrap().resolved;
    assert_eq!(resolved, &vec![1]);
}

#[test]
fn broken_file_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.yml");
    let broken = dir.path().join("broken.yml");
    fs::write(&good, BASE_RULE).unwrap();
    fs::write(&broken, "title: [unclosed\n").unwrap();

    let collection = RuleLoader::new().load_ruleset(&[broken.clone(), good]);
    assert_eq!(collection.len(), 1);
    assert!(matches!(
        &collection.errors[..],
        [CollectionError::Yaml { origin: SourceOrigin::File(p), .. }] if p == &broken
    ));
}

#[test]
fn loaded_rules_validate_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yml");
    fs::write(&base, format!("{}---{}", BASE_RULE, CORRELATION_RULE)).unwrap();

    let mut collection = RuleLoader::new().load_ruleset(&[base]);
    collection.resolve_rule_references();
    let mut validator = SigmaValidator::excluding(&ValidatorRegistry::builtin(), &[]);
    let issues = validator.validate_rules(&collection);
    assert!(issues.is_empty(), "{:?}", issues);
}
