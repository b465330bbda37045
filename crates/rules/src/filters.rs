//! Applying filter documents to the rules they name.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::collection::{CollectionError, SigmaCollection};
use crate::condition::{check_conditions, condition_text, grouped, tokenize, ConditionToken};
use crate::schema::{RuleDocument, SearchIdentifier, SigmaFilter};

/// A filter with its searches renamed so they cannot clash with the rule's.
struct PreparedFilter {
    searches: IndexMap<String, SearchIdentifier>,
    condition: String,
}

impl SigmaCollection {
    /// Narrow detection rules with the filter documents in `filters`.
    ///
    /// A filter applies to every detection rule it names by id or name whose
    /// logsource matches the filter's. Its searches are added to the rule
    /// under a `_filterN_` prefix and every rule condition `c` becomes
    /// `c and <filter condition>`. Collection errors of `filters` are carried
    /// over; documents that are not valid filters become collection errors.
    ///
    /// Returns the number of rule/filter pairs applied.
    pub fn apply_filters(&mut self, filters: &SigmaCollection) -> usize {
        self.errors.extend(filters.errors.iter().cloned());
        let mut applied = 0;

        for (index, document) in filters.iter().enumerate() {
            let filter = match document {
                RuleDocument::Filter(filter) => filter,
                _ => {
                    self.errors.push(CollectionError::InvalidFilter {
                        filter: document.label(),
                        message: "document has no filter section".to_string(),
                    });
                    continue;
                }
            };
            let prepared = match prepare(filter, &format!("_filter{}_", index)) {
                Ok(prepared) => prepared,
                Err(message) => {
                    warn!(filter = %document.label(), error = %message, "skipping invalid filter");
                    self.errors.push(CollectionError::InvalidFilter {
                        filter: document.label(),
                        message,
                    });
                    continue;
                }
            };

            let mut matched = 0;
            for target in &mut self.rules {
                if !filter.filter.rules.iter().any(|r| target.answers_to(r)) {
                    continue;
                }
                let RuleDocument::Detection(rule) = target else {
                    continue;
                };
                if !filter.matches_logsource(&rule.logsource) {
                    debug!(filter = %document.label(), rule = %rule.meta.title, "logsource differs, filter not applied");
                    continue;
                }
                for (name, search) in &prepared.searches {
                    rule.detection.searches.insert(name.clone(), search.clone());
                }
                for condition in &mut rule.detection.conditions {
                    *condition = format!("{} and {}", grouped(condition), grouped(&prepared.condition));
                }
                matched += 1;
            }

            if matched == 0 {
                warn!(filter = %document.label(), "filter matches no rule");
            }
            applied += matched;
        }

        info!(filters = filters.len(), applied, "applied filters");
        applied
    }
}

fn prepare(filter: &SigmaFilter, prefix: &str) -> Result<PreparedFilter, String> {
    if let Some(error) = filter.errors.first() {
        return Err(error.to_string());
    }
    let detection = &filter.filter.detection;
    if let Some(problem) = check_conditions(detection).first() {
        return Err(problem.to_string());
    }

    let mut conditions = Vec::with_capacity(detection.conditions.len());
    for condition in &detection.conditions {
        let tokens = tokenize(condition).map_err(|e| e.to_string())?;
        let mut renamed = Vec::with_capacity(tokens.len());
        for token in tokens {
            renamed.push(match token {
                ConditionToken::Identifier(name) => ConditionToken::Identifier(format!("{}{}", prefix, name)),
                ConditionToken::Quantifier { all, pattern } if pattern == "them" => ConditionToken::Quantifier {
                    all,
                    pattern: format!("{}*", prefix),
                },
                ConditionToken::Quantifier { all, pattern } => ConditionToken::Quantifier {
                    all,
                    pattern: format!("{}{}", prefix, pattern),
                },
                ConditionToken::Pipe(expression) => {
                    return Err(format!("aggregation expression '| {}' is not allowed in a filter", expression));
                }
                other => other,
            });
        }
        conditions.push(condition_text(&renamed));
    }

    let condition = match conditions.len() {
        1 => conditions.remove(0),
        _ => conditions
            .iter()
            .map(|c| format!("({})", c))
            .collect::<Vec<_>>()
            .join(" or "),
    };

    Ok(PreparedFilter {
        searches: detection
            .searches
            .iter()
            .map(|(name, search)| (format!("{}{}", prefix, name), search.clone()))
            .collect(),
        condition,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::schema::SourceOrigin;

    const RULE: &str = r#"
title: Shell Spawned by Web Server
id: 9a5f0c5e-1f3a-4a57-9d0e-5d1b6c2d7e01
name: webserver_shell
logsource:
  category: process_creation
  product: windows
detection:
  selection:
    ParentImage|endswith: '\httpd.exe'
    Image|endswith: '\cmd.exe'
  condition: selection
"#;

    const OTHER_RULE: &str = r#"
title: Unrelated
id: 00000000-0000-4000-8000-000000000002
logsource:
  category: process_creation
  product: windows
detection:
  selection:
    Image|endswith: '\whoami.exe'
  condition: selection
"#;

    const FILTER: &str = r#"
title: Ignore admin accounts
logsource:
  category: process_creation
  product: windows
filter:
  rules:
    - 9a5f0c5e-1f3a-4a57-9d0e-5d1b6c2d7e01
  selection:
    User|startswith: 'ADM_'
  condition: not selection
"#;

    fn file(name: &str, text: &str) -> SigmaCollection {
        SigmaCollection::from_yaml(text, SourceOrigin::File(PathBuf::from(name)))
    }

    fn rules() -> SigmaCollection {
        SigmaCollection::merge([file("rule.yml", RULE), file("other.yml", OTHER_RULE)])
    }

    #[test]
    fn filter_document_is_parsed() {
        let filters = file("filter.yml", FILTER);
        let filter = filters.rules[0].as_filter().unwrap();
        assert!(filter.errors.is_empty(), "{:?}", filter.errors);
        assert_eq!(filter.filter.rules, vec!["9a5f0c5e-1f3a-4a57-9d0e-5d1b6c2d7e01"]);
        assert_eq!(filter.filter.detection.conditions, vec!["not selection"]);
        assert!(filter.filter.detection.searches.contains_key("selection"));
        assert!(!filter.filter.detection.searches.contains_key("rules"));
    }

    #[test]
    fn filter_extends_the_named_rule_only() {
        let mut rules = rules();
        let applied = rules.apply_filters(&file("filter.yml", FILTER));

        assert_eq!(applied, 1);
        assert!(rules.errors.is_empty(), "{:?}", rules.errors);
        let target = rules.rules[0].as_detection().unwrap();
        assert_eq!(target.detection.conditions, vec!["selection and not _filter0_selection"]);
        assert_eq!(target.detection.field_names(), vec!["ParentImage", "Image", "User"]);
        assert!(check_conditions(&target.detection).is_empty());

        let untouched = rules.rules[1].as_detection().unwrap();
        assert_eq!(untouched.detection.conditions, vec!["selection"]);
    }

    #[test]
    fn filter_by_name_and_compound_conditions() {
        let mut rules = SigmaCollection::from_yaml(
            &RULE.replace("condition: selection", "condition: selection or selection"),
            SourceOrigin::Stdin,
        );
        let filter = FILTER
            .replace("- 9a5f0c5e-1f3a-4a57-9d0e-5d1b6c2d7e01", "- webserver_shell")
            .replace("condition: not selection", "condition: not 1 of sel* and not selection");
        rules.apply_filters(&SigmaCollection::from_yaml(&filter, SourceOrigin::Stdin));

        let target = rules.rules[0].as_detection().unwrap();
        assert_eq!(
            target.detection.conditions,
            vec!["(selection or selection) and (not 1 of _filter0_sel* and not _filter0_selection)"]
        );
    }

    #[test]
    fn logsource_mismatch_skips_rule() {
        let mut rules = rules();
        let filter = FILTER.replace("product: windows", "product: linux");
        assert_eq!(rules.apply_filters(&file("filter.yml", &filter)), 0);
        assert_eq!(rules.rules[0].as_detection().unwrap().detection.conditions, vec!["selection"]);
    }

    #[test]
    fn unusable_documents_become_collection_errors() {
        let mut rules = rules();
        let broken = FILTER.replace("condition: not selection", "condition: not missing");
        let filters = SigmaCollection::merge([file("rule.yml", RULE), file("broken.yml", &broken)]);
        assert_eq!(rules.apply_filters(&filters), 0);

        let messages: Vec<String> = rules.errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "invalid filter rule.yml: document has no filter section".to_string(),
                "invalid filter broken.yml: search identifier 'missing' is not defined in the detection"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn filter_without_targets_is_a_parse_error() {
        let filters = file("filter.yml", &FILTER.replace("    - 9a5f0c5e-1f3a-4a57-9d0e-5d1b6c2d7e01\n", ""));
        let filter = filters.rules[0].as_filter().unwrap();
        assert_eq!(filter.errors[0].path, "filter.rules");
    }
}
