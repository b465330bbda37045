//! Conditions deciding whether a processing item applies to a rule.

use serde::Deserialize;
use sigma_rules::SigmaRule;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Every given logsource key must equal the rule's value.
    Logsource {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        product: Option<String>,
        #[serde(default)]
        service: Option<String>,
    },
}

impl RuleCondition {
    pub fn logsource(category: Option<&str>, product: Option<&str>, service: Option<&str>) -> Self {
        RuleCondition::Logsource {
            category: category.map(str::to_string),
            product: product.map(str::to_string),
            service: service.map(str::to_string),
        }
    }

    pub fn matches(&self, rule: &SigmaRule) -> bool {
        match self {
            RuleCondition::Logsource {
                category,
                product,
                service,
            } => {
                let ls = &rule.logsource;
                key_matches(category, &ls.category)
                    && key_matches(product, &ls.product)
                    && key_matches(service, &ls.service)
            }
        }
    }
}

fn key_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(w)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_rules::schema::LogSource;

    fn rule(category: Option<&str>, product: Option<&str>) -> SigmaRule {
        SigmaRule {
            meta: Default::default(),
            logsource: LogSource {
                category: category.map(str::to_string),
                product: product.map(str::to_string),
                service: None,
            },
            detection: Default::default(),
            source: None,
            errors: Vec::new(),
        }
    }

    #[test]
    fn all_given_keys_must_match() {
        let cond = RuleCondition::logsource(Some("process_creation"), Some("windows"), None);
        assert!(cond.matches(&rule(Some("process_creation"), Some("Windows"))));
        assert!(!cond.matches(&rule(Some("process_creation"), Some("linux"))));
        assert!(!cond.matches(&rule(Some("process_creation"), None)));
    }

    #[test]
    fn empty_condition_matches_everything() {
        let cond = RuleCondition::logsource(None, None, None);
        assert!(cond.matches(&rule(None, None)));
    }

    #[test]
    fn deserialize_from_yaml() {
        let cond: RuleCondition = serde_yaml::from_str("type: logsource\nproduct: windows\n").unwrap();
        assert_eq!(cond, RuleCondition::logsource(None, Some("windows"), None));
    }
}
