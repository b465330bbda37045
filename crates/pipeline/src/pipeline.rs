//! Pipeline composition and application.

use std::iter::Sum;
use std::ops::Add;

use indexmap::IndexSet;
use serde::Deserialize;
use sigma_rules::{RuleDocument, SigmaRule};
use tracing::debug;

use crate::condition::RuleCondition;
use crate::transformation::Transformation;

/// One transformation plus the conditions under which it applies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessingItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub transformation: Transformation,
    /// All must match; empty means always.
    #[serde(default)]
    pub rule_conditions: Vec<RuleCondition>,
}

impl ProcessingItem {
    pub fn new(transformation: Transformation) -> Self {
        Self {
            id: None,
            transformation,
            rule_conditions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.rule_conditions.push(condition);
        self
    }

    pub fn applies_to(&self, rule: &SigmaRule) -> bool {
        self.rule_conditions.iter().all(|c| c.matches(rule))
    }
}

/// An ordered list of processing items.
///
/// Pipelines compose by concatenating items: `a + b` applies `a`'s items
/// first. Composition is associative. The leftmost non-empty operand supplies
/// the priority; allow-lists are unioned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessingPipeline {
    #[serde(default)]
    pub name: String,
    /// Lower priorities are applied first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default, rename = "transformations")]
    pub items: Vec<ProcessingItem>,
    /// Backends this pipeline is meant for; empty means any.
    #[serde(skip)]
    pub allowed_backends: IndexSet<String>,
}

impl ProcessingPipeline {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            ..Default::default()
        }
    }

    pub fn with_item(mut self, item: ProcessingItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn allows(&self, backend: &str) -> bool {
        self.allowed_backends.is_empty() || self.allowed_backends.contains(backend)
    }

    /// Apply to a detection rule, returning the transformed copy.
    pub fn apply_rule(&self, rule: &SigmaRule) -> SigmaRule {
        let mut out = rule.clone();
        for item in &self.items {
            if !item.applies_to(&out) {
                continue;
            }
            debug!(
                pipeline = %self.name,
                item = item.id.as_deref().unwrap_or("-"),
                transformation = item.transformation.kind(),
                "applying processing item"
            );
            item.transformation.apply(&mut out);
        }
        out
    }

    /// Apply to any rule document. Correlation and filter documents pass
    /// through unchanged.
    pub fn apply(&self, rule: &RuleDocument) -> RuleDocument {
        match rule {
            RuleDocument::Detection(detection) => RuleDocument::Detection(self.apply_rule(detection)),
            RuleDocument::Correlation(_) | RuleDocument::Filter(_) => rule.clone(),
        }
    }
}

impl Add for ProcessingPipeline {
    type Output = ProcessingPipeline;

    fn add(mut self, rhs: ProcessingPipeline) -> ProcessingPipeline {
        let take_priority = self.items.is_empty() && self.name.is_empty();
        if self.name.is_empty() {
            self.name = rhs.name;
        } else if !rhs.name.is_empty() {
            self.name = format!("{} + {}", self.name, rhs.name);
        }
        if take_priority {
            self.priority = rhs.priority;
        }
        self.items.extend(rhs.items);
        self.allowed_backends.extend(rhs.allowed_backends);
        self
    }
}

impl Sum for ProcessingPipeline {
    fn sum<I: Iterator<Item = ProcessingPipeline>>(iter: I) -> ProcessingPipeline {
        iter.reduce(Add::add).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_rules::collection::SigmaCollection;
    use sigma_rules::SourceOrigin;

    fn prefix(name: &str, priority: i32, prefix: &str) -> ProcessingPipeline {
        ProcessingPipeline::new(name, priority).with_item(ProcessingItem::new(Transformation::FieldNamePrefix {
            prefix: prefix.to_string(),
        }))
    }

    fn rule() -> RuleDocument {
        let yaml = "title: t\nlogsource: {product: windows}\ndetection: {sel: {Image: x}, condition: sel}\n";
        SigmaCollection::from_yaml(yaml, SourceOrigin::Stdin).rules.remove(0)
    }

    fn fields(doc: &RuleDocument) -> Vec<String> {
        doc.as_detection()
            .unwrap()
            .detection
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn composition_is_associative() {
        let (a, b, c) = (prefix("a", 10, "a."), prefix("b", 20, "b."), prefix("c", 30, "c."));
        let left = (a.clone() + b.clone()) + c.clone();
        let right = a + (b + c);
        assert_eq!(left, right);
        assert_eq!(left.name, "a + b + c");
        assert_eq!(left.priority, 10);
    }

    #[test]
    fn items_apply_in_composition_order() {
        let composed: ProcessingPipeline = vec![prefix("a", 0, "a."), prefix("b", 0, "b.")].into_iter().sum();
        assert_eq!(fields(&composed.apply(&rule())), vec!["b.a.Image".to_string()]);
    }

    #[test]
    fn input_rule_is_not_mutated() {
        let original = rule();
        let _ = prefix("a", 0, "a.").apply(&original);
        assert_eq!(fields(&original), vec!["Image".to_string()]);
    }

    #[test]
    fn rule_conditions_gate_items() {
        let pipeline = ProcessingPipeline::new("p", 0).with_item(
            ProcessingItem::new(Transformation::FieldNamePrefix { prefix: "x.".into() })
                .when(RuleCondition::logsource(None, Some("linux"), None)),
        );
        assert_eq!(fields(&pipeline.apply(&rule())), vec!["Image".to_string()]);
    }

    #[test]
    fn allow_lists_union() {
        let mut a = ProcessingPipeline::new("a", 0);
        a.allowed_backends.insert("splunk".into());
        let mut b = ProcessingPipeline::new("b", 0);
        b.allowed_backends.insert("lucene".into());
        let sum = a + b;
        assert!(sum.allows("splunk") && sum.allows("lucene"));
        assert!(!sum.allows("text_query_test"));
        assert!(ProcessingPipeline::default().allows("anything"));
    }

    #[test]
    fn empty_sum_is_default() {
        let sum: ProcessingPipeline = Vec::new().into_iter().sum();
        assert_eq!(sum, ProcessingPipeline::default());
    }
}
