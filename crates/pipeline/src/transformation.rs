//! Field and value transformations.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use sigma_rules::schema::{DetectionItem, DetectionValue, SearchIdentifier};
use sigma_rules::SigmaRule;

/// A regular expression read from a pipeline definition.
#[derive(Clone)]
pub struct ValuePattern(Regex);

impl ValuePattern {
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Regex::new(pattern).map(ValuePattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ValuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValuePattern({:?})", self.as_str())
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<'de> Deserialize<'de> for ValuePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ValuePattern::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// What a processing item does to a rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    /// Rename fields; unmapped fields are left alone.
    FieldNameMapping { mapping: IndexMap<String, String> },
    FieldNamePrefix { prefix: String },
    FieldNameSuffix { suffix: String },
    /// AND a new search of `field: value(s)` pairs onto every condition.
    AddCondition { conditions: IndexMap<String, Value> },
    /// Overwrite the given logsource keys.
    ChangeLogsource {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        product: Option<String>,
        #[serde(default)]
        service: Option<String>,
    },
    /// Regex replacement in every string value, keywords included.
    ReplaceString {
        regex: ValuePattern,
        replacement: String,
    },
    /// Remove detection items on the named fields.
    DropDetectionItem { fields: Vec<String> },
}

impl Transformation {
    pub fn kind(&self) -> &'static str {
        match self {
            Transformation::FieldNameMapping { .. } => "field_name_mapping",
            Transformation::FieldNamePrefix { .. } => "field_name_prefix",
            Transformation::FieldNameSuffix { .. } => "field_name_suffix",
            Transformation::AddCondition { .. } => "add_condition",
            Transformation::ChangeLogsource { .. } => "change_logsource",
            Transformation::ReplaceString { .. } => "replace_string",
            Transformation::DropDetectionItem { .. } => "drop_detection_item",
        }
    }

    pub fn apply(&self, rule: &mut SigmaRule) {
        match self {
            Transformation::FieldNameMapping { mapping } => rename_fields(rule, |field| mapping.get(field).cloned()),
            Transformation::FieldNamePrefix { prefix } => {
                rename_fields(rule, |field| Some(format!("{}{}", prefix, field)))
            }
            Transformation::FieldNameSuffix { suffix } => {
                rename_fields(rule, |field| Some(format!("{}{}", field, suffix)))
            }
            Transformation::AddCondition { conditions } => add_condition(rule, conditions),
            Transformation::ChangeLogsource {
                category,
                product,
                service,
            } => {
                let ls = &mut rule.logsource;
                if category.is_some() {
                    ls.category = category.clone();
                }
                if product.is_some() {
                    ls.product = product.clone();
                }
                if service.is_some() {
                    ls.service = service.clone();
                }
            }
            Transformation::ReplaceString { regex, replacement } => {
                for search in rule.detection.searches.values_mut() {
                    for_each_value_mut(search, &mut |value| {
                        if let DetectionValue::Str(s) = value {
                            let replaced = regex.0.replace_all(s, replacement.as_str()).into_owned();
                            *s = replaced;
                        }
                    });
                }
            }
            Transformation::DropDetectionItem { fields } => {
                for search in rule.detection.searches.values_mut() {
                    search.retain_items(&|item| !fields.contains(&item.field));
                }
            }
        }
    }
}

/// Rename every non-empty field name in the detection and the `fields` list.
fn rename_fields(rule: &mut SigmaRule, rename: impl Fn(&str) -> Option<String>) {
    for search in rule.detection.searches.values_mut() {
        search.for_each_item_mut(&mut |item| {
            if item.field.is_empty() {
                return;
            }
            if let Some(new) = rename(&item.field) {
                item.field = new;
            }
        });
    }
    for field in rule.meta.fields.iter_mut() {
        if let Some(new) = rename(field) {
            *field = new;
        }
    }
}

fn for_each_value_mut(search: &mut SearchIdentifier, f: &mut dyn FnMut(&mut DetectionValue)) {
    match search {
        SearchIdentifier::Fields(items) => {
            for item in items {
                item.values.iter_mut().for_each(|v| f(v));
            }
        }
        SearchIdentifier::AnyOf(alternatives) => {
            for alt in alternatives {
                for_each_value_mut(alt, f);
            }
        }
        SearchIdentifier::Keywords(values) => values.iter_mut().for_each(|v| f(v)),
    }
}

fn to_detection_values(value: &Value) -> Vec<DetectionValue> {
    match value {
        Value::Sequence(seq) => seq.iter().flat_map(to_detection_values).collect(),
        Value::String(s) => vec![DetectionValue::Str(s.clone())],
        Value::Number(n) => match n.as_i64() {
            Some(i) => vec![DetectionValue::Int(i)],
            None => vec![DetectionValue::Str(n.to_string())],
        },
        Value::Bool(b) => vec![DetectionValue::Bool(*b)],
        Value::Null => vec![DetectionValue::Null],
        Value::Mapping(_) | Value::Tagged(_) => Vec::new(),
    }
}

fn add_condition(rule: &mut SigmaRule, conditions: &IndexMap<String, Value>) {
    let items: Vec<DetectionItem> = conditions
        .iter()
        .map(|(field, value)| DetectionItem::new(field.clone(), to_detection_values(value)))
        .filter(|item| !item.values.is_empty())
        .collect();
    if items.is_empty() {
        return;
    }

    let detection = &mut rule.detection;
    let mut n = 0;
    let name = loop {
        let candidate = format!("_cond{}", n);
        if !detection.searches.contains_key(&candidate) {
            break candidate;
        }
        n += 1;
    };

    for condition in detection.conditions.iter_mut() {
        *condition = format!("{} and ({})", name, condition);
    }
    detection.searches.insert(name, SearchIdentifier::Fields(items));
}
