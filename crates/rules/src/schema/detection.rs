//! Log source and detection section types.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;

/// The `logsource` section: which log a rule applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Value modifier appended to a field name with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Contains,
    StartsWith,
    EndsWith,
    /// Values of a list are AND-ed instead of OR-ed.
    All,
    /// Values are regular expressions.
    Re,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Modifier::Contains => "contains",
            Modifier::StartsWith => "startswith",
            Modifier::EndsWith => "endswith",
            Modifier::All => "all",
            Modifier::Re => "re",
        };
        f.write_str(s)
    }
}

impl FromStr for Modifier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "contains" => Ok(Modifier::Contains),
            "startswith" => Ok(Modifier::StartsWith),
            "endswith" => Ok(Modifier::EndsWith),
            "all" => Ok(Modifier::All),
            "re" => Ok(Modifier::Re),
            other => Err(format!("unknown modifier '{}'", other)),
        }
    }
}

/// A scalar value in a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl fmt::Display for DetectionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionValue::Str(s) => f.write_str(s),
            DetectionValue::Int(i) => write!(f, "{}", i),
            DetectionValue::Bool(b) => write!(f, "{}", b),
            DetectionValue::Null => f.write_str("null"),
        }
    }
}

/// One `field|modifiers: values` entry of a search identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionItem {
    pub field: String,
    pub modifiers: Vec<Modifier>,
    pub values: Vec<DetectionValue>,
}

impl DetectionItem {
    pub fn new(field: impl Into<String>, values: Vec<DetectionValue>) -> Self {
        Self {
            field: field.into(),
            modifiers: Vec::new(),
            values,
        }
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

/// A named search in the `detection` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchIdentifier {
    /// A mapping: all items must match.
    Fields(Vec<DetectionItem>),
    /// A list of mappings: any of them may match.
    AnyOf(Vec<SearchIdentifier>),
    /// A list of plain values searched in the whole event.
    Keywords(Vec<DetectionValue>),
}

impl SearchIdentifier {
    /// Visit every detection item, depth first.
    pub fn items(&self) -> Vec<&DetectionItem> {
        match self {
            SearchIdentifier::Fields(items) => items.iter().collect(),
            SearchIdentifier::AnyOf(alternatives) => {
                alternatives.iter().flat_map(|a| a.items()).collect()
            }
            SearchIdentifier::Keywords(_) => Vec::new(),
        }
    }

    /// Mutable visitor over every detection item.
    pub fn for_each_item_mut(&mut self, f: &mut dyn FnMut(&mut DetectionItem)) {
        match self {
            SearchIdentifier::Fields(items) => items.iter_mut().for_each(|i| f(i)),
            SearchIdentifier::AnyOf(alternatives) => {
                for alt in alternatives {
                    alt.for_each_item_mut(f);
                }
            }
            SearchIdentifier::Keywords(_) => {}
        }
    }

    /// Keep only items for which `keep` returns true.
    pub fn retain_items(&mut self, keep: &dyn Fn(&DetectionItem) -> bool) {
        match self {
            SearchIdentifier::Fields(items) => items.retain(|i| keep(i)),
            SearchIdentifier::AnyOf(alternatives) => {
                for alt in alternatives.iter_mut() {
                    alt.retain_items(keep);
                }
                alternatives.retain(|a| !a.is_empty());
            }
            SearchIdentifier::Keywords(_) => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SearchIdentifier::Fields(items) => items.is_empty(),
            SearchIdentifier::AnyOf(alternatives) => alternatives.is_empty(),
            SearchIdentifier::Keywords(values) => values.is_empty(),
        }
    }
}

/// The `detection` section: named searches and one or more conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub searches: IndexMap<String, SearchIdentifier>,
    pub conditions: Vec<String>,
}

impl Detection {
    /// All field names referenced by the detection, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.searches
            .values()
            .flat_map(|s| s.items())
            .map(|i| i.field.as_str())
            .collect()
    }
}
