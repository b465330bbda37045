//! Typed backend options.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{BackendError, Result};

/// One option value: an integer when the text parses as one, else a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionScalar {
    Int(i64),
    Str(String),
}

impl OptionScalar {
    /// Integer if the whole value parses as one, the raw text otherwise.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(i) => OptionScalar::Int(i),
            Err(_) => OptionScalar::Str(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionScalar::Int(i) => Some(*i),
            OptionScalar::Str(_) => None,
        }
    }
}

impl fmt::Display for OptionScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionScalar::Int(i) => write!(f, "{}", i),
            OptionScalar::Str(s) => f.write_str(s),
        }
    }
}

/// A key given once is `Single`; a repeated key keeps every value in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Single(OptionScalar),
    Multiple(Vec<OptionScalar>),
}

impl OptionValue {
    pub fn values(&self) -> Vec<&OptionScalar> {
        match self {
            OptionValue::Single(v) => vec![v],
            OptionValue::Multiple(vs) => vs.iter().collect(),
        }
    }
}

pub type BackendOptions = IndexMap<String, OptionValue>;

/// Expected value kind of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Int,
    /// Any value; integers are accepted as their text.
    Str,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Int => f.write_str("int"),
            OptionKind::Str => f.write_str("str"),
        }
    }
}

/// An option a backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    /// Whether the option may be given more than once.
    pub repeatable: bool,
    pub description: &'static str,
}

/// Check `options` against the specs a backend declares.
pub fn validate_options(backend: &str, specs: &[OptionSpec], options: &BackendOptions) -> Result<()> {
    for (name, value) in options {
        let Some(spec) = specs.iter().find(|s| s.name == name.as_str()) else {
            return Err(BackendError::UnsupportedOption {
                option: name.clone(),
                backend: backend.to_string(),
            });
        };
        let invalid = |expected| BackendError::InvalidOption {
            option: name.clone(),
            backend: backend.to_string(),
            expected,
        };
        if matches!(value, OptionValue::Multiple(_)) && !spec.repeatable {
            return Err(invalid("a single value"));
        }
        if spec.kind == OptionKind::Int && value.values().iter().any(|v| v.as_int().is_none()) {
            return Err(invalid("an integer"));
        }
    }
    Ok(())
}

/// String value of a single-valued option.
pub fn get_str(options: &BackendOptions, name: &str) -> Option<String> {
    match options.get(name)? {
        OptionValue::Single(v) => Some(v.to_string()),
        OptionValue::Multiple(vs) => vs.last().map(|v| v.to_string()),
    }
}

pub fn get_int(options: &BackendOptions, name: &str) -> Option<i64> {
    match options.get(name)? {
        OptionValue::Single(v) => v.as_int(),
        OptionValue::Multiple(vs) => vs.last().and_then(OptionScalar::as_int),
    }
}

/// All values of an option, in the order given.
pub fn get_all(options: &BackendOptions, name: &str) -> Vec<String> {
    options
        .get(name)
        .map(|v| v.values().into_iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[OptionSpec] = &[
        OptionSpec {
            name: "max_query_length",
            kind: OptionKind::Int,
            repeatable: false,
            description: "",
        },
        OptionSpec {
            name: "table_fields",
            kind: OptionKind::Str,
            repeatable: true,
            description: "",
        },
    ];

    fn options(pairs: &[(&str, OptionValue)]) -> BackendOptions {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn scalar_parse_prefers_integers() {
        assert_eq!(OptionScalar::parse("42"), OptionScalar::Int(42));
        assert_eq!(OptionScalar::parse("-7"), OptionScalar::Int(-7));
        assert_eq!(OptionScalar::parse("4.2"), OptionScalar::Str("4.2".into()));
        assert_eq!(OptionScalar::parse("index"), OptionScalar::Str("index".into()));
    }

    #[test]
    fn unknown_option_names_option_and_backend() {
        let opts = options(&[("colour", OptionValue::Single(OptionScalar::Str("red".into())))]);
        assert_eq!(
            validate_options("splunk", SPECS, &opts),
            Err(BackendError::UnsupportedOption {
                option: "colour".into(),
                backend: "splunk".into()
            })
        );
    }

    #[test]
    fn kind_and_repetition_are_checked() {
        let text = options(&[("max_query_length", OptionValue::Single(OptionScalar::Str("long".into())))]);
        assert!(matches!(
            validate_options("splunk", SPECS, &text),
            Err(BackendError::InvalidOption { expected: "an integer", .. })
        ));

        let twice = options(&[(
            "max_query_length",
            OptionValue::Multiple(vec![OptionScalar::Int(1), OptionScalar::Int(2)]),
        )]);
        assert!(matches!(
            validate_options("splunk", SPECS, &twice),
            Err(BackendError::InvalidOption { expected: "a single value", .. })
        ));

        let fields = options(&[(
            "table_fields",
            OptionValue::Multiple(vec![OptionScalar::Str("Image".into()), OptionScalar::Int(4)]),
        )]);
        assert_eq!(validate_options("splunk", SPECS, &fields), Ok(()));
        assert_eq!(get_all(&fields, "table_fields"), vec!["Image".to_string(), "4".to_string()]);
    }

    #[test]
    fn serializes_as_plain_json() {
        let opts = options(&[
            ("a", OptionValue::Single(OptionScalar::Int(1))),
            ("b", OptionValue::Multiple(vec![OptionScalar::Int(1), OptionScalar::Str("x".into())])),
        ]);
        assert_eq!(serde_json::to_string(&opts).unwrap(), r#"{"a":1,"b":[1,"x"]}"#);
    }
}
