//! Lenient YAML-to-rule conversion. Every problem becomes a [`RuleParseError`]
//! on the resulting record; nothing here returns early with an error.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use super::{
    Correlation, CorrelationRule, Detection, DetectionItem, DetectionValue, Filter, LogSource, Modifier,
    ParseErrorKind, RuleDocument, RuleMetadata, RuleParseError, RuleSource, SearchIdentifier,
    SigmaFilter, SigmaRule,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Build a rule document from one parsed YAML document.
pub(crate) fn parse_document(value: &Value, source: Option<RuleSource>) -> RuleDocument {
    let mut errors = Vec::new();

    let Some(map) = value.as_mapping() else {
        errors.push(RuleParseError::new(
            ParseErrorKind::InvalidDocument,
            "",
            "rule document must be a YAML mapping",
        ));
        return RuleDocument::Detection(SigmaRule {
            meta: RuleMetadata::default(),
            logsource: LogSource::default(),
            detection: Detection::default(),
            source,
            errors,
        });
    };

    let meta = parse_metadata(map, &mut errors);

    if let Some(correlation) = get(map, "correlation") {
        let correlation = parse_correlation(correlation, &mut errors);
        return RuleDocument::Correlation(CorrelationRule {
            meta,
            correlation,
            resolved: Vec::new(),
            source,
            errors,
        });
    }

    if let Some(filter) = get(map, "filter") {
        let logsource = parse_logsource(map, &mut errors);
        let filter = parse_filter(filter, &mut errors);
        return RuleDocument::Filter(SigmaFilter {
            meta,
            logsource,
            filter,
            source,
            errors,
        });
    }

    let logsource = parse_logsource(map, &mut errors);
    let detection = parse_detection(map, &mut errors);
    RuleDocument::Detection(SigmaRule {
        meta,
        logsource,
        detection,
        source,
        errors,
    })
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(Value::String(key.to_string()))
}

/// Scalars rendered as strings; numbers are accepted for id-like fields.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn opt_string(map: &Mapping, key: &str, path: &str, errors: &mut Vec<RuleParseError>) -> Option<String> {
    match get(map, key)? {
        Value::Null => None,
        value => match scalar_string(value) {
            Some(s) => Some(s),
            None => {
                errors.push(RuleParseError::new(
                    ParseErrorKind::InvalidType,
                    path,
                    "expected a string",
                ));
                None
            }
        },
    }
}

fn string_list(map: &Mapping, key: &str, path: &str, errors: &mut Vec<RuleParseError>) -> Vec<String> {
    match get(map, key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => {
            let mut out = Vec::with_capacity(seq.len());
            for (i, item) in seq.iter().enumerate() {
                match scalar_string(item) {
                    Some(s) => out.push(s),
                    None => errors.push(RuleParseError::new(
                        ParseErrorKind::InvalidType,
                        format!("{}[{}]", path, i),
                        "expected a string",
                    )),
                }
            }
            out
        }
        Some(value) => match scalar_string(value) {
            Some(s) => vec![s],
            None => {
                errors.push(RuleParseError::new(
                    ParseErrorKind::InvalidType,
                    path,
                    "expected a string or a list of strings",
                ));
                Vec::new()
            }
        },
    }
}

fn parse_date(map: &Mapping, key: &str, errors: &mut Vec<RuleParseError>) -> Option<NaiveDate> {
    let raw = opt_string(map, key, key, errors)?;
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok());
    if parsed.is_none() {
        errors.push(RuleParseError::new(
            ParseErrorKind::InvalidValue,
            key,
            format!("'{}' is not a date in YYYY-MM-DD or YYYY/MM/DD format", raw),
        ));
    }
    parsed
}

fn parse_metadata(map: &Mapping, errors: &mut Vec<RuleParseError>) -> RuleMetadata {
    let title = match opt_string(map, "title", "title", errors) {
        Some(t) => t,
        None => {
            errors.push(RuleParseError::new(
                ParseErrorKind::MissingField,
                "title",
                "rule has no title",
            ));
            String::new()
        }
    };

    let level = opt_string(map, "level", "level", errors).and_then(|raw| match raw.parse() {
        Ok(level) => Some(level),
        Err(e) => {
            errors.push(RuleParseError::new(ParseErrorKind::InvalidValue, "level", e));
            None
        }
    });

    let status = opt_string(map, "status", "status", errors).and_then(|raw| match raw.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            errors.push(RuleParseError::new(ParseErrorKind::InvalidValue, "status", e));
            None
        }
    });

    let mut tags = Vec::new();
    for (i, raw) in string_list(map, "tags", "tags", errors).into_iter().enumerate() {
        match raw.parse() {
            Ok(tag) => tags.push(tag),
            Err(e) => errors.push(RuleParseError::new(
                ParseErrorKind::InvalidValue,
                format!("tags[{}]", i),
                e,
            )),
        }
    }

    RuleMetadata {
        title,
        id: opt_string(map, "id", "id", errors),
        name: opt_string(map, "name", "name", errors),
        status,
        description: opt_string(map, "description", "description", errors),
        author: opt_string(map, "author", "author", errors),
        references: string_list(map, "references", "references", errors),
        date: parse_date(map, "date", errors),
        modified: parse_date(map, "modified", errors),
        tags,
        level,
        falsepositives: string_list(map, "falsepositives", "falsepositives", errors),
        fields: string_list(map, "fields", "fields", errors),
    }
}

fn parse_logsource(map: &Mapping, errors: &mut Vec<RuleParseError>) -> LogSource {
    match get(map, "logsource") {
        None => {
            errors.push(RuleParseError::new(
                ParseErrorKind::MissingField,
                "logsource",
                "rule has no logsource",
            ));
            LogSource::default()
        }
        Some(Value::Mapping(ls)) => LogSource {
            category: opt_string(ls, "category", "logsource.category", errors),
            product: opt_string(ls, "product", "logsource.product", errors),
            service: opt_string(ls, "service", "logsource.service", errors),
        },
        Some(_) => {
            errors.push(RuleParseError::new(
                ParseErrorKind::InvalidType,
                "logsource",
                "expected a mapping",
            ));
            LogSource::default()
        }
    }
}

fn parse_detection(map: &Mapping, errors: &mut Vec<RuleParseError>) -> Detection {
    match get(map, "detection") {
        Some(Value::Mapping(section)) => parse_searches(section, "detection", &[], errors),
        Some(_) => {
            errors.push(RuleParseError::new(
                ParseErrorKind::InvalidType,
                "detection",
                "expected a mapping",
            ));
            Detection::default()
        }
        None => {
            errors.push(RuleParseError::new(
                ParseErrorKind::MissingField,
                "detection",
                "rule has no detection section",
            ));
            Detection::default()
        }
    }
}

/// Search identifiers and conditions of `section`; `reserved` keys are skipped.
fn parse_searches(
    section: &Mapping,
    path: &str,
    reserved: &[&str],
    errors: &mut Vec<RuleParseError>,
) -> Detection {
    let mut searches = IndexMap::new();
    let mut conditions = Vec::new();
    let condition_path = format!("{}.condition", path);

    for (key, value) in section {
        let Some(name) = key.as_str() else {
            errors.push(RuleParseError::new(
                ParseErrorKind::InvalidType,
                path,
                "search identifier names must be strings",
            ));
            continue;
        };
        match name {
            "condition" => {
                conditions = string_list(section, "condition", &condition_path, errors);
            }
            // Legacy aggregation window, not part of the search.
            "timeframe" => {}
            _ if reserved.contains(&name) => {}
            _ => {
                let search_path = format!("{}.{}", path, name);
                if let Some(search) = parse_search(value, &search_path, errors) {
                    searches.insert(name.to_string(), search);
                }
            }
        }
    }

    if conditions.is_empty() {
        errors.push(RuleParseError::new(
            ParseErrorKind::MissingField,
            condition_path,
            format!("{} has no condition", path),
        ));
    }

    Detection {
        searches,
        conditions,
    }
}

fn parse_value(value: &Value) -> Option<DetectionValue> {
    match value {
        Value::String(s) => Some(DetectionValue::Str(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(DetectionValue::Int(i)),
            None => Some(DetectionValue::Str(n.to_string())),
        },
        Value::Bool(b) => Some(DetectionValue::Bool(*b)),
        Value::Null => Some(DetectionValue::Null),
        _ => None,
    }
}

fn parse_search(value: &Value, path: &str, errors: &mut Vec<RuleParseError>) -> Option<SearchIdentifier> {
    match value {
        Value::Mapping(items) => parse_field_items(items, path, errors).map(SearchIdentifier::Fields),
        Value::Sequence(seq) if seq.is_empty() => {
            errors.push(RuleParseError::new(
                ParseErrorKind::InvalidDetection,
                path,
                "search identifier is an empty list",
            ));
            None
        }
        Value::Sequence(seq) if seq.iter().all(Value::is_mapping) => {
            let mut alternatives = Vec::with_capacity(seq.len());
            for (i, item) in seq.iter().enumerate() {
                if let Some(items) = item.as_mapping() {
                    let item_path = format!("{}[{}]", path, i);
                    alternatives.push(SearchIdentifier::Fields(parse_field_items(items, &item_path, errors)?));
                }
            }
            Some(SearchIdentifier::AnyOf(alternatives))
        }
        Value::Sequence(seq) => {
            let values: Option<Vec<_>> = seq.iter().map(parse_value).collect();
            match values {
                Some(values) => Some(SearchIdentifier::Keywords(values)),
                None => {
                    errors.push(RuleParseError::new(
                        ParseErrorKind::InvalidDetection,
                        path,
                        "a list must contain either only mappings or only plain values",
                    ));
                    None
                }
            }
        }
        scalar => match parse_value(scalar) {
            Some(v) => Some(SearchIdentifier::Keywords(vec![v])),
            None => {
                errors.push(RuleParseError::new(
                    ParseErrorKind::InvalidDetection,
                    path,
                    "unsupported search identifier value",
                ));
                None
            }
        },
    }
}

fn parse_field_items(
    items: &Mapping,
    path: &str,
    errors: &mut Vec<RuleParseError>,
) -> Option<Vec<DetectionItem>> {
    let mut out = Vec::with_capacity(items.len());
    let mut ok = true;

    for (key, value) in items {
        let Some(key) = key.as_str() else {
            errors.push(RuleParseError::new(
                ParseErrorKind::InvalidType,
                path,
                "field names must be strings",
            ));
            ok = false;
            continue;
        };
        let item_path = format!("{}.{}", path, key);
        let mut parts = key.split('|');
        let field = parts.next().unwrap_or_default().to_string();

        let mut modifiers = Vec::new();
        for raw in parts {
            match raw.parse::<Modifier>() {
                Ok(m) => modifiers.push(m),
                Err(e) => {
                    errors.push(RuleParseError::new(ParseErrorKind::InvalidModifier, &item_path, e));
                    ok = false;
                }
            }
        }

        let values = match value {
            Value::Sequence(seq) => seq.iter().map(parse_value).collect::<Option<Vec<_>>>(),
            other => parse_value(other).map(|v| vec![v]),
        };
        match values {
            Some(values) if !values.is_empty() => out.push(DetectionItem {
                field,
                modifiers,
                values,
            }),
            Some(_) => {
                errors.push(RuleParseError::new(
                    ParseErrorKind::InvalidDetection,
                    &item_path,
                    "empty value list",
                ));
                ok = false;
            }
            None => {
                errors.push(RuleParseError::new(
                    ParseErrorKind::InvalidType,
                    &item_path,
                    "values must be scalars or lists of scalars",
                ));
                ok = false;
            }
        }
    }

    ok.then_some(out)
}

fn parse_correlation(value: &Value, errors: &mut Vec<RuleParseError>) -> Correlation {
    let Some(map) = value.as_mapping() else {
        errors.push(RuleParseError::new(
            ParseErrorKind::InvalidType,
            "correlation",
            "expected a mapping",
        ));
        return Correlation::default();
    };

    let kind = match opt_string(map, "type", "correlation.type", errors) {
        Some(kind) => kind,
        None => {
            errors.push(RuleParseError::new(
                ParseErrorKind::MissingField,
                "correlation.type",
                "correlation has no type",
            ));
            String::new()
        }
    };
    let rules = string_list(map, "rules", "correlation.rules", errors);
    if rules.is_empty() {
        errors.push(RuleParseError::new(
            ParseErrorKind::MissingField,
            "correlation.rules",
            "correlation references no rules",
        ));
    }

    Correlation {
        kind,
        rules,
        group_by: string_list(map, "group-by", "correlation.group-by", errors),
        timespan: opt_string(map, "timespan", "correlation.timespan", errors),
    }
}

fn parse_filter(value: &Value, errors: &mut Vec<RuleParseError>) -> Filter {
    let Some(map) = value.as_mapping() else {
        errors.push(RuleParseError::new(
            ParseErrorKind::InvalidType,
            "filter",
            "expected a mapping",
        ));
        return Filter::default();
    };

    let rules = string_list(map, "rules", "filter.rules", errors);
    if rules.is_empty() {
        errors.push(RuleParseError::new(
            ParseErrorKind::MissingField,
            "filter.rules",
            "filter targets no rules",
        ));
    }

    Filter {
        rules,
        detection: parse_searches(map, "filter", &["rules"], errors),
    }
}
