//! Built-in dialects and their backend descriptors.

use serde_json::json;
use sigma_pipeline::{ProcessingItem, ProcessingPipeline, Transformation};
use sigma_rules::SigmaCollection;

use super::{Dialect, RenderedQuery, TextQueryBackend};
use crate::backend::{Backend, BackendConfig, BackendDescriptor, FormatInfo};
use crate::options::{OptionKind, OptionSpec};
use crate::result::{ConversionResult, ResultKind};

const DEFAULT_FORMAT: FormatInfo = FormatInfo {
    name: "default",
    description: "Plain queries",
    kind: ResultKind::TextList,
};

const JSON_FORMAT: FormatInfo = FormatInfo {
    name: "json",
    description: "One JSON object per rule with id, title, level and query",
    kind: ResultKind::RecordList,
};

const NUL_FORMAT: FormatInfo = FormatInfo {
    name: "nul",
    description: "Queries separated by NUL bytes",
    kind: ResultKind::Bytes,
};

const QUERY_PREFIX: OptionSpec = OptionSpec {
    name: "query_prefix",
    kind: OptionKind::Str,
    repeatable: false,
    description: "Text prepended to every query",
};

const MAX_QUERY_LENGTH: OptionSpec = OptionSpec {
    name: "max_query_length",
    kind: OptionKind::Int,
    repeatable: false,
    description: "Rules whose query is longer than this are not converted",
};

// ── text_query_test ─────────────────────────────────────────────────

fn slash_regex(field: &str, pattern: &str) -> String {
    format!("{}=/{}/", field, pattern)
}

fn is_null(field: &str) -> String {
    format!("{} is null", field)
}

static TEST_DIALECT: Dialect = Dialect {
    and_token: "and",
    or_token: "or",
    not_token: "not",
    eq_token: "=",
    quote: Some('"'),
    escape_char: '\\',
    escaped: "",
    regex: Some(slash_regex),
    null: is_null,
};

fn test_summary(format: &str, queries: &[RenderedQuery], rules: &SigmaCollection) -> Option<ConversionResult> {
    if format != "summary" {
        return None;
    }
    Some(ConversionResult::Record(json!({
        "backend": "text_query_test",
        "rules": rules.len(),
        "converted": queries.len(),
        "queries": queries.iter().map(|q| &q.query).collect::<Vec<_>>(),
    })))
}

fn text_query_test_backend(descriptor: &'static BackendDescriptor, config: BackendConfig) -> Box<dyn Backend> {
    Box::new(TextQueryBackend::new(descriptor, &TEST_DIALECT, test_summary, config))
}

pub static TEXT_QUERY_TEST: BackendDescriptor = BackendDescriptor {
    identifier: "text_query_test",
    text: "Generic text query backend for testing",
    formats: &[
        DEFAULT_FORMAT,
        JSON_FORMAT,
        NUL_FORMAT,
        FormatInfo {
            name: "summary",
            description: "Single JSON document summarizing the conversion",
            kind: ResultKind::Record,
        },
    ],
    requires_pipeline: false,
    backend_pipeline: None,
    options: &[QUERY_PREFIX, MAX_QUERY_LENGTH],
    factory: text_query_test_backend,
};

// ── splunk ──────────────────────────────────────────────────────────

fn splunk_null(field: &str) -> String {
    format!("NOT {}=*", field)
}

static SPLUNK_DIALECT: Dialect = Dialect {
    and_token: "AND",
    or_token: "OR",
    not_token: "NOT",
    eq_token: "=",
    quote: Some('"'),
    escape_char: '\\',
    escaped: "",
    regex: None,
    null: splunk_null,
};

fn splunk_backend_pipeline() -> ProcessingPipeline {
    let mut mapping = indexmap::IndexMap::new();
    mapping.insert("EventID".to_string(), "EventCode".to_string());
    ProcessingPipeline::new("Splunk field names", 0)
        .with_item(ProcessingItem::new(Transformation::FieldNameMapping { mapping }).with_id("splunk_eventcode"))
}

fn savedsearches(format: &str, queries: &[RenderedQuery], rules: &SigmaCollection) -> Option<ConversionResult> {
    if format != "savedsearches" {
        return None;
    }
    let mut out = String::from(
        "[default]\ndispatch.earliest_time = -30d\ndispatch.latest_time = now\n",
    );
    for q in queries {
        let meta = rules.rules[q.index].meta();
        out.push_str(&format!("\n[{}]\n", meta.title.replace(['[', ']'], "")));
        if let Some(description) = &meta.description {
            out.push_str(&format!("description = {}\n", description.replace('\n', " ")));
        }
        out.push_str(&format!("search = {}\n", q.query));
    }
    Some(ConversionResult::Text(out))
}

fn splunk_backend(descriptor: &'static BackendDescriptor, config: BackendConfig) -> Box<dyn Backend> {
    Box::new(TextQueryBackend::new(descriptor, &SPLUNK_DIALECT, savedsearches, config))
}

pub static SPLUNK: BackendDescriptor = BackendDescriptor {
    identifier: "splunk",
    text: "Splunk SPL queries",
    formats: &[
        DEFAULT_FORMAT,
        JSON_FORMAT,
        NUL_FORMAT,
        FormatInfo {
            name: "savedsearches",
            description: "savedsearches.conf stanzas",
            kind: ResultKind::Text,
        },
    ],
    requires_pipeline: true,
    backend_pipeline: Some(splunk_backend_pipeline),
    options: &[
        QUERY_PREFIX,
        MAX_QUERY_LENGTH,
        OptionSpec {
            name: "table_fields",
            kind: OptionKind::Str,
            repeatable: true,
            description: "Fields appended as `| table f1,f2`",
        },
    ],
    factory: splunk_backend,
};

// ── lucene ──────────────────────────────────────────────────────────

fn lucene_regex(field: &str, pattern: &str) -> String {
    format!("{}:/{}/", field, pattern.replace('/', "\\/"))
}

fn lucene_null(field: &str) -> String {
    format!("NOT _exists_:{}", field)
}

static LUCENE_DIALECT: Dialect = Dialect {
    and_token: "AND",
    or_token: "OR",
    not_token: "NOT",
    eq_token: ":",
    quote: None,
    escape_char: '\\',
    escaped: "+-=&|><!(){}[]^\"~:/ ",
    regex: Some(lucene_regex),
    null: lucene_null,
};

fn lucene_dsl(format: &str, queries: &[RenderedQuery], _: &SigmaCollection) -> Option<ConversionResult> {
    if format != "dsl_lucene" {
        return None;
    }
    Some(ConversionResult::RecordList(
        queries
            .iter()
            .map(|q| {
                json!({
                    "query": {
                        "bool": {
                            "must": [
                                { "query_string": { "query": q.query, "analyze_wildcard": true } }
                            ]
                        }
                    }
                })
            })
            .collect(),
    ))
}

fn lucene_backend(descriptor: &'static BackendDescriptor, config: BackendConfig) -> Box<dyn Backend> {
    Box::new(TextQueryBackend::new(descriptor, &LUCENE_DIALECT, lucene_dsl, config))
}

pub static LUCENE: BackendDescriptor = BackendDescriptor {
    identifier: "lucene",
    text: "Elasticsearch Lucene query strings",
    formats: &[
        DEFAULT_FORMAT,
        JSON_FORMAT,
        NUL_FORMAT,
        FormatInfo {
            name: "dsl_lucene",
            description: "Elasticsearch query DSL wrapping the Lucene query",
            kind: ResultKind::RecordList,
        },
    ],
    requires_pipeline: false,
    backend_pipeline: None,
    options: &[QUERY_PREFIX, MAX_QUERY_LENGTH],
    factory: lucene_backend,
};
