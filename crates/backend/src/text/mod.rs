//! Text query backends: condition-token substitution over a query dialect.
//!
//! Each condition string is tokenized; identifiers and quantifiers are
//! replaced by the rendered search, boolean operators by the dialect's
//! tokens. A rule with several conditions yields one query OR-ing them.

mod dialects;
mod render;

use serde_json::{json, Value};
use sigma_pipeline::ProcessingPipeline;
use sigma_rules::{RuleDocument, SigmaCollection};
use tracing::{debug, warn};

pub use dialects::{LUCENE, SPLUNK, TEXT_QUERY_TEST};
pub use render::Dialect;

use crate::backend::{Backend, BackendConfig, BackendDescriptor};
use crate::error::ConversionError;
use crate::options::{get_all, get_int, get_str, BackendOptions};
use crate::result::{Conversion, ConversionResult, SkippedRule};

/// One rule's query plus the collection index it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub index: usize,
    pub query: String,
}

/// Dialect-specific output formats beyond `default`, `json` and `nul`.
pub type FormatFinisher = fn(&str, &[RenderedQuery], &SigmaCollection) -> Option<ConversionResult>;

pub struct TextQueryBackend {
    descriptor: &'static BackendDescriptor,
    dialect: &'static Dialect,
    finish: FormatFinisher,
    pipeline: ProcessingPipeline,
    options: BackendOptions,
    collect_errors: bool,
}

impl TextQueryBackend {
    pub fn new(
        descriptor: &'static BackendDescriptor,
        dialect: &'static Dialect,
        finish: FormatFinisher,
        config: BackendConfig,
    ) -> Self {
        Self {
            descriptor,
            dialect,
            finish,
            pipeline: config.pipeline,
            options: config.options,
            collect_errors: config.collect_errors,
        }
    }

    /// Render one rule, pipeline applied.
    fn convert_rule(&self, rule: &RuleDocument) -> Result<String, String> {
        if let Some(error) = rule.errors().first() {
            return Err(format!("rule has {} parse error(s), first: {}", rule.errors().len(), error));
        }
        let processed = self.pipeline.apply(rule);
        let detection_rule = match &processed {
            RuleDocument::Detection(rule) => rule,
            RuleDocument::Correlation(_) => {
                return Err(format!(
                    "correlation rules are not supported by backend '{}'",
                    self.descriptor.identifier
                ))
            }
            RuleDocument::Filter(_) => {
                return Err("filter documents are applied to other rules with --filter".to_string())
            }
        };

        let mut query = render::render_rule(self.dialect, &detection_rule.detection)?;
        if let Some(prefix) = get_str(&self.options, "query_prefix") {
            query = format!("{} {}", prefix, query);
        }
        let table_fields = get_all(&self.options, "table_fields");
        if !table_fields.is_empty() {
            query = format!("{} | table {}", query, table_fields.join(","));
        }
        if let Some(max) = get_int(&self.options, "max_query_length") {
            let length = query.chars().count();
            if length as i64 > max {
                return Err(format!("query length {} exceeds max_query_length {}", length, max));
            }
        }
        Ok(query)
    }

    fn records(&self, queries: &[RenderedQuery], rules: &SigmaCollection) -> Vec<Value> {
        queries
            .iter()
            .map(|q| {
                let meta = rules.rules[q.index].meta();
                json!({
                    "id": meta.id,
                    "title": meta.title,
                    "level": meta.level,
                    "query": q.query,
                })
            })
            .collect()
    }
}

impl Backend for TextQueryBackend {
    fn descriptor(&self) -> &'static BackendDescriptor {
        self.descriptor
    }

    fn convert(&self, rules: &SigmaCollection, format: &str) -> Result<Conversion, ConversionError> {
        if !self.descriptor.formats.iter().any(|f| f.name == format) {
            return Err(ConversionError::UnsupportedFormat {
                backend: self.descriptor.identifier.to_string(),
                format: format.to_string(),
            });
        }

        let mut queries = Vec::with_capacity(rules.len());
        let mut skipped = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            match self.convert_rule(rule) {
                Ok(query) => queries.push(RenderedQuery { index, query }),
                Err(reason) if self.collect_errors => {
                    warn!(rule = %rule.label(), reason = %reason, "skipping unconvertible rule");
                    skipped.push(SkippedRule {
                        index,
                        source: rule.label(),
                        reason,
                    });
                }
                Err(reason) => {
                    return Err(ConversionError::Rule {
                        rule: rule.label(),
                        reason,
                    })
                }
            }
        }
        debug!(
            backend = self.descriptor.identifier,
            format,
            converted = queries.len(),
            skipped = skipped.len(),
            "converted rules"
        );

        let result = match format {
            "default" => ConversionResult::TextList(queries.iter().map(|q| q.query.clone()).collect()),
            "json" => ConversionResult::RecordList(self.records(&queries, rules)),
            "nul" => {
                let joined: Vec<&str> = queries.iter().map(|q| q.query.as_str()).collect();
                ConversionResult::Bytes(joined.join("\0").into_bytes())
            }
            other => match (self.finish)(other, &queries, rules) {
                Some(result) => result,
                None => {
                    return Err(ConversionError::UnsupportedFormat {
                        backend: self.descriptor.identifier.to_string(),
                        format: other.to_string(),
                    })
                }
            },
        };

        Ok(Conversion {
            result,
            converted: queries.iter().map(|q| q.index).collect(),
            skipped,
        })
    }
}
