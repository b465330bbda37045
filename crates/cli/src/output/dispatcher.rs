//! Materializing a conversion result into the requested sink.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use sigma_backend::{Conversion, ConversionResult, FormatInfo, ResultKind};
use sigma_rules::SigmaCollection;
use tracing::{debug, info};

use super::encoding::TextEncoding;
use super::fanout::{FanOutReport, FanOutWriter};
use super::OutputPlan;
use crate::error::{CliError, Result};

/// How text and JSON output is rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputSettings {
    pub encoding: TextEncoding,
    /// Pretty-print JSON with this many spaces per level.
    pub json_indent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// Everything went to standard output or one file.
    Single { bytes: usize },
    FanOut(FanOutReport),
}

pub struct ConversionDispatcher {
    plan: OutputPlan,
    settings: OutputSettings,
}

impl ConversionDispatcher {
    pub fn new(plan: OutputPlan, settings: OutputSettings) -> Self {
        Self { plan, settings }
    }

    /// Reject format and sink combinations before any rule is read.
    pub fn check_format(&self, format: &FormatInfo, stdout_is_tty: bool) -> Result<()> {
        match &self.plan {
            OutputPlan::FanOut { .. } if !format.kind.is_per_rule() => Err(CliError::FanOutUnsupported {
                format: format.name.to_string(),
                kind: format.kind,
            }),
            OutputPlan::Stdout if stdout_is_tty && format.kind == ResultKind::Bytes => {
                Err(CliError::BinaryToTerminal)
            }
            _ => Ok(()),
        }
    }

    /// Write `conversion` to the planned sink.
    ///
    /// `rules` must be the collection the backend converted; fan-out uses it
    /// to find each rule's source path.
    pub fn dispatch(
        &self,
        format: &FormatInfo,
        conversion: &Conversion,
        rules: &SigmaCollection,
        stdout: &mut dyn Write,
        stdout_is_tty: bool,
    ) -> Result<DispatchReport> {
        let kind = conversion.result.kind();
        if kind != format.kind {
            return Err(CliError::ContractViolation(format!(
                "format '{}' is declared to produce {} but the backend returned {}",
                format.name, format.kind, kind
            )));
        }
        self.check_format(format, stdout_is_tty)?;

        match &self.plan {
            OutputPlan::Stdout => {
                let mut bytes = self.render(&conversion.result)?;
                if stdout_is_tty && !bytes.is_empty() {
                    bytes.extend(self.settings.encoding.encode("\n")?);
                }
                stdout
                    .write_all(&bytes)
                    .and_then(|()| stdout.flush())
                    .map_err(|source| CliError::Write {
                        path: PathBuf::from("<stdout>"),
                        source,
                    })?;
                Ok(DispatchReport::Single { bytes: bytes.len() })
            }
            OutputPlan::File(path) => {
                let bytes = self.render(&conversion.result)?;
                fs::write(path, &bytes).map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), bytes = bytes.len(), "wrote conversion output");
                Ok(DispatchReport::Single { bytes: bytes.len() })
            }
            OutputPlan::FanOut { dir, nesting_level } => {
                let items = self.render_items(&conversion.result)?;
                if items.len() != conversion.converted.len() {
                    return Err(CliError::ContractViolation(format!(
                        "backend returned {} items for {} converted rules",
                        items.len(),
                        conversion.converted.len()
                    )));
                }

                let mut writer = FanOutWriter::new(dir, *nesting_level);
                for (content, &index) in items.iter().zip(&conversion.converted) {
                    let rule = rules.rules.get(index).ok_or_else(|| {
                        CliError::ContractViolation(format!("converted rule index {} out of range", index))
                    })?;
                    writer.write(&rule.label(), rule.source(), content)?;
                }
                let report = writer.finish();
                info!(
                    dir = %dir.display(),
                    written = report.written,
                    attempted = report.attempted,
                    "wrote per-rule output"
                );
                Ok(DispatchReport::FanOut(report))
            }
        }
    }

    /// Render a result as one unit for a single sink.
    pub fn render(&self, result: &ConversionResult) -> Result<Vec<u8>> {
        let encoding = self.settings.encoding;
        match result {
            ConversionResult::Text(text) => encoding.encode(text),
            ConversionResult::Bytes(bytes) => Ok(bytes.clone()),
            ConversionResult::TextList(items) => encoding.encode(&items.join("\n\n")),
            ConversionResult::RecordList(records) => {
                let lines = records
                    .iter()
                    .map(|record| to_json(record, self.settings.json_indent))
                    .collect::<Result<Vec<_>>>()?;
                encoding.encode(&lines.join("\n"))
            }
            ConversionResult::Record(record) => encoding.encode(&to_json(record, self.settings.json_indent)?),
        }
    }

    /// Render each per-rule item separately.
    fn render_items(&self, result: &ConversionResult) -> Result<Vec<Vec<u8>>> {
        let encoding = self.settings.encoding;
        match result {
            ConversionResult::TextList(items) => items.iter().map(|item| encoding.encode(item)).collect(),
            ConversionResult::RecordList(records) => records
                .iter()
                .map(|record| encoding.encode(&to_json(record, self.settings.json_indent)?))
                .collect(),
            other => Err(CliError::FanOutUnsupported {
                format: other.kind().to_string(),
                kind: other.kind(),
            }),
        }
    }
}

/// Serialize a record; anything but a JSON object breaks the backend contract.
fn to_json(value: &Value, indent: Option<usize>) -> Result<String> {
    if !value.is_object() {
        return Err(CliError::ContractViolation(format!(
            "expected a JSON object, got {}",
            json_type(value)
        )));
    }
    let Some(width) = indent else {
        return Ok(value.to_string());
    };

    let indent = " ".repeat(width);
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    value
        .serialize(&mut serializer)
        .map_err(|e| CliError::ContractViolation(e.to_string()))?;
    debug!(bytes = out.len(), indent = width, "serialized record");
    String::from_utf8(out).map_err(|e| CliError::ContractViolation(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigma_rules::SourceOrigin;
    use tempfile::TempDir;

    const TEXT_LIST: FormatInfo = FormatInfo {
        name: "default",
        description: "queries",
        kind: ResultKind::TextList,
    };
    const RECORDS: FormatInfo = FormatInfo {
        name: "json",
        description: "records",
        kind: ResultKind::RecordList,
    };
    const RECORD: FormatInfo = FormatInfo {
        name: "summary",
        description: "one record",
        kind: ResultKind::Record,
    };
    const BYTES: FormatInfo = FormatInfo {
        name: "nul",
        description: "bytes",
        kind: ResultKind::Bytes,
    };

    fn conversion(result: ConversionResult, converted: Vec<usize>) -> Conversion {
        Conversion {
            result,
            converted,
            skipped: Vec::new(),
        }
    }

    fn stdout_dispatcher(settings: OutputSettings) -> ConversionDispatcher {
        ConversionDispatcher::new(OutputPlan::Stdout, settings)
    }

    fn dispatch_to_vec(
        dispatcher: &ConversionDispatcher,
        format: &FormatInfo,
        result: ConversionResult,
        tty: bool,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        dispatcher.dispatch(format, &conversion(result, Vec::new()), &SigmaCollection::default(), &mut out, tty)?;
        Ok(out)
    }

    fn rules_at(paths: &[&str]) -> SigmaCollection {
        SigmaCollection::merge(paths.iter().map(|p| {
            SigmaCollection::from_yaml(
                &format!("title: {p}\nlogsource: {{}}\ndetection:\n  s:\n    a: 1\n  condition: s\n"),
                SourceOrigin::File(PathBuf::from(p)),
            )
        }))
    }

    #[test]
    fn text_list_joins_with_one_blank_line() {
        let out = dispatch_to_vec(
            &stdout_dispatcher(OutputSettings::default()),
            &TEXT_LIST,
            ConversionResult::TextList(vec!["a".into(), "b".into()]),
            false,
        )
        .unwrap();
        assert_eq!(out, b"a\n\nb");
    }

    #[test]
    fn terminal_output_ends_with_newline() {
        let out = dispatch_to_vec(
            &stdout_dispatcher(OutputSettings::default()),
            &TEXT_LIST,
            ConversionResult::TextList(vec!["a".into()]),
            true,
        )
        .unwrap();
        assert_eq!(out, b"a\n");
    }

    #[test]
    fn record_list_is_one_document_per_line() {
        let out = dispatch_to_vec(
            &stdout_dispatcher(OutputSettings::default()),
            &RECORDS,
            ConversionResult::RecordList(vec![json!({"q": 1}), json!({"q": 2})]),
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"q\":1}\n{\"q\":2}");
    }

    #[test]
    fn json_indent_pretty_prints() {
        let settings = OutputSettings {
            json_indent: Some(2),
            ..OutputSettings::default()
        };
        let out = dispatch_to_vec(
            &stdout_dispatcher(settings),
            &RECORD,
            ConversionResult::Record(json!({"rules": 2})),
            false,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"rules\": 2\n}");
    }

    #[test]
    fn non_object_record_is_a_contract_violation() {
        let err = dispatch_to_vec(
            &stdout_dispatcher(OutputSettings::default()),
            &RECORDS,
            ConversionResult::RecordList(vec![json!({"q": 1}), json!("loose")]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::ContractViolation(m) if m.contains("a string")));
    }

    #[test]
    fn shape_must_match_declared_format() {
        let err = dispatch_to_vec(
            &stdout_dispatcher(OutputSettings::default()),
            &TEXT_LIST,
            ConversionResult::Text("x".into()),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::ContractViolation(_)));
    }

    #[test]
    fn bytes_are_refused_on_a_terminal() {
        let dispatcher = stdout_dispatcher(OutputSettings::default());
        assert!(matches!(
            dispatcher.check_format(&BYTES, true),
            Err(CliError::BinaryToTerminal)
        ));

        let out = dispatch_to_vec(&dispatcher, &BYTES, ConversionResult::Bytes(b"a\0b".to_vec()), false).unwrap();
        assert_eq!(out, b"a\0b");
    }

    #[test]
    fn text_is_encoded() {
        let settings = OutputSettings {
            encoding: TextEncoding::Utf16Le,
            ..OutputSettings::default()
        };
        let out = dispatch_to_vec(
            &stdout_dispatcher(settings),
            &TEXT_LIST,
            ConversionResult::TextList(vec!["a".into()]),
            false,
        )
        .unwrap();
        assert_eq!(out, vec![b'a', 0]);
    }

    #[test]
    fn single_file_sink() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let dispatcher = ConversionDispatcher::new(OutputPlan::File(path.clone()), OutputSettings::default());

        let report = dispatcher
            .dispatch(
                &TEXT_LIST,
                &conversion(ConversionResult::TextList(vec!["a".into(), "b".into()]), vec![0, 1]),
                &SigmaCollection::default(),
                &mut std::io::sink(),
                true,
            )
            .unwrap();
        assert_eq!(report, DispatchReport::Single { bytes: 4 });
        assert_eq!(fs::read_to_string(path).unwrap(), "a\n\nb");
    }

    #[test]
    fn fan_out_mirrors_source_tree() {
        let out = TempDir::new().unwrap();
        let dispatcher = ConversionDispatcher::new(
            OutputPlan::FanOut {
                dir: out.path().to_path_buf(),
                nesting_level: 2,
            },
            OutputSettings::default(),
        );
        let rules = rules_at(&["rules/group_one/r1.yml", "rules/group_two/r2.yml"]);

        let report = dispatcher
            .dispatch(
                &TEXT_LIST,
                &conversion(ConversionResult::TextList(vec!["q1".into(), "q2".into()]), vec![0, 1]),
                &rules,
                &mut std::io::sink(),
                false,
            )
            .unwrap();

        match report {
            DispatchReport::FanOut(report) => assert_eq!((report.written, report.attempted), (2, 2)),
            other => panic!("unexpected report: {other:?}"),
        }
        assert_eq!(fs::read_to_string(out.path().join("group_one/r1.yml")).unwrap(), "q1");
        assert_eq!(fs::read_to_string(out.path().join("group_two/r2.yml")).unwrap(), "q2");
    }

    #[test]
    fn fan_out_writes_every_document_of_a_multi_document_file() {
        let out = TempDir::new().unwrap();
        let dispatcher = ConversionDispatcher::new(
            OutputPlan::FanOut {
                dir: out.path().to_path_buf(),
                nesting_level: 2,
            },
            OutputSettings::default(),
        );
        let doc = |title: &str| format!("title: {title}\nlogsource: {{}}\ndetection:\n  s:\n    a: 1\n  condition: s\n");
        let rules = SigmaCollection::from_yaml(
            &format!("{}---\n{}", doc("first"), doc("second")),
            SourceOrigin::File(PathBuf::from("rules/g2/multi.yml")),
        );
        assert_eq!(rules.len(), 2);

        let report = dispatcher
            .dispatch(
                &TEXT_LIST,
                &conversion(ConversionResult::TextList(vec!["q0".into(), "q1".into()]), vec![0, 1]),
                &rules,
                &mut std::io::sink(),
                false,
            )
            .unwrap();

        match report {
            DispatchReport::FanOut(report) => {
                assert_eq!((report.written, report.attempted), (2, 2));
                assert!(report.failures.is_empty(), "{:?}", report.failures);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert_eq!(fs::read_to_string(out.path().join("g2/multi.yml")).unwrap(), "q0");
        assert_eq!(fs::read_to_string(out.path().join("g2/multi.1.yml")).unwrap(), "q1");
    }

    #[test]
    fn fan_out_follows_converted_indices() {
        let out = TempDir::new().unwrap();
        let dispatcher = ConversionDispatcher::new(
            OutputPlan::FanOut {
                dir: out.path().to_path_buf(),
                nesting_level: 1,
            },
            OutputSettings::default(),
        );
        let rules = rules_at(&["a/skipped.yml", "a/kept.yml"]);

        dispatcher
            .dispatch(
                &RECORDS,
                &conversion(ConversionResult::RecordList(vec![json!({"q": "kept"})]), vec![1]),
                &rules,
                &mut std::io::sink(),
                false,
            )
            .unwrap();

        assert!(!out.path().join("skipped.yml").exists());
        assert_eq!(fs::read_to_string(out.path().join("kept.yml")).unwrap(), "{\"q\":\"kept\"}");
    }

    #[test]
    fn fan_out_requires_one_item_per_rule() {
        let out = TempDir::new().unwrap();
        let dispatcher = ConversionDispatcher::new(
            OutputPlan::FanOut {
                dir: out.path().to_path_buf(),
                nesting_level: 1,
            },
            OutputSettings::default(),
        );

        assert!(matches!(
            dispatcher.check_format(&RECORD, false),
            Err(CliError::FanOutUnsupported { .. })
        ));

        let err = dispatcher
            .dispatch(
                &TEXT_LIST,
                &conversion(ConversionResult::TextList(vec!["q".into()]), vec![0, 1]),
                &rules_at(&["a.yml", "b.yml"]),
                &mut std::io::sink(),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, CliError::ContractViolation(_)));
    }
}
