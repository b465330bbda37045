//! Field names used by rules after pipeline processing.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use sigma_pipeline::ProcessingPipeline;
use sigma_rules::{RuleDocument, SigmaCollection};
use tracing::info;

use super::write_report;
use crate::cli::{FieldsArgs, ReportFormat};
use crate::commands::load_rules;
use crate::error::CliError;
use crate::pipelines::PipelineResolver;
use crate::plugins::Plugins;

pub fn run(args: &FieldsArgs, plugins: &Plugins) -> Result<()> {
    let backend = plugins.backends.get(&args.target).map_err(CliError::from)?;
    PipelineResolver::check_required(backend, &args.pipeline, args.without_pipeline)?;
    let pipeline = PipelineResolver::new(&plugins.pipelines).resolve(
        &args.pipeline,
        backend,
        !args.disable_pipeline_check,
    )?;

    let rules = load_rules(&args.input, &args.file_pattern)?;
    let fields = extract_fields(&rules, &pipeline);
    info!(backend = backend.identifier, rules = rules.len(), fields = fields.len(), "extracted fields");

    let report = match args.format {
        ReportFormat::Text => fields.iter().cloned().collect::<Vec<_>>().join("\n"),
        ReportFormat::Json => serde_json::to_string_pretty(&fields).context("failed to serialize fields")?,
    };
    write_report(&args.output, &report)
}

/// Sorted, unique field names of every rule with `pipeline` applied.
///
/// Detection rules contribute the fields of their searches, correlation
/// rules their `group-by` fields. Keyword searches have no field.
fn extract_fields(rules: &SigmaCollection, pipeline: &ProcessingPipeline) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    for rule in rules.iter() {
        match pipeline.apply(rule) {
            RuleDocument::Detection(processed) => fields.extend(
                processed
                    .detection
                    .field_names()
                    .into_iter()
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            ),
            RuleDocument::Correlation(correlation) => fields.extend(correlation.correlation.group_by),
            RuleDocument::Filter(_) => {}
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_pipeline::{ProcessingItem, Transformation};
    use sigma_rules::SourceOrigin;

    const RULES: &str = r#"
title: Whoami
logsource: {category: process_creation, product: windows}
detection:
  selection:
    Image|endswith: '\whoami.exe'
    CommandLine|contains: /all
  keywords: [whoami]
  condition: selection or keywords
---
title: Net user
logsource: {category: process_creation, product: windows}
detection:
  selection:
    - Image|endswith: '\net.exe'
    - OriginalFileName: net.exe
  condition: selection
---
title: Many logons
correlation:
  type: event_count
  rules: [whoami]
  group-by: [User, ComputerName]
"#;

    fn rules() -> SigmaCollection {
        SigmaCollection::from_yaml(RULES, SourceOrigin::Stdin)
    }

    #[test]
    fn fields_are_sorted_and_unique() {
        let fields = extract_fields(&rules(), &ProcessingPipeline::default());
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        assert_eq!(fields, vec!["CommandLine", "ComputerName", "Image", "OriginalFileName", "User"]);
    }

    #[test]
    fn pipeline_mapping_is_applied_first() {
        let pipeline = ProcessingPipeline::new("ecs", 10).with_item(ProcessingItem::new(
            Transformation::FieldNamePrefix {
                prefix: "process.".to_string(),
            },
        ));
        let fields = extract_fields(&rules(), &pipeline);
        assert!(fields.contains("process.Image"));
        assert!(fields.contains("process.CommandLine"));
        assert!(!fields.contains("Image"));
        // correlation rules are not processed by pipelines
        assert!(fields.contains("User"));
    }
}
