//! Rule counts per logsource category and level.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use sigma_rules::schema::RuleLevel;
use sigma_rules::SigmaCollection;
use tracing::info;

use super::write_report;
use crate::cli::{LogsourceArgs, ReportFormat};
use crate::commands::load_rules;

/// Category label of rules without `logsource.category`.
const NO_CATEGORY: &str = "unspecified";

const COLUMNS: [&str; 8] = [
    "Logsource",
    "Overall",
    "Critical",
    "High",
    "Medium",
    "Low",
    "Informational",
    "None",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LevelCounts {
    overall: usize,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
    informational: usize,
    none: usize,
}

impl LevelCounts {
    fn add(&mut self, level: Option<RuleLevel>) {
        self.overall += 1;
        let slot = match level {
            Some(RuleLevel::Critical) => &mut self.critical,
            Some(RuleLevel::High) => &mut self.high,
            Some(RuleLevel::Medium) => &mut self.medium,
            Some(RuleLevel::Low) => &mut self.low,
            Some(RuleLevel::Informational) => &mut self.informational,
            None => &mut self.none,
        };
        *slot += 1;
    }

    fn cells(&self) -> [usize; 7] {
        [
            self.overall,
            self.critical,
            self.high,
            self.medium,
            self.low,
            self.informational,
            self.none,
        ]
    }
}

pub fn run(args: &LogsourceArgs) -> Result<()> {
    let rules = load_rules(&args.input, &args.file_pattern)?;
    let stats = logsource_stats(&rules);
    info!(categories = stats.len(), "counted rules per logsource");

    let report = match args.format {
        ReportFormat::Text => render_table(&stats),
        ReportFormat::Json => serde_json::to_string_pretty(&stats).context("failed to serialize statistics")?,
    };
    write_report(&args.output, &report)
}

/// Detection rules counted by level, grouped by category in first-seen order.
fn logsource_stats(rules: &SigmaCollection) -> IndexMap<String, LevelCounts> {
    let mut stats: IndexMap<String, LevelCounts> = IndexMap::new();
    for rule in rules.iter().filter_map(|r| r.as_detection()) {
        let category = rule.logsource.category.as_deref().unwrap_or(NO_CATEGORY);
        stats.entry(category.to_string()).or_default().add(rule.meta.level);
    }
    stats
}

/// Left-aligned columns separated by ` | `.
fn render_table(stats: &IndexMap<String, LevelCounts>) -> String {
    let rows: Vec<Vec<String>> = stats
        .iter()
        .map(|(category, counts)| {
            std::iter::once(category.clone())
                .chain(counts.cells().iter().map(usize::to_string))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, header)| rows.iter().map(|r| r[i].len()).chain([header.len()]).max().unwrap_or(0))
        .collect();
    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    let header = format_row(&header);
    let mut lines = vec![header.clone(), "-".repeat(header.len())];
    lines.extend(rows.iter().map(|row| format_row(row)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_rules::SourceOrigin;

    const RULES: &str = r#"
title: A
level: high
logsource: {category: process_creation, product: windows}
detection: {sel: {Image: a.exe}, condition: sel}
---
title: B
level: critical
logsource: {category: process_creation, product: windows}
detection: {sel: {Image: b.exe}, condition: sel}
---
title: C
logsource: {category: dns_query}
detection: {sel: {QueryName: c.example}, condition: sel}
---
title: D
level: low
logsource: {product: linux, service: auditd}
detection: {sel: {type: EXECVE}, condition: sel}
---
title: Correlated
correlation: {type: event_count, rules: [A]}
"#;

    fn stats() -> IndexMap<String, LevelCounts> {
        logsource_stats(&SigmaCollection::from_yaml(RULES, SourceOrigin::Stdin))
    }

    #[test]
    fn counts_by_category_and_level() {
        let stats = stats();
        let categories: Vec<&str> = stats.keys().map(String::as_str).collect();
        assert_eq!(categories, vec!["process_creation", "dns_query", "unspecified"]);

        let process = stats["process_creation"];
        assert_eq!((process.overall, process.high, process.critical), (2, 1, 1));
        assert_eq!(stats["dns_query"].none, 1);
        assert_eq!(stats["unspecified"].low, 1);
    }

    #[test]
    fn json_uses_level_names() {
        let json = serde_json::to_value(stats()).unwrap();
        assert_eq!(json["process_creation"]["Overall"], 2);
        assert_eq!(json["process_creation"]["Informational"], 0);
        assert_eq!(json["dns_query"]["None"], 1);
    }

    #[test]
    fn table_aligns_columns() {
        let table = render_table(&stats());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[0],
            "Logsource        | Overall | Critical | High | Medium | Low | Informational | None"
        );
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(
            lines[2],
            "process_creation | 2       | 1        | 1    | 0      | 0   | 0             | 0"
        );
        assert_eq!(lines.len(), 5);
    }
}
