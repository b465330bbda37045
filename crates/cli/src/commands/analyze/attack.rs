//! ATT&CK Navigator heatmap layers from rule tags.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use sigma_rules::schema::RuleLevel;
use sigma_rules::{RuleDocument, SigmaCollection};
use tracing::info;

use super::write_report;
use crate::cli::{AttackArgs, ScoreFunction};
use crate::commands::load_rules;

const NAVIGATOR_VERSION: &str = "4.8.1";
const LAYER_VERSION: &str = "4.4";

#[derive(Debug, Serialize)]
struct Layer {
    name: String,
    domain: &'static str,
    description: String,
    versions: Versions,
    gradient: Gradient,
    techniques: Vec<TechniqueScore>,
}

#[derive(Debug, Serialize)]
struct Versions {
    navigator: &'static str,
    layer: &'static str,
}

#[derive(Debug, Serialize)]
struct Gradient {
    colors: [String; 2],
    #[serde(rename = "minValue")]
    min_value: u64,
    #[serde(rename = "maxValue")]
    max_value: u64,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct TechniqueScore {
    #[serde(rename = "techniqueID")]
    technique_id: String,
    score: u64,
}

pub fn run(args: &AttackArgs) -> Result<()> {
    let rules = load_rules(&args.input, &args.file_pattern)?;
    let scores = attack_scores(&rules, args.function, args.no_subtechniques);
    info!(techniques = scores.len(), "scored ATT&CK techniques");

    let layer = build_layer(args, scores);
    let json = serde_json::to_string_pretty(&layer).context("failed to serialize layer")?;
    write_report(&args.output, &json)
}

/// Technique id -> score, in first-seen order.
///
/// Only `attack.tNNNN[.NNN]` tags name techniques; tactic tags such as
/// `attack.execution` are ignored.
fn attack_scores(rules: &SigmaCollection, function: ScoreFunction, no_subtechniques: bool) -> IndexMap<String, u64> {
    let mut by_technique: IndexMap<String, Vec<&RuleDocument>> = IndexMap::new();
    for rule in rules.iter() {
        for tag in rule.meta().tags_in("attack") {
            if !is_technique(&tag.name) {
                continue;
            }
            let mut technique = tag.name.to_ascii_uppercase();
            if no_subtechniques {
                if let Some((parent, _)) = technique.split_once('.') {
                    technique = parent.to_string();
                }
            }
            let rules = by_technique.entry(technique).or_default();
            if !rules.iter().any(|r| std::ptr::eq(*r, rule)) {
                rules.push(rule);
            }
        }
    }

    by_technique
        .into_iter()
        .map(|(technique, rules)| (technique, score(function, &rules)))
        .collect()
}

fn is_technique(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('t' | 'T')) && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn score(function: ScoreFunction, rules: &[&RuleDocument]) -> u64 {
    match function {
        ScoreFunction::Count => rules.len() as u64,
        ScoreFunction::Max => rules
            .iter()
            .map(|r| r.meta().level.map_or(0, |l| u64::from(l.value())))
            .max()
            .unwrap_or(0),
        ScoreFunction::Level => rules.iter().map(|r| level_score(r.meta().level)).sum(),
    }
}

fn level_score(level: Option<RuleLevel>) -> u64 {
    match level {
        None | Some(RuleLevel::Informational) => 1,
        Some(RuleLevel::Low) => 2,
        Some(RuleLevel::Medium) => 4,
        Some(RuleLevel::High) => 8,
        Some(RuleLevel::Critical) => 12,
    }
}

fn build_layer(args: &AttackArgs, scores: IndexMap<String, u64>) -> Layer {
    let min_value = args.min_score;
    let max_value = args
        .max_score
        .unwrap_or_else(|| scores.values().copied().max().unwrap_or(0));
    let function = match args.function {
        ScoreFunction::Count => "count",
        ScoreFunction::Max => "max",
        ScoreFunction::Level => "level",
    };

    Layer {
        name: "Sigma rule heatmap".to_string(),
        domain: "enterprise-attack",
        description: format!("Sigma coverage heatmap generated by sigma-cli with score function {}", function),
        versions: Versions {
            navigator: NAVIGATOR_VERSION,
            layer: LAYER_VERSION,
        },
        gradient: Gradient {
            colors: [args.min_color.clone(), args.max_color.clone()],
            min_value,
            max_value,
        },
        techniques: scores
            .into_iter()
            .map(|(technique_id, score)| TechniqueScore { technique_id, score })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_rules::SourceOrigin;
    use std::path::PathBuf;

    const RULES: &str = r#"
title: One
level: high
tags: [attack.execution, attack.t1059.001]
logsource: {product: windows}
detection: {sel: {EventID: 1}, condition: sel}
---
title: Two
level: medium
tags: [attack.t1059.003, attack.t1033]
logsource: {product: windows}
detection: {sel: {EventID: 2}, condition: sel}
---
title: Three
tags: [attack.t1059.001]
logsource: {product: windows}
detection: {sel: {EventID: 3}, condition: sel}
"#;

    fn rules() -> SigmaCollection {
        SigmaCollection::from_yaml(RULES, SourceOrigin::Stdin)
    }

    #[test]
    fn count_per_technique() {
        let scores = attack_scores(&rules(), ScoreFunction::Count, false);
        let expected: Vec<(&str, u64)> = vec![("T1059.001", 2), ("T1059.003", 1), ("T1033", 1)];
        let actual: Vec<(&str, u64)> = scores.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn subtechniques_fold_into_parent() {
        let scores = attack_scores(&rules(), ScoreFunction::Count, true);
        assert_eq!(scores.get("T1059"), Some(&3));
        assert_eq!(scores.get("T1033"), Some(&1));
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn max_and_level_scores() {
        let max = attack_scores(&rules(), ScoreFunction::Max, true);
        assert_eq!(max.get("T1059"), Some(&4));

        // high (8) + medium (4) + no level (1)
        let level = attack_scores(&rules(), ScoreFunction::Level, true);
        assert_eq!(level.get("T1059"), Some(&13));
    }

    fn args(function: ScoreFunction) -> AttackArgs {
        AttackArgs {
            function,
            output: PathBuf::from("-"),
            input: vec![PathBuf::from("-")],
            file_pattern: "*.yml".into(),
            no_subtechniques: false,
            min_score: 0,
            max_score: None,
            min_color: "#ffffff00".into(),
            max_color: "#ff0000".into(),
        }
    }

    #[test]
    fn gradient_starts_at_zero_for_a_single_technique() {
        let rules = SigmaCollection::from_yaml(
            "title: Webshell\nlevel: high\ntags: [attack.persistence, attack.t1505.003]\nlogsource: {category: webserver}\ndetection: {sel: {cs-uri-query: cmd}, condition: sel}\n",
            SourceOrigin::Stdin,
        );
        let args = args(ScoreFunction::Max);
        let layer = build_layer(&args, attack_scores(&rules, ScoreFunction::Max, false));
        let json = serde_json::to_value(&layer).unwrap();

        assert_eq!(json["gradient"]["minValue"], 0);
        assert_eq!(json["gradient"]["maxValue"], 4);
        assert_eq!(json["techniques"][0]["techniqueID"], "T1505.003");
        assert_eq!(json["techniques"][0]["score"], 4);
    }

    #[test]
    fn layer_gradient_honors_explicit_bounds() {
        let args = AttackArgs {
            min_score: 1,
            max_score: Some(10),
            ..args(ScoreFunction::Count)
        };
        let layer = build_layer(&args, attack_scores(&rules(), ScoreFunction::Count, false));
        let json = serde_json::to_value(&layer).unwrap();

        assert_eq!(json["domain"], "enterprise-attack");
        assert_eq!(json["gradient"]["minValue"], 1);
        assert_eq!(json["gradient"]["maxValue"], 10);
        assert_eq!(json["gradient"]["colors"][1], "#ff0000");
        assert_eq!(json["techniques"][0]["techniqueID"], "T1059.001");
        assert_eq!(json["techniques"][0]["score"], 2);
    }
}
