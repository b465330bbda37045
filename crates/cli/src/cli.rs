use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::VALIDATION_CONFIG_ENV;
use crate::input::DEFAULT_FILE_PATTERN;
use crate::output::TextEncoding;

/// Convert and check Sigma detection rules.
///
/// Turns rule files into queries for a target backend, applying processing
/// pipelines, and validates rules against best-practice checks.
#[derive(Parser, Debug)]
#[command(name = "sigma", version, about = "Convert and check Sigma detection rules")]
pub struct CliArgs {
    /// Print full error chains and debug logs
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert Sigma rules into queries.
    ///
    /// INPUT can be files, directories (searched recursively for --file-pattern)
    /// or '-' for standard input.
    Convert(ConvertArgs),

    /// Check Sigma rules for validity and best practices.
    Check(CheckArgs),

    /// List available targets, formats, pipelines or validators.
    List {
        #[command(subcommand)]
        what: ListCommand,
    },

    /// Analyze Sigma rule sets.
    Analyze {
        #[command(subcommand)]
        what: AnalyzeCommand,
    },

    /// Print the version of this tool.
    Version(VersionArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Target query language (see `sigma list targets`)
    #[arg(long, short = 't')]
    pub target: String,

    /// Processing pipeline identifier (see `sigma list pipelines`), YAML file or directory
    #[arg(long, short = 'p')]
    pub pipeline: Vec<String>,

    /// Convert without a processing pipeline even if the target requires one
    #[arg(long)]
    pub without_pipeline: bool,

    /// Allow pipelines that are intended for other targets
    #[arg(long)]
    pub disable_pipeline_check: bool,

    /// Filter file or directory narrowing the rules it names; repeat for several
    #[arg(long, value_name = "FILTER")]
    pub filter: Vec<PathBuf>,

    /// Output format of the target (see `sigma list formats <target>`)
    #[arg(long, short = 'f', default_value = "default")]
    pub format: String,

    /// File name pattern used when recursing into directories
    #[arg(long, short = 'P', default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Skip rules the backend cannot convert instead of failing
    #[arg(long, short = 's')]
    pub skip_unsupported: bool,

    /// Write the result to this file; '-' writes to standard output
    #[arg(long, short = 'o', conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Write one file per rule below this directory
    #[arg(long, short = 'd')]
    pub output_dir: Option<PathBuf>,

    /// Trailing path segments of each rule's source kept below --output-dir
    #[arg(long, requires = "output_dir", value_parser = clap::value_parser!(u16).range(1..))]
    pub nesting_level: Option<u16>,

    /// Tolerate per-rule write failures with --output-dir
    #[arg(long)]
    pub best_effort: bool,

    /// Encoding of text output; binary output is written unchanged
    #[arg(long, short = 'e', value_enum, default_value_t = TextEncoding::Utf8)]
    pub encoding: TextEncoding,

    /// Pretty-print JSON output with this indentation width
    #[arg(long, short = 'j')]
    pub json_indent: Option<usize>,

    /// Backend-specific option as key=value; repeat a key for a list
    #[arg(long = "backend-option", short = 'O')]
    pub backend_option: Vec<String>,

    /// Rule files or directories, '-' for standard input
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Validation configuration file in YAML format
    #[arg(long, short = 'c', env = VALIDATION_CONFIG_ENV)]
    pub validation_config: Option<PathBuf>,

    /// File name pattern used when recursing into directories
    #[arg(long, short = 'P', default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Fail on rule parsing errors (default)
    #[arg(long, short = 'e', overrides_with = "pass_on_error")]
    pub fail_on_error: bool,

    /// Do not fail on rule parsing errors
    #[arg(long, short = 'E', overrides_with = "fail_on_error")]
    pub pass_on_error: bool,

    /// Fail on validation issues
    #[arg(long, short = 'i', overrides_with = "pass_on_issues")]
    pub fail_on_issues: bool,

    /// Do not fail on validation issues (default)
    #[arg(long, short = 'I', overrides_with = "fail_on_issues")]
    pub pass_on_issues: bool,

    /// Validator to skip; repeat for several
    #[arg(long, short = 'x')]
    pub exclude: Vec<String>,

    /// Rule files or directories, '-' for standard input
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

impl CheckArgs {
    pub fn fails_on_error(&self) -> bool {
        !self.pass_on_error
    }

    pub fn fails_on_issues(&self) -> bool {
        self.fail_on_issues
    }
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List conversion targets.
    Targets,
    /// List output formats of a target.
    Formats { backend: String },
    /// List processing pipelines, optionally only those usable with a target.
    Pipelines { backend: Option<String> },
    /// List rule validators.
    Validators,
}

#[derive(Subcommand, Debug)]
pub enum AnalyzeCommand {
    /// Create an ATT&CK Navigator heatmap layer from rule tags.
    Attack(AttackArgs),
    /// List the field names rules use once the target's pipelines are applied.
    Fields(FieldsArgs),
    /// Count rules per logsource category and level.
    Logsource(LogsourceArgs),
}

/// Rendering of `analyze fields` and `analyze logsource` reports.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFunction {
    /// Count of rules
    Count,
    /// Maximum severity value
    Max,
    /// Summarized level score
    Level,
}

#[derive(Args, Debug)]
pub struct AttackArgs {
    /// Scoring function
    #[arg(value_enum)]
    pub function: ScoreFunction,

    /// Layer output file, '-' for standard output
    pub output: PathBuf,

    /// Rule files or directories, '-' for standard input
    #[arg(required = true)]
    pub input: Vec<PathBuf>,

    /// File name pattern used when recursing into directories
    #[arg(long, short = 'P', default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Count sub-techniques as their parent technique
    #[arg(long)]
    pub no_subtechniques: bool,

    /// Lower end of the color gradient
    #[arg(long, default_value_t = 0)]
    pub min_score: u64,

    /// Upper end of the color gradient (default: highest score)
    #[arg(long)]
    pub max_score: Option<u64>,

    /// Color of the lowest score
    #[arg(long, default_value = "#ffffff00")]
    pub min_color: String,

    /// Color of the highest score
    #[arg(long, default_value = "#ff0000")]
    pub max_color: String,
}

#[derive(Args, Debug)]
pub struct FieldsArgs {
    /// Target whose pipelines are applied before fields are collected
    #[arg(long, short = 't')]
    pub target: String,

    /// Processing pipeline identifier, YAML file or directory
    #[arg(long, short = 'p')]
    pub pipeline: Vec<String>,

    /// Collect fields without a processing pipeline even if the target requires one
    #[arg(long)]
    pub without_pipeline: bool,

    /// Allow pipelines that are intended for other targets
    #[arg(long)]
    pub disable_pipeline_check: bool,

    /// File name pattern used when recursing into directories
    #[arg(long, short = 'P', default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Report format
    #[arg(long, short = 'f', value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Output file, '-' for standard output
    pub output: PathBuf,

    /// Rule files or directories, '-' for standard input
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LogsourceArgs {
    /// File name pattern used when recursing into directories
    #[arg(long, short = 'P', default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Report format
    #[arg(long, short = 'f', value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Output file, '-' for standard output
    pub output: PathBuf,

    /// Rule files or directories, '-' for standard input
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Ask crates.io whether a newer release exists
    #[arg(long)]
    pub check_latest: bool,

    /// Timeout for the release check in seconds
    #[arg(long, default_value = "3")]
    pub timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_convert_defaults() {
        let args = CliArgs::try_parse_from(["sigma", "convert", "-t", "lucene", "rules"]).unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert_eq!(convert.format, "default");
        assert_eq!(convert.file_pattern, "*.yml");
        assert_eq!(convert.encoding, TextEncoding::Utf8);
        assert!(convert.pipeline.is_empty());
        assert_eq!(convert.input, vec![PathBuf::from("rules")]);
    }

    #[test]
    fn test_output_and_output_dir_conflict() {
        let err = CliArgs::try_parse_from([
            "sigma", "convert", "-t", "lucene", "-o", "out.txt", "--output-dir", "out", "rules",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_nesting_level_needs_output_dir() {
        let err = CliArgs::try_parse_from(["sigma", "convert", "-t", "lucene", "--nesting-level", "2", "rules"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let err = CliArgs::try_parse_from([
            "sigma", "convert", "-t", "lucene", "-d", "out", "--nesting-level", "0", "rules",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_check_flag_pairs_last_wins() {
        let args = CliArgs::try_parse_from(["sigma", "check", "rules"]).unwrap();
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert!(check.fails_on_error());
        assert!(!check.fails_on_issues());

        let args = CliArgs::try_parse_from([
            "sigma", "check", "--pass-on-error", "--fail-on-issues", "--pass-on-issues", "--fail-on-error", "rules",
        ])
        .unwrap();
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert!(check.fails_on_error());
        assert!(!check.fails_on_issues());
    }

    #[test]
    fn test_filters_accumulate() {
        let args = CliArgs::try_parse_from([
            "sigma", "convert", "-t", "lucene", "--filter", "a.yml", "--filter", "filters", "rules",
        ])
        .unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert_eq!(convert.filter, vec![PathBuf::from("a.yml"), PathBuf::from("filters")]);
    }

    #[test]
    fn test_analyze_subcommands() {
        let args = CliArgs::try_parse_from(["sigma", "analyze", "attack", "max", "-", "rules"]).unwrap();
        let Command::Analyze { what: AnalyzeCommand::Attack(attack) } = args.command else {
            panic!("expected analyze attack");
        };
        assert_eq!(attack.min_score, 0);
        assert_eq!(attack.max_score, None);

        let args = CliArgs::try_parse_from(["sigma", "analyze", "fields", "-t", "splunk", "-p", "sysmon", "-", "rules"])
            .unwrap();
        let Command::Analyze { what: AnalyzeCommand::Fields(fields) } = args.command else {
            panic!("expected analyze fields");
        };
        assert_eq!(fields.pipeline, vec!["sysmon"]);
        assert_eq!(fields.format, ReportFormat::Text);

        let args = CliArgs::try_parse_from(["sigma", "analyze", "logsource", "-f", "json", "out.json", "rules"]).unwrap();
        let Command::Analyze { what: AnalyzeCommand::Logsource(logsource) } = args.command else {
            panic!("expected analyze logsource");
        };
        assert_eq!(logsource.format, ReportFormat::Json);
        assert_eq!(logsource.output, PathBuf::from("out.json"));
    }

    #[test]
    fn test_repeated_options_accumulate() {
        let args = CliArgs::try_parse_from([
            "sigma", "convert", "-t", "splunk", "-p", "sysmon", "-p", "windows", "-O", "a=1", "-O", "a=2", "-",
        ])
        .unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert_eq!(convert.pipeline, vec!["sysmon", "windows"]);
        assert_eq!(convert.backend_option, vec!["a=1", "a=2"]);
        assert_eq!(convert.input, vec![PathBuf::from("-")]);
    }
}
