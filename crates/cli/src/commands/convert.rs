use std::io;

use anyhow::{Context, Result};
use sigma_backend::{BackendConfig, Conversion};
use sigma_rules::SigmaCollection;
use tracing::{debug, info, warn};

use super::{load_filters, load_rules, Outcome};
use crate::cli::ConvertArgs;
use crate::error::CliError;
use crate::options::BackendOptionMerger;
use crate::output::{ConversionDispatcher, DispatchReport, OutputPlan, OutputSettings};
use crate::pipelines::PipelineResolver;
use crate::plugins::Plugins;
use crate::terminal::Terminal;

/// Convert rules into queries of the target backend.
///
/// Everything that can be rejected from flags alone (backend, format, sink,
/// pipeline requirement, option syntax, pipeline resolution) is checked
/// before the first rule file is opened. Filters are applied to the parsed
/// rules before the backend's pipeline runs.
pub fn run(args: &ConvertArgs, plugins: &Plugins, terminal: &Terminal) -> Result<Outcome> {
    let backend = plugins.backends.get(&args.target).map_err(CliError::from)?;
    let format = backend.format(&args.format).map_err(CliError::from)?;

    let plan = OutputPlan::from_args(
        args.output.as_deref(),
        args.output_dir.as_deref(),
        args.nesting_level.map_or(1, usize::from),
    );
    let dispatcher = ConversionDispatcher::new(
        plan,
        OutputSettings {
            encoding: args.encoding,
            json_indent: args.json_indent,
        },
    );
    let stdout_is_tty = terminal.stdout_is_tty();
    dispatcher.check_format(format, stdout_is_tty)?;

    PipelineResolver::check_required(backend, &args.pipeline, args.without_pipeline)?;
    let options = BackendOptionMerger::merge(&args.backend_option)?;
    let pipeline = PipelineResolver::new(&plugins.pipelines).resolve(
        &args.pipeline,
        backend,
        !args.disable_pipeline_check,
    )?;

    let converter = backend
        .create(BackendConfig {
            pipeline,
            options,
            collect_errors: args.skip_unsupported,
        })
        .map_err(CliError::from)?;

    let mut rules = load_rules(&args.input, &args.file_pattern)?;
    if !args.filter.is_empty() {
        let filters = load_filters(&args.filter, &args.file_pattern)?;
        let applied = rules.apply_filters(&filters);
        debug!(filters = filters.len(), applied, "filters applied");
    }
    info!(backend = backend.identifier, format = format.name, rules = rules.len(), "converting rules");
    let conversion = converter
        .convert(&rules, format.name)
        .map_err(CliError::from)
        .context("conversion failed")?;

    let stdout = io::stdout();
    let report = dispatcher.dispatch(format, &conversion, &rules, &mut stdout.lock(), stdout_is_tty)?;
    if let DispatchReport::Single { bytes } = &report {
        debug!(bytes, "conversion output written");
    }

    report_problems(terminal, &rules, &conversion)?;
    terminal.print_diagnostic(&summary_line(&rules, &conversion, &report))?;

    let failed = match &report {
        DispatchReport::FanOut(fan_out) => fan_out.failed(args.best_effort),
        DispatchReport::Single { .. } => false,
    };
    if failed || (!rules.errors.is_empty() && !args.skip_unsupported) {
        return Ok(Outcome::Failure);
    }
    Ok(Outcome::Success)
}

fn report_problems(terminal: &Terminal, rules: &SigmaCollection, conversion: &Conversion) -> Result<()> {
    if !conversion.skipped.is_empty() {
        terminal.print_diagnostic("Ignored errors:")?;
        for skipped in &conversion.skipped {
            terminal.print_diagnostic(&format!("{}: {}", skipped.source, skipped.reason))?;
        }
    }
    if !rules.errors.is_empty() {
        terminal.print_diagnostic("Input errors:")?;
        for error in &rules.errors {
            warn!(error = %error, "collection error");
            terminal.print_diagnostic(&error.to_string())?;
        }
    }
    Ok(())
}

/// `Summary: rules=N converted=N skipped=N errors=N [written=W/A]`
fn summary_line(rules: &SigmaCollection, conversion: &Conversion, report: &DispatchReport) -> String {
    let mut line = format!(
        "Summary: rules={} converted={} skipped={} errors={}",
        rules.len(),
        conversion.converted.len(),
        conversion.skipped.len(),
        rules.errors.len() + rules.rule_error_count(),
    );
    if let DispatchReport::FanOut(fan_out) = report {
        line.push_str(&format!(" written={}/{}", fan_out.written, fan_out.attempted));
        for failure in &fan_out.failures {
            let path = failure
                .path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string());
            line.push_str(&format!("\nWrite failed: {} -> {}: {}", failure.rule, path, failure.reason));
        }
    }
    line
}
