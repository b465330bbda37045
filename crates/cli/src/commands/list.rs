use anyhow::Result;

use crate::cli::ListCommand;
use crate::error::CliError;
use crate::plugins::Plugins;
use crate::terminal::Terminal;

pub fn run(what: &ListCommand, plugins: &Plugins, terminal: &Terminal) -> Result<()> {
    match what {
        ListCommand::Targets => terminal.print_table(&["Identifier", "Target Query Language"], &target_rows(plugins)),
        ListCommand::Formats { backend } => {
            terminal.print_table(&["Format", "Description"], &format_rows(plugins, backend)?)
        }
        ListCommand::Pipelines { backend } => terminal.print_table(
            &["Identifier", "Priority", "Processing Pipeline", "Backends"],
            &pipeline_rows(plugins, backend.as_deref())?,
        ),
        ListCommand::Validators => terminal.print_table(&["Name", "Description"], &validator_rows(plugins)),
    }
}

fn target_rows(plugins: &Plugins) -> Vec<Vec<String>> {
    plugins
        .backends
        .iter()
        .map(|b| vec![b.identifier.to_string(), b.text.to_string()])
        .collect()
}

fn format_rows(plugins: &Plugins, backend: &str) -> Result<Vec<Vec<String>>> {
    let descriptor = plugins.backends.get(backend).map_err(CliError::from)?;
    Ok(descriptor
        .formats
        .iter()
        .map(|f| vec![f.name.to_string(), f.description.to_string()])
        .collect())
}

/// With a backend, only pipelines usable with it are listed.
fn pipeline_rows(plugins: &Plugins, backend: Option<&str>) -> Result<Vec<Vec<String>>> {
    if let Some(backend) = backend {
        plugins.backends.get(backend).map_err(CliError::from)?;
    }
    Ok(plugins
        .pipelines
        .iter()
        .filter(|info| backend.map_or(true, |b| info.allows(b)))
        .map(|info| {
            let pipeline = info.build();
            let backends = if info.allowed_backends.is_empty() {
                "all".to_string()
            } else {
                info.allowed_backends.join(", ")
            };
            vec![
                info.identifier.to_string(),
                pipeline.priority.to_string(),
                info.description.to_string(),
                backends,
            ]
        })
        .collect())
}

fn validator_rows(plugins: &Plugins) -> Vec<Vec<String>> {
    plugins
        .validators
        .iter()
        .map(|v| vec![v.name.to_string(), v.description.to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_include_builtin_backends() {
        let rows = target_rows(&Plugins::builtin());
        let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert!(ids.contains(&"text_query_test"));
        assert!(ids.contains(&"splunk"));
        assert!(ids.contains(&"lucene"));
    }

    #[test]
    fn formats_of_unknown_backend_fail() {
        let plugins = Plugins::builtin();
        let err = format_rows(&plugins, "splnk").unwrap_err();
        let cli = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli.exit_code(), crate::error::EXIT_USAGE);

        let formats = format_rows(&plugins, "text_query_test").unwrap();
        assert_eq!(formats[0][0], "default");
    }

    #[test]
    fn pipelines_are_filtered_by_allow_list() {
        let plugins = Plugins::builtin();
        let all = pipeline_rows(&plugins, None).unwrap();
        let lucene = pipeline_rows(&plugins, Some("lucene")).unwrap();
        let ids: Vec<&str> = lucene.iter().map(|r| r[0].as_str()).collect();

        assert!(lucene.len() < all.len());
        assert!(ids.contains(&"ecs_windows"));
        assert!(ids.contains(&"sysmon"));
        assert!(!ids.contains(&"splunk_windows"));
    }

    #[test]
    fn validators_are_listed() {
        assert!(!validator_rows(&Plugins::builtin()).is_empty());
    }
}
