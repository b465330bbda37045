//! Built-in pipelines and specifier resolution.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use serde_yaml::Value;
use sigma_rules::validation::fuzzy::fuzzy_match;

use crate::condition::RuleCondition;
use crate::error::{PipelineError, Result};
use crate::pipeline::{ProcessingItem, ProcessingPipeline};
use crate::transformation::{Transformation, ValuePattern};

/// A registered pipeline: its generator plus the backends it is meant for.
#[derive(Clone, Copy)]
pub struct PipelineInfo {
    pub identifier: &'static str,
    pub description: &'static str,
    /// Empty means any backend.
    pub allowed_backends: &'static [&'static str],
    factory: fn() -> ProcessingPipeline,
}

impl PipelineInfo {
    pub fn new(
        identifier: &'static str,
        description: &'static str,
        allowed_backends: &'static [&'static str],
        factory: fn() -> ProcessingPipeline,
    ) -> Self {
        Self {
            identifier,
            description,
            allowed_backends,
            factory,
        }
    }

    pub fn allows(&self, backend: &str) -> bool {
        self.allowed_backends.is_empty() || self.allowed_backends.contains(&backend)
    }

    /// Generate the pipeline, stamped with this entry's allow-list.
    pub fn build(&self) -> ProcessingPipeline {
        let mut pipeline = (self.factory)();
        if pipeline.name.is_empty() {
            pipeline.name = self.identifier.to_string();
        }
        pipeline.allowed_backends = self.allowed_backends.iter().map(|b| b.to_string()).collect::<IndexSet<_>>();
        pipeline
    }
}

/// What a pipeline specifier turned out to be.
#[derive(Clone)]
pub enum ResolvedSpecifier<'r> {
    Registered(&'r PipelineInfo),
    /// A pipeline file or a directory of them; allowed for every backend.
    Path(PathBuf),
}

impl ResolvedSpecifier<'_> {
    pub fn allows(&self, backend: &str) -> bool {
        match self {
            ResolvedSpecifier::Registered(info) => info.allows(backend),
            ResolvedSpecifier::Path(_) => true,
        }
    }

    pub fn load(&self) -> Result<ProcessingPipeline> {
        match self {
            ResolvedSpecifier::Registered(info) => Ok(info.build()),
            ResolvedSpecifier::Path(path) => ProcessingPipeline::from_path(path),
        }
    }
}

/// Named pipelines available to `--pipeline`.
pub struct PipelineRegistry {
    entries: IndexMap<&'static str, PipelineInfo>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(PipelineInfo::new(
            "sysmon",
            "Sysmon event ids and log source for Windows rules",
            &[],
            sysmon,
        ));
        registry.register(PipelineInfo::new(
            "windows",
            "Windows event log channels for service-based rules",
            &[],
            windows,
        ));
        registry.register(PipelineInfo::new(
            "splunk_windows",
            "Splunk Windows event log sources",
            &["splunk"],
            splunk_windows,
        ));
        registry.register(PipelineInfo::new(
            "splunk_sysmon_acceleration",
            "Splunk CIM Endpoint.Processes data model field names",
            &["splunk"],
            splunk_sysmon_acceleration,
        ));
        registry.register(PipelineInfo::new(
            "ecs_windows",
            "Elastic Common Schema field names for Winlogbeat",
            &["lucene"],
            ecs_windows,
        ));
        registry.register(PipelineInfo::new(
            "crowdstrike_fdr",
            "CrowdStrike Falcon Data Replicator events",
            &[],
            crowdstrike_fdr,
        ));
        registry
    }

    pub fn register(&mut self, info: PipelineInfo) {
        self.entries.insert(info.identifier, info);
    }

    pub fn get(&self, identifier: &str) -> Option<&PipelineInfo> {
        self.entries.get(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineInfo> {
        self.entries.values()
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Registered identifiers first, then filesystem paths.
    pub fn resolve_specifier(&self, specifier: &str) -> Result<ResolvedSpecifier<'_>> {
        if let Some(info) = self.get(specifier) {
            return Ok(ResolvedSpecifier::Registered(info));
        }
        let path = Path::new(specifier);
        if path.exists() {
            return Ok(ResolvedSpecifier::Path(path.to_path_buf()));
        }
        Err(PipelineError::NotFound {
            specifier: specifier.to_string(),
            suggestion: fuzzy_match(specifier, &self.identifiers()).map(str::to_string),
        })
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Built-in pipelines ──────────────────────────────────────────────

fn mapping(pairs: &[(&str, &str)]) -> Transformation {
    Transformation::FieldNameMapping {
        mapping: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
}

fn add_condition(field: &str, value: Value) -> Transformation {
    let mut conditions = IndexMap::new();
    conditions.insert(field.to_string(), value);
    Transformation::AddCondition { conditions }
}

fn windows_category(category: &str) -> RuleCondition {
    RuleCondition::logsource(Some(category), Some("windows"), None)
}

fn windows_service(service: &str) -> RuleCondition {
    RuleCondition::logsource(None, Some("windows"), Some(service))
}

fn sysmon() -> ProcessingPipeline {
    let mut pipeline = ProcessingPipeline::new("Generic Sysmon", 10);
    for (category, event_id) in [
        ("process_creation", 1),
        ("network_connection", 3),
        ("image_load", 7),
        ("file_event", 11),
        ("dns_query", 22),
    ] {
        pipeline = pipeline
            .with_item(
                ProcessingItem::new(add_condition("EventID", Value::from(event_id)))
                    .with_id(&format!("sysmon_{}_eventid", category))
                    .when(windows_category(category)),
            )
            .with_item(
                ProcessingItem::new(Transformation::ChangeLogsource {
                    category: None,
                    product: Some("windows".into()),
                    service: Some("sysmon".into()),
                })
                .with_id(&format!("sysmon_{}_logsource", category))
                .when(windows_category(category)),
            );
    }
    pipeline
}

fn windows() -> ProcessingPipeline {
    let mut pipeline = ProcessingPipeline::new("Windows channels", 20);
    for (service, channel) in [
        ("security", "Security"),
        ("system", "System"),
        ("application", "Application"),
        ("sysmon", "Microsoft-Windows-Sysmon/Operational"),
        ("powershell", "Microsoft-Windows-PowerShell/Operational"),
    ] {
        pipeline = pipeline.with_item(
            ProcessingItem::new(add_condition("Channel", Value::from(channel)))
                .with_id(&format!("windows_{}_channel", service))
                .when(windows_service(service)),
        );
    }
    pipeline
}

fn splunk_windows() -> ProcessingPipeline {
    let mut pipeline = ProcessingPipeline::new("Splunk Windows log sources", 20);
    for (service, source) in [
        ("security", "WinEventLog:Security"),
        ("system", "WinEventLog:System"),
        ("application", "WinEventLog:Application"),
        ("sysmon", "WinEventLog:Microsoft-Windows-Sysmon/Operational"),
        ("powershell", "WinEventLog:Microsoft-Windows-PowerShell/Operational"),
    ] {
        pipeline = pipeline.with_item(
            ProcessingItem::new(add_condition("source", Value::from(source)))
                .with_id(&format!("splunk_windows_{}_source", service))
                .when(windows_service(service)),
        );
    }
    pipeline
}

fn splunk_sysmon_acceleration() -> ProcessingPipeline {
    ProcessingPipeline::new("Splunk CIM Processes data model", 20).with_item(
        ProcessingItem::new(mapping(&[
            ("Image", "Processes.process_path"),
            ("CommandLine", "Processes.process"),
            ("ParentImage", "Processes.parent_process_path"),
            ("ParentCommandLine", "Processes.parent_process"),
            ("User", "Processes.user"),
            ("OriginalFileName", "Processes.original_file_name"),
            ("ProcessId", "Processes.process_id"),
        ]))
        .with_id("splunk_cim_process_fields")
        .when(windows_category("process_creation")),
    )
}

fn ecs_windows() -> ProcessingPipeline {
    ProcessingPipeline::new("Elastic Common Schema (Winlogbeat)", 20)
        .with_item(
            ProcessingItem::new(mapping(&[
                ("EventID", "event.code"),
                ("Channel", "winlog.channel"),
                ("Provider_Name", "winlog.provider_name"),
                ("ComputerName", "winlog.computer_name"),
                ("Image", "process.executable"),
                ("CommandLine", "process.command_line"),
                ("ParentImage", "process.parent.executable"),
                ("ParentCommandLine", "process.parent.command_line"),
                ("User", "user.name"),
            ]))
            .with_id("ecs_windows_fields")
            .when(RuleCondition::logsource(None, Some("windows"), None)),
        )
        .with_item(
            ProcessingItem::new(Transformation::FieldNameSuffix {
                suffix: ".keyword".into(),
            })
            .with_id("ecs_windows_keyword")
            .when(RuleCondition::logsource(None, Some("windows"), Some("security"))),
        )
}

static DRIVE_LETTER: LazyLock<ValuePattern> =
    LazyLock::new(|| ValuePattern::new(r"(?i)^[a-z]:\\").expect("drive letter pattern is valid"));

fn crowdstrike_fdr() -> ProcessingPipeline {
    let drive_letter = Transformation::ReplaceString {
        regex: DRIVE_LETTER.clone(),
        replacement: r"\Device\HarddiskVolume?\".into(),
    };
    ProcessingPipeline::new("CrowdStrike FDR", 20)
        .with_item(
            ProcessingItem::new(add_condition("event_simpleName", Value::from("ProcessRollup2")))
                .with_id("cs_process_event")
                .when(windows_category("process_creation")),
        )
        .with_item(
            ProcessingItem::new(mapping(&[
                ("Image", "ImageFileName"),
                ("ParentImage", "ParentBaseFileName"),
                ("ProcessId", "RawProcessId"),
                ("User", "UserName"),
            ]))
            .with_id("cs_process_fields")
            .when(windows_category("process_creation")),
        )
        .with_item(
            ProcessingItem::new(Transformation::DropDetectionItem {
                fields: vec!["Provider_Name".into()],
            })
            .with_id("cs_drop_provider"),
        )
        .with_item(ProcessingItem::new(drive_letter).with_id("cs_device_paths"))
}
