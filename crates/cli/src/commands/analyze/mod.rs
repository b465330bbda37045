//! Rule set analyses: ATT&CK coverage, field usage and logsource statistics.

pub mod attack;
pub mod fields;
pub mod logsource;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::input::STDIN_MARKER;

/// Write a report to `output`, or to standard output for `-`.
fn write_report(output: &Path, report: &str) -> Result<()> {
    if output.as_os_str() == STDIN_MARKER {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", report)?;
        return Ok(());
    }
    fs::write(output, format!("{}\n", report))
        .with_context(|| format!("failed to write report: {}", output.display()))?;
    info!(path = %output.display(), "wrote analysis report");
    Ok(())
}
