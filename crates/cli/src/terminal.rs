use anyhow::Result;
use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
    tty::IsTty,
};
use sigma_rules::validation::{Severity, ValidationIssue};
use sigma_rules::ProgressObserver;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const ERROR: Color = Color::Red;
    const NOTICE: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
    const ISSUE: Color = Color::Cyan;
    const VALUE: Color = Color::Blue;
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::Green,
        Severity::Medium => Color::Yellow,
        Severity::High => Color::Red,
    }
}

/// Write `text`, colored when `color` is set.
fn paint(out: &mut impl Write, color: Option<Color>, text: &str) -> io::Result<()> {
    match color {
        Some(color) => execute!(out, SetForegroundColor(color), Print(text), ResetColor),
        None => out.write_all(text.as_bytes()),
    }
}

/// Left-aligned columns with a dashed rule under the header.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut table = line(headers.to_vec());
    let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    table.push_str(&format!("{}\n", "-".repeat(total)));
    for row in rows {
        table.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    table
}

/// Colored report output on stdout, diagnostics on stderr.
pub struct Terminal {
    stdout_color: bool,
    stderr_color: bool,
}

impl Terminal {
    /// Colors are used only on interactive streams.
    pub fn new() -> Self {
        Self {
            stdout_color: io::stdout().is_tty(),
            stderr_color: io::stderr().is_tty(),
        }
    }

    fn out_color(&self, color: Color) -> Option<Color> {
        self.stdout_color.then_some(color)
    }

    fn err_color(&self, color: Color) -> Option<Color> {
        self.stderr_color.then_some(color)
    }

    pub fn stdout_is_tty(&self) -> bool {
        io::stdout().is_tty()
    }

    /// Print a `=== Title ===` section header.
    pub fn print_header(&self, title: &str) -> Result<()> {
        let mut stdout = io::stdout();
        paint(&mut stdout, self.out_color(Colors::HEADER), &format!("=== {} ===\n", title))?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_line(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", text)?;
        Ok(())
    }

    pub fn print_table(&self, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
        let mut stdout = io::stdout();
        let table = format_table(headers, rows);
        let (head, body) = table.split_at(table.find('\n').map_or(0, |i| i + 1));
        paint(&mut stdout, self.out_color(Colors::DIM), head)?;
        let (rule, rest) = body.split_at(body.find('\n').map_or(0, |i| i + 1));
        paint(&mut stdout, self.out_color(Colors::DIM), rule)?;
        stdout.write_all(rest.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a validation issue as `key=value` pairs.
    pub fn print_issue(&self, issue: &ValidationIssue, rules: &str) -> Result<()> {
        let mut stdout = io::stdout();
        let value = self.out_color(Colors::VALUE);
        paint(&mut stdout, None, "issue=")?;
        paint(&mut stdout, self.out_color(Colors::ISSUE), issue.issue)?;
        paint(&mut stdout, None, " severity=")?;
        paint(&mut stdout, self.out_color(severity_color(issue.severity)), &issue.severity.to_string())?;
        paint(&mut stdout, None, " description=")?;
        paint(&mut stdout, value, issue.description)?;
        paint(&mut stdout, None, " rule=")?;
        paint(&mut stdout, value, rules)?;
        paint(&mut stdout, None, " validator=")?;
        paint(&mut stdout, value, issue.validator)?;
        if let Some(detail) = &issue.detail {
            paint(&mut stdout, None, " ")?;
            paint(&mut stdout, value, detail)?;
        }
        paint(&mut stdout, None, "\n")?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a notice about ignored or adjusted settings.
    pub fn print_notice(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        paint(&mut stdout, self.out_color(Colors::NOTICE), &format!("{}\n", msg))?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_failure(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        paint(&mut stdout, self.out_color(Colors::ERROR), &format!("{}\n", msg))?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message on stderr.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        paint(&mut stderr, self.err_color(Colors::ERROR), &format!("Error: {}\n", msg))?;
        stderr.flush()?;
        Ok(())
    }

    /// Print a diagnostic line on stderr.
    pub fn print_diagnostic(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        paint(&mut stderr, self.err_color(Colors::DIM), &format!("{}\n", msg))?;
        stderr.flush()?;
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-line progress on stderr while rule files are parsed.
///
/// Silent when stderr is not a terminal.
pub struct ProgressLine {
    label: String,
    enabled: bool,
}

impl ProgressLine {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            enabled: io::stderr().is_tty(),
        }
    }

    fn draw(&self, text: &str) {
        let mut stderr = io::stderr();
        let drawn = execute!(
            stderr,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Colors::DIM),
            Print(text),
            ResetColor,
        );
        if let Err(e) = drawn {
            debug!(error = %e, "progress line not drawn");
        }
    }
}

impl ProgressObserver for ProgressLine {
    fn started(&mut self, total: usize) {
        if self.enabled && total > 0 {
            self.draw(&format!("{} [0/{}]", self.label, total));
        }
    }

    fn advanced(&mut self, done: usize, total: usize, _path: &Path) {
        if self.enabled {
            self.draw(&format!("{} [{}/{}]", self.label, done, total));
        }
    }

    fn finished(&mut self) {
        if self.enabled {
            let mut stderr = io::stderr();
            execute!(stderr, Print("\n")).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_fit_the_widest_cell() {
        let table = format_table(
            &["Identifier", "Text"],
            &[
                vec!["splunk".into(), "Splunk SPL".into()],
                vec!["text_query_test".into(), "Test".into()],
            ],
        );
        let expected = "\
Identifier       Text
---------------------------
splunk           Splunk SPL
text_query_test  Test
";
        assert_eq!(table, expected);
    }

    #[test]
    fn empty_table_has_header_and_rule() {
        let table = format_table(&["Count", "Rule Error"], &[]);
        assert_eq!(table, "Count  Rule Error\n-----------------\n");
    }

    #[test]
    fn plain_paint_has_no_escape_codes() {
        let mut out = Vec::new();
        paint(&mut out, None, "issue").unwrap();
        assert_eq!(out, b"issue");
    }
}
