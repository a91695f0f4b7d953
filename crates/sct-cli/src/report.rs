//! Validation report: per-file data and the sections that render it
//!
//! A report is an ordered list of [`ReportSection`]s rendered once per
//! input file. `--showbytes` adds the bytecode section before the footer.

use std::fmt::Write;

use colored::Colorize;
use sct_core::validation::ValidationError;

/// Everything learned about one input file
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationReportData {
    pub file: String,
    pub decoded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decode_errors: Vec<String>,
    pub format_errors: Vec<ValidationError>,
    pub determinism_errors: Vec<ValidationError>,
    /// Encoded module, rendered only with `--showbytes`
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

impl ValidationReportData {
    pub fn new(file: impl Into<String>) -> Self {
        ValidationReportData {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.decoded && self.format_errors.is_empty() && self.determinism_errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.decode_errors.len() + self.format_errors.len() + self.determinism_errors.len()
    }
}

pub trait ReportSection {
    fn render(&self, data: &ValidationReportData, out: &mut String);
}

// ── Sections ──────────────────────────────────────────────

pub struct HeaderSection;

impl ReportSection for HeaderSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        let _ = writeln!(out, "{}", "═".repeat(60));
        let _ = writeln!(out, "{} {}", "Smart Contract Validation:".bold(), data.file);
        let _ = writeln!(out, "{}", "═".repeat(60));
    }
}

pub struct DecodeSection;

impl ReportSection for DecodeSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        if data.decoded {
            let _ = writeln!(out, "Decode          {}", "OK".green());
            return;
        }
        let _ = writeln!(out, "Decode          {}", "FAILED".red().bold());
        for message in &data.decode_errors {
            let _ = writeln!(out, "  {} {}", "error:".red(), message);
        }
    }
}

fn render_findings(label: &str, decoded: bool, errors: &[ValidationError], out: &mut String) {
    if !decoded {
        let _ = writeln!(out, "{:<16}{}", label, "skipped".dimmed());
    } else if errors.is_empty() {
        let _ = writeln!(out, "{:<16}{}", label, "valid".green());
    } else {
        let _ = writeln!(out, "{:<16}{} ({} error(s))", label, "invalid".red().bold(), errors.len());
        for error in errors {
            let _ = writeln!(out, "  {} {}", "error:".red(), error);
        }
    }
}

pub struct FormatSection;

impl ReportSection for FormatSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        render_findings("Format", data.decoded, &data.format_errors, out);
    }
}

pub struct DeterminismSection;

impl ReportSection for DeterminismSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        render_findings("Determinism", data.decoded, &data.determinism_errors, out);
    }
}

pub struct ByteCodeSection;

impl ReportSection for ByteCodeSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        let Some(bytes) = &data.bytes else {
            return;
        };
        let _ = writeln!(out, "Bytecode        {} bytes", bytes.len());
        let encoded = hex::encode(bytes);
        for line in encoded.as_bytes().chunks(64) {
            let _ = writeln!(out, "  {}", String::from_utf8_lossy(line));
        }
    }
}

pub struct FooterSection;

impl ReportSection for FooterSection {
    fn render(&self, data: &ValidationReportData, out: &mut String) {
        let verdict = if data.is_valid() {
            "valid".green().bold()
        } else {
            "invalid".red().bold()
        };
        let _ = writeln!(out, "{}", "─".repeat(60));
        let _ = writeln!(out, "Result: {} ({} error(s))", verdict, data.error_count());
        let _ = writeln!(out);
    }
}

/// Section list for a report, in render order
pub fn report_structure(show_bytes: bool) -> Vec<Box<dyn ReportSection>> {
    let mut sections: Vec<Box<dyn ReportSection>> = vec![
        Box::new(HeaderSection),
        Box::new(DecodeSection),
        Box::new(FormatSection),
        Box::new(DeterminismSection),
    ];
    if show_bytes {
        sections.push(Box::new(ByteCodeSection));
    }
    sections.push(Box::new(FooterSection));
    sections
}

pub fn render(sections: &[Box<dyn ReportSection>], data: &ValidationReportData) -> String {
    let mut out = String::new();
    for section in sections {
        section.render(data, &mut out);
    }
    out
}
