//! Report rendering.
//!
//! Turns a [`StatusReport`] into plain text, an aligned table, or JSON.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::StatusReport;
use crate::vm::VmStatus;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One `name: state` line per VM
    #[default]
    Plain,
    /// Aligned columns with a summary line
    Table,
    /// JSON output
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// What to include in a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    /// Show each VM's UUID.
    pub show_uuid: bool,
    /// Show OS type, memory, CPUs and state-change time.
    pub details: bool,
}

/// JSON shape of a report: the report plus its summary counts.
#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    hypervisor: &'a str,
    total: usize,
    running: usize,
    vms: &'a [VmStatus],
}

/// Render `report` in the given format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(report: &StatusReport, format: OutputFormat, options: &RenderOptions) -> Result<String> {
    match format {
        OutputFormat::Plain => Ok(render_plain(report, options)),
        OutputFormat::Table => Ok(render_table(report, options)),
        OutputFormat::Json => render_json(report),
    }
}

/// Bare VM names, one per line.
#[must_use]
pub fn render_names(vms: &[VmStatus]) -> String {
    vms.iter().fold(String::new(), |mut out, vm| {
        out.push_str(&vm.name);
        out.push('\n');
        out
    })
}

fn render_plain(report: &StatusReport, options: &RenderOptions) -> String {
    let mut out = String::new();
    for vm in &report.vms {
        let _ = write!(out, "{}", vm.name);
        if options.show_uuid {
            let _ = write!(out, " {{{}}}", vm.uuid);
        }
        let _ = write!(out, ": {}", vm.state_label());

        if options.details {
            let extra = detail_cells(vm)
                .into_iter()
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>();
            if !extra.is_empty() {
                let _ = write!(out, " ({})", extra.join(", "));
            }
        }
        out.push('\n');
    }
    out
}

/// OS, memory, CPUs and since-time cells; empty strings for unknown values.
fn detail_cells(vm: &VmStatus) -> [String; 4] {
    let Some(details) = &vm.details else {
        let note = vm
            .error
            .as_ref()
            .map(|e| format!("details unavailable: {e}"))
            .unwrap_or_default();
        return [note, String::new(), String::new(), String::new()];
    };

    [
        details.os_type.clone().unwrap_or_default(),
        details
            .memory_mb
            .map(|mb| format!("{mb} MB"))
            .unwrap_or_default(),
        details
            .cpus
            .map(|cpus| format!("{cpus} CPU{}", if cpus == 1 { "" } else { "s" }))
            .unwrap_or_default(),
        details
            .state_changed_at
            .map(|at| format!("since {}", at.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_default(),
    ]
}

fn render_table(report: &StatusReport, options: &RenderOptions) -> String {
    if report.is_empty() {
        return "No virtual machines found.\n".to_string();
    }

    let mut header = vec!["NAME", "STATE"];
    if options.show_uuid {
        header.push("UUID");
    }
    if options.details {
        header.extend(["OS", "MEMORY", "CPUS", "SINCE"]);
    }

    let rows: Vec<Vec<String>> = report
        .vms
        .iter()
        .map(|vm| {
            let mut row = vec![vm.name.clone(), vm.state_label()];
            if options.show_uuid {
                row.push(vm.uuid.clone());
            }
            if options.details {
                let cells = detail_cells(vm);
                row.extend(cells.into_iter().map(|cell| {
                    let cell = cell.strip_prefix("since ").map_or(cell.clone(), String::from);
                    if cell.is_empty() {
                        "-".to_string()
                    } else {
                        cell
                    }
                }));
            }
            row
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, header.iter().copied(), &widths);
    for row in &rows {
        write_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    let _ = writeln!(
        out,
        "\n{} of {} VM{} running",
        report.running_count(),
        report.total(),
        if report.total() == 1 { "" } else { "s" }
    );
    out
}

fn write_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let mut line = String::new();
    for (cell, width) in cells.zip(widths) {
        let _ = write!(line, "{cell:<width$}  ");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn render_json(report: &StatusReport) -> Result<String> {
    let json = JsonReport {
        generated_at: report.generated_at,
        hypervisor: &report.hypervisor,
        total: report.total(),
        running: report.running_count(),
        vms: &report.vms,
    };
    let mut out = serde_json::to_string_pretty(&json)?;
    out.push('\n');
    Ok(out)
}
