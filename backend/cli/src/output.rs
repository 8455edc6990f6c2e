//! Terminal output: notes, tables, and the catalog and status views.

use intentforge_core::{Catalog, OperationDescriptor};
use intentforge_router::ProviderStatus;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

fn paint(text: &str, style: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

/// Left-aligned columns sized to their widest cell.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut out = String::new();
    out.push_str(&paint(&pad_line(headers, &widths), BOLD));
    out.push('\n');
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));
    for row in rows {
        let cells: Vec<&str> = (0..headers.len())
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        out.push_str(&pad_line(&cells, &widths));
        out.push('\n');
    }
    out
}

fn pad_line(cells: &[&str], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    format!("  {}", padded.join("  ").trim_end())
}

/// `name(param: type, optional?: type)` signature.
fn signature(descriptor: &OperationDescriptor) -> String {
    let params: Vec<String> = descriptor
        .parameters
        .iter()
        .map(|(param, spec)| {
            let marker = if spec.required { "" } else { "?" };
            format!("{param}{marker}: {}", spec.param_type)
        })
        .collect();
    format!("{}({})", descriptor.name, params.join(", "))
}

pub fn tools_table(catalog: &Catalog) -> String {
    let rows: Vec<Vec<String>> = catalog
        .entries()
        .map(|entry| {
            vec![
                signature(&entry.descriptor),
                entry.provider.clone(),
                entry.descriptor.description.lines().next().unwrap_or("").to_string(),
            ]
        })
        .collect();
    render_table(&["OPERATION", "PROVIDER", "DESCRIPTION"], &rows)
}

pub fn status_table(statuses: &[ProviderStatus]) -> String {
    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|status| {
            let state = if status.reachable {
                paint("reachable", GREEN)
            } else {
                paint("unreachable", RED)
            };
            vec![
                status.name.clone(),
                status.url.clone(),
                state,
                status.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["PROVIDER", "URL", "STATE", "ERROR"], &rows)
}
