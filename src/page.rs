use std::fs;
use std::path::Path;

use log::*;

use crate::extract::Outcome;
use crate::reconcile::{html_escape, SummaryRow};
use crate::Error;

pub const TITLE: &str = "Named Entity Recognition";
pub const SUBTITLE: &str = "Location extraction for LaporGub Jateng reports";

const HEADERS: [&str; 3] = ["Entity", "Location type", "Confidence (score)"];

const GUIDE: [&str; 3] = [
    "Enter the report or news text.",
    "Run the extraction.",
    "The system detects the locations.",
];

pub fn status_line(online: bool) -> &'static str {
    if online {
        "Model online"
    } else {
        "Model offline"
    }
}

/// Fixed-width table for the terminal.
pub fn console_table(rows: &[SummaryRow]) -> String {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(cells(row).iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 3]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut out = line(HEADERS);
    out.push_str(&format!("|-{}-|\n", rule.join("-|-")));
    for row in rows {
        out.push_str(&line(cells(row)));
    }
    out
}

fn cells(row: &SummaryRow) -> [&str; 3] {
    [&row.surface, &row.label, &row.score]
}

/// Everything printed to the terminal for one submission.
pub fn console_report(outcome: &Outcome) -> String {
    let mut out = String::new();
    match outcome {
        Outcome::Found(found) => {
            out.push_str(&outcome.message());
            out.push('\n');
            out.push_str(&console_table(&found.rows));
            out.push_str("\nContext:\n");
            out.push_str(&found.plain);
            out.push('\n');
        }
        Outcome::NoEntities { .. } => {
            out.push_str(&outcome.message());
            out.push('\n');
        }
        Outcome::Warning(message) => out.push_str(&format!("Warning: {}\n", message)),
        Outcome::Failed(message) | Outcome::Offline(message) => {
            out.push_str(&format!("Error: {}\n", message))
        }
    }
    out
}

/// Standalone HTML page for one submission.
pub fn html_report(online: bool, input: &str, outcome: &Outcome) -> String {
    let mut html = String::new();
    html.push_str(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>NER LaporGub Jateng</title>
<style>
body { font-family: sans-serif; margin: 0; display: flex; }
aside { width: 240px; padding: 20px; background: #f0f2f6; min-height: 100vh; }
main { flex: 1; padding: 20px 40px; }
.online { color: #155724; background: #d4edda; padding: 8px; border-radius: 4px; }
.offline { color: #721c24; background: #f8d7da; padding: 8px; border-radius: 4px; }
.info { color: #0c5460; background: #d1ecf1; padding: 8px; border-radius: 4px; }
.warning { color: #856404; background: #fff3cd; padding: 8px; border-radius: 4px; }
.error { color: #721c24; background: #f8d7da; padding: 8px; border-radius: 4px; }
.success { color: #155724; background: #d4edda; padding: 8px; border-radius: 4px; }
table { border-collapse: collapse; margin: 12px 0; }
th, td { border: 1px solid #ddd; padding: 6px 12px; text-align: left; }
pre { white-space: pre-wrap; background: #fafafa; padding: 10px; border: 1px solid #eee; }
</style>
</head>
<body>
"#,
    );

    html.push_str("<aside><h3>System status</h3>");
    let class = if online { "online" } else { "offline" };
    html.push_str(&format!(r#"<div class="{}">{}</div>"#, class, status_line(online)));
    html.push_str("<hr><p><b>Guide:</b></p><ol>");
    for step in GUIDE.iter() {
        html.push_str(&format!("<li>{}</li>", step));
    }
    html.push_str("</ol></aside>\n");

    html.push_str(&format!("<main><h1>{}</h1><h2>{}</h2><hr>\n", TITLE, SUBTITLE));
    html.push_str(&format!(
        "<p>Report text:</p><pre>{}</pre>\n",
        html_escape(input)
    ));

    match outcome {
        Outcome::Found(found) => {
            html.push_str(&format!(
                r#"<div class="success">{}</div>"#,
                html_escape(&outcome.message())
            ));
            html.push_str("<table><tr>");
            for header in HEADERS.iter() {
                html.push_str(&format!("<th>{}</th>", header));
            }
            html.push_str("</tr>");
            for row in &found.rows {
                html.push_str("<tr>");
                for cell in cells(row).iter() {
                    html.push_str(&format!("<td>{}</td>", html_escape(cell)));
                }
                html.push_str("</tr>");
            }
            html.push_str("</table>\n<h3>Context:</h3>\n");
            html.push_str(&format!(
                r#"<div style="padding:15px; border:1px solid #ddd; border-radius:5px; line-height:1.6;">{}</div>"#,
                found.html
            ));
        }
        Outcome::NoEntities { .. } => {
            html.push_str(&format!(r#"<div class="info">{}</div>"#, outcome.message()));
        }
        Outcome::Warning(message) => {
            html.push_str(&format!(r#"<div class="warning">{}</div>"#, html_escape(message)));
        }
        Outcome::Failed(message) | Outcome::Offline(message) => {
            html.push_str(&format!(r#"<div class="error">{}</div>"#, html_escape(message)));
        }
    }

    html.push_str("\n</main></body></html>\n");
    html
}

pub fn write_html_report(path: &Path, online: bool, input: &str, outcome: &Outcome) -> Result<(), Error> {
    fs::write(path, html_report(online, input, outcome))?;
    info!("Report written to {}", path.display());
    Ok(())
}
