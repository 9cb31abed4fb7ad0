use err_derive::Error;
use serde::{Deserialize, Serialize};

use log::*;

/// A tagged span over the cleaned text.
///
/// `start` and `end` are character offsets, half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub score: f64,
    pub surface: String,
}

impl EntitySpan {
    fn overlaps(&self, other: &EntitySpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub surface: String,
    pub label: String,
    pub score: String,
}

impl From<&EntitySpan> for SummaryRow {
    fn from(span: &EntitySpan) -> Self {
        Self {
            surface: span.surface.clone(),
            label: span.label.clone(),
            score: format_score(span.score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupStyle {
    Html,
    Plain,
}

impl MarkupStyle {
    fn wrap(self, surface: &str, label: &str) -> String {
        match self {
            MarkupStyle::Html => format!(
                concat!(
                    r#"<span style="background-color: #d1ecf1; color: #0c5460; padding: 2px 5px; border-radius: 4px; font-weight: bold;">"#,
                    r#"{} <span style="font-size: 0.8em; opacity: 0.7;">[{}]</span></span>"#
                ),
                html_escape(surface),
                html_escape(label)
            ),
            MarkupStyle::Plain => format!("[{}]{{{}}}", surface, label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub rows: Vec<SummaryRow>,
    pub markup: String,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(
        display = "Span {}..{} [{}] does not fit a text of {} characters",
        start,
        end,
        label,
        len
    )]
    InvalidSpan {
        start: usize,
        end: usize,
        label: String,
        len: usize,
    },
}

/// `0.8743` becomes `87.43%`.
pub fn format_score(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Spans checked against a text and ready to be written into it.
///
/// Rows follow the model's order. Only non-empty spans that do not overlap an
/// earlier reported span are highlighted; the rest keep only their row. The
/// highlighted spans are disjoint, so writing them from the highest `start` to
/// the lowest keeps the offsets of those still to be written valid.
#[derive(Debug)]
pub struct Highlights<'a> {
    text: &'a str,
    bounds: Vec<usize>,
    accepted: Vec<&'a EntitySpan>,
    pub rows: Vec<SummaryRow>,
}

/// Validate `spans` against `text` and pick the ones to highlight.
pub fn plan<'a>(text: &'a str, spans: &'a [EntitySpan]) -> Result<Highlights<'a>, ReconcileError> {
    let bounds = char_bounds(text);
    let len = bounds.len() - 1;
    if let Some(bad) = spans.iter().find(|s| s.start > s.end || s.end > len) {
        return Err(ReconcileError::InvalidSpan {
            start: bad.start,
            end: bad.end,
            label: bad.label.clone(),
            len,
        });
    }

    let rows = spans.iter().map(SummaryRow::from).collect();

    let mut accepted: Vec<&EntitySpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.start == span.end {
            warn!("Not highlighting empty span [{}] at {}", span.label, span.start);
            continue;
        }
        if let Some(winner) = accepted.iter().find(|a| a.overlaps(span)) {
            warn!(
                "Not highlighting {:?} at {}..{}: overlaps {:?} at {}..{}",
                span.surface, span.start, span.end, winner.surface, winner.start, winner.end
            );
            continue;
        }
        accepted.push(span);
    }
    accepted.sort_by(|a, b| b.start.cmp(&a.start));

    Ok(Highlights {
        text,
        bounds,
        accepted,
        rows,
    })
}

impl<'a> Highlights<'a> {
    pub fn render(&self, style: MarkupStyle) -> String {
        let mut markup = self.text.to_string();
        for span in &self.accepted {
            let range = self.bounds[span.start]..self.bounds[span.end];
            let wrapped = style.wrap(&self.text[range.clone()], &span.label);
            markup.replace_range(range, &wrapped);
        }
        markup
    }
}

/// Build the summary rows and the highlighted text for a set of spans.
pub fn reconcile(
    text: &str,
    spans: &[EntitySpan],
    style: MarkupStyle,
) -> Result<Reconciled, ReconcileError> {
    let highlights = plan(text, spans)?;
    let markup = highlights.render(style);
    Ok(Reconciled {
        rows: highlights.rows,
        markup,
    })
}

/// Byte position of every character plus the end of the text.
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
