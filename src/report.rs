use std::fmt::Write;
use std::time::Duration;

use crate::analysis::score::AccuracyClass;
use crate::analysis::LetterReport;
use crate::model::AnalysisResult;
use crate::parser::classify::ClassifiedLink;
use crate::parser::clip_chars;

const TEXT_WIDTH: usize = 48;

/// Compact per-link table followed by the run summary.
pub fn render(report: &LetterReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.title.as_deref().unwrap_or(&report.url));
    let _ = writeln!(
        out,
        "{:>3} | {:<10} | {:>4} | {:<9} | {}",
        "#", "Category", "Acc", "Grade", "Link text"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for r in &report.results {
        let (acc, grade) = if r.is_scored() {
            (r.accuracy.to_string(), grade_label(AccuracyClass::of(r.accuracy)))
        } else {
            ("-".to_string(), "-")
        };
        let _ = writeln!(
            out,
            "{:>3} | {:<10} | {:>4} | {:<9} | {}",
            r.link.order + 1,
            r.link.category.key(),
            acc,
            grade,
            truncate(&r.link.text, TEXT_WIDTH)
        );
    }

    let problems: Vec<&AnalysisResult> = report
        .results
        .iter()
        .filter(|r| r.link.category.is_verified() && r.accuracy < 70)
        .collect();
    if !problems.is_empty() {
        let _ = writeln!(out, "\n--- Needs fixing ---");
        for r in problems {
            let issues: Vec<&str> = r.issues.iter().map(|i| i.describe()).collect();
            let _ = writeln!(out, "  #{} {}", r.link.order + 1, issues.join(", "));
            if r.suggested_text != r.link.text {
                let _ = writeln!(out, "     -> {}", r.suggested_text);
            }
        }
    }

    let s = &report.summary;
    let _ = writeln!(
        out,
        "\n{} links | {} scored | avg accuracy {}% | {} need fixing",
        s.total, s.scored, s.average_accuracy, s.needs_fix
    );
    out
}

/// One `"<category name>: <suggested text>"` line per scored link.
pub fn suggestions(results: &[AnalysisResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.is_scored() && !r.suggested_text.trim().is_empty())
        .map(|r| format!("{}: {}", r.link.category.display_name(), r.suggested_text))
        .collect()
}

/// Offline listing of classified links, grouped by section header.
pub fn render_links(links: &[ClassifiedLink]) -> String {
    let mut out = String::new();
    for link in links {
        let section = if link.section.is_empty() { "-" } else { &link.section };
        let _ = writeln!(
            out,
            "{:>3} | {:<10} | {:<16} | {} <{}>",
            link.order + 1,
            link.category.key(),
            truncate(section, 16),
            truncate(&link.text, TEXT_WIDTH),
            link.url
        );
    }
    out
}

fn grade_label(class: AccuracyClass) -> &'static str {
    match class {
        AccuracyClass::Excellent => "excellent",
        AccuracyClass::Good => "good",
        AccuracyClass::Fair => "fair",
        AccuracyClass::Poor => "poor",
    }
}

/// Clip to `max` chars, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    let clipped = clip_chars(s, max);
    if clipped.len() == s.len() {
        s.to_string()
    } else {
        format!("{}...", clipped)
    }
}

/// `1.5s`, `2m 5s`, or `1h 2m 5s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", d.as_secs_f64()),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, m, s) => format!("{}h {}m {}s", h, m, s),
    }
}

// ── Tests ──
