pub mod classify;
pub mod document;
pub mod links;
pub mod sections;
pub mod title;

use std::collections::BTreeMap;

use tracing::info;

use crate::category::Category;
use crate::config::AnalysisConfig;
use classify::ClassifiedLink;
use document::Document;
use sections::SectionMatch;

/// Everything derived from one newsletter document before any fetching.
#[derive(Debug, Clone)]
pub struct ParsedLetter {
    pub title: Option<String>,
    pub sections: Vec<SectionMatch>,
    pub links: Vec<ClassifiedLink>,
}

impl ParsedLetter {
    pub fn empty() -> Self {
        Self {
            title: None,
            sections: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for link in &self.links {
            *counts.entry(link.category).or_insert(0) += 1;
        }
        counts
    }
}

/// Longest prefix of `s` holding at most `max` chars, cut on a char boundary.
pub fn clip_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Three-pass pipeline: text → sections → links → categories.
pub fn process_document(doc: &Document, config: &AnalysisConfig) -> ParsedLetter {
    let sections = sections::locate_sections(doc.text(), &config.section_patterns);
    info!(
        "Sections found: {:?}",
        sections.iter().map(|s| s.category.display_name()).collect::<Vec<_>>()
    );

    let raw = links::extract_links(doc, &config.link_filter);
    let classified = classify::classify_links(&sections, raw, config);

    let letter = ParsedLetter {
        title: title::extract_title(doc),
        sections,
        links: classified,
    };
    info!(
        "Extracted {} links, per category: {:?}",
        letter.links.len(),
        letter.category_counts()
    );
    letter
}

/// Parse markup and run the pipeline; unparseable input yields no links.
pub fn process_markup(markup: &str, config: &AnalysisConfig) -> ParsedLetter {
    match Document::parse(markup) {
        Ok(doc) => process_document(&doc, config),
        Err(e) => {
            tracing::warn!("Document parse failed, no links extracted: {}", e);
            ParsedLetter::empty()
        }
    }
}

// ── Tests ──
