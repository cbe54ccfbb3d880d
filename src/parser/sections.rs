use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::config::SectionPattern;

/// First occurrence of a category's section header in the flattened text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMatch {
    pub category: Category,
    /// Character offset of the header.
    pub offset: usize,
    /// The matched header text.
    pub text: String,
}

/// Locate section headers, one per category at most, sorted by offset.
pub fn locate_sections(text: &str, patterns: &[SectionPattern]) -> Vec<SectionMatch> {
    let mut sections: Vec<SectionMatch> = patterns
        .iter()
        .filter_map(|p| {
            let m = p.pattern.find(text)?;
            Some(SectionMatch {
                category: p.category,
                offset: char_offset(text, m.start()),
                text: m.as_str().to_string(),
            })
        })
        .collect();

    sections.sort_by_key(|s| s.offset);
    sections
}

/// Convert a byte index into a character index.
pub fn char_offset(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}
