use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::Category;
use crate::config::{AnalysisConfig, Tier};
use crate::parser::links::RawLink;
use crate::parser::sections::SectionMatch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedLink {
    pub id: String,
    pub url: String,
    pub text: String,
    pub offset: usize,
    pub category: Category,
    /// Header text of the containing section, empty when none applied.
    pub section: String,
    pub order: usize,
}

/// Which cascade step produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Section,
    Rule(Tier),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub category: Category,
    pub section: String,
    pub basis: Basis,
}

/// Category cascade: section containment, then keyword rules in configured
/// order, then the configured fallback.
pub fn classify(
    sections: &[SectionMatch],
    text: &str,
    url: &str,
    offset: usize,
    config: &AnalysisConfig,
) -> Verdict {
    if let Some(section) = sections.iter().rev().find(|s| s.offset <= offset) {
        return Verdict {
            category: section.category,
            section: section.text.clone(),
            basis: Basis::Section,
        };
    }

    let text_lc = text.to_lowercase();
    let url_lc = url.to_lowercase();
    for rule in &config.keyword_rules {
        let haystack = match rule.tier {
            Tier::LinkText => &text_lc,
            Tier::LinkUrl | Tier::Domain => &url_lc,
        };
        if rule.matches(haystack) {
            return Verdict {
                category: rule.category,
                section: String::new(),
                basis: Basis::Rule(rule.tier),
            };
        }
    }

    Verdict {
        category: config.fallback,
        section: String::new(),
        basis: Basis::Default,
    }
}

/// Classify offset-sorted links; `order` and `id` follow the input order.
pub fn classify_links(
    sections: &[SectionMatch],
    links: Vec<RawLink>,
    config: &AnalysisConfig,
) -> Vec<ClassifiedLink> {
    links
        .into_iter()
        .enumerate()
        .map(|(order, link)| {
            let verdict = classify(sections, &link.text, &link.url, link.offset, config);
            debug!(
                "link #{}: {} -> {} ({:?}, offset {})",
                order,
                super::clip_chars(&link.text, 40),
                verdict.category,
                verdict.basis,
                link.offset
            );
            ClassifiedLink {
                id: format!("link-{}", order),
                url: link.url,
                text: link.text,
                offset: link.offset,
                category: verdict.category,
                section: verdict.section,
                order,
            }
        })
        .collect()
}
