use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::LinkFilter;
use crate::parser::document::{Anchor, Document};
use crate::parser::sections::char_offset;

/// An outbound link that survived filtering, tagged with its text offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub url: String,
    pub text: String,
    pub offset: usize,
}

/// Filter, dedup by URL, and order the document's links by text offset.
pub fn extract_links(doc: &Document, filter: &LinkFilter) -> Vec<RawLink> {
    extract_from_anchors(doc.text(), doc.anchors(), filter)
}

pub fn extract_from_anchors(
    body_text: &str,
    anchors: impl IntoIterator<Item = Anchor>,
    filter: &LinkFilter,
) -> Vec<RawLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in anchors {
        if is_noise(&anchor, filter) || seen.contains(&anchor.href) {
            continue;
        }
        seen.insert(anchor.href.clone());
        let offset = text_offset(body_text, &anchor.text);
        links.push(RawLink {
            url: anchor.href,
            text: anchor.text,
            offset,
        });
    }

    // Stable: offset ties keep traversal order.
    links.sort_by_key(|l| l.offset);
    links
}

fn is_noise(anchor: &Anchor, filter: &LinkFilter) -> bool {
    let text = anchor.text.trim();
    let url = anchor.href.as_str();
    let len = text.chars().count();

    text.is_empty()
        || len < filter.min_chars
        || len > filter.max_chars
        || url.starts_with('#')
        || url.starts_with("mailto:")
        || filter.denied_url_parts.iter().any(|p| url.contains(p.as_str()))
        || filter.denied_text_parts.iter().any(|p| text.contains(p.as_str()))
}

/// First character offset of `needle` in `haystack`, or 0 when absent.
fn text_offset(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .map(|byte_idx| char_offset(haystack, byte_idx))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(text: &str, href: &str) -> Anchor {
        Anchor {
            text: text.to_string(),
            href: href.to_string(),
        }
    }

    fn extract(body: &str, anchors: Vec<Anchor>) -> Vec<RawLink> {
        extract_from_anchors(body, anchors, &LinkFilter::default())
    }

    #[test]
    fn drops_noise_links() {
        let long = "가".repeat(201);
        let links = extract(
            "본문",
            vec![
                anchor("", "https://a.example"),
                anchor("ab", "https://b.example"),
                anchor(&long, "https://c.example"),
                anchor("목차로", "#top"),
                anchor("메일 보내기", "mailto:hi@example.com"),
                anchor("지난 호 보기", "https://page.stibee.com/archive"),
                anchor("오렌지레터 구독하기", "https://example.com/sub"),
                anchor("수신거부", "https://example.com/unsub"),
                anchor("남는 링크", "https://ok.example"),
            ],
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://ok.example");
    }

    #[test]
    fn dedup_by_url_keeps_first_in_traversal_order() {
        let links = extract(
            "첫번째 링크 ... 두번째 링크",
            vec![
                anchor("두번째 링크", "https://same.example"),
                anchor("첫번째 링크", "https://same.example"),
            ],
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "두번째 링크");
    }

    #[test]
    fn same_text_different_urls_both_kept() {
        let links = extract(
            "공고 Apply 끝",
            vec![
                anchor("Apply", "https://one.example"),
                anchor("Apply", "https://two.example"),
            ],
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].offset, links[1].offset);
        assert_eq!(links[0].url, "https://one.example");
        assert_eq!(links[1].url, "https://two.example");
    }

    #[test]
    fn sorted_by_offset_with_missing_text_at_zero() {
        let links = extract(
            "앞부분 가나다라 뒷부분 마바사아",
            vec![
                anchor("마바사아", "https://late.example"),
                anchor("가나다라", "https://early.example"),
                anchor("본문에 없음", "https://missing.example"),
            ],
        );
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://missing.example", "https://early.example", "https://late.example"]
        );
        assert_eq!(links[1].offset, 4);
    }
}
