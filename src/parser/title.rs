use std::sync::LazyLock;

use regex::Regex;

use crate::parser::document::Document;

static BODY_TITLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"🍊\s*([^🍊\n\r]{10,100})",
        r"오렌지레터\s*([^#\n\r]{10,100})",
        r"(\d{4}년\s*\d{1,2}월\s*\d{1,2}일[^#\n\r]{5,50})",
        r"([^#\n\r]{5,50})\s*#\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static EDGE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-|:]\s*|\s*[-|:]\s*$").unwrap());

const MIN_TITLE: usize = 5;
const MAX_TITLE: usize = 100;

/// Best-effort newsletter issue title.
pub fn extract_title(doc: &Document) -> Option<String> {
    let mut title = doc.first_text("title").unwrap_or_default();

    if too_short(&title) {
        for re in BODY_TITLE_RES.iter() {
            if let Some(caps) = re.captures(doc.text()) {
                title = caps[1].trim().to_string();
                if !too_short(&title) {
                    break;
                }
            }
        }
    }
    if too_short(&title) {
        if let Some(meta) = doc
            .first_attr(r#"meta[property="og:title"]"#, "content")
            .or_else(|| doc.first_attr(r#"meta[name="title"]"#, "content"))
        {
            title = meta;
        }
    }
    if too_short(&title) {
        if let Some(h1) = doc.first_text("h1") {
            title = h1;
        }
    }

    let cleaned: String = EDGE_PUNCT_RE
        .replace_all(&title, "")
        .chars()
        .take(MAX_TITLE)
        .collect();
    (cleaned.chars().count() >= 3).then_some(cleaned)
}

fn too_short(title: &str) -> bool {
    title.chars().count() < MIN_TITLE
}
