use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{AuditError, Result};

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// A hyperlink-bearing node as seen during document-order traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub text: String,
    pub href: String,
}

/// Parsed newsletter markup with its flattened body text.
pub struct Document {
    html: Html,
    text: String,
    base: Option<Url>,
}

impl Document {
    pub fn parse(markup: &str) -> Result<Self> {
        Self::parse_with_base(markup, None)
    }

    /// Relative hrefs are resolved against `base` when one is given.
    pub fn parse_with_base(markup: &str, base: Option<&Url>) -> Result<Self> {
        if markup.trim().is_empty() {
            return Err(AuditError::Parse("empty document".into()));
        }
        let html = Html::parse_document(markup);
        let text = match html.select(&BODY).next() {
            Some(body) => body.text().collect::<String>(),
            None => html.root_element().text().collect::<String>(),
        };

        Ok(Self {
            html,
            text,
            base: base.cloned(),
        })
    }

    /// Concatenated text content of the body, like a DOM `textContent`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-blank text nodes of the body, one per line.
    pub fn text_lines(&self) -> String {
        let lines: Vec<&str> = match self.html.select(&BODY).next() {
            Some(body) => body.text().map(str::trim).filter(|t| !t.is_empty()).collect(),
            None => Vec::new(),
        };
        lines.join("\n")
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Every `a[href]` in depth-first document order.
    pub fn anchors(&self) -> Vec<Anchor> {
        self.html
            .select(&ANCHORS)
            .filter_map(|el| {
                let raw = el.value().attr("href")?.trim();
                Some(Anchor {
                    text: el.text().collect::<String>().trim().to_string(),
                    href: self.resolve(raw),
                })
            })
            .collect()
    }

    /// Trimmed text of the first element matching `selector`.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        self.html
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Trimmed attribute value of the first element matching `selector`.
    pub fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        self.html
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn resolve(&self, href: &str) -> String {
        // Fragments and mail links stay raw so the extractor can reject them.
        if href.starts_with('#') || href.starts_with("mailto:") {
            return href.to_string();
        }
        match &self.base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}
