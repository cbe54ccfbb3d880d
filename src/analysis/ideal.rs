use std::sync::LazyLock;

use regex::Regex;

use crate::category::Category;
use crate::model::PageMetadata;

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\.(\d{2})\.(\d{2})\s*~\s*(\d{4})\.(\d{2})\.(\d{2})").unwrap()
});

const ROLLING_DEADLINE: &str = "채용시 마감";
const ONLINE: &str = "온라인";
const FUNDING_MARKERS: &[&str] = &["펀딩", "캠페인"];

/// A `YYYY.MM.DD ~ YYYY.MM.DD` range anywhere in `period` → `M/D` of its end
/// date; anything else unchanged.
pub fn format_period(period: &str) -> String {
    match PERIOD_RE.captures(period) {
        Some(caps) => {
            let month: u32 = caps[5].parse().unwrap_or_default();
            let day: u32 = caps[6].parse().unwrap_or_default();
            format!("{}/{}", month, day)
        }
        None => period.to_string(),
    }
}

/// Canonical link text for `category` built from whichever fields are present.
pub fn ideal_text(category: Category, meta: &PageMetadata) -> String {
    let organizer = present(&meta.organizer);
    let title = present(&meta.title);
    let period = present(&meta.period);
    let location = present(&meta.location);
    let target = present(&meta.target);

    let mut parts: Vec<String> = Vec::new();
    let bracketed = |s: &str| format!("[{}]", s);
    let deadline = |p: &str| format!("(~{})", format_period(p));

    match category {
        Category::Job => {
            parts.extend(organizer.map(bracketed));
            parts.extend(title.map(str::to_string));
            parts.extend(target.map(|t| format!("({})", t)));
            parts.extend(period.filter(|p| *p != ROLLING_DEADLINE).map(deadline));
        }
        Category::Funding => {
            parts.extend(title.map(str::to_string));
            if meta.keywords.iter().any(|k| FUNDING_MARKERS.contains(&k.as_str())) {
                parts.push("펀딩".to_string());
            }
            parts.extend(period.map(deadline));
        }
        Category::Education => {
            parts.extend(organizer.map(bracketed));
            parts.extend(title.map(str::to_string));
            parts.extend(location.filter(|l| *l != ONLINE).map(|l| format!("({})", l)));
        }
        Category::Contest => {
            parts.extend(title.map(str::to_string));
            parts.extend(period.map(deadline));
        }
        Category::Event => {
            parts.extend(organizer.map(bracketed));
            parts.extend(title.map(str::to_string));
            // The date only ever rides inside the location parenthetical.
            if let Some(location) = location {
                match period {
                    Some(p) => parts.push(format!("({}, {})", location, format_period(p))),
                    None => parts.push(format!("({})", location)),
                }
            }
        }
        _ => parts.extend(title.map(str::to_string)),
    }

    parts.join(" ")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
