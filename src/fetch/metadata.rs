use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::model::PageMetadata;
use crate::parser::clip_chars;
use crate::parser::document::Document;

static LD_JSON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static ALL_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

static ORGANIZER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)주최\s*[:：]\s*([^\n\r|]+)",
        r"(?i)주관\s*[:：]\s*([^\n\r|]+)",
        r"(?i)발행\s*[:：]\s*([^\n\r|]+)",
        r"(?i)운영\s*[:：]\s*([^\n\r|]+)",
        r"(?i)기관\s*[:：]\s*([^\n\r|]+)",
        r"(?i)단체\s*[:：]\s*([^\n\r|]+)",
        r"(?i)회사\s*[:：]\s*([^\n\r|]+)",
        r"(?i)\bby\s+([^\n\r|]+)",
        r"©\s*([^\n\r|]+)",
        r"ⓒ\s*([^\n\r|]+)",
    ])
});

static DATE_RANGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(\d{4}[-./년]\s*\d{1,2}[-./월]\s*\d{1,2}일?)\s*[~-]\s*(\d{4}[-./년]\s*\d{1,2}[-./월]\s*\d{1,2}일?)",
        r"(\d{1,2}[-./]\d{1,2})\s*[~-]\s*(\d{1,2}[-./]\d{1,2})",
    ])
});
static DATE_LABEL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"마감\s*[:：]\s*(\d{4}[-./년]\s*\d{1,2}[-./월]\s*\d{1,2}일?)",
        r"접수기간\s*[:：]\s*([^\n\r]+?까지)",
        r"신청기간\s*[:：]\s*([^\n\r]+)",
        r"모집기간\s*[:：]\s*([^\n\r]+)",
        r"기간\s*[:：]\s*([^\n\r]+)",
        r"일시\s*[:：]\s*([^\n\r]+)",
        r"날짜\s*[:：]\s*([^\n\r]+)",
        r"(?i)until\s+([^\n\r]+)",
        r"(?i)deadline\s*[:：]\s*([^\n\r]+)",
    ])
});
const DATE_MARKERS: &[&str] = &["월", "일", "년", "까지", "until", "deadline", "/", "-", "."];

static ONLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)온라인|비대면|화상|virtual|online|zoom|webex|google\s+meet|microsoft\s+teams").unwrap()
});
static LOCATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"장소\s*[:：]\s*([^\n\r]+)",
        r"위치\s*[:：]\s*([^\n\r]+)",
        r"주소\s*[:：]\s*([^\n\r]+)",
        r"개최지\s*[:：]\s*([^\n\r]+)",
        r"(?i)venue\s*[:：]\s*([^\n\r]+)",
        r"(?i)location\s*[:：]\s*([^\n\r]+)",
        r"(?i)address\s*[:：]\s*([^\n\r]+)",
        r"([가-힣]+시\s+[가-힣]+구\s*[^\n\r]{0,30})",
        r"([가-힣]+구\s+[가-힣]+동\s*[^\n\r]{0,30})",
        r"((?:서울|부산|대구|인천|광주|대전|울산|세종|경기|강원|충북|충남|전북|전남|경북|경남|제주)[^\n\r]{0,50})",
    ])
});
static TARGET_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"대상\s*[:：]\s*([^\n\r]+)",
        r"자격\s*[:：]\s*([^\n\r]+)",
        r"경력\s*[:：]\s*([^\n\r]+)",
        r"(신입/경력|신입|경력|인턴)",
    ])
});
static CONTACT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"연락처\s*[:：]\s*([^\n\r]+)",
        r"문의\s*[:：]\s*([^\n\r]+)",
        r"이메일\s*[:：]\s*([^\n\r]+)",
        r"전화\s*[:：]\s*([^\n\r]+)",
    ])
});
static DETAIL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"내용\s*[:：]\s*([^\n\r]+)",
        r"상세\s*[:：]\s*([^\n\r]+)",
        r"설명\s*[:：]\s*([^\n\r]+)",
        r"소개\s*[:：]\s*([^\n\r]+)",
    ])
});

/// Known hosts whose pages rarely name their organizer.
const DOMAIN_ORGANIZERS: &[(&str, &str)] = &[
    ("habitat.careers.team", "해비타트"),
    ("koica.go.kr", "KOICA"),
    ("msf.or.kr", "국경없는의사회"),
    ("concern.or.kr", "컨선월드와이드"),
    ("globalcare.or.kr", "굿네이버스"),
    ("asannanum.career.greetinghr.com", "아산나눔재단"),
    ("saramin.co.kr", "사람인"),
    ("happybean.naver.com", "네이버 해피빈"),
    ("cherry.charity", "체리"),
    ("socialfunch.org", "소셜펀치"),
];

const KEYWORD_GROUPS: &[(&str, &[&str])] = &[
    ("채용", &["채용", "구인", "모집", "입사", "리크루팅"]),
    ("펀딩", &["펀딩", "후원", "기부", "캠페인", "크라우드"]),
    ("교육", &["교육", "강의", "세미나", "워크샵", "컨퍼런스"]),
    ("공모", &["공모", "공모전", "지원", "신청", "모집"]),
    ("행사", &["행사", "이벤트", "축제", "박람회", "전시"]),
];

const CONTENT_SELECTORS: &[&str] = &["main", "article", ".content", ".post", ".entry"];

/// Forms render client-side, so there is nothing to scrape.
pub fn is_form_url(url: &str) -> bool {
    url.contains("forms.gle") || url.contains("docs.google.com/forms")
}

pub fn form_metadata() -> PageMetadata {
    PageMetadata {
        title: Some("Google Form".into()),
        description: Some("구글 폼 신청서".into()),
        organizer: Some("Google Forms".into()),
        location: Some("온라인".into()),
        keywords: vec!["신청".into(), "폼".into()],
        site_name: Some("forms.gle".into()),
        note: Some("구글 폼은 직접 방문이 필요합니다".into()),
        ..Default::default()
    }
}

/// Pull link-text facts out of a fetched page.
pub fn extract(html: &str, url: &str) -> PageMetadata {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let doc = match Document::parse(html) {
        Ok(doc) => doc,
        Err(_) => {
            return PageMetadata {
                site_name: host,
                ..Default::default()
            }
        }
    };
    let body = doc.text_lines();
    let ld = json_ld(&doc);

    let title = doc
        .first_attr(r#"meta[property="og:title"]"#, "content")
        .or_else(|| doc.first_text("title"))
        .or_else(|| doc.first_text("h1"))
        .or_else(|| doc.first_text("h2"));
    let description = doc
        .first_attr(r#"meta[property="og:description"]"#, "content")
        .or_else(|| doc.first_attr(r#"meta[name="description"]"#, "content"));

    let keywords = classify_keywords(title.as_deref(), description.as_deref());

    PageMetadata {
        organizer: find_organizer(&doc, &body, url),
        period: find_period(&doc, ld.as_ref(), &body),
        location: find_location(&doc, ld.as_ref(), &body),
        target: first_capture(&TARGET_RES, &body).map(|t| truncate(&t, 30)),
        main_content: find_main_content(&doc),
        contact_info: first_capture(&CONTACT_RES, &body).map(|c| truncate(&c, 50)),
        details: first_capture(&DETAIL_RES, &body).map(|d| truncate(&d, 100)),
        site_name: doc
            .first_attr(r#"meta[property="og:site_name"]"#, "content")
            .or(host),
        title,
        description,
        keywords,
        note: None,
        error: false,
    }
}

fn find_organizer(doc: &Document, body: &str, url: &str) -> Option<String> {
    if let Some(author) = doc.first_attr(r#"meta[name="author"]"#, "content") {
        return Some(truncate(&author, 50));
    }
    for re in ORGANIZER_RES.iter() {
        if let Some(caps) = re.captures(body) {
            let candidate = caps[1].trim();
            let len = candidate.chars().count();
            if (2..=50).contains(&len) && !ALL_DIGITS_RE.is_match(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    DOMAIN_ORGANIZERS
        .iter()
        .find(|(domain, _)| url.contains(domain))
        .map(|(_, name)| name.to_string())
}

fn find_period(doc: &Document, ld: Option<&serde_json::Value>, body: &str) -> Option<String> {
    if let Some(data) = ld {
        match (ld_str(data, "startDate"), ld_str(data, "endDate")) {
            (Some(start), Some(end)) => return Some(format!("{} ~ {}", start, end)),
            _ => {
                if let Some(valid) = ld_str(data, "validThrough") {
                    return Some(format!("~{}", valid));
                }
            }
        }
    }
    if let Some(start) = doc.first_attr(r#"meta[property="event:start_time"]"#, "content") {
        return Some(truncate(&start, 30));
    }
    for re in DATE_RANGE_RES.iter() {
        if let Some(caps) = re.captures(body) {
            return Some(format!("{} ~ {}", caps[1].trim(), caps[2].trim()));
        }
    }
    // First label hit decides, even if it turns out not to look like a date.
    for re in DATE_LABEL_RES.iter() {
        if let Some(caps) = re.captures(body) {
            let candidate = truncate(caps[1].trim(), 50);
            return DATE_MARKERS
                .iter()
                .any(|m| candidate.contains(m))
                .then_some(candidate);
        }
    }
    None
}

fn find_location(doc: &Document, ld: Option<&serde_json::Value>, body: &str) -> Option<String> {
    if let Some(loc) = ld.and_then(|d| d.get("location")) {
        let value = match loc {
            serde_json::Value::Object(_) => ld_str(loc, "name").or_else(|| ld_str(loc, "address")),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        };
        if value.is_some() {
            return value;
        }
    }
    if let Some(loc) = doc.first_attr(r#"meta[property="event:location"]"#, "content") {
        return Some(truncate(&loc, 50));
    }
    if ONLINE_RE.is_match(body) {
        return Some("온라인".to_string());
    }
    for re in LOCATION_RES.iter() {
        if let Some(caps) = re.captures(body) {
            let candidate = truncate(caps[1].trim(), 50);
            if candidate.chars().count() >= 2 && !ALL_DIGITS_RE.is_match(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn find_main_content(doc: &Document) -> Option<String> {
    CONTENT_SELECTORS
        .iter()
        .find_map(|sel| doc.first_text(sel))
        .or_else(|| doc.first_text("p"))
        .map(|t| truncate(&t, 200))
}

fn classify_keywords(title: Option<&str>, description: Option<&str>) -> Vec<String> {
    let all = format!("{} {}", title.unwrap_or(""), description.unwrap_or("")).to_lowercase();
    KEYWORD_GROUPS
        .iter()
        .find(|(_, words)| words.iter().any(|w| all.contains(w)))
        .map(|(group, _)| vec![group.to_string()])
        .unwrap_or_default()
}

fn json_ld(doc: &Document) -> Option<serde_json::Value> {
    let raw: String = doc.html().select(&LD_JSON).next()?.text().collect();
    serde_json::from_str(&raw).ok()
}

fn ld_str(data: &serde_json::Value, key: &str) -> Option<String> {
    match data.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_capture(res: &[Regex], text: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truncate(s: &str, max: usize) -> String {
    clip_chars(s, max).trim().to_string()
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}
