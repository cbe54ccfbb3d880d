use std::time::Duration;

use regex::Regex;

use crate::category::Category;

pub const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_DB_PATH: &str = "data/letter_audit.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Header phrase that opens a category section in the newsletter body.
#[derive(Debug, Clone)]
pub struct SectionPattern {
    pub category: Category,
    pub pattern: Regex,
}

/// Which part of a link a keyword rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    LinkText,
    LinkUrl,
    Domain,
}

/// One fallback classification rule: any keyword hit assigns `category`.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub tier: Tier,
    pub category: Category,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(tier: Tier, category: Category, keywords: &[&str]) -> Self {
        Self {
            tier,
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// `haystack` must already be lower-cased.
    pub fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct LinkFilter {
    pub min_chars: usize,
    pub max_chars: usize,
    pub denied_url_parts: Vec<String>,
    pub denied_text_parts: Vec<String>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            min_chars: 3,
            max_chars: 200,
            denied_url_parts: to_strings(&["stibee.com", "orangeletter.kr", "orangelab.kr"]),
            denied_text_parts: to_strings(&[
                "구독",
                "바로가기",
                "오렌지랩",
                "수신거부",
                "unsubscribe",
                "오렌지레터와 메일함 바깥에서 만나기",
                "광고(유료)",
                "제보하기(무료)",
                "광고하기(유료)",
                "광고 문의",
                "제보 문의",
            ]),
        }
    }
}

/// Pure tables and knobs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub batch_size: usize,
    pub section_patterns: Vec<SectionPattern>,
    /// Evaluated in order after section containment; first hit wins.
    pub keyword_rules: Vec<KeywordRule>,
    pub fallback: Category,
    pub link_filter: LinkFilter,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            section_patterns: default_section_patterns(),
            keyword_rules: default_keyword_rules(),
            fallback: Category::News,
            link_filter: LinkFilter::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

fn section(category: Category, pattern: &str) -> SectionPattern {
    SectionPattern {
        category,
        pattern: Regex::new(&format!("(?i){}", pattern)).expect("static section pattern"),
    }
}

pub fn default_section_patterns() -> Vec<SectionPattern> {
    vec![
        section(Category::News, r"\(소식\)\s*세상을 바꾸는 크고 작은 움직임이 있었어요"),
        section(Category::Interview, r"\(인터뷰\)\s*어떤 사람들이, 무슨 변화를 꿈꿀까요\?"),
        section(Category::Thought, r"\(생각거리\)\s*우리는 다양한 목소리와 이야기를 듣고 싶어요"),
        section(Category::Ad, r"\(광고\)\s*오렌지레터 비즈니스 서포터 소식이에요"),
        section(Category::Job, r"\(채용\)\s*좋아하는 일이 직업이 될 수도 있어요"),
        section(Category::Funding, r"\(후원/캠페인/이벤트\)\s*마음이 가는 일은 적극적으로 밀어줘요"),
        section(Category::Education, r"\(교육/모임\)\s*따로 또 같이, 사람들과 함께 성장해요"),
        section(Category::Contest, r"\(공모/지원\)\s*언제나 새로운 기회는 있어요"),
        section(Category::Event, r"\(행사\)\s*여기서 만나요"),
    ]
}

pub fn default_keyword_rules() -> Vec<KeywordRule> {
    use Category::*;
    use Tier::*;

    vec![
        KeywordRule::new(LinkText, Job, &[
            "채용", "모집", "구인", "입사", "리크루팅", "신입", "경력", "인턴", "정규직", "계약직",
            "파트타임",
        ]),
        KeywordRule::new(LinkText, Funding, &[
            "펀딩", "후원", "캠페인", "기부", "크라우드", "모금", "도움", "지원해", "함께해",
        ]),
        KeywordRule::new(LinkText, Education, &[
            "교육", "강의", "세미나", "워크샵", "컨퍼런스", "토론", "모임", "스터디", "네트워킹",
            "아카데미", "학습", "프로그램",
        ]),
        KeywordRule::new(LinkText, Contest, &[
            "공모", "지원", "신청", "모집", "선발", "접수", "마감", "응모",
        ]),
        KeywordRule::new(LinkText, Event, &[
            "행사", "이벤트", "축제", "박람회", "전시", "페어", "개최", "참가",
        ]),
        KeywordRule::new(LinkUrl, Job, &[
            "career", "job", "recruit", "hiring", "employment", "saramin", "jobkorea", "wanted",
        ]),
        KeywordRule::new(LinkUrl, Funding, &[
            "funding", "campaign", "donation", "happybean", "tumblbug", "kickstarter", "indiegogo",
            "cherry.charity", "socialfunch",
        ]),
        KeywordRule::new(LinkUrl, Education, &[
            "education", "seminar", "academy", "course", "workshop", "conference", "onoffmix",
            "festa",
        ]),
        KeywordRule::new(LinkUrl, Contest, &[
            "contest", "competition", "apply", "application", "startup",
        ]),
        KeywordRule::new(LinkUrl, Event, &["event", "festival", "fair", "exhibition"]),
        KeywordRule::new(Domain, Funding, &["naver.com", "kakao.com"]),
        KeywordRule::new(Domain, Contest, &["forms.gle", "tally.so", "typeform"]),
    ]
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Runtime settings ──

/// Environment-driven settings for the binary and the HTTP ports.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: String,
    pub bulk_endpoint: Option<String>,
    pub timeout: Duration,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            bulk_endpoint: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            db_path: lookup("LETTER_AUDIT_DB").unwrap_or(defaults.db_path),
            bulk_endpoint: lookup("LETTER_AUDIT_BULK_ENDPOINT").filter(|s| !s.trim().is_empty()),
            timeout: parse_num("LETTER_AUDIT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            batch_size: parse_num("LETTER_AUDIT_BATCH_SIZE")
                .map(|n| (n as usize).max(1))
                .unwrap_or(defaults.batch_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_rules_keep_fixed_priority() {
        let rules = default_keyword_rules();
        let text_order: Vec<Category> = rules
            .iter()
            .filter(|r| r.tier == Tier::LinkText)
            .map(|r| r.category)
            .collect();
        assert_eq!(
            text_order,
            vec![
                Category::Job,
                Category::Funding,
                Category::Education,
                Category::Contest,
                Category::Event
            ]
        );
        // Tiers are contiguous: text, then url, then domain.
        let tiers: Vec<Tier> = rules.iter().map(|r| r.tier).collect();
        let first_url = tiers.iter().position(|t| *t == Tier::LinkUrl).unwrap();
        let first_domain = tiers.iter().position(|t| *t == Tier::Domain).unwrap();
        assert!(tiers[..first_url].iter().all(|t| *t == Tier::LinkText));
        assert!(tiers[first_url..first_domain].iter().all(|t| *t == Tier::LinkUrl));
    }

    #[test]
    fn section_patterns_cover_every_category() {
        let patterns = default_section_patterns();
        for c in Category::ALL {
            assert!(patterns.iter().any(|p| p.category == c), "{} missing", c);
        }
    }

    #[test]
    fn section_patterns_ignore_case_and_spacing() {
        let patterns = default_section_patterns();
        let ad = patterns.iter().find(|p| p.category == Category::Ad).unwrap();
        assert!(ad.pattern.is_match("(광고)   오렌지레터 비즈니스 서포터 소식이에요"));
    }

    #[test]
    fn batch_size_never_zero() {
        assert_eq!(AnalysisConfig::default().with_batch_size(0).batch_size, 1);
    }

    #[test]
    fn settings_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("LETTER_AUDIT_DB", "/tmp/x.sqlite"),
            ("LETTER_AUDIT_TIMEOUT_SECS", "3"),
            ("LETTER_AUDIT_BATCH_SIZE", "not-a-number"),
            ("LETTER_AUDIT_BULK_ENDPOINT", "  "),
        ]
        .into_iter()
        .collect();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.db_path, "/tmp/x.sqlite");
        assert_eq!(s.timeout, Duration::from_secs(3));
        assert_eq!(s.batch_size, DEFAULT_BATCH_SIZE);
        assert!(s.bulk_endpoint.is_none());
    }
}
