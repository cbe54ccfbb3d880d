use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Job,
    Funding,
    Education,
    Contest,
    Event,
    News,
    Interview,
    Thought,
    Ad,
}

/// Metadata fields a category's link text is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Organizer,
    Title,
    Target,
    Period,
    Location,
}

/// Formatting rule for one verified category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRules {
    pub required_fields: &'static [Field],
    pub format_pattern: &'static str,
}

const JOB_RULES: CategoryRules = CategoryRules {
    required_fields: &[Field::Organizer, Field::Title, Field::Target],
    format_pattern: "[회사명] 직군 (경력구분)",
};
const FUNDING_RULES: CategoryRules = CategoryRules {
    required_fields: &[Field::Title, Field::Period],
    format_pattern: "프로젝트명 펀딩 (~마감일)",
};
const EDUCATION_RULES: CategoryRules = CategoryRules {
    required_fields: &[Field::Organizer, Field::Title, Field::Location],
    format_pattern: "[주최] 프로그램명 (장소)",
};
const CONTEST_RULES: CategoryRules = CategoryRules {
    required_fields: &[Field::Title, Field::Period],
    format_pattern: "공모전명 (~마감일)",
};
const EVENT_RULES: CategoryRules = CategoryRules {
    required_fields: &[Field::Organizer, Field::Title, Field::Location, Field::Period],
    format_pattern: "[주최] 행사명 (장소, 기간)",
};

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Job,
        Category::Funding,
        Category::Education,
        Category::Contest,
        Category::Event,
        Category::News,
        Category::Interview,
        Category::Thought,
        Category::Ad,
    ];

    pub const VERIFIED: [Category; 5] = [
        Category::Job,
        Category::Funding,
        Category::Education,
        Category::Contest,
        Category::Event,
    ];

    pub fn is_verified(self) -> bool {
        Self::VERIFIED.contains(&self)
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::Job => "job",
            Category::Funding => "funding",
            Category::Education => "education",
            Category::Contest => "contest",
            Category::Event => "event",
            Category::News => "news",
            Category::Interview => "interview",
            Category::Thought => "thought",
            Category::Ad => "ad",
        }
    }

    /// Section label as it appears in the newsletter headers.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Job => "채용",
            Category::Funding => "후원/캠페인/이벤트",
            Category::Education => "교육/모임",
            Category::Contest => "공모/지원",
            Category::Event => "행사",
            Category::News => "소식",
            Category::Interview => "인터뷰",
            Category::Thought => "생각거리",
            Category::Ad => "광고",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Job => "🎯",
            Category::Funding => "📢",
            Category::Education => "📚",
            Category::Contest => "🏆",
            Category::Event => "🎉",
            Category::News => "📰",
            Category::Interview => "🎤",
            Category::Thought => "💭",
            Category::Ad => "📣",
        }
    }

    /// Rules for verified categories; excluded categories fall back to the job rules.
    pub fn rules(self) -> CategoryRules {
        match self {
            Category::Funding => FUNDING_RULES,
            Category::Education => EDUCATION_RULES,
            Category::Contest => CONTEST_RULES,
            Category::Event => EVENT_RULES,
            _ => JOB_RULES,
        }
    }

    pub fn from_display_name(name: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.display_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_set_is_fixed() {
        let verified: Vec<_> = Category::ALL.iter().filter(|c| c.is_verified()).collect();
        assert_eq!(verified.len(), 5);
        assert!(!Category::News.is_verified());
        assert!(!Category::Ad.is_verified());
    }

    #[test]
    fn keys_round_trip_through_from_str() {
        for c in Category::ALL {
            assert_eq!(c.key().parse::<Category>().unwrap(), c);
        }
        assert!("blog".parse::<Category>().is_err());
    }

    #[test]
    fn display_names_resolve() {
        assert_eq!(Category::from_display_name("공모/지원"), Some(Category::Contest));
        assert_eq!(Category::from_display_name("없음"), None);
    }

    #[test]
    fn event_requires_four_fields() {
        assert_eq!(Category::Event.rules().required_fields.len(), 4);
        assert!(Category::Contest.rules().format_pattern.contains('('));
        assert!(!Category::Contest.rules().format_pattern.contains('['));
    }
}
