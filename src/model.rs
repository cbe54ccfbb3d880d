use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::Field;
use crate::parser::classify::ClassifiedLink;

/// Facts about a link's destination page. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub organizer: Option<String>,
    pub period: Option<String>,
    pub location: Option<String>,
    pub target: Option<String>,
    pub keywords: Vec<String>,
    pub main_content: Option<String>,
    pub contact_info: Option<String>,
    pub details: Option<String>,
    pub site_name: Option<String>,
    pub note: Option<String>,
    pub error: bool,
}

impl PageMetadata {
    /// Non-blank value of a scored field.
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Organizer => &self.organizer,
            Field::Title => &self.title,
            Field::Target => &self.target,
            Field::Period => &self.period,
            Field::Location => &self.location,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: u32,
    pub max: u32,
}

impl DimensionScore {
    /// Clamps `score` into `0..=max`.
    pub fn new(score: i32, max: u32) -> Self {
        Self {
            score: score.clamp(0, max as i32) as u32,
            max,
        }
    }

    /// `score / max` scaled to `weight`; an empty dimension counts as zero.
    pub fn weighted(&self, weight: f64) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            weight * f64::from(self.score) / f64::from(self.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub core_info: DimensionScore,
    pub accuracy: DimensionScore,
    pub readability: DimensionScore,
    pub consistency: DimensionScore,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueCode {
    DateMissing,
    OrganizerUnclear,
    LocationMissing,
    TargetUnclear,
    TextTooShort,
    TextTooLong,
    Ok,
    Excluded,
    PageLoadFailed,
    /// Free-form issue reported by the bulk analyzer.
    Other(String),
}

impl IssueCode {
    pub fn as_str(&self) -> &str {
        match self {
            IssueCode::DateMissing => "date-missing",
            IssueCode::OrganizerUnclear => "organizer-unclear",
            IssueCode::LocationMissing => "location-missing",
            IssueCode::TargetUnclear => "target-unclear",
            IssueCode::TextTooShort => "text-too-short",
            IssueCode::TextTooLong => "text-too-long",
            IssueCode::Ok => "ok",
            IssueCode::Excluded => "excluded",
            IssueCode::PageLoadFailed => "page-load-failed",
            IssueCode::Other(s) => s,
        }
    }

    /// Human-readable Korean label.
    pub fn describe(&self) -> &str {
        match self {
            IssueCode::DateMissing => "날짜 정보가 누락되었습니다",
            IssueCode::OrganizerUnclear => "주최/회사 정보가 불명확합니다",
            IssueCode::LocationMissing => "장소 정보가 누락되었습니다",
            IssueCode::TargetUnclear => "대상 정보가 불명확합니다",
            IssueCode::TextTooShort => "링크 텍스트가 너무 짧습니다",
            IssueCode::TextTooLong => "링크 텍스트가 너무 깁니다",
            IssueCode::Ok => "양호",
            IssueCode::Excluded => "검증 제외",
            IssueCode::PageLoadFailed => "페이지 로드 실패",
            IssueCode::Other(s) => s,
        }
    }
}

impl From<String> for IssueCode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "date-missing" => IssueCode::DateMissing,
            "organizer-unclear" => IssueCode::OrganizerUnclear,
            "location-missing" => IssueCode::LocationMissing,
            "target-unclear" => IssueCode::TargetUnclear,
            "text-too-short" => IssueCode::TextTooShort,
            "text-too-long" => IssueCode::TextTooLong,
            "ok" => IssueCode::Ok,
            "excluded" => IssueCode::Excluded,
            "page-load-failed" => IssueCode::PageLoadFailed,
            _ => IssueCode::Other(s),
        }
    }
}

impl From<IssueCode> for String {
    fn from(code: IssueCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final per-link outcome of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub link: ClassifiedLink,
    pub page_info: Option<PageMetadata>,
    pub suggested_text: String,
    pub accuracy: u32,
    pub issues: Vec<IssueCode>,
    pub breakdown: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Placeholder for a link in a category that is never scored.
    pub fn excluded(link: ClassifiedLink) -> Self {
        Self {
            suggested_text: link.text.clone(),
            link,
            page_info: None,
            accuracy: 0,
            issues: vec![IssueCode::Excluded],
            breakdown: None,
            error: None,
        }
    }

    /// Degraded result for a link whose metadata could not be obtained.
    pub fn failed(link: ClassifiedLink, reason: impl Into<String>) -> Self {
        Self {
            suggested_text: link.text.clone(),
            link,
            page_info: None,
            accuracy: 0,
            issues: vec![IssueCode::PageLoadFailed],
            breakdown: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.breakdown.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    fn link() -> ClassifiedLink {
        ClassifiedLink {
            id: "link-0".into(),
            url: "https://a.example".into(),
            text: "링크".into(),
            offset: 0,
            category: Category::News,
            section: String::new(),
            order: 0,
        }
    }

    #[test]
    fn dimension_score_clamps() {
        assert_eq!(DimensionScore::new(-5, 20).score, 0);
        assert_eq!(DimensionScore::new(45, 30).score, 30);
        assert_eq!(DimensionScore::new(0, 0).weighted(40.0), 0.0);
    }

    #[test]
    fn missing_metadata_fields_deserialize() {
        let meta: PageMetadata = serde_json::from_str(r#"{"title":"제목"}"#).unwrap();
        assert_eq!(meta.field(Field::Title), Some("제목"));
        assert_eq!(meta.field(Field::Organizer), None);
        assert!(meta.keywords.is_empty());
        assert!(!meta.error);
    }

    #[test]
    fn blank_fields_count_as_absent() {
        let meta = PageMetadata {
            location: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(meta.field(Field::Location), None);
    }

    #[test]
    fn issue_codes_serialize_as_strings() {
        let json = serde_json::to_string(&vec![IssueCode::DateMissing, IssueCode::Other("상금누락".into())]).unwrap();
        assert_eq!(json, r#"["date-missing","상금누락"]"#);
        let back: Vec<IssueCode> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], IssueCode::DateMissing);
    }

    #[test]
    fn excluded_result_shape() {
        let r = AnalysisResult::excluded(link());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["issues"][0], "excluded");
        assert!(v["pageInfo"].is_null());
        assert!(v["breakdown"].is_null());
        assert_eq!(v["suggestedText"], "링크");
        assert_eq!(v["id"], "link-0");
        assert!(v.get("error").is_none());
    }
}
