use serde::Serialize;

use crate::category::{Category, Field};
use crate::model::{DimensionScore, IssueCode, PageMetadata, ScoreBreakdown};

const CORE_INFO_PER_FIELD: u32 = 10;
const ACCURACY_MAX: u32 = 30;
const READABILITY_MAX: u32 = 20;
const CONSISTENCY_MAX: u32 = 10;

const SHORT_TEXT: usize = 10;
const LONG_TEXT: usize = 100;
const TITLE_PREFIX: usize = 5;

const CORE_INFO_WEIGHT: f64 = 40.0;
const ACCURACY_WEIGHT: f64 = 30.0;
const READABILITY_WEIGHT: f64 = 20.0;
const CONSISTENCY_WEIGHT: f64 = 10.0;

/// Four-dimension score of `current` link text against the page's facts.
///
/// `suggested` is accepted for parity with the bulk path but does not affect
/// the score.
pub fn score_breakdown(
    current: &str,
    _suggested: &str,
    meta: &PageMetadata,
    category: Category,
) -> ScoreBreakdown {
    let rules = category.rules();
    let len = current.chars().count();

    // Core info: each required field quoted verbatim.
    let hits = rules
        .required_fields
        .iter()
        .filter(|f| contains_field(current, meta, **f))
        .count() as u32;
    let core_max = CORE_INFO_PER_FIELD * rules.required_fields.len() as u32;
    let core_info = DimensionScore::new((hits * CORE_INFO_PER_FIELD) as i32, core_max);

    let mut accuracy = ACCURACY_MAX as i32;
    if len < SHORT_TEXT {
        accuracy -= 10;
    }
    if !mentions_title(current, meta) {
        accuracy -= 10;
    }

    let mut readability = READABILITY_MAX as i32;
    if len > LONG_TEXT {
        readability -= 5;
    }
    if len < SHORT_TEXT {
        readability -= 10;
    }
    if !current.chars().any(is_hangul_syllable) {
        readability -= 5;
    }

    let mut consistency = CONSISTENCY_MAX as i32;
    if rules.format_pattern.contains('[') && !current.contains('[') {
        consistency -= 3;
    }
    if rules.format_pattern.contains('(') && !current.contains('(') {
        consistency -= 3;
    }

    ScoreBreakdown {
        core_info,
        accuracy: DimensionScore::new(accuracy, ACCURACY_MAX),
        readability: DimensionScore::new(readability, READABILITY_MAX),
        consistency: DimensionScore::new(consistency, CONSISTENCY_MAX),
    }
}

/// Weighted reduction of a breakdown to an integer in `0..=100`.
pub fn accuracy_score(b: &ScoreBreakdown) -> u32 {
    let total = b.core_info.weighted(CORE_INFO_WEIGHT)
        + b.accuracy.weighted(ACCURACY_WEIGHT)
        + b.readability.weighted(READABILITY_WEIGHT)
        + b.consistency.weighted(CONSISTENCY_WEIGHT);
    (total.round() as u32).min(100)
}

pub fn calculate_accuracy(
    current: &str,
    suggested: &str,
    meta: &PageMetadata,
    category: Category,
) -> u32 {
    accuracy_score(&score_breakdown(current, suggested, meta, category))
}

/// Issue codes for missing required facts and length problems, or `ok`.
pub fn identify_issues(current: &str, meta: &PageMetadata, category: Category) -> Vec<IssueCode> {
    let mut issues: Vec<IssueCode> = category
        .rules()
        .required_fields
        .iter()
        .filter(|f| !contains_field(current, meta, **f))
        .filter_map(|f| match f {
            Field::Period => Some(IssueCode::DateMissing),
            Field::Organizer => Some(IssueCode::OrganizerUnclear),
            Field::Location => Some(IssueCode::LocationMissing),
            Field::Target => Some(IssueCode::TargetUnclear),
            Field::Title => None,
        })
        .collect();

    let len = current.chars().count();
    if len < SHORT_TEXT {
        issues.push(IssueCode::TextTooShort);
    }
    if len > LONG_TEXT {
        issues.push(IssueCode::TextTooLong);
    }
    if issues.is_empty() {
        issues.push(IssueCode::Ok);
    }
    issues
}

fn contains_field(current: &str, meta: &PageMetadata, field: Field) -> bool {
    meta.field(field).is_some_and(|v| current.contains(v))
}

fn mentions_title(current: &str, meta: &PageMetadata) -> bool {
    match meta.field(Field::Title) {
        Some(title) => {
            let prefix: String = title.to_lowercase().chars().take(TITLE_PREFIX).collect();
            current.to_lowercase().contains(&prefix)
        }
        None => false,
    }
}

fn is_hangul_syllable(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

/// Display bucket for an accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyClass {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl AccuracyClass {
    pub fn of(accuracy: u32) -> Self {
        match accuracy {
            90.. => AccuracyClass::Excellent,
            70..=89 => AccuracyClass::Good,
            50..=69 => AccuracyClass::Fair,
            _ => AccuracyClass::Poor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> PageMetadata {
        PageMetadata {
            organizer: Some("Acme".into()),
            title: Some("Senior Dev".into()),
            target: Some("3+ yrs".into()),
            ..Default::default()
        }
    }

    #[test]
    fn core_info_full_when_all_fields_quoted() {
        let b = score_breakdown("[Acme] Senior Dev (3+ yrs)", "", &acme(), Category::Job);
        assert_eq!(b.core_info.score, b.core_info.max);
        assert_eq!(b.core_info.max, 30);
        assert_eq!(b.accuracy.score, 30);
        // No Hangul in the text.
        assert_eq!(b.readability.score, 15);
        assert_eq!(b.consistency.score, 10);
        assert_eq!(accuracy_score(&b), 95);
    }

    #[test]
    fn empty_metadata_scores_low_but_non_negative() {
        let meta = PageMetadata::default();
        for category in Category::VERIFIED {
            let b = score_breakdown("짧음", "", &meta, category);
            assert_eq!(b.core_info.score, 0);
            assert_eq!(b.accuracy.score, 10);
            assert_eq!(b.readability.score, 10);
            let acc = accuracy_score(&b);
            assert!(acc <= 100);
        }
        let b = score_breakdown("x", "", &meta, Category::Event);
        assert_eq!(b.readability.score, 5);
        assert_eq!(b.consistency.score, 4);
        // 0 + 10 + 5 + 4
        assert_eq!(accuracy_score(&b), 19);
    }

    #[test]
    fn readability_penalties_stack() {
        let long = "a".repeat(101);
        let b = score_breakdown(&long, "", &PageMetadata::default(), Category::Contest);
        assert_eq!(b.readability.score, 10);
    }

    #[test]
    fn title_prefix_is_case_insensitive() {
        let meta = PageMetadata {
            title: Some("GREEN Festival 2024".into()),
            ..Default::default()
        };
        let b = score_breakdown("green fest 안내 페이지입니다", "", &meta, Category::Event);
        assert_eq!(b.accuracy.score, 30);
    }

    #[test]
    fn accuracy_rounds_weighted_sum() {
        let meta = PageMetadata {
            title: Some("청년 아이디어 공모전".into()),
            period: Some("2024.11.01 ~ 2024.12.15".into()),
            ..Default::default()
        };
        // title hit only: 40*10/20 = 20, accuracy 30, readability 20, consistency 10 - 3 (no parens)
        let acc = calculate_accuracy("청년 아이디어 공모전 바로 신청", "", &meta, Category::Contest);
        assert_eq!(acc, 20 + 30 + 20 + 7);
    }

    #[test]
    fn issues_for_missing_fields() {
        let meta = PageMetadata {
            organizer: Some("서울시".into()),
            title: Some("박람회".into()),
            location: Some("DDP".into()),
            period: Some("2024.11.30".into()),
            ..Default::default()
        };
        let issues = identify_issues("[서울시] 박람회", &meta, Category::Event);
        assert_eq!(
            issues,
            vec![IssueCode::LocationMissing, IssueCode::DateMissing, IssueCode::TextTooShort]
        );
    }

    #[test]
    fn issues_ok_when_complete() {
        let issues = identify_issues("[Acme] Senior Dev (3+ yrs) 채용", &acme(), Category::Job);
        assert_eq!(issues, vec![IssueCode::Ok]);
    }

    #[test]
    fn issues_flag_long_text() {
        let long = "가".repeat(120);
        let issues = identify_issues(&long, &PageMetadata::default(), Category::Contest);
        assert_eq!(issues, vec![IssueCode::DateMissing, IssueCode::TextTooLong]);
    }

    #[test]
    fn accuracy_classes() {
        assert_eq!(AccuracyClass::of(95), AccuracyClass::Excellent);
        assert_eq!(AccuracyClass::of(70), AccuracyClass::Good);
        assert_eq!(AccuracyClass::of(50), AccuracyClass::Fair);
        assert_eq!(AccuracyClass::of(0), AccuracyClass::Poor);
    }
}
