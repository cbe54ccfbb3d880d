pub mod ideal;
pub mod score;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::category::Category;
use crate::config::AnalysisConfig;
use crate::error::{AuditError, Result};
use crate::fetch::{BulkAnalyzer, BulkEntry, DocumentSource, MetadataFetcher};
use crate::model::{AnalysisResult, PageMetadata};
use crate::parser::classify::ClassifiedLink;
use crate::parser::document::Document;
use crate::parser::{self, ParsedLetter};

const NEEDS_FIX_BELOW: u32 = 70;

/// Score one link against fetched metadata.
pub fn analyze_link(link: &ClassifiedLink, meta: PageMetadata) -> AnalysisResult {
    let suggested = ideal::ideal_text(link.category, &meta);
    let breakdown = score::score_breakdown(&link.text, &suggested, &meta, link.category);
    let issues = score::identify_issues(&link.text, &meta, link.category);

    AnalysisResult {
        link: link.clone(),
        accuracy: score::accuracy_score(&breakdown),
        suggested_text: suggested,
        issues,
        breakdown: Some(breakdown),
        page_info: Some(meta),
        error: None,
    }
}

/// Convert a bulk analyzer entry; a missing entry scores zero.
pub fn from_bulk_entry(link: &ClassifiedLink, entry: Option<&BulkEntry>) -> AnalysisResult {
    let meta = entry.and_then(|e| e.key_info.clone()).unwrap_or_default();
    let suggested = entry
        .and_then(|e| e.suggested_text.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| link.text.clone());
    let accuracy = entry
        .and_then(|e| e.accuracy)
        .map(|a| a.round().clamp(0.0, 100.0) as u32)
        .unwrap_or(0);
    let breakdown = score::score_breakdown(&link.text, &suggested, &meta, link.category);

    AnalysisResult {
        link: link.clone(),
        page_info: Some(meta),
        suggested_text: suggested,
        accuracy,
        issues: entry.map(|e| e.issues.clone()).unwrap_or_default(),
        breakdown: Some(breakdown),
        error: None,
    }
}

/// Aggregate figures over the scored links of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total: usize,
    pub scored: usize,
    pub average_accuracy: u32,
    pub needs_fix: usize,
    pub per_category: BTreeMap<Category, usize>,
}

impl AnalysisSummary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let scored: Vec<&AnalysisResult> = results
            .iter()
            .filter(|r| r.link.category.is_verified())
            .collect();
        let average_accuracy = if scored.is_empty() {
            0
        } else {
            let sum: u32 = scored.iter().map(|r| r.accuracy).sum();
            (f64::from(sum) / scored.len() as f64).round() as u32
        };
        let mut per_category = BTreeMap::new();
        for r in &scored {
            *per_category.entry(r.link.category).or_insert(0) += 1;
        }

        Self {
            total: results.len(),
            scored: scored.len(),
            average_accuracy,
            needs_fix: scored.iter().filter(|r| r.accuracy < NEEDS_FIX_BELOW).count(),
            per_category,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LetterReport {
    pub url: String,
    pub title: Option<String>,
    pub summary: AnalysisSummary,
    pub results: Vec<AnalysisResult>,
}

/// One analysis run: owns its config, ports, and progress reporting.
pub struct AnalysisSession {
    config: AnalysisConfig,
    fetcher: Arc<dyn MetadataFetcher>,
    bulk: Option<Arc<dyn BulkAnalyzer>>,
    progress: ProgressBar,
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            config,
            fetcher,
            bulk: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_bulk(mut self, bulk: Arc<dyn BulkAnalyzer>) -> Self {
        self.bulk = Some(bulk);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Fetch, parse, and analyze a newsletter by URL.
    pub async fn run_url(&self, source: &dyn DocumentSource, url: &str) -> Result<LetterReport> {
        let base = validate_url(url)?;
        let markup = source.fetch_document(base.as_str()).await?;
        let letter = parse_letter(&markup, &base, &self.config);
        let results = self.analyze_letter(&letter).await;

        Ok(LetterReport {
            url: base.to_string(),
            title: letter.title,
            summary: AnalysisSummary::from_results(&results),
            results,
        })
    }

    pub async fn analyze(&self, doc: &Document) -> Vec<AnalysisResult> {
        let letter = parser::process_document(doc, &self.config);
        self.analyze_letter(&letter).await
    }

    /// Every classified link in `order`; excluded ones carry a placeholder.
    pub async fn analyze_letter(&self, letter: &ParsedLetter) -> Vec<AnalysisResult> {
        let verified: Vec<ClassifiedLink> = letter
            .links
            .iter()
            .filter(|l| l.category.is_verified())
            .cloned()
            .collect();
        info!("{} of {} links eligible for scoring", verified.len(), letter.links.len());

        self.progress.set_length(verified.len() as u64);
        let scored = self.score_links(&verified).await;
        self.progress.finish_and_clear();

        let mut by_id: HashMap<String, AnalysisResult> =
            scored.into_iter().map(|r| (r.link.id.clone(), r)).collect();

        letter
            .links
            .iter()
            .map(|link| {
                by_id
                    .remove(&link.id)
                    .unwrap_or_else(|| AnalysisResult::excluded(link.clone()))
            })
            .collect()
    }

    async fn score_links(&self, links: &[ClassifiedLink]) -> Vec<AnalysisResult> {
        if links.is_empty() {
            return Vec::new();
        }
        if let Some(bulk) = &self.bulk {
            match bulk.analyze_batch(links).await {
                Ok(entries) => {
                    info!("Bulk analysis returned {} entries", entries.len());
                    self.progress.inc(links.len() as u64);
                    return links
                        .iter()
                        .map(|l| from_bulk_entry(l, entries.get(&l.url)))
                        .collect();
                }
                Err(e) => warn!("Bulk analysis unavailable, falling back to per-link: {}", e),
            }
        }
        self.analyze_batched(links).await
    }

    /// Sequential batches; links within a batch run concurrently.
    pub async fn analyze_batched(&self, links: &[ClassifiedLink]) -> Vec<AnalysisResult> {
        let batch_size = self.config.batch_size.max(1);
        let mut results = Vec::with_capacity(links.len());

        for (i, batch) in links.chunks(batch_size).enumerate() {
            info!(
                "Analyzing batch {} ({}/{})",
                i + 1,
                (i * batch_size + batch.len()).min(links.len()),
                links.len()
            );
            let batch_results = join_all(batch.iter().map(|link| self.analyze_one(link))).await;
            results.extend(batch_results);
        }
        results
    }

    async fn analyze_one(&self, link: &ClassifiedLink) -> AnalysisResult {
        let result = match self.fetcher.fetch(&link.url).await {
            Ok(meta) if meta.error => {
                let reason = meta
                    .description
                    .clone()
                    .unwrap_or_else(|| "page reported an error".to_string());
                warn!("Metadata for {} flagged as error: {}", link.url, reason);
                AnalysisResult::failed(link.clone(), reason)
            }
            Ok(meta) => analyze_link(link, meta),
            Err(e) => {
                warn!("Link analysis failed for {}: {}", link.url, e);
                AnalysisResult::failed(link.clone(), e.to_string())
            }
        };
        self.progress.inc(1);
        result
    }
}

/// Only absolute http(s) URLs are accepted as session input.
pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AuditError::InvalidInput("empty URL".into()));
    }
    let parsed =
        Url::parse(trimmed).map_err(|e| AuditError::InvalidInput(format!("{}: {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(AuditError::InvalidInput(format!("unsupported URL: {}", trimmed))),
    }
}

/// Synchronous parse step so no parsed DOM is held across an await.
fn parse_letter(markup: &str, base: &Url, config: &AnalysisConfig) -> ParsedLetter {
    match Document::parse_with_base(markup, Some(base)) {
        Ok(doc) => parser::process_document(&doc, config),
        Err(e) => {
            warn!("Document parse failed, no links extracted: {}", e);
            ParsedLetter::empty()
        }
    }
}
