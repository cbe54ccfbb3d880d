use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::warn;

use letter_audit::analysis::AnalysisSession;
use letter_audit::cache::{CachedDocumentSource, CachedMetadataFetcher, CacheStore, SqliteCache};
use letter_audit::category::Category;
use letter_audit::config::{AnalysisConfig, Settings};
use letter_audit::fetch::{DocumentSource, HttpBulkAnalyzer, HttpFetcher, MetadataFetcher};
use letter_audit::parser::{self, ParsedLetter};
use letter_audit::report;

#[derive(Parser)]
#[command(name = "letter_audit", about = "Audit newsletter link texts against their target pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a newsletter and score every verifiable link
    Analyze {
        /// Newsletter URL
        url: String,
        /// Links analyzed concurrently per batch
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Try the bulk analyzer endpoint first (LETTER_AUDIT_BULK_ENDPOINT)
        #[arg(long)]
        bulk: bool,
        /// Skip the on-disk cache
        #[arg(long)]
        no_cache: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Only show links of this category (job, funding, education, ...)
        #[arg(short, long)]
        category: Option<Category>,
    },
    /// Classify links of saved newsletter HTML files without fetching anything
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Inspect or maintain the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry counts
    Stats,
    /// Delete every entry
    Clear,
    /// Delete expired entries
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    let result = match cli.command {
        Commands::Analyze {
            url,
            batch_size,
            bulk,
            no_cache,
            json,
            category,
        } => {
            analyze(&settings, &url, batch_size, bulk, no_cache, json, category).await
        }
        Commands::Extract { files, json } => extract(&files, json),
        Commands::Cache { action } => {
            let cache = SqliteCache::open(&settings.db_path)
                .with_context(|| format!("opening cache at {}", settings.db_path))?;
            match action {
                CacheAction::Stats => {
                    let s = cache.stats()?;
                    println!("Entries: {}", s.entries);
                    println!("Expired: {}", s.expired);
                }
                CacheAction::Clear => println!("Removed {} entries.", cache.clear()?),
                CacheAction::Prune => println!("Pruned {} expired entries.", cache.prune_expired()?),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", report::format_duration(elapsed));
    }

    result
}

async fn analyze(
    settings: &Settings,
    url: &str,
    batch_size: Option<usize>,
    bulk: bool,
    no_cache: bool,
    json: bool,
    category: Option<Category>,
) -> anyhow::Result<()> {
    let http = Arc::new(HttpFetcher::new(settings)?);
    let mut fetcher: Arc<dyn MetadataFetcher> = http.clone();
    let mut source: Arc<dyn DocumentSource> = http;

    if !no_cache {
        match SqliteCache::open(&settings.db_path) {
            Ok(cache) => {
                let store: Arc<dyn CacheStore> = Arc::new(cache);
                fetcher = Arc::new(CachedMetadataFetcher::new(fetcher, store.clone()));
                source = Arc::new(CachedDocumentSource::new(source, store));
            }
            Err(e) => warn!("Cache unavailable at {}, continuing without: {}", settings.db_path, e),
        }
    }

    let config =
        AnalysisConfig::default().with_batch_size(batch_size.unwrap_or(settings.batch_size));

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut session = AnalysisSession::new(config, fetcher).with_progress(pb);
    if bulk {
        match &settings.bulk_endpoint {
            Some(endpoint) => {
                session = session.with_bulk(Arc::new(HttpBulkAnalyzer::new(endpoint, settings)?))
            }
            None => warn!("--bulk given but LETTER_AUDIT_BULK_ENDPOINT is not set"),
        }
    }

    let mut letter = session.run_url(source.as_ref(), url).await?;
    if let Some(c) = category {
        letter.results.retain(|r| r.link.category == c);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&letter)?);
        return Ok(());
    }

    print!("{}", report::render(&letter));
    let lines = report::suggestions(&letter.results);
    if !lines.is_empty() {
        println!("\n--- Suggestions ---");
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn extract(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let config = AnalysisConfig::default();
    let letters: Vec<(PathBuf, anyhow::Result<ParsedLetter>)> = files
        .par_iter()
        .map(|path| {
            let letter = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .map(|markup| parser::process_markup(&markup, &config));
            (path.clone(), letter)
        })
        .collect();

    for (path, letter) in letters {
        let letter = match letter {
            Ok(l) => l,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };
        if json {
            println!("{}", serde_json::to_string_pretty(&letter.links)?);
            continue;
        }

        println!("== {} ==", path.display());
        if let Some(title) = &letter.title {
            println!("{}", title);
        }
        print!("{}", report::render_links(&letter.links));
        let counts: Vec<String> = letter
            .category_counts()
            .into_iter()
            .map(|(c, n)| format!("{} {}", c.key(), n))
            .collect();
        println!("{} links ({})\n", letter.links.len(), counts.join(", "));
    }
    Ok(())
}
