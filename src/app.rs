//! One export run: crawl the feed, filter by date, write the spreadsheet.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::export::write_ods;
use crate::feed::{crawl, HttpSource, PageSource, StopReason};

/// Outcome of a successful run, printed by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
    /// Unique articles collected before date filtering.
    pub collected: usize,
    pub duplicates_skipped: usize,
    /// Articles dropped by the date window.
    pub filtered_out: usize,
    /// Rows written, header excluded.
    pub exported: usize,
    pub output: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} articles to {}",
            self.exported,
            self.output.display()
        )?;
        write!(
            f,
            "{} page(s) fetched ({}), {} duplicate(s) skipped",
            self.pages_fetched, self.stop_reason, self.duplicates_skipped
        )?;
        if self.filtered_out > 0 {
            write!(f, ", {} outside the date range", self.filtered_out)?;
        }
        Ok(())
    }
}

/// Runs an export over HTTP.
pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    let mut source = HttpSource::new(config.http.clone()).context("Failed to build HTTP client")?;
    run_with_source(&mut source, config).await
}

/// Runs an export against any page source.
///
/// Nothing is written unless the crawl succeeds with at least one article; a
/// previous output file is then left as it was. A date window that excludes
/// every article still produces a sheet holding only the header row.
pub async fn run_with_source<S: PageSource>(
    source: &mut S,
    config: &RunConfig,
) -> Result<RunSummary> {
    tracing::info!(
        url = %config.feed_url,
        paginate = config.crawl.paginate,
        max_articles = ?config.crawl.max_articles,
        "Starting export"
    );
    if !config.date_range.is_unbounded() {
        tracing::info!(
            from = ?config.date_range.start_date(),
            to = ?config.date_range.end_date(),
            "Keeping articles published inside the date range"
        );
    }

    let result = crawl(source, &config.feed_url, &config.crawl)
        .await
        .with_context(|| format!("Export aborted, '{}' was not written", config.output.display()))?;

    let collected = result.articles.len();
    if collected == 0 {
        anyhow::bail!("No articles found at {}", config.feed_url);
    }

    let (articles, filtered_out) = config.date_range.apply(result.articles);
    if filtered_out > 0 {
        tracing::info!(
            kept = articles.len(),
            dropped = filtered_out,
            "Applied date range"
        );
    }
    if articles.is_empty() {
        tracing::warn!(
            collected = collected,
            "No article falls inside the date range, writing a header-only sheet"
        );
    }

    write_ods(&articles, &config.output).context("Failed to save the spreadsheet")?;
    tracing::info!(
        path = %config.output.display(),
        rows = articles.len(),
        "Spreadsheet written"
    );

    Ok(RunSummary {
        pages_fetched: result.pages_fetched,
        stop_reason: result.stop_reason,
        collected,
        duplicates_skipped: result.duplicates_skipped,
        filtered_out,
        exported: articles.len(),
        output: config.output.clone(),
    })
}
