//! The fetch-paginate loop.
//!
//! WordPress never says how many feed pages exist. The loop keeps requesting
//! `?paged=N` until a page comes back empty (or 404), the article cap is hit,
//! or one of the runaway guards trips. Pages are fetched strictly one after the
//! other with a polite delay in between.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::fetcher::FetchError;
use crate::feed::parser::{parse_page, Article, ParseError};
use crate::util::page_url;

/// Something that can return the raw bytes of a feed page.
///
/// [`HttpSource`](crate::feed::HttpSource) is the production implementation;
/// tests script pages in memory.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&mut self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Knobs for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// When false only the base URL is fetched.
    pub paginate: bool,
    /// Hard cap on collected articles. `None` means unlimited.
    pub max_articles: Option<usize>,
    /// Pause between consecutive page requests.
    pub delay: Duration,
    /// Stop after this many pages. 0 disables the guard.
    pub max_pages: u32,
    /// Stop after this many consecutive pages with nothing new. 0 disables the guard.
    pub max_duplicate_pages: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            paginate: true,
            max_articles: None,
            delay: Duration::from_secs(1),
            max_pages: 500,
            max_duplicate_pages: 3,
        }
    }
}

/// Why the loop ended. Every variant is a successful end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page parsed to zero entries.
    EmptyPage,
    /// A page after the first answered 404.
    PageNotFound,
    /// The article cap was reached.
    MaxArticles,
    /// Pagination is disabled.
    SinglePage,
    /// `max_pages` pages were fetched.
    MaxPages,
    /// `max_duplicate_pages` consecutive pages added nothing.
    DuplicatePages,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EmptyPage => "empty page",
            StopReason::PageNotFound => "page not found",
            StopReason::MaxArticles => "article limit reached",
            StopReason::SinglePage => "pagination disabled",
            StopReason::MaxPages => "page limit reached",
            StopReason::DuplicatePages => "only duplicates returned",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful crawl.
#[derive(Debug)]
pub struct Crawl {
    /// Unique articles in discovery order.
    pub articles: Vec<Article>,
    /// Number of page requests made (including a final empty or 404 page).
    pub pages_fetched: u32,
    /// Number of inter-page delays applied; always `pages_fetched - 1`.
    pub delays_applied: u32,
    pub duplicates_skipped: usize,
    pub stop_reason: StopReason,
}

/// A fatal crawl failure. Articles gathered on earlier pages are discarded.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Failed to fetch page {page} ({url})")]
    Fetch {
        page: u32,
        url: Url,
        source: FetchError,
    },
    #[error("Failed to parse page {page} ({url})")]
    Parse {
        page: u32,
        url: Url,
        source: ParseError,
    },
}

impl CrawlError {
    /// The 1-based page number the failure happened on.
    pub fn page(&self) -> u32 {
        match self {
            CrawlError::Fetch { page, .. } | CrawlError::Parse { page, .. } => *page,
        }
    }
}

/// Ordered, deduplicated, optionally bounded article list.
#[derive(Debug, Default)]
pub struct Accumulator {
    articles: Vec<Article>,
    seen: HashSet<String>,
    limit: Option<usize>,
}

impl Accumulator {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            articles: Vec::new(),
            seen: HashSet::new(),
            limit,
        }
    }

    /// Appends `article` unless its identity key was already seen or the
    /// accumulator is full. Returns true if it was added.
    pub fn push(&mut self, article: Article) -> bool {
        if self.is_full() {
            return false;
        }
        if !self.seen.insert(article.identity_key()) {
            return false;
        }
        self.articles.push(article);
        true
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.articles.len() >= limit)
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn into_articles(self) -> Vec<Article> {
        self.articles
    }
}

/// Collects every article reachable from `base` by paging through the feed.
///
/// # Errors
///
/// - [`CrawlError::Fetch`] - a page could not be fetched. A 404 on page 1 is an
///   error; a 404 on a later page ends pagination instead.
/// - [`CrawlError::Parse`] - a page was not a valid RSS/Atom document
pub async fn crawl<S: PageSource>(
    source: &mut S,
    base: &Url,
    options: &CrawlOptions,
) -> Result<Crawl, CrawlError> {
    let mut acc = Accumulator::new(options.max_articles);
    let mut page: u32 = 1;
    let mut delays_applied: u32 = 0;
    let mut duplicates_skipped = 0;
    let mut stale_pages: u32 = 0;

    let stop_reason = loop {
        let url = if options.paginate {
            page_url(base, page)
        } else {
            base.clone()
        };
        tracing::info!(page = page, url = %url, "Fetching feed page");

        let bytes = match source.fetch_page(&url).await {
            Ok(bytes) => bytes,
            Err(e) if page > 1 && e.is_not_found() => {
                tracing::info!(page = page, "Page not found, end of pagination");
                break StopReason::PageNotFound;
            }
            Err(err) => {
                return Err(CrawlError::Fetch {
                    page,
                    url,
                    source: err,
                })
            }
        };

        let entries = match parse_page(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                return Err(CrawlError::Parse {
                    page,
                    url,
                    source: err,
                })
            }
        };

        if entries.is_empty() {
            tracing::info!(page = page, "Empty page, end of pagination");
            break StopReason::EmptyPage;
        }

        let mut added = 0;
        for article in entries {
            if acc.is_full() {
                break;
            }
            if acc.push(article) {
                added += 1;
            } else {
                duplicates_skipped += 1;
            }
        }
        tracing::info!(
            page = page,
            new = added,
            total = acc.len(),
            "Page processed"
        );

        if acc.is_full() {
            break StopReason::MaxArticles;
        }
        if !options.paginate {
            break StopReason::SinglePage;
        }

        if added == 0 {
            stale_pages += 1;
            if options.max_duplicate_pages > 0 && stale_pages >= options.max_duplicate_pages {
                tracing::warn!(
                    page = page,
                    stale_pages = stale_pages,
                    "Feed keeps returning known articles, stopping pagination"
                );
                break StopReason::DuplicatePages;
            }
        } else {
            stale_pages = 0;
        }

        if options.max_pages > 0 && page >= options.max_pages {
            tracing::warn!(
                max_pages = options.max_pages,
                "Page limit reached before the feed ran out"
            );
            break StopReason::MaxPages;
        }

        page += 1;
        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
        delays_applied += 1;
    };

    Ok(Crawl {
        articles: acc.into_articles(),
        pages_fetched: page,
        delays_applied,
        duplicates_skipped,
        stop_reason,
    })
}
