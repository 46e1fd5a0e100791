//! Feed retrieval: paging through a WordPress feed and mapping its items.
//!
//! - [`crawl`](crawl()) - the fetch-paginate loop with deduplication and runaway guards
//! - [`HttpSource`] - HTTP transport with timeout, size limit and retry/backoff
//! - [`parse_page`] - RSS/Atom parsing via `feed-rs`, mapped to [`Article`]
//! - [`DateRange`] - optional publication-date window applied after the crawl
//!
//! # Example
//!
//! ```ignore
//! use feedsheet::feed::{crawl, CrawlOptions, HttpOptions, HttpSource};
//!
//! let mut source = HttpSource::new(HttpOptions::default())?;
//! let base = url::Url::parse("https://www.uneiaparjour.fr/feed/")?;
//! let result = crawl(&mut source, &base, &CrawlOptions::default()).await?;
//! println!("{} articles over {} pages", result.articles.len(), result.pages_fetched);
//! ```

mod crawl;
mod fetcher;
mod filter;
mod parser;

pub use crawl::{
    crawl, Accumulator, Crawl, CrawlError, CrawlOptions, PageSource, StopReason,
};
pub use fetcher::{default_user_agent, FetchError, HttpOptions, HttpSource};
pub use filter::{parse_user_date, DateRange, DateRangeError};
pub use parser::{parse_page, Article, ParseError, MAX_CATEGORIES};
