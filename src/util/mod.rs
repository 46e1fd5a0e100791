//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL handling**: feed URL validation and WordPress `paged=N` page URLs
//! - **Text processing**: HTML-to-text conversion and XML-safe sanitising
//!
//! # Examples
//!
//! ```
//! use feedsheet::util::{page_url, strip_html, validate_feed_url};
//!
//! let base = validate_feed_url("https://example.com/feed/").unwrap();
//! assert_eq!(page_url(&base, 2).as_str(), "https://example.com/feed/?paged=2");
//!
//! assert_eq!(strip_html("<p>Bonjour</p>"), "Bonjour");
//! ```

mod text;
mod feed_url;

pub use text::{strip_html, strip_xml_invalid_chars};
pub use feed_url::{page_url, validate_feed_url, UrlError, PAGE_PARAM};
