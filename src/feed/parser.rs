use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::util::{strip_html, strip_xml_invalid_chars};

/// Maximum number of categories kept per article (one spreadsheet column each).
pub const MAX_CATEGORIES: usize = 6;

/// Feed XML could not be parsed as RSS or Atom.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(String);

impl From<feed_rs::parser::ParseFeedError> for ParseError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        ParseError(err.to_string())
    }
}

/// One syndicated item, mapped to the output row schema.
///
/// Missing text fields are empty strings, never absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Plain text; HTML is stripped during parsing.
    pub description: String,
    pub url: String,
    /// At most [`MAX_CATEGORIES`] entries, in feed order.
    pub categories: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    /// Date text as written in the feed, kept only when it could not be parsed.
    pub unparsed_date: String,
}

impl Article {
    /// Key used to detect the same article on several pages.
    ///
    /// The URL when present. Items without a link fall back to a digest of
    /// title and publication date.
    pub fn identity_key(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }

        let input = format!(
            "|{}|{}",
            self.title,
            self.published
                .map(|p| p.timestamp().to_string())
                .unwrap_or_default()
        );
        let hash = Sha256::digest(input.as_bytes());
        format!("{:x}", hash)
    }

    /// Publication date as `DD/MM/YYYY`. Falls back to the feed's own text
    /// when the date could not be parsed, or an empty string when absent.
    pub fn published_date(&self) -> String {
        match self.published {
            Some(dt) => dt.format("%d/%m/%Y").to_string(),
            None => self.unparsed_date.clone(),
        }
    }
}

/// Parses one feed page into articles, in document order.
///
/// An empty `Vec` means the page had no items (end of pagination for the crawler).
pub fn parse_page(bytes: &[u8]) -> Result<Vec<Article>, ParseError> {
    let feed = parser::parse(bytes)?;

    let mut raw_dates = raw_item_dates(bytes);
    if raw_dates.len() != feed.entries.len() {
        raw_dates.clear();
    }
    let mut raw_dates = raw_dates.into_iter();

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| map_entry(entry, raw_dates.next().unwrap_or_default()))
        .collect())
}

/// Elements that carry an item's date (RSS, Atom and Dublin Core).
const DATE_ELEMENTS: [&[u8]; 4] = [b"pubDate", b"published", b"updated", b"date"];

/// Text of the first date element of every `<item>`/`<entry>`, in document order.
///
/// feed-rs drops dates it cannot parse; this keeps their text. Returns what
/// was collected so far if the document turns out to be malformed.
fn raw_item_dates(bytes: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut dates: Vec<String> = Vec::new();
    let mut in_item = false;
    let mut capturing = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    in_item = true;
                    dates.push(String::new());
                }
                name if in_item && DATE_ELEMENTS.contains(&name) => {
                    capturing = dates.last().is_some_and(|d| d.is_empty());
                }
                _ => {}
            },
            Ok(Event::Text(t)) if capturing => {
                if let (Ok(text), Some(slot)) = (t.unescape(), dates.last_mut()) {
                    slot.push_str(&text);
                }
            }
            Ok(Event::CData(t)) if capturing => {
                if let Some(slot) = dates.last_mut() {
                    slot.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                if matches!(e.local_name().as_ref(), b"item" | b"entry") {
                    in_item = false;
                }
                capturing = false;
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    dates
}

fn map_entry(entry: Entry, raw_date: String) -> Article {
    let title = entry
        .title
        .map(|t| clean_line(&t.content))
        .unwrap_or_default();

    let url = entry
        .links
        .first()
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();

    // RSS <description> lands in summary; content:encoded only when no excerpt exists
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|html| strip_xml_invalid_chars(&strip_html(&html)).into_owned())
        .unwrap_or_default();

    let categories = entry
        .categories
        .into_iter()
        .map(|c| clean_line(&c.term))
        .filter(|term| !term.is_empty())
        .take(MAX_CATEGORIES)
        .collect();

    let published = entry.published.or(entry.updated);
    let unparsed_date = match published {
        Some(_) => String::new(),
        None => clean_line(&raw_date),
    };

    Article {
        title,
        description,
        url,
        categories,
        published,
        unparsed_date,
    }
}

fn clean_line(s: &str) -> String {
    strip_xml_invalid_chars(s.trim()).into_owned()
}
