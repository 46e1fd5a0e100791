use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::feed::parser::Article;

/// Accepted `--from` / `--to` formats, tried in order.
const USER_DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Invalid date '{0}': use DD/MM/YYYY or YYYY-MM-DD")]
    InvalidFormat(String),
    #[error("Start date {from} is after end date {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },
}

/// Parses a date typed by the user, e.g. `25/04/2025` or `2025-04-25`.
pub fn parse_user_date(input: &str) -> Result<NaiveDate, DateRangeError> {
    let trimmed = input.trim();
    USER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| DateRangeError::InvalidFormat(input.to_string()))
}

/// Inclusive publication-date window, in UTC.
///
/// Either bound may be open. Articles with no publication date always pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, DateRangeError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(DateRangeError::Inverted { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.from
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.to
    }

    fn start(&self) -> Option<DateTime<Utc>> {
        self.from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    fn end(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc())
    }

    pub fn contains(&self, article: &Article) -> bool {
        let Some(published) = article.published else {
            return true;
        };
        if self.start().is_some_and(|start| published < start) {
            return false;
        }
        if self.end().is_some_and(|end| published > end) {
            return false;
        }
        true
    }

    /// Keeps the articles inside the window, preserving order.
    /// Returns the kept articles and how many were dropped.
    pub fn apply(&self, articles: Vec<Article>) -> (Vec<Article>, usize) {
        if self.is_unbounded() {
            return (articles, 0);
        }
        let total = articles.len();
        let kept: Vec<Article> = articles.into_iter().filter(|a| self.contains(a)).collect();
        let dropped = total - kept.len();
        (kept, dropped)
    }
}
