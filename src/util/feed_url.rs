use thiserror::Error;
use url::Url;

/// Query parameter WordPress uses to page through `/feed/`.
pub const PAGE_PARAM: &str = "paged";

/// Errors that can occur while validating a feed URL.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validates a feed URL given on the command line or in the config file.
///
/// # Errors
///
/// Returns [`UrlError`] if the URL cannot be parsed, is not `http`/`https`,
/// or has no host.
///
/// # Examples
///
/// ```
/// use feedsheet::util::validate_feed_url;
///
/// let url = validate_feed_url("https://www.uneiaparjour.fr/feed/").unwrap();
/// assert_eq!(url.host_str(), Some("www.uneiaparjour.fr"));
///
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost(url.to_string()));
    }

    Ok(url)
}

/// Builds the URL of feed page `page` (1-based).
///
/// Page 1 is the base URL itself. Later pages set `paged=<page>`, replacing any
/// `paged` already present and keeping every other query parameter in place.
pub fn page_url(base: &Url, page: u32) -> Url {
    if page <= 1 {
        return base.clone();
    }

    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(PAGE_PARAM, &page.to_string());
    url
}
