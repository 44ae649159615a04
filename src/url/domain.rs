use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use gleaner::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Host of a URL string, or None if it does not parse
pub fn host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_domain)
}

/// Returns the `n`-th non-empty path segment counted from the end (1 = last)
///
/// Trailing slashes and query strings do not shift the count. Relative
/// references are accepted and split on `/` as-is.
///
/// # Examples
///
/// ```
/// use gleaner::url::path_segment_from_end;
///
/// let url = "https://myanimelist.net/character/417/Lelouch_Lamperouge";
/// assert_eq!(path_segment_from_end(url, 2), Some("417".to_string()));
/// assert_eq!(path_segment_from_end("/characters/rem/", 1), Some("rem".to_string()));
/// ```
pub fn path_segment_from_end(url_str: &str, n: usize) -> Option<String> {
    if n == 0 {
        return None;
    }

    let path = match Url::parse(url_str) {
        Ok(url) => url.path().to_string(),
        Err(_) => url_str
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .rev()
        .nth(n - 1)
        .map(str::to_string)
}
