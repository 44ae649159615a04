//! Link resolution against a document URL
//!
//! Hrefs pulled out of listing pages are usually relative. They are joined
//! against the URL the document was actually served from, and anything that
//! does not lead to an HTTP(S) resource is dropped.

use url::Url;

/// Resolves an href against a base URL
///
/// Returns `None` for empty hrefs, `javascript:`, `mailto:`, `tel:` and
/// `data:` links, same-page fragments, and anything that does not resolve to
/// an HTTP(S) URL.
///
/// # Arguments
///
/// * `href` - The raw attribute value
/// * `base_url` - The URL of the document the href came from
///
/// # Example
///
/// ```
/// use gleaner::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://anime.gf/characters/?page=2").unwrap();
/// assert_eq!(
///     resolve_link("/characters/rem", &base),
///     Some("https://anime.gf/characters/rem".to_string())
/// );
/// assert_eq!(resolve_link("#top", &base), None);
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}

/// Resolves an href against a base URL string
///
/// Falls back to the trimmed href when the base does not parse, which only
/// happens for hand-built envelopes.
pub fn resolve_against(href: &str, base: &str) -> Option<String> {
    match Url::parse(base) {
        Ok(base_url) => resolve_link(href, &base_url),
        Err(_) => {
            let href = href.trim();
            (!href.is_empty()).then(|| href.to_string())
        }
    }
}

/// Returns `url` with `param` set to `value`, replacing any earlier occurrence
///
/// Used to turn a bare pagination cursor into a request URL.
pub fn set_query_param(url: &Url, param: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut updated = url.clone();
    updated.set_query(None);
    {
        let mut pairs = updated.query_pairs_mut();
        pairs.extend_pairs(kept);
        pairs.append_pair(param, value);
    }
    updated
}
