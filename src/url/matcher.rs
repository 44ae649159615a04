use crate::url::host_of;

/// Returns true if the URL's host is covered by a job's `allowed-domains` list
///
/// An empty list allows every host. `anime.gf` covers that host only;
/// `*.anime.gf` also covers `anime.gf` and any of its subdomains. Patterns
/// compare case-insensitively. URLs without a host never match a non-empty
/// list, so relative links must be resolved first.
///
/// # Examples
///
/// ```
/// use gleaner::url::is_allowed_domain;
///
/// let allowed = vec!["*.anime.gf".to_string(), "myanimelist.net".to_string()];
/// assert!(is_allowed_domain(&allowed, "https://cdn.anime.gf/portrait.png"));
/// assert!(is_allowed_domain(&allowed, "https://myanimelist.net/character/417"));
/// assert!(!is_allowed_domain(&allowed, "https://ads.example.com/banner"));
/// assert!(is_allowed_domain(&[], "https://anywhere.example/"));
/// ```
pub fn is_allowed_domain(patterns: &[String], url: &str) -> bool {
    if patterns.is_empty() {
        return true;
    }

    let Some(host) = host_of(url) else {
        return false;
    };

    patterns.iter().any(|pattern| host_matches(pattern, &host))
}

/// `host` is expected lowercase, as `host_of` returns it
fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}
