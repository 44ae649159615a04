//! Markup helpers built on `scraper`

use scraper::{ElementRef, Html, Selector};

/// Collapses runs of whitespace into single spaces and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Item scopes of a document
///
/// Without a scope query the whole document is a single scope.
pub(crate) fn item_scopes<'a>(document: &'a Html, selector: Option<&Selector>) -> Vec<ElementRef<'a>> {
    match selector {
        Some(selector) => document.select(selector).collect(),
        None => vec![document.root_element()],
    }
}

/// Values of every element matching `selector` inside `scope`
///
/// No selector means the scope element itself. With `attr` the attribute
/// value is read, otherwise the element's text. Elements lacking the
/// attribute are skipped; empty values are kept for the caller to filter.
pub(crate) fn element_values(
    scope: ElementRef<'_>,
    selector: Option<&Selector>,
    attr: Option<&str>,
) -> Vec<String> {
    let read = |el: ElementRef<'_>| match attr {
        Some(name) => el.value().attr(name).map(collapse_whitespace),
        None => Some(collapse_whitespace(&el.text().collect::<String>())),
    };

    match selector {
        Some(selector) => scope.select(selector).filter_map(read).collect(),
        None => read(scope).into_iter().collect(),
    }
}

/// First `href` among elements matching `selector`, in document order
pub(crate) fn first_href(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}
