//! Pagination controller: decides whether a listing document has a next page
//!
//! Cue discovery, first match wins:
//! 1. Relation markers (`rel="next"` links in markup, a `Link` header on payloads)
//! 2. Configured cues (`next-css` selectors, `next-path` cursor)
//!
//! Termination, in priority order: page ceiling, record cap, no cue (an
//! offsite cue counts as none), cue pointing back at the current page.

use crate::config::JobConfig;
use crate::crawler::Document;
use crate::extract::{compile_selector, first_href, parse_path, resolve, scalar_strings};
use crate::state::{PaginationState, RequestDescriptor, RequestKind, ResponseEnvelope};
use crate::url::{is_allowed_domain, resolve_against, same_page, set_query_param};
use crate::ConfigResult;
use scraper::Selector;
use tracing::debug;
use url::Url;

const REL_NEXT: &str = "a[rel~=next][href], link[rel~=next][href]";

/// A next-page hint found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cue {
    /// A link, resolved against the document URL
    Href(String),
    /// A cursor value from a payload field
    Cursor(String),
}

/// Per-job pagination rules
#[derive(Debug, Clone)]
pub struct PaginationController {
    ceiling: u32,
    max_records: Option<usize>,
    rel_next: Selector,
    next_css: Vec<Selector>,
    next_path: Option<Vec<String>>,
    next_param: Option<String>,
    allowed_domains: Vec<String>,
}

impl PaginationController {
    pub fn from_job(job: &JobConfig) -> ConfigResult<Self> {
        Ok(Self {
            ceiling: job.max_pages.max(1),
            max_records: job.max_records,
            rel_next: compile_selector(REL_NEXT)?,
            next_css: job
                .next_css
                .iter()
                .map(|css| compile_selector(css))
                .collect::<ConfigResult<_>>()?,
            next_path: job.next_path.as_deref().map(parse_path),
            next_param: job.next_param.clone().filter(|p| !p.is_empty()),
            allowed_domains: job.allowed_domains.clone(),
        })
    }

    /// Highest listing page this job may fetch
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Derives the continuation for a listing document
    ///
    /// `records_emitted` is the number of listing records the job has produced
    /// so far, this document included.
    pub fn next_page(
        &self,
        document: &Document,
        envelope: &ResponseEnvelope,
        records_emitted: usize,
    ) -> PaginationState {
        let request = &envelope.request;
        let page = request.page();

        if request.kind() == RequestKind::Detail {
            return PaginationState::done(page);
        }

        if page >= self.ceiling {
            debug!(url = %request.url(), page, ceiling = self.ceiling, "Page ceiling reached");
            return PaginationState::done(page);
        }

        if self.max_records.is_some_and(|max| records_emitted >= max) {
            debug!(url = %request.url(), records_emitted, "Record cap reached");
            return PaginationState::done(page);
        }

        let Some(cue) = self.discover(document, envelope) else {
            debug!(url = %request.url(), page, "No next-page cue");
            return PaginationState::done(page);
        };

        let Some(target) = self.target_for(cue, envelope) else {
            debug!(url = %request.url(), "Next-page cue did not resolve");
            return PaginationState::done(page);
        };

        if !is_allowed_domain(&self.allowed_domains, &target) {
            debug!(url = %request.url(), next = %target, "Ignoring offsite next-page cue");
            return PaginationState::done(page);
        }

        if same_page(&target, request.url()) || same_page(&target, &envelope.final_url) {
            debug!(url = %request.url(), "Next-page cue points at the current page");
            return PaginationState::done(page);
        }

        PaginationState::continue_with(page, RequestDescriptor::listing(target, page + 1))
    }

    fn discover(&self, document: &Document, envelope: &ResponseEnvelope) -> Option<Cue> {
        match document {
            Document::SemiStructured(dom) => first_href(dom, &self.rel_next)
                .or_else(|| {
                    self.next_css
                        .iter()
                        .find_map(|selector| first_href(dom, selector))
                })
                .map(Cue::Href),
            Document::Structured(payload) => envelope
                .link_header
                .as_deref()
                .and_then(link_header_next)
                .map(Cue::Href)
                .or_else(|| {
                    let segments = self.next_path.as_ref()?;
                    scalar_strings(&resolve(payload, segments))
                        .into_iter()
                        .find(|v| !v.is_empty())
                        .map(Cue::Cursor)
                }),
        }
    }

    fn target_for(&self, cue: Cue, envelope: &ResponseEnvelope) -> Option<String> {
        let base = &envelope.final_url;
        match cue {
            Cue::Href(href) => resolve_against(&href, base),
            Cue::Cursor(cursor) => {
                if Url::parse(&cursor).is_ok() {
                    return Some(cursor);
                }
                match &self.next_param {
                    Some(param) => {
                        let current = Url::parse(envelope.request.url())
                            .or_else(|_| Url::parse(base))
                            .ok()?;
                        Some(set_query_param(&current, param, &cursor).to_string())
                    }
                    None => resolve_against(&cursor, base),
                }
            }
        }
    }
}

/// The `rel="next"` target of an RFC 8288 `Link` header
fn link_header_next(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let Some((name, value)) = param.split_once('=') else {
                return false;
            };
            name.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });

        is_next.then(|| target.trim().to_string())
    })
}
