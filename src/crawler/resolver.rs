//! Source resolution: picks a parsing strategy from response metadata

use crate::config::{default_structured_content_types, CrawlerConfig};
use crate::state::ResponseEnvelope;
use crate::GleanError;
use scraper::Html;

/// How a response body is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Machine-readable payload (JSON)
    Structured,
    /// Markup document (HTML)
    SemiStructured,
}

/// A decoded response body
///
/// Holds a parsed DOM for markup documents, which is not `Send`; decode,
/// extract and paginate without crossing an `.await`.
pub enum Document {
    Structured(serde_json::Value),
    SemiStructured(Html),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Structured(_) => DocumentKind::Structured,
            Self::SemiStructured(_) => DocumentKind::SemiStructured,
        }
    }
}

/// Classifies and decodes response envelopes
#[derive(Debug, Clone)]
pub struct SourceResolver {
    structured_prefixes: Vec<String>,
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(default_structured_content_types())
    }
}

impl SourceResolver {
    /// Creates a resolver treating the given content-type prefixes as structured
    pub fn new(structured_prefixes: Vec<String>) -> Self {
        Self {
            structured_prefixes: structured_prefixes
                .into_iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.structured_content_types.clone())
    }

    /// Picks the parsing strategy for an envelope
    ///
    /// A content type starting with a configured prefix is Structured.
    /// Anything else, including a missing header, is SemiStructured.
    pub fn classify(&self, envelope: &ResponseEnvelope) -> DocumentKind {
        let content_type = match envelope.content_type.as_deref() {
            Some(ct) => ct.trim().to_ascii_lowercase(),
            None => return DocumentKind::SemiStructured,
        };

        if self
            .structured_prefixes
            .iter()
            .any(|prefix| content_type.starts_with(prefix))
        {
            DocumentKind::Structured
        } else {
            DocumentKind::SemiStructured
        }
    }

    /// Classifies the envelope and decodes its body
    ///
    /// # Errors
    ///
    /// Returns `GleanError::MalformedPayload` if a Structured body does not
    /// parse as JSON. Markup never fails to parse.
    pub fn resolve(&self, envelope: &ResponseEnvelope) -> Result<Document, GleanError> {
        match self.classify(envelope) {
            DocumentKind::Structured => serde_json::from_str(&envelope.body)
                .map(Document::Structured)
                .map_err(|e| GleanError::MalformedPayload {
                    url: envelope.final_url.clone(),
                    message: e.to_string(),
                }),
            DocumentKind::SemiStructured => {
                Ok(Document::SemiStructured(Html::parse_document(&envelope.body)))
            }
        }
    }
}
