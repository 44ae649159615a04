use std::collections::BTreeMap;

/// Context key carrying the entity key of the record that spawned a drill-down
pub const ENTITY_KEY_CONTEXT: &str = "__entity_key";

/// What a fetched document is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A listing page: yields item records and drives pagination
    Listing,

    /// A drill-down page for one entity already partially extracted
    Detail,
}

/// A URL to fetch plus the opaque context carried across the fetch
///
/// Immutable once created; the context comes back unchanged on the matching
/// [`ResponseEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: String,
    kind: RequestKind,
    page: u32,
    context: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Creates a listing request for the given page number
    pub fn listing(url: impl Into<String>, page: u32) -> Self {
        Self {
            url: url.into(),
            kind: RequestKind::Listing,
            page,
            context: BTreeMap::new(),
        }
    }

    /// Creates a drill-down request carrying a partial record as context
    pub fn detail(url: impl Into<String>, page: u32, context: BTreeMap<String, String>) -> Self {
        Self {
            url: url.into(),
            kind: RequestKind::Detail,
            page,
            context,
        }
    }

    /// The absolute URL to fetch
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Listing page number this request belongs to
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Entity key threaded through a drill-down request, if any
    pub fn entity_key(&self) -> Option<&str> {
        self.context.get(ENTITY_KEY_CONTEXT).map(String::as_str)
    }
}

/// A completed fetch: response metadata, raw body and the originating request
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,

    /// Content-Type header, if the server sent one
    pub content_type: Option<String>,

    /// URL after redirects
    pub final_url: String,

    /// RFC 8288 `Link` header, if present
    pub link_header: Option<String>,

    pub body: String,

    pub request: RequestDescriptor,
}

impl ResponseEnvelope {
    /// Builds an envelope for a body fetched from the request's own URL
    pub fn new(request: RequestDescriptor, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            final_url: request.url().to_string(),
            link_header: None,
            body: body.into(),
            request,
        }
    }
}
