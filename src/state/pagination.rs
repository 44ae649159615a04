use crate::state::RequestDescriptor;

/// Continuation decision derived fresh from one listing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    /// Page number of the document the decision was made on
    pub page: u32,

    /// Whether another listing page should be fetched
    pub more: bool,

    /// The next listing request, present exactly when `more` is true
    pub next: Option<RequestDescriptor>,
}

impl PaginationState {
    /// State for a document that has not been inspected yet
    pub fn start(page: u32) -> Self {
        Self {
            page,
            more: true,
            next: None,
        }
    }

    /// Terminal state: no further listing request for this job
    pub fn done(page: u32) -> Self {
        Self {
            page,
            more: false,
            next: None,
        }
    }

    /// Continuation onto the given request
    pub fn continue_with(page: u32, next: RequestDescriptor) -> Self {
        Self {
            page,
            more: true,
            next: Some(next),
        }
    }
}
