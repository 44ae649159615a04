use std::fmt;

/// How processing of one fetched (or attempted) page ended
///
/// Outcomes are tallied per job for the end-of-run report. None of them abort a
/// job: every failure simply ends that page's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageOutcome {
    // ===== Success =====
    /// Document classified, extracted and (for listings) paginated
    Extracted,

    // ===== Failures =====
    /// Fetch failed, timed out or returned a status outside the allow-list
    TransportFailed,

    /// Structured body that could not be decoded
    Malformed,

    // ===== Skips =====
    /// Request dropped by the allowed-domain filter
    Offsite,

    /// Request abandoned because the job was cancelled
    Cancelled,
}

impl PageOutcome {
    /// Returns true if the page contributed records and pagination cues
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Extracted)
    }

    /// Returns true if this represents an error outcome
    pub fn is_error(&self) -> bool {
        matches!(self, Self::TransportFailed | Self::Malformed)
    }

    /// Stable string form, used in logs and the run table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::TransportFailed => "transport_failed",
            Self::Malformed => "malformed",
            Self::Offsite => "offsite",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses an outcome from its string form
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "extracted" => Some(Self::Extracted),
            "transport_failed" => Some(Self::TransportFailed),
            "malformed" => Some(Self::Malformed),
            "offsite" => Some(Self::Offsite),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible outcomes
    pub fn all() -> [Self; 5] {
        [
            Self::Extracted,
            Self::TransportFailed,
            Self::Malformed,
            Self::Offsite,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
