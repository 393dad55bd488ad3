//! Pagination schemes and the continuation metadata read from a page.

use serde::Serialize;

/// The pagination convention a server uses for a collection.
///
/// Detected from the first page and pinned for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationScheme {
    /// Opaque continuation token (`nextPageToken`, `pageToken`, `cursor`, `continuation`).
    Token,
    /// Fully- or partially-qualified URL of the next page.
    NextUrl,
    /// `offset` + `total` counters.
    OffsetTotal,
    /// `page` + `pages` counters.
    PageCount,
    /// No continuation marker; the collection fit in one page.
    Unpaged,
}

impl std::fmt::Display for PaginationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::NextUrl => write!(f, "next_url"),
            Self::OffsetTotal => write!(f, "offset_total"),
            Self::PageCount => write!(f, "page_count"),
            Self::Unpaged => write!(f, "unpaged"),
        }
    }
}

/// Pagination metadata extracted from one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Continuation {
    /// A continuation token and the body field it was found in.
    Token { field: String, value: String },
    /// A next-page URL as the server wrote it.
    Url { url: String },
    /// Offset of this page and total collection size.
    Offset { offset: u64, total: u64 },
    /// This page number and total page count.
    Page { page: u64, pages: u64 },
    /// No marker: this page is the last one.
    None,
}

impl Continuation {
    /// The scheme this marker belongs to.
    #[must_use]
    pub const fn scheme(&self) -> Option<PaginationScheme> {
        match self {
            Self::Token { .. } => Some(PaginationScheme::Token),
            Self::Url { .. } => Some(PaginationScheme::NextUrl),
            Self::Offset { .. } => Some(PaginationScheme::OffsetTotal),
            Self::Page { .. } => Some(PaginationScheme::PageCount),
            Self::None => None,
        }
    }
}
