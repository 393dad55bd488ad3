//! Remote API access.
//!
//! - [`RequestDescriptor`]: one page request (endpoint + ordered query)
//! - [`Transport`]: the seam between the fetch engine and the network
//! - [`HttpTransport`]: `reqwest`-backed production transport
//! - [`list_libraries`]: the `GET /libraries` endpoint

mod http;
mod libraries;
mod request;
mod transport;

#[cfg(test)]
pub mod testing;

pub use http::HttpTransport;
pub use libraries::{LibrarySummary, list_libraries};
pub use request::RequestDescriptor;
pub use transport::{Transport, TransportError};

use reqwest::Url;

/// Default remote API base URL.
pub const DEFAULT_API_URL: &str = "https://api.mementodatabase.com/v1";

/// Listing endpoint for one library's entries.
///
/// The library id is a single percent-encoded path segment.
#[must_use]
pub fn entries_endpoint(api_url: &str, library_id: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let Ok(mut url) = Url::parse(base) else {
        // Unparseable base URLs surface as `InvalidUrl` when the request is sent.
        return format!("{base}/libraries/{library_id}/entries");
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["libraries", library_id, "entries"]);
    }
    url.into()
}

/// Endpoint listing all libraries.
#[must_use]
pub fn libraries_endpoint(api_url: &str) -> String {
    format!("{}/libraries", api_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_strip_trailing_slash() {
        assert_eq!(
            entries_endpoint("https://api.test/v1/", "abc"),
            "https://api.test/v1/libraries/abc/entries"
        );
        assert_eq!(libraries_endpoint("https://api.test/v1"), "https://api.test/v1/libraries");
    }

    #[test]
    fn test_library_id_is_one_path_segment() {
        assert_eq!(
            entries_endpoint("https://api.test/v1", "a/b?c#d"),
            "https://api.test/v1/libraries/a%2Fb%3Fc%23d/entries"
        );
        assert_eq!(entries_endpoint("https://api.test", "abc"), "https://api.test/libraries/abc/entries");
    }
}
