//! Request descriptors for listing endpoints.
//!
//! A descriptor is the complete, transport-independent description of one
//! page request: the endpoint, the ordered query parameters, and the
//! pagination scheme in force once one has been detected.

use reqwest::Url;

use crate::pagination::PaginationScheme;

/// Query parameters whose values are credentials and must never be logged.
const SECRET_PARAMS: [&str; 3] = ["token", "access_token", "api_key"];

/// One page request against a remote listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Absolute URL without query string.
    pub endpoint: String,
    /// Query parameters, in the order they are sent.
    pub query: Vec<(String, String)>,
    /// Pagination scheme pinned for this run, once detected.
    pub scheme: Option<PaginationScheme>,
}

impl RequestDescriptor {
    /// Create a descriptor with no query parameters.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query: Vec::new(),
            scheme: None,
        }
    }

    /// Builder form of [`set_param`](Self::set_param).
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Set a parameter, replacing an existing value in place.
    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.query.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.query.push((key.to_string(), value));
        }
    }

    /// Get the first value of a parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove every occurrence of a parameter.
    pub fn remove_param(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    /// The requested page size, if a numeric `limit` is present.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.param("limit").and_then(|v| v.trim().parse().ok())
    }

    /// Build the full URL.
    ///
    /// # Errors
    ///
    /// Returns the parse error message if the endpoint is not a valid URL.
    pub fn to_url(&self) -> Result<Url, String> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| format!("{}: {e}", self.endpoint))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Split an absolute URL back into endpoint and query parameters.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut endpoint = url.clone();
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        Self {
            endpoint: endpoint.to_string(),
            query,
            scheme: None,
        }
    }

    /// URL with credential parameters masked, for logs and reports.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut masked = self.clone();
        for (k, v) in &mut masked.query {
            if SECRET_PARAMS.contains(&k.as_str()) {
                *v = "***".to_string();
            }
        }
        masked
            .to_url()
            .map_or_else(|_| masked.endpoint.clone(), |u| u.to_string())
    }

    /// Whether two descriptors would issue the same HTTP request.
    #[must_use]
    pub fn same_request(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint && self.query == other.query
    }
}
