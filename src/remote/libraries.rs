//! Library listing endpoint.

use serde::Serialize;
use serde_json::Value;

use super::request::RequestDescriptor;
use super::transport::{Transport, TransportError};

/// A remote library as reported by `GET /libraries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibrarySummary {
    pub id: String,
    pub name: Option<String>,
}

/// List the libraries visible to the configured token.
///
/// Accepts `{"libraries": [...]}`, `{"items": [...]}` or a bare list; an
/// object keyed by library id is flattened to its values.
///
/// # Errors
///
/// Returns the transport error if the request fails.
pub fn list_libraries<T: Transport + ?Sized>(
    transport: &T,
    request: &RequestDescriptor,
) -> Result<Vec<LibrarySummary>, TransportError> {
    let body = transport.get(request)?;
    Ok(parse_libraries(&body))
}

fn parse_libraries(body: &Value) -> Vec<LibrarySummary> {
    let listed = body
        .get("libraries")
        .or_else(|| body.get("items"))
        .unwrap_or(body);

    let entries: Vec<&Value> = match listed {
        Value::Array(values) => values.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|lib| {
            let id = ["id", "library_id", "uuid"]
                .iter()
                .find_map(|k| lib.get(*k).and_then(scalar_text))?;
            let name = ["name", "title"]
                .iter()
                .find_map(|k| lib.get(*k).and_then(scalar_text));
            Some(LibrarySummary { id, name })
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
