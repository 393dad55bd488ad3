//! Libraries command implementation.

use super::load_config_or_default;
use crate::error::Result;
use crate::remote::{HttpTransport, RequestDescriptor, libraries_endpoint, list_libraries};
use colored::Colorize;
use std::path::PathBuf;

/// List libraries visible to the configured token.
///
/// # Errors
///
/// Returns an error if the request fails.
pub fn execute(config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let config = load_config_or_default(config_path)?;
    let remote = config.remote_settings();

    let mut request = RequestDescriptor::new(libraries_endpoint(&remote.api_url));
    if let Some(token) = &remote.token {
        request.set_param("token", token.as_str());
    }
    let transport = HttpTransport::new(remote.timeout)?;
    let libraries = list_libraries(&transport, &request)?;

    if json {
        println!("{}", serde_json::to_string(&libraries)?);
        return Ok(());
    }

    if libraries.is_empty() {
        println!("{}", "No libraries visible to this token.".dimmed());
        return Ok(());
    }

    let configured = config.collection_ids();
    println!("{}", "Libraries:".blue().bold());
    for library in &libraries {
        let marker = if configured.contains(&library.id) {
            " (configured)".green().to_string()
        } else {
            String::new()
        };
        match &library.name {
            Some(name) => println!("  {}  {name}{marker}", library.id.bold()),
            None => println!("  {}{marker}", library.id.bold()),
        }
    }
    Ok(())
}
