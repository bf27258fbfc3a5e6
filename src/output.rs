//! # Page Output
//!
//! Serialises rendered pages as HTML, JSON or YAML and writes them to a file
//! or standard output.

use crate::dashboard::Page;
use crate::html::render_html;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Output file already exists: {0} (use --force to overwrite)")]
    Exists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// Standalone HTML document with plotly.js
    #[default]
    Html,
    /// Page structure and figures as JSON
    Json,
    /// Page structure and figures as YAML
    Yaml,
}

impl PageFormat {
    /// Guesses the format from a file extension, defaulting to HTML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
            Some(ext) if ext == "json" => PageFormat::Json,
            Some(ext) if ext == "yaml" || ext == "yml" => PageFormat::Yaml,
            _ => PageFormat::Html,
        }
    }
}

pub fn render_page(page: &Page, format: PageFormat) -> Result<String, OutputError> {
    Ok(match format {
        PageFormat::Html => render_html(page)?,
        PageFormat::Json => serde_json::to_string_pretty(page)?,
        PageFormat::Yaml => serde_yaml::to_string(page)?,
    })
}

/// Writes `contents` to `output_path`, creating parent directories.
pub async fn write_output(
    output_path: &Path,
    contents: &str,
    force: bool,
) -> Result<(), OutputError> {
    if !force && tokio::fs::try_exists(output_path).await? {
        return Err(OutputError::Exists(output_path.display().to_string()));
    }
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    debug!("Writing {} bytes to {}", contents.len(), output_path.display());
    tokio::fs::write(output_path, contents).await?;
    Ok(())
}
