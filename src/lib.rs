use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

pub mod extract;


pub use extract::{
    extract, BundleMetadata, ExtractError, ExtractOptions, ExtractResult, ExtractStats, Extraction,
    SchemaRoot, DEFAULT_PACKAGE,
};

/// JSON view of a run: metadata, metrics and the full schema tree
#[derive(Debug, Serialize)]
pub struct ExtractSummary<'a> {
    pub metadata: &'a BundleMetadata,
    pub stats: ExtractStats,
    pub schema: &'a SchemaRoot,
}

impl<'a> From<&'a Extraction> for ExtractSummary<'a> {
    fn from(extraction: &'a Extraction) -> Self {
        Self {
            metadata: &extraction.metadata,
            stats: extraction.stats,
            schema: &extraction.schema,
        }
    }
}

/// Read a bundle from disk and run the extraction over it
pub fn extract_file(path: &Path, options: &ExtractOptions) -> ExtractResult<Extraction> {
    if !path.exists() {
        return Err(ExtractError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "bundle does not exist"),
        });
    }

    info!(path = %path.display(), "reading bundle");
    let content = fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    extract(&content, options)
}

/// Render the JSON summary of a finished run
pub fn summary_json(extraction: &Extraction) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExtractSummary::from(extraction))
}

/// Write an output document
pub fn write_output(path: &Path, contents: &str) -> ExtractResult<()> {
    fs::write(path, contents).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}
