use std::path::Path;

use anyhow::{Context, Result};

use super::walker::SourceFormat;

pub fn extract_text(path: &Path, format: SourceFormat) -> Result<String> {
    match format {
        SourceFormat::Text => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {}", path.display())),
        SourceFormat::Pdf => pdf_extract::extract_text(path)
            .with_context(|| format!("Failed to extract PDF text: {}", path.display())),
    }
}
