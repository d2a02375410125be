use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Pdf,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "md" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Recursively lists loadable files under `dir`, skipping hidden entries.
/// The result is sorted so repeated runs produce the same chunk ids in the same order.
pub fn find_sources(dir: &Path) -> Vec<(PathBuf, SourceFormat)> {
    let mut sources: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let format = SourceFormat::from_path(&path)?;
            Some((path, format))
        })
        .collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    sources
}
