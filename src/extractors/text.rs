// src/extractors/text.rs
use crate::utils::error::ExtractError;
use std::fs;
use std::panic::{self, UnwindSafe};
use std::path::{Path, PathBuf};

/// Reads the text of one source document. PDFs go through pdf-extract;
/// `.txt` files hold text that was extracted ahead of time.
pub fn read_source_text(path: &Path) -> Result<String, ExtractError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => {
            let bytes = fs::read(path).map_err(|source| ExtractError::Io { path: path.to_path_buf(), source })?;
            contain_panic(|| pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string()))
                .map_err(|reason| ExtractError::Pdf(path.to_path_buf(), reason))
        }
        "txt" => fs::read_to_string(path).map_err(|source| ExtractError::Io { path: path.to_path_buf(), source }),
        _ => Err(ExtractError::Unsupported(path.to_path_buf())),
    }
}

/// Runs an extraction, turning a panic inside it into an error message.
/// pdf-extract panics instead of failing on a number of malformed documents.
fn contain_panic<F>(extract: F) -> Result<String, String>
where
    F: FnOnce() -> Result<String, String> + UnwindSafe,
{
    match panic::catch_unwind(extract) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(format!("extractor panicked: {}", message))
        }
    }
}

/// Like [`read_source_text`], but an unreadable source contributes no text
/// instead of failing the batch.
pub fn read_source_text_lossy(path: &Path) -> String {
    match read_source_text(path) {
        Ok(text) => {
            tracing::debug!("Read {} chars from {}", text.chars().count(), path.display());
            text
        }
        Err(e) => {
            tracing::warn!("Skipping unreadable source: {}", e);
            String::new()
        }
    }
}

/// Period label for a report: its file name without the extension.
pub fn period_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Files in `dir` whose extension is in `extensions` (case-insensitive),
/// sorted by file name. A missing directory yields an empty list.
pub fn list_sources(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Source directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(&e)));
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
