//! File content pipeline: binary attachment vs. text extraction.
//!
//! Given the caller's file inputs and the target adapter's capabilities, the
//! pipeline decides per file whether to pass it through as a binary
//! attachment or to extract text and fold it into the prompt context. A
//! failing file degrades to a structured warning; the call only fails hard
//! when every requested file was unusable.

mod extract;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::adapters::Capabilities;
use crate::error::PromptError;

/// Extraction formats supported by the fallback chain. Exactly these seven;
/// anything else is handled only via binary attachment or degrades per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Pdf,
    Doc,
    Docx,
    Md,
    Txt,
    Json,
    Rtf,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "md" => Some(Self::Md),
            "txt" => Some(Self::Txt),
            "json" => Some(Self::Json),
            "rtf" => Some(Self::Rtf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Where the attachment bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// One caller-supplied attachment, consumed once by the pipeline.
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// Display name used in delimiters, warnings and uploads.
    pub name: String,
    pub source: FileSource,
    /// Detected format; `None` means the extension is outside the supported
    /// set and only the binary path can carry the file.
    pub format: Option<FileFormat>,
}

impl FileSpec {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let format = FileFormat::from_path(&path);
        Self {
            name,
            source: FileSource::Path(path),
            format,
        }
    }

    /// In-memory attachment; the format is derived from the given name.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let format = FileFormat::from_path(Path::new(&name));
        Self {
            name,
            source: FileSource::Bytes(data),
            format,
        }
    }
}

impl From<PathBuf> for FileSpec {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

impl From<&Path> for FileSpec {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<&str> for FileSpec {
    fn from(path: &str) -> Self {
        Self::from_path(path)
    }
}

impl From<String> for FileSpec {
    fn from(path: String) -> Self {
        Self::from_path(path)
    }
}

/// Structured per-file degradation record.
#[derive(Debug, Clone)]
pub struct FileWarning {
    pub file: String,
    pub reason: String,
}

/// Output of the pipeline, handed to the adapter invocation.
#[derive(Debug, Clone, Default)]
pub struct PreparedContext {
    /// Files passed through for native binary upload, in caller order.
    pub attachments: Vec<FileSpec>,
    /// Extracted text blocks, delimited per source file, in caller order.
    pub context_text: Option<String>,
    /// Files that could not be included.
    pub warnings: Vec<FileWarning>,
}

impl PreparedContext {
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty() && self.context_text.is_none()
    }
}

/// Merge `file` and `files` arguments into one ordered list, de-duplicating
/// repeated paths.
pub fn collect_specs(file: Option<FileSpec>, files: Vec<FileSpec>) -> Vec<FileSpec> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut collected = Vec::new();
    for spec in file.into_iter().chain(files) {
        if let FileSource::Path(path) = &spec.source {
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !seen.insert(key) {
                continue;
            }
        }
        collected.push(spec);
    }
    collected
}

/// Decide per file between binary attachment and text extraction.
pub fn prepare(
    files: Vec<FileSpec>,
    binary_files: bool,
    caps: &Capabilities,
) -> Result<PreparedContext, PromptError> {
    let total = files.len();
    let mut prepared = PreparedContext::default();
    let mut blocks: Vec<String> = Vec::new();

    for spec in files {
        if binary_files && spec.format.is_some_and(|f| caps.supports_binary(f)) {
            prepared.attachments.push(spec);
            continue;
        }

        match extract::extract_text(&spec) {
            Ok(text) => blocks.push(format!(
                "----- begin file: {name} -----\n{text}\n----- end file: {name} -----",
                name = spec.name,
            )),
            Err(reason) => {
                tracing::warn!(file = %spec.name, %reason, "attachment omitted");
                prepared.warnings.push(FileWarning {
                    file: spec.name,
                    reason,
                });
            }
        }
    }

    if total > 0 && prepared.attachments.is_empty() && blocks.is_empty() {
        let failed: Vec<String> = prepared.warnings.iter().map(|w| w.file.clone()).collect();
        return Err(PromptError::FileExtraction(format!(
            "no requested file could be included: {}",
            failed.join(", ")
        )));
    }

    if !blocks.is_empty() {
        prepared.context_text = Some(blocks.join("\n\n"));
    }
    Ok(prepared)
}

/// Read the attachment bytes for binary upload.
pub(crate) fn read_attachment_bytes(spec: &FileSpec) -> Result<Vec<u8>, PromptError> {
    match &spec.source {
        FileSource::Bytes(data) => Ok(data.clone()),
        FileSource::Path(path) => std::fs::read(path).map_err(|e| {
            PromptError::FileExtraction(format!("cannot read {}: {e}", path.display()))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_covers_the_supported_set() {
        for (ext, format) in [
            ("pdf", FileFormat::Pdf),
            ("doc", FileFormat::Doc),
            ("docx", FileFormat::Docx),
            ("md", FileFormat::Md),
            ("txt", FileFormat::Txt),
            ("json", FileFormat::Json),
            ("rtf", FileFormat::Rtf),
        ] {
            assert_eq!(FileFormat::from_extension(ext), Some(format));
        }
        assert_eq!(FileFormat::from_extension("xyz"), None);
        assert_eq!(FileFormat::from_extension("PDF"), Some(FileFormat::Pdf));
    }

    #[test]
    fn collect_specs_deduplicates_repeated_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let collected = collect_specs(
            Some(FileSpec::from_path(&path)),
            vec![FileSpec::from_path(&path), FileSpec::from_path(&path)],
        );
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].name, "a.txt");
    }

    #[test]
    fn bytes_specs_are_never_deduplicated() {
        let collected = collect_specs(
            None,
            vec![
                FileSpec::from_bytes("a.txt", b"one".to_vec()),
                FileSpec::from_bytes("a.txt", b"two".to_vec()),
            ],
        );
        assert_eq!(collected.len(), 2);
    }
}
