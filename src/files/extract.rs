//! Text extraction handlers for the supported formats.
//!
//! Failures are reported as plain reason strings; the pipeline turns them
//! into per-file warnings rather than hard errors.

use std::io::Read;

use super::{FileFormat, FileSource, FileSpec};

/// Run the handler registered for the file's detected format.
pub(super) fn extract_text(spec: &FileSpec) -> Result<String, String> {
    let Some(format) = spec.format else {
        return Err(format!(
            "unsupported file extension for '{}' (supported: pdf, doc, docx, md, txt, json, rtf)",
            spec.name
        ));
    };

    let bytes = read_bytes(spec)?;
    match format {
        FileFormat::Txt | FileFormat::Md => utf8_text(bytes),
        FileFormat::Json => json_text(bytes),
        FileFormat::Rtf => Ok(rtf_to_text(&String::from_utf8_lossy(&bytes))),
        FileFormat::Pdf => pdf_extract::extract_text_from_mem(&bytes)
            .map(|text| text.trim().to_string())
            .map_err(|e| format!("pdf extraction failed: {e}")),
        FileFormat::Docx => docx_text(&bytes),
        FileFormat::Doc => Ok(legacy_doc_text(&bytes)),
    }
}

fn read_bytes(spec: &FileSpec) -> Result<Vec<u8>, String> {
    match &spec.source {
        FileSource::Bytes(data) => Ok(data.clone()),
        FileSource::Path(path) => {
            if !path.exists() {
                return Err(format!("file does not exist: {}", path.display()));
            }
            std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
        }
    }
}

fn utf8_text(bytes: Vec<u8>) -> Result<String, String> {
    String::from_utf8(bytes).map_err(|_| "file is not valid UTF-8".to_string())
}

/// Parse and re-serialize so malformed JSON fails the file, and the folded
/// context is deterministic (pretty-printed, sorted keys).
fn json_text(bytes: Vec<u8>) -> Result<String, String> {
    let payload: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {e}"))?;
    serde_json::to_string_pretty(&payload).map_err(|e| format!("cannot render JSON: {e}"))
}

/// Pull the paragraph text out of `word/document.xml`.
fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| format!("not a valid docx archive: {e}"))?;
    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("docx is missing word/document.xml: {e}"))?
        .read_to_string(&mut document)
        .map_err(|e| format!("cannot read docx document: {e}"))?;

    let mut reader = quick_xml::Reader::from_str(&document);
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Text(t)) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| format!("malformed docx text node: {e}"))?;
                text.push_str(&chunk);
            }
            Ok(quick_xml::events::Event::End(e)) if e.local_name().as_ref() == b"p" => {
                text.push('\n');
            }
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.local_name().as_ref() == b"br" =>
            {
                text.push('\n');
            }
            Ok(quick_xml::events::Event::Empty(e)) if e.local_name().as_ref() == b"tab" => {
                text.push('\t');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("malformed docx XML: {e}")),
        }
    }
    Ok(text.trim().to_string())
}

/// Best-effort fallback for legacy `.doc`: a lossy single-byte decode with
/// non-printable bytes dropped. Mirrors the behavior callers get when no
/// dedicated converter is installed.
fn legacy_doc_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for &byte in bytes {
        let ch = byte as char;
        if ch == '\n' || ch == '\t' || ch == '\r' || (' '..='~').contains(&ch) || byte >= 0xA0 {
            text.push(ch);
        }
    }
    text.trim().to_string()
}

/// Destination groups whose content is metadata, not document text.
const RTF_SKIP_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "themedata",
    "listtable",
];

/// Minimal RTF-to-text conversion: drops control words and metadata groups,
/// keeps the document text, maps paragraph/line controls to newlines.
fn rtf_to_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    // Depth below which we are inside a skipped destination group.
    let mut depth: i32 = 0;
    let mut skip_until_depth: Option<i32> = None;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '{' => {
                depth += 1;
                i += 1;
            }
            '}' => {
                if skip_until_depth == Some(depth) {
                    skip_until_depth = None;
                }
                depth -= 1;
                i += 1;
            }
            '\\' => {
                i += 1;
                if i >= chars.len() {
                    break;
                }
                let next = chars[i];
                if next == '\\' || next == '{' || next == '}' {
                    if skip_until_depth.is_none() {
                        out.push(next);
                    }
                    i += 1;
                } else if next == '\'' {
                    // Hex-escaped byte, e.g. \'e9
                    let hex: String = chars[i + 1..].iter().take(2).collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        if skip_until_depth.is_none() {
                            out.push(byte as char);
                        }
                    }
                    i += 1 + hex.len();
                } else if next == '*' {
                    // `{\*...}` marks an ignorable destination.
                    skip_until_depth.get_or_insert(depth);
                    i += 1;
                } else if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    // Optional numeric parameter.
                    if i < chars.len() && (chars[i] == '-' || chars[i].is_ascii_digit()) {
                        i += 1;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                    // A single space terminates the control word.
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }
                    if RTF_SKIP_DESTINATIONS.contains(&word.as_str()) {
                        skip_until_depth.get_or_insert(depth);
                    } else if skip_until_depth.is_none() {
                        match word.as_str() {
                            "par" | "line" => out.push('\n'),
                            "tab" => out.push('\t'),
                            _ => {}
                        }
                    }
                } else {
                    i += 1;
                }
            }
            '\r' | '\n' => {
                i += 1;
            }
            _ => {
                if skip_until_depth.is_none() {
                    out.push(ch);
                }
                i += 1;
            }
        }
    }

    out.trim().to_string()
}
