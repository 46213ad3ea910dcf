//! Multi-format document loader
//!
//! Turns a file into raw text blocks. Decode failures never reach the
//! caller: the loader logs and returns an empty sequence, or falls back to
//! best-effort text decoding. Trading fidelity for availability keeps the
//! pipeline from hard-failing on an unknown or damaged format.

use std::path::Path;

use crate::types::{FileType, RawTextBlock};

/// Document loader for the upload formats (txt, md, json, pdf, docx) with a
/// text fallback for everything else
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a file into raw text blocks. Never fails: on unreadable input an
    /// empty sequence is returned and the failure is logged.
    pub fn load(file_name: &str, path: &Path) -> Vec<RawTextBlock> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        Self::load_bytes(file_name, &data)
    }

    /// Load already-read file bytes into raw text blocks
    pub fn load_bytes(file_name: &str, data: &[u8]) -> Vec<RawTextBlock> {
        let file_type = FileType::from_filename(file_name);

        match file_type {
            FileType::Text | FileType::Markdown => Self::read_as_text(file_name, data, file_type),
            FileType::Json => Self::read_json(file_name, data),
            FileType::Pdf => Self::read_pdf(file_name, data),
            FileType::Docx => Self::read_docx(file_name, data),
            FileType::Unknown => {
                tracing::warn!(
                    "No specialized handling for '{}', reading as text",
                    file_name
                );
                Self::read_as_text(file_name, data, FileType::Unknown)
            }
        }
    }

    /// Decode bytes as UTF-8, dropping invalid sequences rather than failing
    /// the whole read over one bad byte.
    fn read_as_text(file_name: &str, data: &[u8], file_type: FileType) -> Vec<RawTextBlock> {
        let text = String::from_utf8_lossy(data).to_string();
        vec![RawTextBlock::new(text, file_name, file_type)]
    }

    /// Flatten JSON into a line-oriented text rendering. Parse failure falls
    /// back to the plain-text path on the same bytes.
    fn read_json(file_name: &str, data: &[u8]) -> Vec<RawTextBlock> {
        let value: serde_json::Value = match serde_json::from_slice(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("JSON parsing failed for '{}': {}", file_name, e);
                return Self::read_as_text(file_name, data, FileType::Text);
            }
        };

        let text = match value {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, value)| format!("{}: {}", key, Self::render_value(value)))
                .collect::<Vec<_>>()
                .join("\n"),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Self::render_value)
                .collect::<Vec<_>>()
                .join("\n"),
            scalar => Self::render_value(&scalar),
        };

        vec![RawTextBlock::new(text, file_name, FileType::Json)]
    }

    /// Render a JSON value on one line. Nested containers are stringified,
    /// not recursively flattened.
    fn render_value(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn read_pdf(file_name: &str, data: &[u8]) -> Vec<RawTextBlock> {
        match Self::extract_pdf_with_timeout(data) {
            Ok(text) if !text.trim().is_empty() => {
                // Strip null bytes and collapse the whitespace pdf-extract
                // tends to leave behind
                let text = text
                    .replace('\0', "")
                    .lines()
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![RawTextBlock::new(text, file_name, FileType::Pdf)]
            }
            Ok(_) => {
                tracing::warn!("No text content extracted from '{}'", file_name);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("PDF extraction failed for '{}': {}", file_name, e);
                Self::read_as_text(file_name, data, FileType::Pdf)
            }
        }
    }

    /// Run pdf-extract in a separate thread with a timeout; problematic fonts
    /// can otherwise hang extraction indefinitely.
    fn extract_pdf_with_timeout(data: &[u8]) -> Result<String, String> {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.to_string())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err("PDF extraction timeout after 60s".to_string())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err("PDF extraction thread crashed".to_string())
            }
        }
    }

    fn read_docx(file_name: &str, data: &[u8]) -> Vec<RawTextBlock> {
        let doc = match docx_rs::read_docx(data) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("DOCX parsing failed for '{}': {}", file_name, e);
                return Self::read_as_text(file_name, data, FileType::Docx);
            }
        };

        let mut text = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
        }

        if text.trim().is_empty() {
            tracing::warn!("No text content extracted from '{}'", file_name);
            return Vec::new();
        }

        vec![RawTextBlock::new(text, file_name, FileType::Docx)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_text_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "The vacation policy allows 25 days.").unwrap();

        let blocks = DocumentLoader::load("policy.txt", file.path());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_type, FileType::Text);
        assert!(blocks[0].text.contains("vacation policy"));
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let blocks = DocumentLoader::load("gone.txt", Path::new("/nonexistent/gone.txt"));
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_json_object_flattens_to_key_value_lines() {
        let blocks = DocumentLoader::load_bytes("data.json", br#"{"a": 1, "b": 2}"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_type, FileType::Json);

        let lines: Vec<&str> = blocks[0].text.lines().collect();
        assert_eq!(lines, vec!["a: 1", "b: 2"]);
    }

    #[test]
    fn test_json_preserves_key_order() {
        let blocks = DocumentLoader::load_bytes("data.json", br#"{"zeta": "z", "alpha": "a"}"#);
        let lines: Vec<&str> = blocks[0].text.lines().collect();
        assert_eq!(lines, vec!["zeta: z", "alpha: a"]);
    }

    #[test]
    fn test_json_array_renders_one_line_per_element() {
        let blocks = DocumentLoader::load_bytes("list.json", br#"["one", "two", 3]"#);
        let lines: Vec<&str> = blocks[0].text.lines().collect();
        assert_eq!(lines, vec!["one", "two", "3"]);
    }

    #[test]
    fn test_json_nested_values_are_stringified_not_flattened() {
        let blocks =
            DocumentLoader::load_bytes("nested.json", br#"{"team": {"size": 4}, "tags": [1, 2]}"#);
        let lines: Vec<&str> = blocks[0].text.lines().collect();
        assert_eq!(lines, vec![r#"team: {"size":4}"#, "tags: [1,2]"]);
    }

    #[test]
    fn test_invalid_json_falls_back_to_text() {
        let blocks = DocumentLoader::load_bytes("broken.json", b"not json at all");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "not json at all");
    }

    #[test]
    fn test_unknown_extension_reads_as_text() {
        let blocks = DocumentLoader::load_bytes("notes.xyz", b"plain content");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_type, FileType::Unknown);
        assert_eq!(blocks[0].text, "plain content");
    }

    #[test]
    fn test_invalid_utf8_is_dropped_not_fatal() {
        let blocks = DocumentLoader::load_bytes("mixed.txt", b"good \xFF\xFE text");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].text.contains("good"));
        assert!(blocks[0].text.contains("text"));
    }
}
