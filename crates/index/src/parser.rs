//! Attachment parsing and text extraction.

use courier_core::{AppError, AppResult};
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") | Some("csv") | Some("log") | Some("eml") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Extract clean text from the bytes of the attachment at `path`.
///
/// The path only selects the content type; nothing is read from disk.
pub fn parse_bytes(path: &Path, bytes: &[u8]) -> AppResult<String> {
    let text = match ContentType::from_path(path) {
        ContentType::Pdf => extract_pdf(path, bytes)?,
        ContentType::Markdown => clean_markdown(decode(path, bytes)?),
        ContentType::Html => clean_html(decode(path, bytes)?),
        ContentType::PlainText => decode(path, bytes)?.to_string(),
        ContentType::Unknown => {
            let raw = decode(path, bytes)?;
            if !is_likely_text(raw) {
                tracing::warn!("Skipping likely binary file: {:?}", path);
                return Err(AppError::Index(format!(
                    "Binary file not supported: {:?}",
                    path
                )));
            }
            raw.to_string()
        }
    };

    Ok(text)
}

fn decode<'a>(path: &Path, bytes: &'a [u8]) -> AppResult<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|e| AppError::Index(format!("{:?} is not valid UTF-8: {}", path, e)))
}

/// Extract the text layer of a PDF.
fn extract_pdf(path: &Path, bytes: &[u8]) -> AppResult<String> {
    // pdf-extract panics on some malformed inputs
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| AppError::Index(format!("PDF extraction panicked for {:?}", path)))?;

    extracted.map_err(|e| AppError::Index(format!("PDF extraction failed for {:?}: {}", path, e)))
}

/// Clean markdown by removing header markers and fences.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags, scripts and styles.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    let lower = text.to_ascii_lowercase();

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;

            let rest = &lower[i..];
            if rest.starts_with("<script") {
                in_script = true;
            } else if rest.starts_with("</script") {
                in_script = false;
            } else if rest.starts_with("<style") {
                in_style = true;
            } else if rest.starts_with("</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check if text is likely UTF-8 text (not binary).
fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("invoice.PDF")),
            ContentType::Pdf
        );
        assert_eq!(
            ContentType::from_path(Path::new("notes.md")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("body.txt")),
            ContentType::PlainText
        );
        assert_eq!(
            ContentType::from_path(Path::new("archive.zip")),
            ContentType::Unknown
        );
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><body><p>Hello <b>world</b></p><script>var x;</script></body></html>";
        let output = clean_html(input);
        assert_eq!(output, "Hello world");
    }

    #[test]
    fn test_clean_html_multibyte() {
        let output = clean_html("<p>Café número 2</p>");
        assert_eq!(output, "Café número 2");
    }

    #[test]
    fn test_parse_plain_text_kept_verbatim() {
        let text = parse_bytes(Path::new("body.txt"), b"  line one\nline two  ").unwrap();
        assert_eq!(text, "  line one\nline two  ");
    }

    #[test]
    fn test_parse_markdown_from_bytes() {
        let text = parse_bytes(Path::new("notes.md"), b"# Agenda\nBudget review").unwrap();
        assert_eq!(text, "Agenda\nBudget review");
    }

    #[test]
    fn test_parse_binary_unknown_rejected() {
        assert!(parse_bytes(Path::new("blob.bin"), b"abc\0def").is_err());
    }

    #[test]
    fn test_parse_invalid_utf8_is_error() {
        assert!(parse_bytes(Path::new("body.txt"), &[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_parse_corrupt_pdf_is_error() {
        assert!(parse_bytes(Path::new("broken.pdf"), b"not really a pdf").is_err());
    }
}
