//! Body and attachment content extraction
//!
//! Converts HTML bodies to readable plain text and extracts text from
//! attachment payloads by file extension. Plain-text formats decode as
//! UTF-8 (lossy), HTML goes through `html2text`, and PDFs through
//! `pdf-extract`. Anything else reports an unsupported type.

use crate::errors::{AppError, AppResult};

/// Render width for HTML-to-text conversion
const TEXT_WIDTH: usize = 120;

/// Attachment payloads above this size are not parsed
const MAX_EXTRACT_BYTES: usize = 5_000_000;

/// Extensions decoded as plain UTF-8 text
const TEXT_EXTENSIONS: [&str; 5] = ["txt", "csv", "log", "json", "md"];

/// Convert an HTML body to plain text
///
/// Degrades gracefully: if conversion fails, the original HTML is returned
/// so the caller never loses the content.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .map(|text| text.trim().to_owned())
        .unwrap_or_else(|_| html.to_owned())
}

/// Extract readable text from an attachment payload
///
/// Routing is by the filename extension (lowercased). Supported: txt, csv,
/// log, json, md, html, pdf.
///
/// # Errors
///
/// - `InvalidInput` for unsupported extensions or oversized payloads
/// - `Internal` if the PDF parser rejects the payload
pub fn extract_attachment_text(name: &str, content: &[u8]) -> AppResult<String> {
    if content.len() > MAX_EXTRACT_BYTES {
        return Err(AppError::InvalidInput(format!(
            "attachment '{name}' exceeds the {MAX_EXTRACT_BYTES} byte extraction limit"
        )));
    }

    let ext = extension_of(name);
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(String::from_utf8_lossy(content).into_owned());
    }

    match ext.as_str() {
        "html" | "htm" => Ok(html_to_text(&String::from_utf8_lossy(content))),
        "pdf" => pdf_extract::extract_text_from_mem(content)
            .map(|text| text.trim().to_owned())
            .map_err(|e| AppError::Internal(format!("failed to parse PDF '{name}': {e}"))),
        other => Err(AppError::InvalidInput(format!(
            "unsupported attachment type '{other}'; supported: txt, csv, log, json, md, html, pdf"
        ))),
    }
}

/// Lowercased filename extension, empty when absent
fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{extension_of, extract_attachment_text, html_to_text};

    #[test]
    fn extension_is_lowercased_last_segment() {
        assert_eq!(extension_of("report.final.PDF"), "pdf");
        assert_eq!(extension_of("notes.txt"), "txt");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn text_extensions_decode_as_utf8() {
        let out = extract_attachment_text("data.csv", b"a,b\n1,2").expect("csv is supported");
        assert_eq!(out, "a,b\n1,2");
    }

    #[test]
    fn html_attachment_is_converted_to_text() {
        let out = extract_attachment_text("page.html", b"<p>Hello <b>there</b></p>")
            .expect("html is supported");
        assert!(out.contains("Hello"));
        assert!(!out.contains("<p>"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = extract_attachment_text("sheet.xlsx", b"PK\x03\x04").expect_err("must fail");
        assert!(err.to_string().contains("unsupported attachment type"));
    }

    #[test]
    fn html_to_text_strips_markup() {
        let text = html_to_text("<div><p>Hello</p><p>World</p></div>");
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn empty_html_yields_empty_text() {
        assert_eq!(html_to_text(""), "");
    }
}
