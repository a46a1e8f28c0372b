//! Text extraction from uploaded bytes.

use crate::types::SourceType;
use askroute_core::{AppError, AppResult};

/// Text extracted from one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub num_pages: usize,
}

/// Extract plain text from document bytes.
///
/// Unreadable input (corrupt PDF, non UTF-8 text, no text at all) is an
/// `AppError::Validation`.
pub fn extract_text(bytes: &[u8], source_type: SourceType) -> AppResult<Extracted> {
    let extracted = match source_type {
        SourceType::Pdf => extract_pdf(bytes)?,
        SourceType::Text => Extracted {
            text: decode_utf8(bytes)?,
            num_pages: 1,
        },
        SourceType::Markdown => Extracted {
            text: clean_markdown(&decode_utf8(bytes)?),
            num_pages: 1,
        },
    };

    if extracted.text.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "No text could be extracted from {} document",
            source_type
        )));
    }

    Ok(extracted)
}

fn extract_pdf(bytes: &[u8]) -> AppResult<Extracted> {
    // pdf-extract can panic on malformed object streams
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| AppError::Validation("PDF extraction failed: malformed document".to_string()))?
        .map_err(|e| AppError::Validation(format!("PDF extraction failed: {}", e)))?;

    let num_pages = pages.len();
    let text = pages
        .iter()
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    tracing::debug!("Extracted {} bytes of text from {} PDF pages", text.len(), num_pages);

    Ok(Extracted { text, num_pages })
}

fn decode_utf8(bytes: &[u8]) -> AppResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| AppError::Validation(format!("Document is not valid UTF-8 text: {}", e)))
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences carry no content
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

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;

    #[test]
    fn test_plain_text() {
        let extracted = extract_text(b"Glutt.ai was founded in 2020.", SourceType::Text).unwrap();
        assert_eq!(extracted.text, "Glutt.ai was founded in 2020.");
        assert_eq!(extracted.num_pages, 1);
    }

    #[test]
    fn test_markdown_is_cleaned() {
        let md = "# Title\n\n---\nSome *content*.\n```rust\nfn main() {}\n```\n";
        let extracted = extract_text(md.as_bytes(), SourceType::Markdown).unwrap();
        assert_eq!(extracted.text, "Title\nSome *content*.\nfn main() {}");
    }

    #[test]
    fn test_invalid_pdf_is_validation_error() {
        let err = extract_text(b"not a pdf", SourceType::Pdf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_non_utf8_text_is_validation_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00, 0x80], SourceType::Text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_blank_text_is_validation_error() {
        let err = extract_text(b"   \n\t ", SourceType::Text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
