use async_trait::async_trait;

use crate::error::IngestionError;

/// The minimum number of non-whitespace characters extracted text must have
/// to be considered a real document rather than garbage or a scan with no
/// text layer.
pub const MIN_NON_WHITESPACE_CHARS: usize = 16;

/// Pulls plain text out of an uploaded file. Implementations for the richer
/// formats (pdf, docx, ...) shell out to or wrap a parsing library; this
/// crate ships only the formats that need no such dependency.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String, IngestionError>;
}

/// Handles `txt`, `md`, and `html` by decoding as UTF-8 and (for `html`)
/// stripping tags with a minimal parser. Other supported content types are
/// expected to be handled by a richer extractor composed in front of this
/// one via `PlainTextExtractor` as the fallback.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String, IngestionError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| IngestionError::ExtractionFailed(format!("not valid utf-8: {e}")))?;

        let text = match content_type {
            "html" => strip_tags(&text),
            _ => text,
        };

        if non_whitespace_count(&text) < MIN_NON_WHITESPACE_CHARS {
            return Err(IngestionError::EmptyDocument);
        }

        Ok(text)
    }
}

fn non_whitespace_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
