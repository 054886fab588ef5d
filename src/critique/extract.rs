use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Resolves the declared media type, falling back on the file extension
    /// when browsers send a generic type such as `application/octet-stream`.
    pub fn detect(media_type: &str, file_name: Option<&str>) -> Result<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => return Ok(Self::Pdf),
            "text/plain" => return Ok(Self::PlainText),
            _ => {}
        }

        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") => Ok(Self::PlainText),
            _ => Err(Error::UnsupportedMediaType(format!(
                "'{}' ({}); upload a PDF or TXT file",
                file_name.unwrap_or("upload"),
                if essence.is_empty() { "unknown type" } else { essence.as_str() }
            ))),
        }
    }
}

/// A file received from the user, not yet interpreted.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: Option<String>,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(file_name: Option<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Result<DocumentKind> {
        DocumentKind::detect(&self.media_type, self.file_name.as_deref())
    }
}

/// Extracts the document text, rejecting empty or unreadable content.
pub fn extract_text(document: &UploadedDocument) -> Result<String> {
    let kind = document.kind()?;
    if document.bytes.is_empty() {
        return Err(Error::EmptyDocument);
    }

    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(&document.bytes)?,
        DocumentKind::PlainText => decode_plain_text(&document.bytes)?,
    };

    ensure_readable(&text)?;
    debug!(
        "Extracted {} characters from {:?} document",
        text.chars().count(),
        kind
    );
    Ok(text)
}

/// Text of every page in order, each followed by a newline.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Extraction(format!("invalid PDF: {e}")))?;

    debug!("PDF has {} pages", pages.len());

    let mut text = String::new();
    for page in &pages {
        text.push_str(page.trim());
        text.push('\n');
    }
    Ok(text)
}

pub fn decode_plain_text(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Extraction(format!("text file is not valid UTF-8: {e}")))
}

pub fn ensure_readable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::EmptyDocument);
    }
    Ok(())
}
