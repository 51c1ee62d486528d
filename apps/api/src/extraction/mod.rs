//! Document text extraction: uploaded PDF/DOC/DOCX bytes in, clean text and
//! metadata out, or a typed error with a stable code.
//!
//! The extractor is a pure transform. It performs no I/O beyond logging and
//! holds no state other than its injected configuration, so request handlers
//! can call it per-upload without coordination.

pub mod handlers;
mod normalize;
mod pdf;
mod word;

use std::collections::HashSet;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// A decode that "succeeds" with less than this much text did not really
/// succeed (scanned-image PDFs, password-protected files).
const MIN_EXTRACTED_CHARS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// An uploaded file as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Declared MIME type from the multipart field.
    pub content_type: String,
    pub bytes: Bytes,
}

/// Extractor options, constructed explicitly at startup and injected.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_file_size_bytes: usize,
    pub supported_mime_types: HashSet<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            supported_mime_types: [MIME_PDF, MIME_DOC, MIME_DOCX]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// The closed set of decodable formats. Adding a MIME type to the supported
/// set forces a variant (and a decoder) here; there is no string-keyed
/// dispatch anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOC => Some(Self::Doc),
            MIME_DOCX => Some(Self::Docx),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Everything that can go wrong between upload and clean text. Each variant
/// carries a stable `code()` suitable for programmatic branching in clients.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid file: a name, a type, and content must all be present")]
    InvalidFile,

    #[error("Unsupported file type '{mime}'. Upload a PDF or Word document")]
    UnsupportedType { mime: String },

    #[error("File is {size}, which exceeds the {limit} limit")]
    FileTooLarge { size: String, limit: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("PDF extraction failed: {0}")]
    PdfExtractionFailed(#[from] pdf_extract::OutputError),

    #[error("Word document extraction failed: {0}")]
    WordExtractionFailed(String),

    #[error("No text could be extracted. The file may be a scanned image or password-protected")]
    NoTextExtracted,

    #[error("Extraction produced an inconsistent result")]
    InvalidResult,

    #[error("Unexpected extraction failure: {0}")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ExtractionError {
    /// Stable machine-readable code for each failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFile => "INVALID_FILE",
            Self::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::PdfExtractionFailed(_) => "PDF_EXTRACTION_FAILED",
            Self::WordExtractionFailed(_) => "WORD_EXTRACTION_FAILED",
            Self::NoTextExtracted => "NO_TEXT_EXTRACTED",
            Self::InvalidResult => "INVALID_RESULT",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    pub file_name: String,
    pub file_size: usize,
    pub file_type: String,
    /// Populated for PDFs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    pub word_count: usize,
    pub character_count: usize,
    pub extracted_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: ExtractionMetadata,
}

struct RawDocumentText {
    text: String,
    page_count: Option<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    config: ExtractorConfig,
}

impl DocumentExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Turns an uploaded file into clean text plus metadata.
    ///
    /// Validation order is part of the contract: MIME type first, then size,
    /// then shape, so clients always see the most specific error. The decode
    /// itself is wrapped so that a panicking parser surfaces as
    /// `Unknown` instead of unwinding through the request handler.
    pub fn extract(&self, file: &UploadedFile) -> Result<ExtractionResult, ExtractionError> {
        let started = Instant::now();
        let format = self.validate(file)?;

        let raw = decode(format, &file.bytes)?;
        let text = normalize::clean_text(&raw.text);

        if text.chars().count() < MIN_EXTRACTED_CHARS {
            return Err(ExtractionError::NoTextExtracted);
        }

        let metadata = ExtractionMetadata {
            file_name: file.name.clone(),
            file_size: file.bytes.len(),
            file_type: file.content_type.clone(),
            page_count: raw.page_count,
            word_count: normalize::word_count(&text),
            character_count: text.chars().count(),
            extracted_at: Utc::now(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        let result = ExtractionResult { text, metadata };
        validate_result(&result)?;

        debug!(
            "extracted {} words from {} ({} bytes) in {}ms",
            result.metadata.word_count,
            result.metadata.file_name,
            result.metadata.file_size,
            result.metadata.processing_time_ms,
        );

        Ok(result)
    }

    fn validate(&self, file: &UploadedFile) -> Result<DocumentFormat, ExtractionError> {
        if !self.config.supported_mime_types.contains(&file.content_type) {
            return Err(ExtractionError::UnsupportedType {
                mime: file.content_type.clone(),
            });
        }
        let format =
            DocumentFormat::from_mime(&file.content_type).ok_or(ExtractionError::InvalidFile)?;

        if file.bytes.is_empty() {
            return Err(ExtractionError::EmptyFile);
        }
        if file.bytes.len() > self.config.max_file_size_bytes {
            return Err(ExtractionError::FileTooLarge {
                size: human_size(file.bytes.len()),
                limit: human_size(self.config.max_file_size_bytes),
            });
        }

        if file.name.trim().is_empty() {
            return Err(ExtractionError::InvalidFile);
        }

        Ok(format)
    }
}

/// Format dispatch, matched exhaustively. Parser panics (lopdf is known to
/// panic on some malformed streams) are caught and wrapped.
fn decode(format: DocumentFormat, bytes: &[u8]) -> Result<RawDocumentText, ExtractionError> {
    let outcome = std::panic::catch_unwind(|| match format {
        DocumentFormat::Pdf => pdf::extract_pdf_text(bytes).map(|p| RawDocumentText {
            text: p.text,
            page_count: Some(p.page_count),
        }),
        DocumentFormat::Docx => word::extract_docx_text(bytes).map(|text| RawDocumentText {
            text,
            page_count: None,
        }),
        DocumentFormat::Doc => word::extract_doc_text(bytes).map(|text| RawDocumentText {
            text,
            page_count: None,
        }),
    });

    match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "decoder panicked".to_string());
            Err(ExtractionError::Unknown(message.into()))
        }
    }
}

/// Final consistency check on the assembled result.
fn validate_result(result: &ExtractionResult) -> Result<(), ExtractionError> {
    let meta = &result.metadata;
    if result.text.is_empty()
        || meta.word_count == 0
        || meta.character_count != result.text.chars().count()
    {
        return Err(ExtractionError::InvalidResult);
    }
    Ok(())
}

fn human_size(bytes: usize) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
