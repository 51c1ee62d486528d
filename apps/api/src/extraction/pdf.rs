//! PDF text decoding.

use tracing::debug;

use super::ExtractionError;

pub(super) struct PdfText {
    pub text: String,
    pub page_count: usize,
}

/// Decodes a PDF page by page.
///
/// Text runs within a page are joined by single spaces, pages by newlines,
/// so downstream normalization sees one line per page. Parser failures map
/// to `ExtractionError::PdfExtractionFailed` with the lopdf-level cause
/// attached.
pub(super) fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)?;
    let page_count = pages.len();

    let text = pages
        .iter()
        .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    debug!("decoded {page_count} PDF page(s), {} raw chars", text.len());

    Ok(PdfText { text, page_count })
}
