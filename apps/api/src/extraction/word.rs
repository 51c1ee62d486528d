//! Word document text decoding: DOCX via `docx-rs`, legacy DOC via
//! best-effort recovery of printable text from the binary stream.

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::{debug, warn};

use super::ExtractionError;

/// OLE2 compound-file signature carried by legacy `.doc` binaries.
const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Shortest run of printable characters worth keeping when scraping a
/// legacy binary. Anything shorter is format noise.
const MIN_PRINTABLE_RUN: usize = 3;

/// Decodes a DOCX document into raw text, one paragraph per line.
///
/// Structural elements other than paragraphs (tables, section breaks) are
/// skipped with a warning rather than failing the whole extraction.
pub(super) fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| ExtractionError::WordExtractionFailed(e.to_string()))?;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut skipped = 0usize;

    for child in docx.document.children.iter() {
        match child {
            DocumentChild::Paragraph(para) => {
                let text: String = para
                    .children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<Vec<_>>()
                                .join(""),
                        ),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("");

                if !text.is_empty() {
                    paragraphs.push(text);
                }
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("DOCX decode skipped {skipped} non-paragraph element(s)");
    }

    Ok(paragraphs.join("\n"))
}

/// Recovers text from a legacy binary `.doc` file.
///
/// There is no maintained pure-Rust reader for the Word 97 binary format, so
/// this scans the raw bytes under both a UTF-16LE and a single-byte view,
/// keeps runs of printable characters, and returns whichever view recovered
/// more real content. Lossy by construction; the caller's minimum-length
/// check catches the cases where nothing useful survives.
pub(super) fn extract_doc_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.len() < OLE2_MAGIC.len() || bytes[..OLE2_MAGIC.len()] != OLE2_MAGIC {
        warn!("legacy DOC upload without OLE2 signature, attempting recovery anyway");
    }

    let wide = printable_runs(utf16le_chars(bytes));
    let narrow = printable_runs(bytes.iter().map(|&b| b as char));

    let text = if alphabetic_weight(&wide) >= alphabetic_weight(&narrow) {
        wide
    } else {
        narrow
    };

    debug!("legacy DOC recovery yielded {} raw chars", text.len());
    Ok(text)
}

fn utf16le_chars(bytes: &[u8]) -> impl Iterator<Item = char> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .map(|unit| {
            // Surrogate pairs are rare in resume text; map them to noise.
            char::from_u32(unit as u32).unwrap_or('\u{0}')
        })
}

/// Keeps runs of at least `MIN_PRINTABLE_RUN` printable characters, joined
/// by newlines. Everything else in a binary stream is structure, not prose.
fn printable_runs(chars: impl Iterator<Item = char>) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in chars {
        if is_printable(c) {
            current.push(c);
        } else if !current.is_empty() {
            if current.trim().chars().count() >= MIN_PRINTABLE_RUN {
                runs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.trim().chars().count() >= MIN_PRINTABLE_RUN {
        runs.push(current);
    }

    runs.join("\n")
}

fn is_printable(c: char) -> bool {
    c == ' ' || c == '\t' || (!c.is_control() && c != '\u{FFFD}')
}

fn alphabetic_weight(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}
