//! Pluggable text extraction with chunking and size guards (spec §4.5).
//!
//! Every extracted body passes through the same chunker regardless of
//! source format, so `KnowledgeSync::upsert_file_chunks` only ever sees
//! `(title, body)` pairs already within the per-chunk budget.

use scraper::{Html, Selector};

use crate::error::{IdeaGraphError, Result};

/// Hard ceiling on input size; anything larger is rejected before any
/// extraction work runs so a malicious/huge upload can't force an
/// unbounded allocation.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Chunk boundary: bodies longer than this are split paragraph-wise.
pub const CHUNK_SIZE_CHARS: usize = 50_000;

/// The content kinds this extractor understands. `content_type` strings
/// from an upload map onto these via [`ContentKind::from_mime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    Markdown,
    Html,
    Pdf,
    Docx,
}

impl ContentKind {
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime {
            "text/plain" => Ok(Self::PlainText),
            "text/markdown" => Ok(Self::Markdown),
            "text/html" => Ok(Self::Html),
            "application/pdf" => Ok(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Ok(Self::Docx),
            other => Err(IdeaGraphError::InvalidInput(format!(
                "unsupported content type: {other}"
            ))),
        }
    }
}

/// One chunk of extracted text, already sized to fit a single
/// KnowledgeObject. `index` is the `<fileId>_<n>` suffix.
#[derive(Debug, Clone)]
pub struct ExtractedChunk {
    pub index: usize,
    pub title: String,
    pub body: String,
}

pub struct ContentExtractor;

impl ContentExtractor {
    /// Extracts `bytes` as `kind`, decodes text encodings with a
    /// UTF-8 → UTF-16 → latin-1 fallback chain, then chunks the result.
    /// `original_title` seeds each chunk's `<title> (Part n/N)` label.
    pub fn extract(kind: ContentKind, bytes: &[u8], original_title: &str) -> Result<Vec<ExtractedChunk>> {
        if bytes.len() > MAX_BODY_BYTES {
            return Err(IdeaGraphError::InvalidInput(format!(
                "body of {} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_BODY_BYTES
            )));
        }

        let text = match kind {
            ContentKind::PlainText | ContentKind::Markdown => Self::decode_text(bytes)?,
            ContentKind::Html => Self::extract_html(&Self::decode_text(bytes)?),
            ContentKind::Pdf => Self::extract_pdf(bytes)?,
            ContentKind::Docx => Self::extract_docx(bytes)?,
        };

        Ok(Self::chunk(&text, original_title))
    }

    /// UTF-8 → UTF-16 (LE, with BOM stripped) → latin-1, the last of
    /// which always succeeds since every byte maps to a Unicode scalar.
    fn decode_text(bytes: &[u8]) -> Result<String> {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return Ok(s.to_string());
        }

        if bytes.len() % 2 == 0 {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            if let Ok(s) = String::from_utf16(&units) {
                return Ok(s.trim_start_matches('\u{feff}').to_string());
            }
        }

        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Strips `<script>`/`<style>`/comment nodes via structural DOM
    /// parsing (never regex across tag boundaries, per spec §4.5's
    /// ReDoS guard), then collapses whitespace.
    fn extract_html(html: &str) -> String {
        let document = Html::parse_document(html);
        let skip = Selector::parse("script, style").expect("static selector");

        let skip_ids: std::collections::HashSet<_> = document
            .select(&skip)
            .flat_map(|el| el.descendants().map(|n| n.id()))
            .collect();

        let mut text = String::new();
        for node in document.root_element().descendants() {
            if skip_ids.contains(&node.id()) {
                continue;
            }
            if let Some(t) = node.value().as_text() {
                text.push_str(t);
                text.push(' ');
            }
        }

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Extracts text page-by-page via `pdf-extract` and joins with blank
    /// lines so paragraph chunking still finds natural boundaries.
    fn extract_pdf(bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| IdeaGraphError::InvalidInput(format!("pdf extraction failed: {e}")))
    }

    /// Concatenates paragraph runs from a `.docx` archive.
    fn extract_docx(bytes: &[u8]) -> Result<String> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| IdeaGraphError::InvalidInput(format!("docx extraction failed: {e:?}")))?;

        let mut paragraphs = Vec::new();
        for child in &docx.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut line = String::new();
                for run_child in &p.children {
                    if let docx_rs::ParagraphChild::Run(run) = run_child {
                        for text_child in &run.children {
                            if let docx_rs::RunChild::Text(t) = text_child {
                                line.push_str(&t.text);
                            }
                        }
                    }
                }
                if !line.trim().is_empty() {
                    paragraphs.push(line);
                }
            }
        }

        Ok(paragraphs.join("\n\n"))
    }

    /// Greedy paragraph-fill chunking: split on blank lines, then pack
    /// paragraphs into chunks of at most [`CHUNK_SIZE_CHARS`]. A single
    /// paragraph longer than the budget is hard-split (rare — only
    /// unformatted dumps hit this). Bodies under the budget produce
    /// exactly one chunk with the unmodified title (spec §8 "Boundary").
    fn chunk(text: &str, original_title: &str) -> Vec<ExtractedChunk> {
        if text.len() <= CHUNK_SIZE_CHARS {
            return vec![ExtractedChunk {
                index: 0,
                title: original_title.to_string(),
                body: text.to_string(),
            }];
        }

        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        let mut bodies: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs {
            let candidate_len = current.len() + 2 + paragraph.len();
            if !current.is_empty() && candidate_len > CHUNK_SIZE_CHARS {
                bodies.push(std::mem::take(&mut current));
            }

            if paragraph.len() > CHUNK_SIZE_CHARS {
                if !current.is_empty() {
                    bodies.push(std::mem::take(&mut current));
                }
                for hard_chunk in paragraph.as_bytes().chunks(CHUNK_SIZE_CHARS) {
                    bodies.push(String::from_utf8_lossy(hard_chunk).into_owned());
                }
                continue;
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        if !current.is_empty() {
            bodies.push(current);
        }

        let total = bodies.len();
        bodies
            .into_iter()
            .enumerate()
            .map(|(index, body)| ExtractedChunk {
                index,
                title: format!("{original_title} (Part {}/{total})", index + 1),
                body,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_body() {
        let err = ContentExtractor::extract(ContentKind::PlainText, &vec![0u8; MAX_BODY_BYTES + 1], "t");
        assert!(err.is_err());
    }

    #[test]
    fn single_chunk_for_small_body() {
        let chunks = ContentExtractor::extract(ContentKind::PlainText, b"hello world", "Notes").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title, "Notes");
    }

    #[test]
    fn splits_long_body_into_paragraph_chunks() {
        let paragraph = "x".repeat(1000);
        let body = vec![paragraph; 120].join("\n\n");
        let chunks = ContentExtractor::extract(ContentKind::PlainText, body.as_bytes(), "Big").unwrap();
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.body.len() <= CHUNK_SIZE_CHARS);
        }
        assert!(chunks[0].title.contains("Part 1/"));
    }

    #[test]
    fn strips_script_and_style_tags() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><p>Hello <b>World</b></p></body></html>";
        let text = ContentExtractor::extract_html(html);
        assert!(!text.contains("evil"));
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }

    #[test]
    fn decodes_latin1_fallback() {
        let bytes = vec![0xE9, 0x20, 0x61, 0x63, 0x63, 0x65, 0x6E, 0x74]; // "é accent" in latin-1
        let decoded = ContentExtractor::decode_text(&bytes).unwrap();
        assert!(decoded.contains('é'));
    }

    #[test]
    fn content_kind_from_mime_rejects_unknown() {
        assert!(ContentKind::from_mime("application/x-unknown").is_err());
    }
}
