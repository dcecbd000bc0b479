//! DOCX writer: turns an `OcrDocument` into a docx-rs document and saves it.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use docx_rs::{AlignmentType, BreakType, Docx, LineSpacing, PageMargin, Paragraph, Run};

use convert_core::document::{Alignment, OcrDocument, PageLayout};
use convert_core::error::{ConvertError, Result};

/// US Letter, in twips.
pub const PAGE_WIDTH_TWIPS: u32 = 12240;
pub const PAGE_HEIGHT_TWIPS: u32 = 15840;

const HEADER_FOOTER_TWIPS: i32 = 720;

/// Points to twentieths of a point.
pub fn twips(points: f64) -> u32 {
    (points * 20.0).round().max(0.0) as u32
}

/// Points to the half-point unit of `w:sz`.
pub fn half_points(points: f64) -> u32 {
    (points * 2.0).round().max(0.0) as u32
}

fn alignment_type(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
    }
}

/// Characters XML 1.0 cannot carry at all, even escaped.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// OCR output can contain stray control characters; they are dropped.
fn strip_invalid(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
    }
}

fn page_margin(layout: &PageLayout) -> PageMargin {
    let margin = twips(layout.margin) as i32;
    PageMargin::new()
        .top(margin)
        .right(margin)
        .bottom(margin)
        .left(margin)
        .header(HEADER_FOOTER_TWIPS)
        .footer(HEADER_FOOTER_TWIPS)
        .gutter(0)
}

fn line_paragraph(text: &str, layout: &PageLayout) -> Paragraph {
    let paragraph = Paragraph::new()
        .align(alignment_type(layout.alignment))
        .line_spacing(LineSpacing::new().before(twips(layout.space_before)));
    if text.is_empty() {
        return paragraph;
    }
    paragraph.add_run(
        Run::new()
            .add_text(strip_invalid(text))
            .size(half_points(layout.font_size) as usize),
    )
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

/// One paragraph per OCR line, a page-break paragraph between pages.
pub fn build_docx(document: &OcrDocument) -> Docx {
    let layout = &document.layout;
    let mut docx = Docx::new()
        .page_size(PAGE_WIDTH_TWIPS, PAGE_HEIGHT_TWIPS)
        .page_margin(page_margin(layout));

    for (i, page) in document.pages.iter().enumerate() {
        if i > 0 {
            docx = docx.add_paragraph(page_break());
        }
        for text in &page.paragraphs {
            docx = docx.add_paragraph(line_paragraph(text, layout));
        }
    }
    docx
}

/// Write `document` as a `.docx` package at `output_path`.
///
/// The package is written next to the target and renamed over it once
/// complete; an existing file is left untouched on failure.
pub fn write_docx(document: &OcrDocument, output_path: &Path) -> Result<()> {
    let docx = build_docx(document);
    write_atomically(output_path, |file| {
        docx.build()
            .pack(file)
            .map_err(|e| ConvertError::Docx(format!("Failed to write DOCX: {}", e)))
    })?;

    log::info!(
        "DOCX written: {} ({} pages, {} paragraphs)",
        output_path.display(),
        document.pages.len(),
        document.paragraph_count()
    );
    Ok(())
}

fn write_atomically<F>(output_path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2docx-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| {
            ConvertError::Docx(format!(
                "Failed to create {}: {}",
                output_path.display(),
                e
            ))
        })?;
    log::debug!("Writing DOCX via {}", tmp.path().display());

    // The temp file is removed when `tmp` drops on an early return.
    write(tmp.as_file_mut())?;

    tmp.persist(output_path).map_err(|e| {
        ConvertError::Docx(format!(
            "Failed to save {}: {}",
            output_path.display(),
            e.error
        ))
    })?;
    Ok(())
}
