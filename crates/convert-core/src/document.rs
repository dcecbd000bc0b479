//! Intermediate representation passed between pipeline stages.
//!
//! `SourceImages` is what an image source hands to the pipeline; `OcrDocument`
//! is what the pipeline hands to a document writer. Every OCR'd image becomes
//! exactly one `Page`, in extraction order.

use image::DynamicImage;

use crate::options::ConversionOptions;

/// A raster image decoded from an embedded PDF image XObject.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 1-based page number the image was found on.
    pub page: u32,
    /// Position within that page's image list.
    pub index_on_page: usize,
    pub image: DynamicImage,
}

impl ExtractedImage {
    pub fn new(page: u32, index_on_page: usize, image: DynamicImage) -> Self {
        Self {
            page,
            index_on_page,
            image,
        }
    }
}

/// Everything an image source extracted from one PDF.
#[derive(Debug, Clone, Default)]
pub struct SourceImages {
    pub images: Vec<ExtractedImage>,
}

impl SourceImages {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Paragraph alignment. Only left alignment is produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
}

/// Fixed page and paragraph formatting, expressed in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Uniform margin on all four sides.
    pub margin: f64,
    pub font_size: f64,
    pub space_before: f64,
    pub alignment: Alignment,
}

impl PageLayout {
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            margin: options.margin_points(),
            font_size: options.font_size,
            space_before: options.space_before,
            alignment: Alignment::Left,
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::from_options(&ConversionOptions::default())
    }
}

/// One output page: the OCR text of one image, one paragraph per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub paragraphs: Vec<String>,
}

impl Page {
    /// Split recognized text on `\n`. Empty lines stay as empty paragraphs.
    pub fn from_text(text: &str) -> Self {
        Self {
            paragraphs: text.split('\n').map(str::to_string).collect(),
        }
    }
}

/// A finished document ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrDocument {
    pub layout: PageLayout,
    pub pages: Vec<Page>,
}

impl OcrDocument {
    /// Number of page breaks a writer must emit between pages.
    pub fn page_break_count(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn paragraph_count(&self) -> usize {
        self.pages.iter().map(|p| p.paragraphs.len()).sum()
    }
}

/// Accumulates pages for an [`OcrDocument`].
///
/// Layout is fixed when the builder is created, before any paragraph is added.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    layout: PageLayout,
    pages: Vec<Page>,
}

impl DocumentBuilder {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            pages: Vec::new(),
        }
    }

    /// Append the recognized text of one image as a new page.
    pub fn add_page(&mut self, text: &str) -> &Page {
        self.pages.push(Page::from_text(text));
        &self.pages[self.pages.len() - 1]
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> OcrDocument {
        OcrDocument {
            layout: self.layout,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_text_keeps_empty_lines() {
        let page = Page::from_text("Line one\n\nLine three\n");
        assert_eq!(page.paragraphs, vec!["Line one", "", "Line three", ""]);
    }

    #[test]
    fn test_page_from_empty_text() {
        let page = Page::from_text("");
        assert_eq!(page.paragraphs, vec![""]);
    }

    #[test]
    fn test_builder_one_page_per_text() {
        let mut builder = DocumentBuilder::new(PageLayout::default());
        builder.add_page("first");
        builder.add_page("second\npage");
        builder.add_page("");
        let doc = builder.finish();

        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.page_break_count(), 2);
        assert_eq!(doc.pages[1].paragraphs, vec!["second", "page"]);
        assert_eq!(doc.paragraph_count(), 4);
    }

    #[test]
    fn test_layout_from_options() {
        let opts = ConversionOptions {
            margin_inches: 1.5,
            font_size: 10.0,
            ..Default::default()
        };
        let layout = PageLayout::from_options(&opts);
        assert_eq!(layout.margin, 108.0);
        assert_eq!(layout.font_size, 10.0);
        assert_eq!(layout.space_before, 12.0);
        assert_eq!(layout.alignment, Alignment::Left);
    }

    #[test]
    fn test_empty_document_has_no_breaks() {
        let doc = DocumentBuilder::new(PageLayout::default()).finish();
        assert_eq!(doc.page_break_count(), 0);
    }
}
