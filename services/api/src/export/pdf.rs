//! services/api/src/export/pdf.rs
//!
//! Renders the finished book as a printable A4 PDF: a title page, then one
//! PDF page per story page with the illustration scaled to fit the content
//! width (aspect ratio preserved) and word-wrapped text beneath it.

use super::ExportError;
use printpdf::image_crate::codecs::jpeg::JpegDecoder;
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use storybook_core::domain::{StoredImage, StoryPage};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const MAX_IMAGE_HEIGHT_MM: f32 = 170.0;
const BODY_FONT_SIZE: f32 = 13.0;
const LINE_HEIGHT_MM: f32 = 7.0;
// Lowest baseline for body text, clear of the page-number footer.
const TEXT_BOTTOM_MM: f32 = 22.0;
// Helvetica at 13pt across the 174mm content width.
const WRAP_COLUMNS: usize = 78;
const IMAGE_DPI: f32 = 96.0;

pub fn render(title: &str, pages: &[StoryPage]) -> Result<Vec<u8>, ExportError> {
    let (doc, title_page, title_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let title_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    let layer = doc.get_page(title_page).get_layer(title_layer);
    layer.use_text(title, 30.0, Mm(MARGIN_MM), Mm(190.0), &title_font);
    layer.use_text(
        "A storybook made with a little help from AI.",
        12.0,
        Mm(MARGIN_MM),
        Mm(176.0),
        &body_font,
    );

    for page in pages {
        let (page_index, layer_index) =
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let mut layer = doc.get_page(page_index).get_layer(layer_index);
        draw_footer(&layer, page.page, &body_font);

        let mut text_top = PAGE_HEIGHT_MM - MARGIN_MM;
        if let Some(image) = &page.illustration {
            if let Some(placed_height) = place_image(&layer, image) {
                text_top -= placed_height + 12.0;
            }
        }

        // Text that would run into the footer flows onto continuation
        // sheets carrying the same page number.
        let mut y = text_top;
        for line in wrap_text(&page.text, WRAP_COLUMNS) {
            if y < TEXT_BOTTOM_MM {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
                layer = doc.get_page(next_page).get_layer(next_layer);
                draw_footer(&layer, page.page, &body_font);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            layer.use_text(line, BODY_FONT_SIZE, Mm(MARGIN_MM), Mm(y), &body_font);
            y -= LINE_HEIGHT_MM;
        }
    }

    let mut bytes: Vec<u8> = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut bytes);
        doc.save(&mut writer)
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
    }
    Ok(bytes)
}

fn draw_footer(layer: &PdfLayerReference, page_number: u32, font: &printpdf::IndirectFontRef) {
    layer.use_text(
        format!("{page_number}"),
        10.0,
        Mm(PAGE_WIDTH_MM / 2.0),
        Mm(10.0),
        font,
    );
}

/// Draws the illustration centered at the top of the content area, scaled
/// to fit the content width with a height cap, and returns its rendered
/// height in millimetres. Undecodable images are skipped so a corrupt
/// illustration cannot sink the whole export.
fn place_image(layer: &PdfLayerReference, stored: &StoredImage) -> Option<f32> {
    let image = decode_image(stored)?;

    let natural_width_mm = px_to_mm(image.image.width.0);
    let natural_height_mm = px_to_mm(image.image.height.0);
    if natural_width_mm <= 0.0 || natural_height_mm <= 0.0 {
        return None;
    }

    let scale = (CONTENT_WIDTH_MM / natural_width_mm)
        .min(MAX_IMAGE_HEIGHT_MM / natural_height_mm);
    let rendered_width = natural_width_mm * scale;
    let rendered_height = natural_height_mm * scale;
    let x = (PAGE_WIDTH_MM - rendered_width) / 2.0;
    let y = PAGE_HEIGHT_MM - MARGIN_MM - rendered_height;

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
    Some(rendered_height)
}

fn decode_image(stored: &StoredImage) -> Option<Image> {
    let mut cursor = std::io::Cursor::new(stored.data.as_slice());
    match stored.mime_type.as_str() {
        "image/jpeg" => Image::try_from(JpegDecoder::new(&mut cursor).ok()?).ok(),
        _ => Image::try_from(PngDecoder::new(&mut cursor).ok()?).ok(),
    }
}

fn px_to_mm(px: usize) -> f32 {
    px as f32 * 25.4 / IMAGE_DPI
}

/// Greedy word wrap. Words longer than the column width get a line of
/// their own rather than being split.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
        } else if line.len() + 1 + word.len() <= columns {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    // A 1x1 PNG, enough to exercise the embedding path.
    const TINY_PNG_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    #[test]
    fn wrap_respects_the_column_limit() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert!(lines.iter().all(|l| l.len() <= 15));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_gives_overlong_words_their_own_line() {
        let lines = wrap_text("a supercalifragilisticexpialidocious day", 10);
        assert_eq!(
            lines,
            vec!["a", "supercalifragilisticexpialidocious", "day"]
        );
    }

    #[test]
    fn wrap_of_empty_text_is_empty() {
        assert!(wrap_text("", 40).is_empty());
        assert!(wrap_text("   ", 40).is_empty());
    }

    #[test]
    fn rendered_document_is_a_pdf() {
        let mut page = StoryPage::new(1, "Once upon a time there was a shy dragon.");
        page.illustration = Some(StoredImage::new(
            BASE64.decode(TINY_PNG_B64).unwrap(),
            "image/png",
        ));
        let bytes = render("The Shy Dragon", &[page]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn corrupt_illustrations_are_skipped_not_fatal() {
        let mut page = StoryPage::new(1, "text");
        page.illustration = Some(StoredImage::new(vec![0, 1, 2, 3], "image/png"));
        let bytes = render("T", &[page]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| w == &needle).count()
    }

    /// Page dictionaries (`/Type /Page`) minus the page-tree nodes
    /// (`/Type /Pages`), i.e. the number of physical sheets.
    fn sheet_count(bytes: &[u8]) -> usize {
        occurrences(bytes, b"/Page") - occurrences(bytes, b"/Pages")
    }

    #[test]
    fn overlong_page_text_flows_onto_continuation_sheets() {
        let short = render("T", &[StoryPage::new(1, "a few words")]).unwrap();
        let long_text = "whimsical dragon adventure ".repeat(400);
        let long = render("T", &[StoryPage::new(1, long_text)]).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert_eq!(sheet_count(&short), 2); // title sheet + one story sheet
        assert!(sheet_count(&long) > sheet_count(&short));
    }
}
