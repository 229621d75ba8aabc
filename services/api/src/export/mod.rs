//! services/api/src/export/mod.rs
//!
//! Local composition of the finished book into downloadable artifacts:
//! a printable PDF, a self-contained interactive HTML document, and a zip
//! bundle of the HTML plus per-page narration files.

pub mod html;
pub mod pdf;

use std::io::Write;
use storybook_core::domain::StoryPage;
use zip::write::FileOptions;

/// Errors raised while assembling an export artifact.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to assemble the PDF: {0}")]
    Pdf(String),
    #[error("Failed to assemble the zip bundle: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The name of every narration file inside the zip bundle, also used as
/// the relative `src` in the bundled HTML.
pub fn audio_file_name(page_number: u32) -> String {
    format!("audio/page-{page_number}.mp3")
}

/// Bundles the rendered HTML with the narration clips of the given pages.
/// The HTML must reference the clips by their relative names
/// (`html::AudioSource::Relative`).
pub fn bundle_zip(html_document: &str, pages: &[StoryPage]) -> Result<Vec<u8>, ExportError> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = FileOptions::default();

    writer.start_file("story.html", options)?;
    writer.write_all(html_document.as_bytes())?;

    for page in pages {
        if let Some(clip) = &page.narration {
            writer.start_file(audio_file_name(page.page), options)?;
            writer.write_all(&clip.data)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storybook_core::domain::AudioClip;

    #[test]
    fn zip_bundle_has_the_zip_magic_and_contains_the_audio() {
        let mut page = StoryPage::new(1, "hello");
        page.narration = Some(AudioClip::mpeg(vec![0xff, 0xfb, 0x90]));
        let silent = StoryPage::new(2, "quiet");

        let bytes = bundle_zip("<html></html>", &[page, silent]).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["story.html", "audio/page-1.mp3"]);
    }
}
