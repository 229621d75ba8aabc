//! crates/storybook_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stored binary image together with its declared media type.
///
/// Portraits and illustrations travel as base64 data URIs between the
/// browser, the session and the image model, so conversion helpers live here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl StoredImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Renders the image as a `data:<mime>;base64,<payload>` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }

    /// The base64 payload without the data-URI framing, as the image
    /// model expects for inline attachments.
    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.data)
    }
}

/// A narration clip for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn mpeg(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: "audio/mpeg".to_string(),
        }
    }
}

/// One page of the story being authored.
///
/// `page` numbers are unique and contiguous starting at 1 within a session;
/// the session controller owns renumbering.
#[derive(Debug, Clone)]
pub struct StoryPage {
    pub page: u32,
    pub text: String,
    pub illustration: Option<StoredImage>,
    /// Names of roster characters appearing on this page.
    pub characters: Vec<String>,
    pub narration: Option<AudioClip>,
}

impl StoryPage {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            illustration: None,
            characters: Vec::new(),
            narration: None,
        }
    }
}

/// A recurring character extracted from the outline. The name is the join
/// key to pages; the description feeds portrait generation.
#[derive(Debug, Clone)]
pub struct Character {
    pub name: String,
    pub description: String,
    pub portrait: Option<StoredImage>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            portrait: None,
        }
    }
}

/// A page stub as returned by the outline service, before the session
/// assigns defensive page numbers.
#[derive(Debug, Clone)]
pub struct PageStub {
    pub page: Option<u32>,
    pub text: String,
}

/// The character roster plus page mapping produced by the character
/// extraction service.
#[derive(Debug, Clone)]
pub struct CharacterAnalysis {
    pub characters: Vec<Character>,
    pub pages: Vec<PageCharacters>,
}

/// Which character names appear on one page.
#[derive(Debug, Clone)]
pub struct PageCharacters {
    pub page: u32,
    pub characters: Vec<String>,
}

/// A story published to the public gallery. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct PublicStory {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image_url: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

/// The fields of a gallery entry before the document store assigns an id
/// and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewPublicStory {
    pub title: String,
    pub author: String,
    pub cover_image_url: String,
    pub html_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_carries_the_mime_and_encoded_payload() {
        let image = StoredImage::new(vec![1, 2, 3], "image/png");
        assert_eq!(image.to_data_uri(), "data:image/png;base64,AQID");
        assert_eq!(image.base64_payload(), "AQID");
    }
}
