//! services/api/src/web/protocol.rs
//!
//! Defines the JSON wire types exchanged between the browser client and the
//! API server. Domain types never serialize directly; these views are the
//! only serialization boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storybook_core::domain::PublicStory;
use storybook_core::session::StorySession;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// The story idea, e.g. "A shy dragon who is afraid of fire".
    pub premise: String,
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePageRequest {
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCharacterRequest {
    pub description: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PublishRequest {
    pub author: String,
    /// Publishing is contingent on explicit consent.
    pub consent: bool,
}

/// The object-storage upload contract. Field names follow the original
/// client payloads.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// The raw HTML document text, stored as UTF-8.
    pub file_content: String,
    pub mime_type: String,
    #[serde(default)]
    pub is_html: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct NewStoryRequest {
    pub title: String,
    pub author: String,
    pub cover_image_url: String,
    pub html_url: String,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub public_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct PageView {
    pub page: u32,
    pub text: String,
    /// Names of roster characters appearing on this page.
    pub characters: Vec<String>,
    /// The approved illustration as a data URI, if any.
    pub image_url: Option<String>,
    pub has_audio: bool,
}

#[derive(Serialize, ToSchema)]
pub struct CharacterView {
    pub name: String,
    pub description: String,
    /// The portrait as a data URI, if any.
    pub image_url: Option<String>,
}

/// A snapshot of one authoring session, returned by every wizard action.
#[derive(Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    /// One of: prompt, outline, character_creation, creating_pages, finished.
    pub stage: String,
    pub title: String,
    pub premise: String,
    pub current_page_index: usize,
    pub characters_ready: bool,
    pub pages: Vec<PageView>,
    pub characters: Vec<CharacterView>,
}

impl SessionView {
    pub fn from_session(session: &StorySession) -> Self {
        Self {
            id: session.id(),
            stage: session.stage().to_string(),
            title: session.title().to_string(),
            premise: session.premise().to_string(),
            current_page_index: session.current_page_index(),
            characters_ready: session.characters_ready(),
            pages: session
                .pages()
                .iter()
                .map(|p| PageView {
                    page: p.page,
                    text: p.text.clone(),
                    characters: p.characters.clone(),
                    image_url: p.illustration.as_ref().map(|i| i.to_data_uri()),
                    has_audio: p.narration.is_some(),
                })
                .collect(),
            characters: session
                .characters()
                .iter()
                .map(|c| CharacterView {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    image_url: c.portrait.as_ref().map(|i| i.to_data_uri()),
                })
                .collect(),
        }
    }
}

/// An illustration awaiting approval, with the generation token that ties
/// it to the request that produced it.
#[derive(Serialize, ToSchema)]
pub struct IllustrationView {
    pub generation: u64,
    pub image_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct StoryView {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image_url: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<PublicStory> for StoryView {
    fn from(story: PublicStory) -> Self {
        Self {
            id: story.id,
            title: story.title,
            author: story.author,
            cover_image_url: story.cover_image_url,
            html_url: story.html_url,
            created_at: story.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storybook_core::domain::PageStub;

    #[test]
    fn session_view_reflects_stage_and_pages() {
        let mut session = StorySession::new("a premise", "A Title");
        session
            .apply_outline(vec![PageStub {
                page: None,
                text: "Once upon a time".to_string(),
            }])
            .unwrap();
        let view = SessionView::from_session(&session);
        assert_eq!(view.stage, "outline");
        assert_eq!(view.pages.len(), 1);
        assert_eq!(view.pages[0].page, 1);
        assert!(view.pages[0].image_url.is_none());
        assert!(view.characters_ready);
    }

    #[test]
    fn upload_request_accepts_the_original_field_names() {
        let request: UploadRequest = serde_json::from_str(
            r#"{ "fileContent": "<html></html>", "mimeType": "text/html", "isHtml": true }"#,
        )
        .unwrap();
        assert!(request.is_html);
        assert_eq!(request.mime_type, "text/html");
    }
}
