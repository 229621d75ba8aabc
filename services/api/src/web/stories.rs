//! services/api/src/web/stories.rs
//!
//! Handlers for the public gallery and the raw upload endpoint.

use crate::web::protocol::{NewStoryRequest, StoryView, UploadRequest, UploadResponse};
use crate::web::rest::upstream_error;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use storybook_core::domain::NewPublicStory;

const GALLERY_PAGE_SIZE: i64 = 20;

/// List the most recently published stories, newest first.
#[utoipa::path(
    get,
    path = "/stories",
    responses((status = 200, description = "The latest gallery entries", body = [StoryView]))
)]
pub async fn list_stories_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stories = state
        .gallery_adapter
        .list_recent(GALLERY_PAGE_SIZE)
        .await
        .map_err(|e| upstream_error("Failed to load the story gallery.", e))?;
    let views: Vec<StoryView> = stories.into_iter().map(StoryView::from).collect();
    Ok(Json(views))
}

/// Record a gallery entry for artifacts that were uploaded separately.
#[utoipa::path(
    post,
    path = "/stories",
    request_body = NewStoryRequest,
    responses(
        (status = 201, description = "The recorded gallery entry", body = StoryView),
        (status = 400, description = "Missing title or author")
    )
)]
pub async fn save_story_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewStoryRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if request.title.trim().is_empty() || request.author.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "A title and an author name are required.".to_string(),
        ));
    }

    let story = state
        .gallery_adapter
        .publish(NewPublicStory {
            title: request.title,
            author: request.author,
            cover_image_url: request.cover_image_url,
            html_url: request.html_url,
        })
        .await
        .map_err(|e| upstream_error("Failed to publish the story.", e))?;

    Ok((StatusCode::CREATED, Json(StoryView::from(story))))
}

/// Checks the HTML-only restriction and yields the document's bytes.
/// `file_content` carries the raw HTML text, stored as UTF-8.
fn html_document_bytes(request: UploadRequest) -> Result<Vec<u8>, (StatusCode, String)> {
    if !request.is_html || request.mime_type != "text/html" {
        return Err((
            StatusCode::BAD_REQUEST,
            "Only HTML story documents can be uploaded.".to_string(),
        ));
    }
    Ok(request.file_content.into_bytes())
}

/// Upload a story document to object storage.
///
/// Only HTML documents are accepted here; every other artifact reaches
/// storage through the publish flow, which keeps this endpoint from acting
/// as a general-purpose file host.
#[utoipa::path(
    post,
    path = "/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "The public URL of the stored file", body = UploadResponse),
        (status = 400, description = "Not an HTML document")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mime_type = request.mime_type.clone();
    let content = html_document_bytes(request)?;

    let public_url = state
        .storage_adapter
        .store(&content, &mime_type)
        .await
        .map_err(|e| upstream_error("Failed to store the uploaded file.", e))?;

    Ok(Json(UploadResponse { public_url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_accepts_the_raw_html_document_text() {
        let request = UploadRequest {
            file_content: "<html><body>My story</body></html>".to_string(),
            mime_type: "text/html".to_string(),
            is_html: true,
        };
        let bytes = html_document_bytes(request).unwrap();
        assert_eq!(bytes, b"<html><body>My story</body></html>");
    }

    #[test]
    fn non_html_uploads_are_rejected() {
        let request = UploadRequest {
            file_content: "AQID".to_string(),
            mime_type: "image/png".to_string(),
            is_html: false,
        };
        let (status, message) = html_document_bytes(request).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("HTML"));
    }

    #[test]
    fn html_flag_without_the_html_media_type_is_rejected() {
        let request = UploadRequest {
            file_content: "<html></html>".to_string(),
            mime_type: "application/octet-stream".to_string(),
            is_html: true,
        };
        assert!(html_document_bytes(request).is_err());
    }
}
