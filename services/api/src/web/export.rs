//! services/api/src/web/export.rs
//!
//! Handlers that turn a finished session into downloadable artifacts (PDF,
//! HTML, zip bundle) or a published gallery entry.

use crate::export::{bundle_zip, html, html::AudioSource, pdf};
use crate::web::protocol::{PublishRequest, StoryView};
use crate::web::rest::{not_found, session_error, upstream_error};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use std::sync::Arc;
use storybook_core::domain::{NewPublicStory, StoryPage};
use storybook_core::session::{SessionError, StorySession, WizardStage};
use tracing::error;
use uuid::Uuid;

/// Snapshots the parts of a finished session the exporters need, without
/// holding the store lock while rendering.
fn finished_snapshot(
    session: &StorySession,
) -> Result<(String, Vec<StoryPage>), SessionError> {
    if session.stage() != WizardStage::Finished {
        return Err(SessionError::WrongStage {
            expected: "finished",
            found: session.stage(),
        });
    }
    Ok((session.title().to_string(), session.pages().to_vec()))
}

/// Turns a story title into a safe download file name.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-').to_lowercase();
    if stem.is_empty() {
        "storybook".to_string()
    } else {
        stem
    }
}

/// Download the finished book as a printable PDF.
#[utoipa::path(
    get,
    path = "/sessions/{id}/export/pdf",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "The rendered PDF", content_type = "application/pdf"),
        (status = 409, description = "The book is not finished yet")
    )
)]
pub async fn export_pdf_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (title, pages) = state
        .sessions
        .with(&id, finished_snapshot)
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    let bytes = pdf::render(&title, &pages).map_err(|e| {
        error!("PDF export failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to render the PDF.".to_string(),
        )
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", file_stem(&title)),
            ),
        ],
        Bytes::from(bytes),
    ))
}

/// Download the finished book as an interactive HTML document. When the
/// book has narration the response is a zip bundling the document with its
/// audio files; otherwise it is a single self-contained HTML file.
#[utoipa::path(
    get,
    path = "/sessions/{id}/export/html",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "An HTML document or a zip bundle"),
        (status = 409, description = "The book is not finished yet")
    )
)]
pub async fn export_html_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (title, pages, narrated) = state
        .sessions
        .with(&id, |s| {
            let (title, pages) = finished_snapshot(s)?;
            Ok::<_, SessionError>((title, pages, s.has_narration()))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    let stem = file_stem(&title);

    if narrated {
        let document = html::render(&title, &pages, AudioSource::Relative);
        let bytes = bundle_zip(&document, &pages).map_err(|e| {
            error!("Zip export failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build the export bundle.".to_string(),
            )
        })?;
        Ok((
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{stem}.zip\""),
                ),
            ],
            Bytes::from(bytes),
        ))
    } else {
        let document = html::render(&title, &pages, AudioSource::Inline);
        Ok((
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{stem}.html\""),
                ),
            ],
            Bytes::from(document.into_bytes()),
        ))
    }
}

/// Publish the finished book to the public gallery. The exported HTML and
/// the cover image go to object storage; the gallery records their URLs.
#[utoipa::path(
    post,
    path = "/sessions/{id}/publish",
    params(("id" = Uuid, Path, description = "The session id.")),
    request_body = PublishRequest,
    responses(
        (status = 201, description = "The published gallery entry", body = StoryView),
        (status = 400, description = "Missing author name or consent"),
        (status = 409, description = "The book is not finished yet")
    )
)]
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !request.consent {
        return Err((
            StatusCode::BAD_REQUEST,
            "Publishing requires consent.".to_string(),
        ));
    }
    let author = request.author.trim();
    if author.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "An author name is required.".to_string(),
        ));
    }

    let (title, pages, cover) = state
        .sessions
        .with(&id, |s| {
            let (title, pages) = finished_snapshot(s)?;
            Ok::<_, SessionError>((title, pages, s.cover_image().cloned()))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    // The published document embeds its audio so it stays a single file.
    let document = html::render(&title, &pages, AudioSource::Inline);
    let html_url = state
        .storage_adapter
        .store(document.as_bytes(), "text/html")
        .await
        .map_err(|e| upstream_error("Failed to store the story document.", e))?;

    let cover_image_url = match cover {
        Some(image) => state
            .storage_adapter
            .store(&image.data, &image.mime_type)
            .await
            .map_err(|e| upstream_error("Failed to store the cover image.", e))?,
        None => String::new(),
    };

    let story = state
        .gallery_adapter
        .publish(NewPublicStory {
            title,
            author: author.to_string(),
            cover_image_url,
            html_url,
        })
        .await
        .map_err(|e| upstream_error("Failed to publish the story.", e))?;

    Ok((StatusCode::CREATED, Json(StoryView::from(story))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_keeps_only_safe_characters() {
        assert_eq!(file_stem("The Shy Dragon!"), "the-shy-dragon");
        assert_eq!(file_stem("  "), "storybook");
        assert_eq!(file_stem("Ember & Pip"), "ember---pip");
    }
}
