//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers that drive the authoring wizard and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    CreateSessionRequest, IllustrationView, SessionView, UpdateCharacterRequest,
    UpdatePageRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::future::join_all;
use std::sync::Arc;
use storybook_core::domain::{AudioClip, StoredImage};
use storybook_core::ports::PortError;
use storybook_core::session::{SessionError, StorySession, WizardStage};
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        get_session_handler,
        delete_session_handler,
        update_page_handler,
        delete_page_handler,
        confirm_outline_handler,
        update_character_handler,
        generate_portrait_handler,
        upload_portrait_handler,
        confirm_characters_handler,
        illustrate_page_handler,
        approve_page_handler,
        generate_audiobook_handler,
        crate::web::export::export_pdf_handler,
        crate::web::export::export_html_handler,
        crate::web::export::publish_handler,
        crate::web::stories::list_stories_handler,
        crate::web::stories::save_story_handler,
        crate::web::stories::upload_handler,
    ),
    components(schemas(
        CreateSessionRequest,
        UpdatePageRequest,
        UpdateCharacterRequest,
        crate::web::protocol::PublishRequest,
        crate::web::protocol::UploadRequest,
        crate::web::protocol::UploadResponse,
        crate::web::protocol::NewStoryRequest,
        crate::web::protocol::PageView,
        crate::web::protocol::CharacterView,
        SessionView,
        IllustrationView,
        crate::web::protocol::StoryView,
    )),
    tags(
        (name = "Storybook API", description = "API endpoints for the AI storybook creator.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Translation
//=========================================================================================

pub(crate) fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Session not found.".to_string())
}

/// Maps a state-machine violation to an HTTP response. The wizard never
/// crashes on these; the client stays on its current stage and retries.
pub(crate) fn session_error(e: SessionError) -> (StatusCode, String) {
    let status = match e {
        SessionError::PageOutOfRange(_) | SessionError::UnknownCharacter(_) => {
            StatusCode::NOT_FOUND
        }
        SessionError::WrongStage { .. }
        | SessionError::StaleGeneration
        | SessionError::NoPendingIllustration => StatusCode::CONFLICT,
        SessionError::CharactersNotReady => StatusCode::BAD_REQUEST,
        SessionError::EmptyOutline => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

/// Logs an upstream failure and hides the raw error behind a short
/// user-facing message.
pub(crate) fn upstream_error(message: &str, e: PortError) -> (StatusCode, String) {
    error!("{message} {e:?}");
    (StatusCode::BAD_GATEWAY, message.to_string())
}

//=========================================================================================
// Session Lifecycle
//=========================================================================================

/// Start a new authoring session from a premise.
///
/// Runs outline generation; on failure nothing is recorded and the client
/// stays on the prompt screen.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created with a drafted outline", body = SessionView),
        (status = 502, description = "Outline generation failed")
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if request.premise.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Prompt is required.".to_string()));
    }

    let stubs = state
        .outline_adapter
        .generate_outline(&request.premise)
        .await
        .map_err(|e| upstream_error("Failed to generate story outline.", e))?;

    let mut session = StorySession::new(request.premise, request.title);
    session.apply_outline(stubs).map_err(session_error)?;

    let view = SessionView::from_session(&session);
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Fetch the current state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, body = SessionView),
        (status = 404, description = "No such session")
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with(&id, SessionView::from_session)
        .await
        .ok_or_else(not_found)?;
    Ok(Json(view))
}

/// Discard a session and all of its state (the wizard's "start over").
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "No such session")
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

//=========================================================================================
// Outline Stage
//=========================================================================================

/// Edit the text of one page.
#[utoipa::path(
    put,
    path = "/sessions/{id}/pages/{index}",
    params(
        ("id" = Uuid, Path, description = "The session id."),
        ("index" = usize, Path, description = "Zero-based page index.")
    ),
    request_body = UpdatePageRequest,
    responses((status = 200, body = SessionView))
)]
pub async fn update_page_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(request): Json<UpdatePageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.set_page_text(index, request.text)
                .map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

/// Delete a page while still drafting the outline.
#[utoipa::path(
    delete,
    path = "/sessions/{id}/pages/{index}",
    params(
        ("id" = Uuid, Path, description = "The session id."),
        ("index" = usize, Path, description = "Zero-based page index.")
    ),
    responses((status = 200, description = "Page removed, remainder renumbered", body = SessionView))
)]
pub async fn delete_page_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.remove_page(index).map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

/// Confirm the outline and extract the character roster.
///
/// On extraction failure the session stays in the outline stage with all
/// edits intact, ready for a manual retry.
#[utoipa::path(
    post,
    path = "/sessions/{id}/outline/confirm",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, body = SessionView),
        (status = 502, description = "Character extraction failed; outline unchanged")
    )
)]
pub async fn confirm_outline_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let pages = state
        .sessions
        .with(&id, |s| {
            if s.stage() == WizardStage::Outline {
                Ok(s.pages().to_vec())
            } else {
                Err(SessionError::WrongStage {
                    expected: "outline",
                    found: s.stage(),
                })
            }
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    let analysis = state
        .character_adapter
        .identify_characters(&pages)
        .await
        .map_err(|e| upstream_error("Failed to identify characters.", e))?;

    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.apply_character_analysis(analysis)
                .map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

//=========================================================================================
// Character Stage
//=========================================================================================

/// Edit a character's visual description.
#[utoipa::path(
    put,
    path = "/sessions/{id}/characters/{name}",
    params(
        ("id" = Uuid, Path, description = "The session id."),
        ("name" = String, Path, description = "The character name.")
    ),
    request_body = UpdateCharacterRequest,
    responses((status = 200, body = SessionView))
)]
pub async fn update_character_handler(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
    Json(request): Json<UpdateCharacterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.set_character_description(&name, request.description)
                .map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

/// Generate a reference portrait from the character's description.
#[utoipa::path(
    post,
    path = "/sessions/{id}/characters/{name}/portrait/generate",
    params(
        ("id" = Uuid, Path, description = "The session id."),
        ("name" = String, Path, description = "The character name.")
    ),
    responses(
        (status = 200, body = SessionView),
        (status = 502, description = "Portrait generation failed")
    )
)]
pub async fn generate_portrait_handler(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let description = state
        .sessions
        .with(&id, |s| {
            s.characters()
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.description.clone())
                .ok_or_else(|| SessionError::UnknownCharacter(name.clone()))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    let portrait = state
        .illustrator_adapter
        .generate_portrait(&description)
        .await
        .map_err(|e| upstream_error("Failed to generate the character portrait.", e))?;

    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.attach_portrait(&name, portrait)
                .map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

/// Upload a portrait photo for a character.
///
/// Accepts a multipart/form-data request with a single image part. The raw
/// bytes and declared media type are stored directly, with no re-encoding.
#[utoipa::path(
    post,
    path = "/sessions/{id}/characters/{name}/portrait",
    params(
        ("id" = Uuid, Path, description = "The session id."),
        ("name" = String, Path, description = "The character name.")
    ),
    request_body(content_type = "multipart/form-data", description = "The portrait image."),
    responses(
        (status = 200, body = SessionView),
        (status = 400, description = "Missing file or content type")
    )
)]
pub async fn upload_portrait_handler(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include an image file".to_string(),
            )
        })?;

    let mime_type = field
        .content_type()
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "The uploaded file must declare an image content type".to_string(),
            )
        })?;
    let data = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let portrait = StoredImage::new(data.to_vec(), mime_type);
    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.attach_portrait(&name, portrait)
                .map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

/// Confirm the roster and start illustrating, page by page.
#[utoipa::path(
    post,
    path = "/sessions/{id}/characters/confirm",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, body = SessionView),
        (status = 400, description = "A character still lacks a portrait")
    )
)]
pub async fn confirm_characters_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with_mut(&id, |s| {
            s.confirm_characters().map(|_| SessionView::from_session(s))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

//=========================================================================================
// Illustration Stage
//=========================================================================================

/// Illustrate the page at the cursor. Calling this again regenerates,
/// discarding any earlier pending image; a superseded in-flight call is
/// rejected when it resolves (last submitted wins).
#[utoipa::path(
    post,
    path = "/sessions/{id}/illustration",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "An illustration awaiting approval", body = IllustrationView),
        (status = 409, description = "The result was superseded by a newer request"),
        (status = 502, description = "No image was produced")
    )
)]
pub async fn illustrate_page_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (token, page_text, references) = state
        .sessions
        .with_mut(&id, |s| {
            let token = s.begin_illustration()?;
            let (text, references) = s.illustration_request()?;
            Ok::<_, SessionError>((token, text, references))
        })
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    let image = state
        .illustrator_adapter
        .illustrate_page(&page_text, &references)
        .await
        .map_err(|e| upstream_error("Failed to generate page image.", e))?;
    let image_url = image.to_data_uri();

    state
        .sessions
        .with_mut(&id, |s| s.complete_illustration(token, image))
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    Ok(Json(IllustrationView {
        generation: token,
        image_url,
    }))
}

/// Approve the pending illustration and advance to the next page.
/// Approving the last page finishes the book.
#[utoipa::path(
    post,
    path = "/sessions/{id}/illustration/approve",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, body = SessionView),
        (status = 409, description = "No illustration is awaiting approval")
    )
)]
pub async fn approve_page_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .with_mut(&id, |s| s.approve_page().map(|_| SessionView::from_session(s)))
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;
    Ok(Json(view))
}

//=========================================================================================
// Audiobook
//=========================================================================================

/// Narrate every page that does not yet have audio. Pages are narrated
/// concurrently and independently; already-narrated pages are skipped, so
/// repeating the call is idempotent. Clips that succeed are kept even when
/// others fail.
#[utoipa::path(
    post,
    path = "/sessions/{id}/audiobook",
    params(("id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, body = SessionView),
        (status = 502, description = "Narration failed for at least one page"),
        (status = 503, description = "No TTS credentials are configured")
    )
)]
pub async fn generate_audiobook_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let tts = state.tts_adapter.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Audio generation service is not configured.".to_string(),
        )
    })?;

    let jobs = state
        .sessions
        .with(&id, |s| s.pages_without_narration())
        .await
        .ok_or_else(not_found)?
        .map_err(session_error)?;

    let calls = jobs.into_iter().map(|(index, text)| {
        let tts = tts.clone();
        async move { (index, tts.generate_audio(&text).await) }
    });
    let results = join_all(calls).await;

    let mut failed: Vec<usize> = Vec::new();
    state
        .sessions
        .with_mut(&id, |s| {
            for (index, result) in results {
                match result {
                    Ok(data) => {
                        // The session can only have left Finished via reset,
                        // in which case it is gone from the store.
                        let _ = s.attach_narration(index, AudioClip::mpeg(data));
                    }
                    Err(e) => {
                        error!("Narration failed for page index {index}: {e:?}");
                        failed.push(index);
                    }
                }
            }
        })
        .await
        .ok_or_else(not_found)?;

    if !failed.is_empty() {
        return Err((
            StatusCode::BAD_GATEWAY,
            "Failed to generate audio for some pages. Already narrated pages were kept; try again."
                .to_string(),
        ));
    }

    let view = state
        .sessions
        .with(&id, SessionView::from_session)
        .await
        .ok_or_else(not_found)?;
    Ok(Json(view))
}
