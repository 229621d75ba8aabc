//! crates/storybook_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like model APIs or storage.

use crate::domain::{
    CharacterAnalysis, NewPublicStory, PageStub, PublicStory, StoredImage, StoryPage,
};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., model API,
/// document store, object storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The service answered but produced nothing usable (e.g. no image part
    /// in a generation response).
    #[error("The service produced no usable output: {0}")]
    EmptyResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Turns a free-text premise into an ordered list of page stubs.
#[async_trait]
pub trait OutlineService: Send + Sync {
    async fn generate_outline(&self, premise: &str) -> PortResult<Vec<PageStub>>;
}

/// Analyzes the drafted pages and returns the character roster plus the
/// page-to-character-names mapping.
#[async_trait]
pub trait CharacterAnalysisService: Send + Sync {
    async fn identify_characters(&self, pages: &[StoryPage]) -> PortResult<CharacterAnalysis>;
}

/// Produces character portraits and per-page illustrations.
#[async_trait]
pub trait IllustrationService: Send + Sync {
    /// Generates a reference portrait from a character's visual description.
    async fn generate_portrait(&self, description: &str) -> PortResult<StoredImage>;

    /// Generates one page illustration conditioned on the supplied reference
    /// portraits. Returns exactly one image or fails; retrying is the
    /// caller's decision.
    async fn illustrate_page(
        &self,
        page_text: &str,
        references: &[StoredImage],
    ) -> PortResult<StoredImage>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

/// Object storage for exported artifacts. Returns a public URL.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn store(&self, content: &[u8], mime_type: &str) -> PortResult<String>;
}

/// The document store backing the public gallery.
#[async_trait]
pub trait GalleryService: Send + Sync {
    /// Records a new gallery entry; the store assigns id and creation time.
    async fn publish(&self, entry: NewPublicStory) -> PortResult<PublicStory>;

    /// Lists the most recently published stories, newest first.
    async fn list_recent(&self, limit: i64) -> PortResult<Vec<PublicStory>>;
}
