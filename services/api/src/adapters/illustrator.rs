//! services/api/src/adapters/illustrator.rs
//!
//! This module contains the adapter for portrait and page-illustration
//! generation. It implements the `IllustrationService` port from the `core`
//! crate using Gemini's multimodal image output.

use crate::adapters::gemini::GeminiClient;
use async_trait::async_trait;
use storybook_core::domain::StoredImage;
use storybook_core::ports::{IllustrationService, PortResult};

/// An adapter that implements the `IllustrationService` port. The same
/// image model handles both calls; the page call additionally attaches the
/// reference portraits inline so character appearance stays consistent.
#[derive(Clone)]
pub struct GeminiIllustratorAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiIllustratorAdapter {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    fn portrait_instruction(description: &str) -> String {
        format!(
            "Create a character portrait for a children's storybook. The character is: \"{description}\". \
             The style should be whimsical, vibrant, colorful, and enchanting, with a simple background \
             that keeps the focus on the character. Do not include any text in the image."
        )
    }

    fn page_instruction(page_text: &str) -> String {
        format!(
            "Create a whimsical, vibrant, and colorful illustration for a children's storybook. \
             The scene is: \"{page_text}\". Use the provided images as a direct reference for the \
             characters' appearance. The characters should look exactly like the reference images. \
             Ensure the final image matches the storybook art style. Do not include any text in the image."
        )
    }
}

#[async_trait]
impl IllustrationService for GeminiIllustratorAdapter {
    async fn generate_portrait(&self, description: &str) -> PortResult<StoredImage> {
        self.client
            .generate_image(&self.model, &Self::portrait_instruction(description), &[])
            .await
    }

    async fn illustrate_page(
        &self,
        page_text: &str,
        references: &[StoredImage],
    ) -> PortResult<StoredImage> {
        self.client
            .generate_image(&self.model, &Self::page_instruction(page_text), references)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_instruction_embeds_the_scene_and_forbids_text() {
        let instruction = GeminiIllustratorAdapter::page_instruction("Ember hides in a cave.");
        assert!(instruction.contains("\"Ember hides in a cave.\""));
        assert!(instruction.contains("Do not include any text in the image."));
        assert!(instruction.contains("reference"));
    }
}
