//! services/api/src/adapters/outline_llm.rs
//!
//! This module contains the adapter that drafts a story outline from a
//! premise. It implements the `OutlineService` port from the `core` crate.

use crate::adapters::gemini::GeminiClient;
use async_trait::async_trait;
use serde::Deserialize;
use storybook_core::domain::PageStub;
use storybook_core::ports::{OutlineService, PortError, PortResult};

const SYSTEM_INSTRUCTIONS: &str = "You are a creative storyteller for children. Generate a list of story pages. Each page should have a page number and a short paragraph of text. Ensure the story flows well and is age-appropriate.";

/// An adapter that implements the `OutlineService` port using Gemini's
/// schema-constrained JSON output.
#[derive(Clone)]
pub struct GeminiOutlineAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiOutlineAdapter {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "page": {
                        "type": "INTEGER",
                        "description": "The page number, starting from 1."
                    },
                    "text": {
                        "type": "STRING",
                        "description": "The short paragraph of story text for this page. Should be engaging for a child."
                    }
                },
                "required": ["page", "text"]
            }
        })
    }

    /// Parses the model output. The schema requires both fields, but the
    /// result is read defensively: a missing page number is left unset for
    /// the session to fill in, missing text becomes an empty string.
    fn parse_outline(json: &str) -> PortResult<Vec<PageStub>> {
        #[derive(Deserialize)]
        struct OutlineEntry {
            page: Option<u32>,
            #[serde(default)]
            text: String,
        }

        let entries: Vec<OutlineEntry> = serde_json::from_str(json).map_err(|e| {
            PortError::Unexpected(format!("Outline response was not a page array: {e}"))
        })?;
        Ok(entries
            .into_iter()
            .map(|entry| PageStub {
                page: entry.page,
                text: entry.text,
            })
            .collect())
    }
}

#[async_trait]
impl OutlineService for GeminiOutlineAdapter {
    async fn generate_outline(&self, premise: &str) -> PortResult<Vec<PageStub>> {
        let user_prompt = format!(
            "Create a children's story outline based on this idea: \"{premise}\". The story should have between 5 and 8 pages."
        );
        let json = self
            .client
            .generate_json(
                &self.model,
                SYSTEM_INSTRUCTIONS,
                &user_prompt,
                Self::response_schema(),
            )
            .await?;
        Self::parse_outline(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_outline_parses() {
        let json = r#"[
            { "page": 1, "text": "Once upon a time..." },
            { "page": 2, "text": "The dragon woke up." }
        ]"#;
        let stubs = GeminiOutlineAdapter::parse_outline(json).unwrap();
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].page, Some(1));
        assert_eq!(stubs[1].text, "The dragon woke up.");
    }

    #[test]
    fn entries_missing_fields_are_tolerated() {
        let json = r#"[ { "text": "no number here" }, { "page": 3 } ]"#;
        let stubs = GeminiOutlineAdapter::parse_outline(json).unwrap();
        assert_eq!(stubs[0].page, None);
        assert_eq!(stubs[1].text, "");
    }

    #[test]
    fn non_array_output_is_an_error() {
        let err = GeminiOutlineAdapter::parse_outline(r#"{"page": 1}"#).unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
