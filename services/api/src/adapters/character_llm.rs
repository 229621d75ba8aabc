//! services/api/src/adapters/character_llm.rs
//!
//! This module contains the adapter that extracts the character roster and
//! the page-to-character mapping from a drafted story. It implements the
//! `CharacterAnalysisService` port from the `core` crate.

use crate::adapters::gemini::GeminiClient;
use async_trait::async_trait;
use serde::Deserialize;
use storybook_core::domain::{Character, CharacterAnalysis, PageCharacters, StoryPage};
use storybook_core::ports::{CharacterAnalysisService, PortError, PortResult};

const SYSTEM_INSTRUCTIONS: &str = "You are an expert at analyzing stories to extract structured data. Identify the characters and map them to the pages they appear on.";

/// An adapter that implements the `CharacterAnalysisService` port using
/// Gemini's schema-constrained JSON output.
#[derive(Clone)]
pub struct GeminiCharacterAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiCharacterAdapter {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "characters": {
                    "type": "ARRAY",
                    "description": "A list of the main characters in the story.",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": { "type": "STRING", "description": "The character's name." },
                            "description": {
                                "type": "STRING",
                                "description": "A brief, one-sentence physical description of the character suitable for an image generation prompt."
                            }
                        },
                        "required": ["name", "description"]
                    }
                },
                "pages": {
                    "type": "ARRAY",
                    "description": "Mapping of which characters appear on each page.",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "page": { "type": "INTEGER", "description": "The page number." },
                            "characters": {
                                "type": "ARRAY",
                                "description": "A list of character names that appear on this page.",
                                "items": { "type": "STRING" }
                            }
                        },
                        "required": ["page", "characters"]
                    }
                }
            },
            "required": ["characters", "pages"]
        })
    }

    /// Parses the model output. Absent arrays default to empty rather than
    /// failing the whole extraction.
    fn parse_analysis(json: &str) -> PortResult<CharacterAnalysis> {
        #[derive(Deserialize)]
        struct RawAnalysis {
            #[serde(default)]
            characters: Vec<RawCharacter>,
            #[serde(default)]
            pages: Vec<RawPage>,
        }
        #[derive(Deserialize)]
        struct RawCharacter {
            name: String,
            #[serde(default)]
            description: String,
        }
        #[derive(Deserialize)]
        struct RawPage {
            page: u32,
            #[serde(default)]
            characters: Vec<String>,
        }

        let raw: RawAnalysis = serde_json::from_str(json).map_err(|e| {
            PortError::Unexpected(format!("Character response had an unexpected shape: {e}"))
        })?;
        Ok(CharacterAnalysis {
            characters: raw
                .characters
                .into_iter()
                .map(|c| Character::new(c.name, c.description))
                .collect(),
            pages: raw
                .pages
                .into_iter()
                .map(|p| PageCharacters {
                    page: p.page,
                    characters: p.characters,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl CharacterAnalysisService for GeminiCharacterAdapter {
    async fn identify_characters(&self, pages: &[StoryPage]) -> PortResult<CharacterAnalysis> {
        let story_text = pages
            .iter()
            .map(|p| format!("Page {}: {}", p.page, p.text))
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!(
            "Analyze the following children's story and identify the main characters and their appearances on each page.\n\n{story_text}"
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
        Self::parse_analysis(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_analysis_parses() {
        let json = r#"{
            "characters": [
                { "name": "Ember the Dragon", "description": "a small green dragon with golden eyes" }
            ],
            "pages": [
                { "page": 1, "characters": ["Ember the Dragon"] },
                { "page": 2, "characters": [] }
            ]
        }"#;
        let analysis = GeminiCharacterAdapter::parse_analysis(json).unwrap();
        assert_eq!(analysis.characters.len(), 1);
        assert_eq!(analysis.characters[0].name, "Ember the Dragon");
        assert_eq!(analysis.pages.len(), 2);
        assert_eq!(analysis.pages[0].characters, vec!["Ember the Dragon"]);
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let analysis = GeminiCharacterAdapter::parse_analysis("{}").unwrap();
        assert!(analysis.characters.is_empty());
        assert!(analysis.pages.is_empty());
    }

    #[test]
    fn malformed_analysis_is_an_error() {
        let err = GeminiCharacterAdapter::parse_analysis("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
