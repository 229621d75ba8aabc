//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for the ElevenLabs Text-to-Speech (TTS)
//! service. It implements the `TextToSpeechService` port from the `core` crate.

use async_trait::async_trait;
use serde::Serialize;
use storybook_core::ports::{PortError, PortResult, TextToSpeechService};

const BASE_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const MODEL_ID: &str = "eleven_turbo_v2";

/// An adapter that implements the `TextToSpeechService` port using the
/// ElevenLabs API. One fixed narrator voice, one fixed model tier.
#[derive(Clone)]
pub struct ElevenLabsTtsAdapter {
    http: reqwest::Client,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsTtsAdapter {
    pub fn new(http: reqwest::Client, api_key: String, voice_id: String) -> Self {
        Self {
            http,
            api_key,
            voice_id,
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[async_trait]
impl TextToSpeechService for ElevenLabsTtsAdapter {
    /// Generates a vector of MP3 audio data from the given text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let url = format!("{}/{}", BASE_URL, self.voice_id);
        let request = SpeechRequest {
            text,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("ElevenLabs transport error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "ElevenLabs API error ({status}): {body}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(format!("ElevenLabs transport error: {e}")))?;
        if bytes.is_empty() {
            return Err(PortError::EmptyResponse(
                "ElevenLabs returned an empty audio stream".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_request_serializes_to_the_expected_wire_shape() {
        let request = SpeechRequest {
            text: "Once upon a time.",
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "Once upon a time.",
                "model_id": "eleven_turbo_v2",
                "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 }
            })
        );
    }
}
