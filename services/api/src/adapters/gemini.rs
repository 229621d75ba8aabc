//! services/api/src/adapters/gemini.rs
//!
//! A thin client for the Google Generative Language API, shared by the
//! outline, character and illustration adapters. It covers the two request
//! shapes the app needs: schema-constrained JSON generation and multimodal
//! image generation with inline reference attachments.

use serde::{Deserialize, Serialize};
use storybook_core::domain::StoredImage;
use storybook_core::ports::{PortError, PortResult};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    /// Generates JSON text constrained by a response schema.
    pub async fn generate_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> PortResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![RequestPart::text(user)],
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![RequestPart::text(system)],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
                response_modalities: None,
            }),
        };

        let response = self.call(model, &request).await?;
        let text = response
            .first_text()
            .ok_or_else(|| PortError::EmptyResponse(response.finish_summary()))?;
        Ok(text.trim().to_string())
    }

    /// Generates one image from a text instruction plus optional inline
    /// reference images. Fails with `EmptyResponse` when the model returns
    /// no image part.
    pub async fn generate_image(
        &self,
        model: &str,
        instruction: &str,
        references: &[StoredImage],
    ) -> PortResult<StoredImage> {
        let mut parts = vec![RequestPart::text(instruction)];
        for reference in references {
            parts.push(RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: reference.mime_type.clone(),
                    data: reference.base64_payload(),
                },
            });
        }

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
            }),
        };

        let response = self.call(model, &request).await?;
        response
            .first_image()
            .ok_or_else(|| PortError::EmptyResponse(response.finish_summary()))
    }

    async fn call(&self, model: &str, request: &GenerateRequest) -> PortResult<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            BASE_URL, model, self.api_key
        );

        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini transport error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini transport error: {e}")))?;
        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| PortError::Unexpected(format!("Failed to parse Gemini response: {e}")))?;

        if let Some(error) = response.error {
            return Err(PortError::Unexpected(format!(
                "Gemini API returned error: {}",
                error.message
            )));
        }
        Ok(response)
    }
}

//=========================================================================================
// Wire Format
//=========================================================================================

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl RequestPart {
    fn text(text: &str) -> Self {
        RequestPart::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    fn first_text(&self) -> Option<&str> {
        self.parts().find_map(|p| p.text.as_deref())
    }

    fn first_image(&self) -> Option<StoredImage> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
        self.parts().find_map(|p| {
            let inline = p.inline_data.as_ref()?;
            let data = BASE64.decode(&inline.data).ok()?;
            Some(StoredImage::new(data, inline.mime_type.clone()))
        })
    }

    /// A short description of why a candidate carried no usable parts,
    /// for the error message.
    fn finish_summary(&self) -> String {
        let reason = self
            .candidates
            .iter()
            .flatten()
            .next()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("UNKNOWN");
        format!("model finished with reason {reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_response_parsing_success() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [ { "text": "[{\"page\":1}]" } ],
                        "role": "model"
                    },
                    "finishReason": "STOP",
                    "index": 0
                }
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_text(), Some("[{\"page\":1}]"));
    }

    #[test]
    fn safety_blocked_response_has_no_text() {
        // Content is omitted entirely when generation is blocked.
        let json = r#"{
            "candidates": [ { "finishReason": "SAFETY", "index": 0 } ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(response.first_text().is_none());
        assert_eq!(response.finish_summary(), "model finished with reason SAFETY");
    }

    #[test]
    fn image_part_is_extracted_and_decoded() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Here is your illustration." },
                            { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        let image = response.first_image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, vec![1, 2, 3]);
    }

    #[test]
    fn text_only_response_yields_no_image() {
        let json = r#"{
            "candidates": [
                {
                    "content": { "parts": [ { "text": "I cannot draw that." } ], "role": "model" },
                    "finishReason": "STOP"
                }
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(response.first_image().is_none());
    }

    #[test]
    fn request_parts_serialize_to_the_expected_wire_shape() {
        let parts = vec![
            RequestPart::text("draw a dragon"),
            RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: "image/png".to_string(),
                    data: "AQID".to_string(),
                },
            },
        ];
        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "text": "draw a dragon" },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ])
        );
    }
}
