//! [`ImageGenerator`] backed by an OpenAI-compatible images API.
//!
//! Two endpoints are used:
//!
//! * `POST {base}/images/generations` (JSON) when no reference image exists
//! * `POST {base}/images/edits` (multipart) when a reference image anchors
//!   character identity and style
//!
//! Both return `data[0].b64_json`, which is decoded here. The decoded bytes
//! are returned as-is; their format is sniffed later by the compositor.

use crate::config::CompilationConfig;
use crate::error::{ServiceError, StorybookError};
use crate::prompts::illustration_prompt_with_bible;
use crate::services::{ImageGenerator, ImageRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for the images API.
pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl OpenAiImageGenerator {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn generate_plain(&self, model: &str, prompt: &str, size: &str) -> Result<Vec<u8>, ServiceError> {
        // The gpt-image family always answers with base64 and rejects the
        // `response_format` field; DALL·E models need it spelled out.
        let response_format = model.starts_with("dall-e").then_some("b64_json");
        let body = GenerationRequest {
            model,
            prompt,
            n: 1,
            size,
            response_format,
        };
        let resp = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_response(resp).await
    }

    async fn generate_with_reference(
        &self,
        model: &str,
        prompt: &str,
        size: &str,
        reference: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let (file_name, mime) = if reference.starts_with(&[0xFF, 0xD8, 0xFF]) {
            ("reference.jpg", "image/jpeg")
        } else {
            ("reference.png", "image/png")
        };
        let part = Part::bytes(reference.to_vec())
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| ServiceError::Request(format!("multipart: {e}")))?;
        let form = Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .text("size", size.to_string())
            .text("n", "1")
            .part("image[]", part);

        let resp = self
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_response(resp).await
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, request: ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
        let prompt = illustration_prompt_with_bible(request.prompt, request.style, request.character_bible);
        debug!(
            "Image request: model={} size={} reference={} prompt_len={}",
            request.model,
            request.size,
            request.reference_image.is_some(),
            prompt.len()
        );

        match request.reference_image {
            Some(reference) => {
                self.generate_with_reference(request.model, &prompt, request.size, reference)
                    .await
            }
            None => self.generate_plain(request.model, &prompt, request.size).await,
        }
    }
}

async fn decode_response(resp: reqwest::Response) -> Result<Vec<u8>, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();
        return Err(ServiceError::Request(format!("HTTP {status}: {snippet}")));
    }

    let parsed: ImagesResponse = resp
        .json()
        .await
        .map_err(|e| ServiceError::InvalidResponse(format!("images JSON: {e}")))?;
    let b64 = parsed
        .data
        .into_iter()
        .find_map(|d| d.b64_json)
        .ok_or_else(|| ServiceError::InvalidResponse("no b64_json image in response".into()))?;

    STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| ServiceError::InvalidResponse(format!("base64: {e}")))
}

fn map_reqwest_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Request(format!("timeout: {e}"))
    } else {
        ServiceError::Request(e.to_string())
    }
}

/// Resolve the image generator: explicit object first, then `OPENAI_API_KEY`
/// (with optional `OPENAI_BASE_URL`).
pub fn resolve_image_generator(
    config: &CompilationConfig,
) -> Result<Arc<dyn ImageGenerator>, StorybookError> {
    if let Some(ref generator) = config.image_generator {
        return Ok(Arc::clone(generator));
    }

    let key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| StorybookError::ProviderNotConfigured {
            service: "Image",
            provider: "openai".to_string(),
            hint: "Set OPENAI_API_KEY (and optionally OPENAI_BASE_URL) for illustration.".into(),
        })?;
    let base_url = std::env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty());

    let generator = OpenAiImageGenerator::new(key, base_url, config.api_timeout_secs).map_err(|e| {
        StorybookError::ProviderNotConfigured {
            service: "Image",
            provider: "openai".to_string(),
            hint: e.to_string(),
        }
    })?;
    Ok(Arc::new(generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let g = OpenAiImageGenerator::new("k", Some("http://localhost:8080/v1/".into()), 5).unwrap();
        assert_eq!(g.base_url, "http://localhost:8080/v1");
        let g = OpenAiImageGenerator::new("k", None, 5).unwrap();
        assert_eq!(g.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn dalle_requests_ask_for_base64() {
        let body = GenerationRequest {
            model: "dall-e-3",
            prompt: "a fox",
            n: 1,
            size: "1024x1024",
            response_format: "dall-e-3".starts_with("dall-e").then_some("b64_json"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"], "b64_json");

        let body = GenerationRequest {
            response_format: None,
            ..body
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn response_without_image_is_rejected() {
        let parsed: ImagesResponse = serde_json::from_str(r#"{"data":[{"url":"http://x"}]}"#).unwrap();
        assert!(parsed.data.into_iter().find_map(|d| d.b64_json).is_none());
    }
}
