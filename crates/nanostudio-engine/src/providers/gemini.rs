use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use super::{
    ContentProvider, ImageGenerationRequest, InlineImage, TextGenerationRequest,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_image_payload(request: &ImageGenerationRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(image) = request.reference_image.as_ref() {
            parts.push(json!({
                "inlineData": {
                    "data": image.data,
                    "mimeType": image.mime_type,
                }
            }));
        }
        parts.push(json!({ "text": request.prompt }));

        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(vec![json!({
                "role": "user",
                "parts": parts,
            })]),
        );
        if let Some(aspect_ratio) = request.aspect_ratio {
            payload.insert(
                "generationConfig".to_string(),
                json!({
                    "imageConfig": { "aspectRatio": aspect_ratio.as_str() },
                }),
            );
        }
        Value::Object(payload)
    }

    fn build_text_payload(request: &TextGenerationRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.contents }],
            }]
        })
    }

    fn post(&self, model: &str, payload: &Value) -> Result<Value> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("Gemini API key not configured (set API_KEY or GEMINI_API_KEY)");
        };
        let endpoint = self.endpoint_for_model(model);
        log::debug!("POST {endpoint}");
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(payload)
            .send()
            .map_err(|err| {
                anyhow::Error::new(err.without_url())
                    .context(format!("Gemini request failed ({endpoint})"))
            })?;
        response_json_or_error(response)
    }

    fn first_candidate_parts(response_payload: &Value) -> Vec<Value> {
        response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn extract_first_image(response_payload: &Value) -> Option<InlineImage> {
        Self::first_candidate_parts(response_payload)
            .iter()
            .find_map(|part| {
                let inline = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)?;
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                Some(InlineImage {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                })
            })
    }

    fn extract_text(response_payload: &Value) -> Option<String> {
        let text = Self::first_candidate_parts(response_payload)
            .iter()
            .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<String>();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl ContentProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_image(&self, request: &ImageGenerationRequest) -> Result<Option<InlineImage>> {
        let payload = Self::build_image_payload(request);
        let response_payload = self.post(&request.model, &payload)?;
        Ok(Self::extract_first_image(&response_payload))
    }

    fn generate_text(&self, request: &TextGenerationRequest) -> Result<Option<String>> {
        let payload = Self::build_text_payload(request);
        let response_payload = self.post(&request.model, &payload)?;
        Ok(Self::extract_text(&response_payload))
    }
}

/// Parses a success body, or surfaces the provider's own error message.
fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .context("Gemini response body read failed")?;
    if !status.is_success() {
        let provider_message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|parsed| {
                parsed
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .map(str::to_string)
            });
        match provider_message {
            Some(message) => bail!("{message}"),
            None => bail!(
                "Gemini request failed ({code}): {}",
                truncate_text(&body, 512)
            ),
        }
    }
    serde_json::from_str(&body).context("Gemini returned invalid JSON payload")
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
