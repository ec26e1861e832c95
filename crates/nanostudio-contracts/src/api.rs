//! JSON bodies exchanged between the studio and the relay.
//!
//! Field names follow the browser client (`imageBase64`, `aspectRatio`,
//! `optimizedPrompt`), so the relay stays wire-compatible with it.

use serde::{Deserialize, Deserializer, Serialize};

use crate::modes::AspectRatio;

pub const GENERATE_IMAGE_PATH: &str = "/api/generate-image";
pub const OPTIMIZE_PROMPT_PATH: &str = "/api/optimize-prompt";
pub const HEALTH_PATH: &str = "/api/health";

pub const PROMPT_REQUIRED: &str = "Prompt is required";
pub const NO_IMAGE_DATA: &str = "No image data found in response";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl GenerateImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_base64: None,
            aspect_ratio: None,
        }
    }

    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image_base64 = Some(image_base64.into());
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    /// The reference image, ignoring empty strings the browser sends for "none".
    pub fn reference_image(&self) -> Option<&str> {
        self.image_base64
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateImageResponse {
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizePromptRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizePromptResponse {
    pub optimized_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub image_model: String,
    pub text_model: String,
}

/// Browsers send `null` for an unset prompt; treat it like a missing one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
