use std::sync::Arc;

use anyhow::{bail, Result};
use nanostudio_contracts::api::{GenerateImageRequest, NO_IMAGE_DATA, PROMPT_REQUIRED};
use nanostudio_contracts::data_uri::{png_data_uri, strip_image_data_prefix};
use nanostudio_contracts::AspectRatio;

use crate::config::{KeyRole, StudioConfig};
use crate::prompts::optimization_contents;
use crate::providers::{
    provider_from_config, ContentProvider, ImageGenerationRequest, InlineImage,
    TextGenerationRequest,
};

/// The two operations the studio needs, however they are reached.
pub trait StudioBackend {
    /// Returns a `data:image/png;base64,` URI.
    fn generate_image(&self, request: &GenerateImageRequest) -> Result<String>;

    fn optimize_prompt(&self, prompt: &str) -> Result<String>;
}

/// Calls the provider in-process. The relay server and the client fallback
/// both go through this type.
#[derive(Clone)]
pub struct DirectBackend {
    provider: Arc<dyn ContentProvider>,
    image_model: String,
    text_model: String,
    default_aspect_ratio: Option<AspectRatio>,
}

impl DirectBackend {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        image_model: impl Into<String>,
        text_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            image_model: image_model.into(),
            text_model: text_model.into(),
            default_aspect_ratio: None,
        }
    }

    pub fn from_config(config: &StudioConfig, role: KeyRole) -> Result<Self> {
        let provider = provider_from_config(config, role)?;
        let backend = Self::new(provider, &config.image_model, &config.text_model);
        Ok(match role {
            KeyRole::Relay => backend,
            KeyRole::Client => backend.with_default_aspect_ratio(AspectRatio::Square),
        })
    }

    /// Aspect ratio sent when the request carries none.
    pub fn with_default_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.default_aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }
}

impl StudioBackend for DirectBackend {
    fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
        if request.prompt.trim().is_empty() {
            bail!(PROMPT_REQUIRED);
        }
        // Uploads are always declared as PNG, whatever prefix they arrived with.
        let reference_image = request.reference_image().map(|raw| InlineImage {
            mime_type: "image/png".to_string(),
            data: strip_image_data_prefix(raw).to_string(),
        });
        let provider_request = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: request.prompt.clone(),
            reference_image,
            aspect_ratio: request.aspect_ratio.or(self.default_aspect_ratio),
        };
        let Some(image) = self.provider.generate_image(&provider_request)? else {
            bail!(NO_IMAGE_DATA);
        };
        Ok(png_data_uri(&image.data))
    }

    fn optimize_prompt(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            bail!(PROMPT_REQUIRED);
        }
        let text = self.provider.generate_text(&TextGenerationRequest {
            model: self.text_model.clone(),
            contents: optimization_contents(prompt),
        })?;
        Ok(text
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| prompt.to_string()))
    }
}
