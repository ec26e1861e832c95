use std::time::Duration;

use anyhow::{bail, Context, Result};
use nanostudio_contracts::api::{
    GenerateImageRequest, GenerateImageResponse, OptimizePromptRequest, OptimizePromptResponse,
};
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::StudioBackend;

/// HTTP client for a running relay, rooted at its `/api` base URL.
pub struct RelayClient {
    base_url: String,
    http: HttpClient,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build relay HTTP client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("relay request failed ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "Server returned {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            );
        }
        response
            .json::<R>()
            .with_context(|| format!("relay returned an unexpected body ({url})"))
    }
}

impl StudioBackend for RelayClient {
    fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
        let response: GenerateImageResponse = self.post_json("generate-image", request)?;
        Ok(response.image)
    }

    fn optimize_prompt(&self, prompt: &str) -> Result<String> {
        let response: OptimizePromptResponse = self.post_json(
            "optimize-prompt",
            &OptimizePromptRequest {
                prompt: prompt.to_string(),
            },
        )?;
        Ok(response.optimized_prompt)
    }
}
