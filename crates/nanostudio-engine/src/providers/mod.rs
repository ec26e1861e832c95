use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use nanostudio_contracts::AspectRatio;

use crate::config::{KeyRole, StudioConfig};

mod dryrun;
mod gemini;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

/// Base64 image payload as exchanged with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub reference_image: Option<InlineImage>,
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone)]
pub struct TextGenerationRequest {
    pub model: String,
    pub contents: String,
}

pub trait ContentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// First inline image of the response; `None` when the model sent none.
    fn generate_image(&self, request: &ImageGenerationRequest) -> Result<Option<InlineImage>>;

    /// Response text; `None` when the model sent no text.
    fn generate_text(&self, request: &TextGenerationRequest) -> Result<Option<String>>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ContentProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContentProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(
    config: &StudioConfig,
    role: KeyRole,
) -> Result<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();
    providers.register(GeminiProvider::new(
        &config.api_base,
        config.api_key(role).map(str::to_string),
        config.request_timeout,
    )?);
    providers.register(DryrunProvider);
    Ok(providers)
}

/// The provider named by `config.provider`, holding the key for `role`.
pub fn provider_from_config(
    config: &StudioConfig,
    role: KeyRole,
) -> Result<Arc<dyn ContentProvider>> {
    let registry = default_provider_registry(config, role)?;
    let Some(provider) = registry.get(&config.provider) else {
        bail!(
            "unknown provider '{}' (available: {})",
            config.provider,
            registry.names().join(", ")
        );
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::{default_provider_registry, provider_from_config};
    use crate::config::{KeyRole, StudioConfig};

    #[test]
    fn default_registry_includes_gemini_and_dryrun() -> anyhow::Result<()> {
        let names = default_provider_registry(&StudioConfig::default(), KeyRole::Relay)?.names();
        assert_eq!(names, vec!["dryrun".to_string(), "gemini".to_string()]);
        Ok(())
    }

    #[test]
    fn unknown_provider_lists_alternatives() {
        let config = StudioConfig {
            provider: "midjourney".to_string(),
            ..StudioConfig::default()
        };
        let err = provider_from_config(&config, KeyRole::Client)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("unknown provider 'midjourney'"));
        assert!(err.contains("dryrun, gemini"));
    }
}
