use anyhow::Result;
use nanostudio_contracts::api::GenerateImageRequest;

use crate::backend::{DirectBackend, StudioBackend};
use crate::config::{KeyRole, StudioConfig};
use crate::relay_client::RelayClient;

/// Relay first; on any relay failure, one direct attempt. Nothing is retried.
pub struct FallbackBackend {
    relay: Box<dyn StudioBackend>,
    direct: Box<dyn StudioBackend>,
}

impl FallbackBackend {
    pub fn new(relay: Box<dyn StudioBackend>, direct: Box<dyn StudioBackend>) -> Self {
        Self { relay, direct }
    }

    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let relay = RelayClient::new(&config.relay_url, config.request_timeout)?;
        let direct = DirectBackend::from_config(config, KeyRole::Client)?;
        Ok(Self::new(Box::new(relay), Box::new(direct)))
    }
}

impl StudioBackend for FallbackBackend {
    fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
        match self.relay.generate_image(request) {
            Ok(image) => Ok(image),
            Err(relay_err) => {
                log::warn!(
                    "Backend server unavailable or failed. Falling back to client-side generation: {relay_err:#}"
                );
                self.direct.generate_image(request).inspect_err(|err| {
                    log::error!("Client-side generation error: {err:#}");
                })
            }
        }
    }

    fn optimize_prompt(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Ok(String::new());
        }
        match self.relay.optimize_prompt(prompt) {
            Ok(optimized) => Ok(optimized),
            Err(relay_err) => {
                log::warn!(
                    "Backend server unavailable or failed. Falling back to client-side optimization: {relay_err:#}"
                );
                match self.direct.optimize_prompt(prompt) {
                    Ok(optimized) => Ok(optimized),
                    Err(err) => {
                        log::error!("Client-side optimization error: {err:#}");
                        Ok(prompt.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use nanostudio_contracts::api::{GenerateImageRequest, OptimizePromptRequest};
    use nanostudio_contracts::AspectRatio;
    use rouille::Response;
    use serde_json::json;

    use super::FallbackBackend;
    use crate::backend::{DirectBackend, StudioBackend};
    use crate::providers::DryrunProvider;
    use crate::relay_client::RelayClient;
    use crate::test_support::{closed_port_url, StubServer};

    /// Counts calls and answers with a fixed outcome.
    struct ScriptedBackend {
        calls: Arc<AtomicUsize>,
        answer: Option<&'static str>,
    }

    impl ScriptedBackend {
        fn boxed(answer: Option<&'static str>) -> (Box<dyn StudioBackend>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    calls: Arc::clone(&calls),
                    answer,
                }),
                calls,
            )
        }

        fn respond(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(answer) => Ok(answer.to_string()),
                None => bail!("scripted failure"),
            }
        }
    }

    impl StudioBackend for ScriptedBackend {
        fn generate_image(&self, _request: &GenerateImageRequest) -> Result<String> {
            self.respond()
        }

        fn optimize_prompt(&self, _prompt: &str) -> Result<String> {
            self.respond()
        }
    }

    /// Records what the direct path was asked to do.
    #[derive(Clone, Default)]
    struct RecordingBackend {
        images: Arc<Mutex<Vec<GenerateImageRequest>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl StudioBackend for RecordingBackend {
        fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
            if let Ok(mut rows) = self.images.lock() {
                rows.push(request.clone());
            }
            Ok("data:image/png;base64,DIRECT".to_string())
        }

        fn optimize_prompt(&self, prompt: &str) -> Result<String> {
            if let Ok(mut rows) = self.prompts.lock() {
                rows.push(prompt.to_string());
            }
            Ok(format!("{prompt}, directly"))
        }
    }

    #[test]
    fn direct_attempt_repeats_the_relay_request() -> Result<()> {
        let relay_bodies: Arc<Mutex<Vec<(String, Vec<u8>)>>> = Arc::default();
        let captured = Arc::clone(&relay_bodies);
        let stub = StubServer::start(move |request| {
            let mut body = Vec::new();
            if let Some(mut data) = request.data() {
                let _ = std::io::Read::read_to_end(&mut data, &mut body);
            }
            if let Ok(mut rows) = captured.lock() {
                rows.push((request.url(), body));
            }
            Response::json(&json!({"error": "overloaded"})).with_status_code(502)
        })?;
        let relay = RelayClient::new(&stub.url("/api"), None)?;
        let direct = RecordingBackend::default();
        let backend = FallbackBackend::new(Box::new(relay), Box::new(direct.clone()));

        let request = GenerateImageRequest::new("turn the sky violet")
            .with_image("data:image/jpeg;base64,REF")
            .with_aspect_ratio(AspectRatio::Portrait);
        assert_eq!(backend.generate_image(&request)?, "data:image/png;base64,DIRECT");
        assert_eq!(
            backend.optimize_prompt("a violet sky")?,
            "a violet sky, directly"
        );

        let relay_rows = relay_bodies
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?;
        assert_eq!(relay_rows.len(), 2);
        assert_eq!(relay_rows[0].0, "/api/generate-image");
        let sent_to_relay: GenerateImageRequest = serde_json::from_slice(&relay_rows[0].1)?;
        assert_eq!(relay_rows[1].0, "/api/optimize-prompt");
        let optimize_to_relay: OptimizePromptRequest = serde_json::from_slice(&relay_rows[1].1)?;

        let direct_images = direct
            .images
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?;
        assert_eq!(direct_images.as_slice(), [sent_to_relay.clone()].as_slice());
        assert_eq!(sent_to_relay, request);

        let direct_prompts = direct
            .prompts
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?;
        assert_eq!(direct_prompts.as_slice(), [optimize_to_relay.prompt].as_slice());
        Ok(())
    }

    #[test]
    fn healthy_relay_skips_direct_call() -> Result<()> {
        let (relay, relay_calls) = ScriptedBackend::boxed(Some("from-relay"));
        let (direct, direct_calls) = ScriptedBackend::boxed(Some("from-direct"));
        let backend = FallbackBackend::new(relay, direct);

        assert_eq!(backend.generate_image(&GenerateImageRequest::new("p"))?, "from-relay");
        assert_eq!(backend.optimize_prompt("p")?, "from-relay");
        assert_eq!(relay_calls.load(Ordering::SeqCst), 2);
        assert_eq!(direct_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn relay_failure_triggers_exactly_one_direct_attempt() -> Result<()> {
        let (relay, relay_calls) = ScriptedBackend::boxed(None);
        let (direct, direct_calls) = ScriptedBackend::boxed(None);
        let backend = FallbackBackend::new(relay, direct);

        let err = backend
            .generate_image(&GenerateImageRequest::new("p"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "scripted failure");
        assert_eq!(relay_calls.load(Ordering::SeqCst), 1);
        assert_eq!(direct_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn optimize_swallows_direct_failure() -> Result<()> {
        let (relay, _) = ScriptedBackend::boxed(None);
        let (direct, direct_calls) = ScriptedBackend::boxed(None);
        let backend = FallbackBackend::new(relay, direct);

        assert_eq!(backend.optimize_prompt("keep me")?, "keep me");
        assert_eq!(direct_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn blank_optimize_makes_no_calls() -> Result<()> {
        let (relay, relay_calls) = ScriptedBackend::boxed(Some("x"));
        let (direct, direct_calls) = ScriptedBackend::boxed(Some("y"));
        let backend = FallbackBackend::new(relay, direct);

        assert_eq!(backend.optimize_prompt("   ")?, "");
        assert_eq!(relay_calls.load(Ordering::SeqCst), 0);
        assert_eq!(direct_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn relay_error_status_falls_back_to_provider() -> Result<()> {
        let hits = Arc::new(AtomicUsize::new(0));
        let relay_hits = Arc::clone(&hits);
        let stub = StubServer::start(move |_request| {
            relay_hits.fetch_add(1, Ordering::SeqCst);
            Response::json(&json!({"error": "quota exhausted"})).with_status_code(503)
        })?;
        let relay = RelayClient::new(&stub.url("/api"), None)?;
        let direct = DirectBackend::new(Arc::new(DryrunProvider), "dryrun", "dryrun");
        let backend = FallbackBackend::new(Box::new(relay), Box::new(direct));

        let image = backend.generate_image(&GenerateImageRequest::new("a harbor at dusk"))?;
        assert!(image.starts_with("data:image/png;base64,"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn unreachable_relay_falls_back_to_provider() -> Result<()> {
        let relay = RelayClient::new(&closed_port_url("/api")?, None)?;
        let direct = DirectBackend::new(Arc::new(DryrunProvider), "dryrun", "dryrun");
        let backend = FallbackBackend::new(Box::new(relay), Box::new(direct));

        let optimized = backend.optimize_prompt("a harbor at dusk")?;
        assert!(optimized.starts_with("a harbor at dusk, "));
        Ok(())
    }
}
