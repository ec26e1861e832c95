//! UI-independent session state for the studio.
//!
//! Every rule the interface enforces lives here: submission checks,
//! in-flight flags, gallery ordering and the user-facing error strings.
//! A front end only renders this state and forwards user actions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use nanostudio_contracts::api::GenerateImageRequest;
use nanostudio_contracts::data_uri::{encode_data_uri, image_mime_for_path, parse_data_uri};
use nanostudio_contracts::library::prompt_by_number;
use nanostudio_contracts::{AppMode, AspectRatio, Gallery, GeneratedImage, GenerationConfig};

use crate::backend::StudioBackend;

pub const EMPTY_PROMPT_ERROR: &str = "Please enter a description or instruction.";
pub const MISSING_IMAGE_ERROR: &str = "Please upload a reference image.";
pub const GENERATION_FAILED_ERROR: &str = "Something went wrong while generating the image.";
pub const OPTIMIZE_FAILED_ERROR: &str = "Failed to optimize prompt. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub name: String,
    pub data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateBlocked {
    /// A generation is already in flight; the request is dropped silently.
    Busy,
    /// Rejected before any backend call; the message is also on `Studio::error`.
    Invalid(String),
}

/// A generation that passed validation and holds the `loading` flag.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    request: GenerateImageRequest,
    mode: AppMode,
}

impl PendingGeneration {
    pub fn request(&self) -> &GenerateImageRequest {
        &self.request
    }
}

#[derive(Debug, Default)]
pub struct Studio {
    pub mode: AppMode,
    pub prompt: String,
    pub selected_image: Option<SelectedImage>,
    pub config: GenerationConfig,
    pub gallery: Gallery,
    loading: bool,
    optimizing: bool,
    error: Option<String>,
}

impl Studio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn optimizing(&self) -> bool {
        self.optimizing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_mode(&mut self, mode: AppMode) {
        self.mode = mode;
        self.error = None;
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.config.aspect_ratio = aspect_ratio;
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn select_library_prompt(&mut self, number: usize) -> Option<&str> {
        let chosen = prompt_by_number(number)?;
        self.prompt = chosen.to_string();
        Some(chosen)
    }

    pub fn select_image(&mut self, name: impl Into<String>, data_uri: impl Into<String>) {
        self.selected_image = Some(SelectedImage {
            name: name.into(),
            data_uri: data_uri.into(),
        });
    }

    /// Reads an image file into a data URI, typed by extension or, failing
    /// that, by sniffing the bytes.
    pub fn select_image_file(&mut self, path: &Path) -> Result<&SelectedImage> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let mime_type = match image_mime_for_path(path) {
            Some(mime) => mime,
            None => image::guess_format(&bytes)
                .map(|format| format.to_mime_type())
                .with_context(|| format!("{} is not a recognised image", path.display()))?,
        };
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let selected: &SelectedImage = self.selected_image.insert(SelectedImage {
            name,
            data_uri: encode_data_uri(mime_type, &bytes),
        });
        Ok(selected)
    }

    pub fn clear_image(&mut self) {
        self.selected_image = None;
    }

    pub fn begin_generate(&mut self) -> Result<PendingGeneration, GenerateBlocked> {
        if self.loading {
            return Err(GenerateBlocked::Busy);
        }
        if self.prompt.trim().is_empty() {
            return Err(self.reject(EMPTY_PROMPT_ERROR));
        }
        let image = if self.mode.requires_image() {
            match &self.selected_image {
                Some(selected) => Some(selected.data_uri.clone()),
                None => return Err(self.reject(MISSING_IMAGE_ERROR)),
            }
        } else {
            None
        };

        self.loading = true;
        self.error = None;
        let mut request = GenerateImageRequest::new(self.prompt.clone())
            .with_aspect_ratio(self.config.aspect_ratio);
        if let Some(image) = image {
            request = request.with_image(image);
        }
        Ok(PendingGeneration {
            request,
            mode: self.mode,
        })
    }

    pub fn finish_generate(
        &mut self,
        pending: PendingGeneration,
        outcome: Result<String>,
    ) -> Option<&GeneratedImage> {
        self.loading = false;
        match outcome {
            Ok(url) => Some(
                self.gallery
                    .record(url, pending.request.prompt, pending.mode),
            ),
            Err(err) => {
                let message = err.to_string();
                self.error = Some(if message.trim().is_empty() {
                    GENERATION_FAILED_ERROR.to_string()
                } else {
                    message
                });
                None
            }
        }
    }

    pub fn generate(&mut self, backend: &dyn StudioBackend) -> Option<&GeneratedImage> {
        let pending = self.begin_generate().ok()?;
        let outcome = backend.generate_image(pending.request());
        self.finish_generate(pending, outcome)
    }

    /// Returns the prompt to optimize, or `None` when there is nothing to do.
    pub fn begin_optimize(&mut self) -> Option<String> {
        if self.optimizing || self.prompt.trim().is_empty() {
            return None;
        }
        self.optimizing = true;
        self.error = None;
        Some(self.prompt.clone())
    }

    pub fn finish_optimize(&mut self, outcome: Result<String>) -> bool {
        self.optimizing = false;
        match outcome {
            Ok(optimized) => {
                self.prompt = optimized;
                true
            }
            Err(err) => {
                log::error!("prompt optimization failed: {err:#}");
                self.error = Some(OPTIMIZE_FAILED_ERROR.to_string());
                false
            }
        }
    }

    pub fn optimize(&mut self, backend: &dyn StudioBackend) -> bool {
        let Some(prompt) = self.begin_optimize() else {
            return false;
        };
        let outcome = backend.optimize_prompt(&prompt);
        self.finish_optimize(outcome)
    }

    /// Writes a gallery image as `nano-banana-<id>.png`. `target` is an image
    /// id or a 1-based gallery position.
    pub fn download(&self, target: &str, dir: &Path) -> Result<PathBuf> {
        let target = target.trim();
        let image = self
            .gallery
            .get(target)
            .or_else(|| {
                target
                    .parse::<usize>()
                    .ok()
                    .and_then(|position| self.gallery.nth(position))
            })
            .ok_or_else(|| anyhow!("no gallery image matches '{target}'"))?;
        let Some(uri) = parse_data_uri(&image.url) else {
            bail!("image {} is not a base64 data URI", image.id);
        };
        let bytes = uri
            .decode()
            .with_context(|| format!("image {} has invalid base64 data", image.id))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(image.download_file_name());
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    fn reject(&mut self, message: &str) -> GenerateBlocked {
        self.error = Some(message.to_string());
        GenerateBlocked::Invalid(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::sync::Arc;

    use anyhow::{anyhow, bail, Result};
    use nanostudio_contracts::api::GenerateImageRequest;
    use nanostudio_contracts::{AppMode, AspectRatio};

    use super::{
        GenerateBlocked, Studio, EMPTY_PROMPT_ERROR, GENERATION_FAILED_ERROR,
        MISSING_IMAGE_ERROR, OPTIMIZE_FAILED_ERROR,
    };
    use crate::backend::{DirectBackend, StudioBackend};
    use crate::providers::DryrunProvider;

    #[derive(Default)]
    struct RecordingBackend {
        requests: RefCell<Vec<GenerateImageRequest>>,
        optimize_calls: RefCell<usize>,
        fail_with: Option<&'static str>,
    }

    impl StudioBackend for RecordingBackend {
        fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
            self.requests.borrow_mut().push(request.clone());
            match self.fail_with {
                Some(message) => Err(anyhow!(message)),
                None => Ok(format!("data:image/png;base64,{}", self.requests.borrow().len())),
            }
        }

        fn optimize_prompt(&self, prompt: &str) -> Result<String> {
            *self.optimize_calls.borrow_mut() += 1;
            if self.fail_with.is_some() {
                bail!("optimizer offline");
            }
            Ok(format!("{prompt}, golden hour"))
        }
    }

    #[test]
    fn blank_prompt_sets_error_without_calling_backend() {
        let backend = RecordingBackend::default();
        let mut studio = Studio::new();
        studio.set_prompt("   ");

        assert!(studio.generate(&backend).is_none());
        assert_eq!(studio.error(), Some(EMPTY_PROMPT_ERROR));
        assert!(backend.requests.borrow().is_empty());
        assert!(!studio.loading());
    }

    #[test]
    fn image_modes_require_a_reference_image() {
        let backend = RecordingBackend::default();
        let mut studio = Studio::new();
        studio.set_mode(AppMode::ImageEdit);
        studio.set_prompt("add a moon");

        assert!(studio.generate(&backend).is_none());
        assert_eq!(studio.error(), Some(MISSING_IMAGE_ERROR));
        assert!(backend.requests.borrow().is_empty());

        studio.set_mode(AppMode::ImageToImage);
        assert_eq!(studio.error(), None);
    }

    #[test]
    fn successful_generations_are_prepended() -> Result<()> {
        let backend = RecordingBackend::default();
        let mut studio = Studio::new();
        studio.set_aspect_ratio(AspectRatio::Wide);
        studio.set_prompt("first");
        studio.generate(&backend);
        studio.set_prompt("second");
        let newest = studio
            .generate(&backend)
            .cloned()
            .ok_or_else(|| anyhow!("expected an image"))?;

        assert_eq!(newest.prompt, "second");
        let prompts: Vec<&str> = studio.gallery.iter().map(|image| image.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["second", "first"]);
        assert_ne!(studio.gallery.nth(1).map(|i| &i.id), studio.gallery.nth(2).map(|i| &i.id));
        assert_eq!(backend.requests.borrow()[0].aspect_ratio, Some(AspectRatio::Wide));
        assert!(!studio.loading());
        Ok(())
    }

    #[test]
    fn selected_image_is_only_sent_in_image_modes() {
        let backend = RecordingBackend::default();
        let mut studio = Studio::new();
        studio.select_image("cat.png", "data:image/png;base64,CAT");
        studio.set_prompt("a cat astronaut");

        studio.generate(&backend);
        studio.set_mode(AppMode::ImageToImage);
        studio.generate(&backend);

        let requests = backend.requests.borrow();
        assert_eq!(requests[0].image_base64, None);
        assert_eq!(requests[1].image_base64.as_deref(), Some("data:image/png;base64,CAT"));
        assert_eq!(studio.gallery.latest().map(|i| i.mode), Some(AppMode::ImageToImage));
    }

    #[test]
    fn generation_is_ignored_while_in_flight() -> Result<()> {
        let mut studio = Studio::new();
        studio.set_prompt("a lighthouse");
        let pending = studio
            .begin_generate()
            .map_err(|blocked| anyhow!("unexpected block: {blocked:?}"))?;
        assert!(studio.loading());
        assert_eq!(studio.begin_generate().err(), Some(GenerateBlocked::Busy));

        studio.finish_generate(pending, Ok("data:image/png;base64,AA".to_string()));
        assert!(!studio.loading());
        assert_eq!(studio.gallery.len(), 1);
        Ok(())
    }

    #[test]
    fn failure_message_falls_back_when_empty() {
        let mut studio = Studio::new();
        studio.set_prompt("x");

        let failing = RecordingBackend {
            fail_with: Some("Quota exceeded"),
            ..RecordingBackend::default()
        };
        assert!(studio.generate(&failing).is_none());
        assert_eq!(studio.error(), Some("Quota exceeded"));

        let silent = RecordingBackend {
            fail_with: Some(""),
            ..RecordingBackend::default()
        };
        studio.generate(&silent);
        assert_eq!(studio.error(), Some(GENERATION_FAILED_ERROR));
        assert!(studio.gallery.is_empty());
        assert!(!studio.loading());
    }

    #[test]
    fn optimize_replaces_prompt_or_reports_failure() {
        let mut studio = Studio::new();
        let backend = RecordingBackend::default();

        assert!(!studio.optimize(&backend));
        assert_eq!(*backend.optimize_calls.borrow(), 0);

        studio.set_prompt("a fox");
        assert!(studio.optimize(&backend));
        assert_eq!(studio.prompt, "a fox, golden hour");

        let failing = RecordingBackend {
            fail_with: Some("down"),
            ..RecordingBackend::default()
        };
        assert!(!studio.optimize(&failing));
        assert_eq!(studio.prompt, "a fox, golden hour");
        assert_eq!(studio.error(), Some(OPTIMIZE_FAILED_ERROR));
        assert!(!studio.optimizing());
    }

    #[test]
    fn optimize_is_ignored_while_optimizing() {
        let mut studio = Studio::new();
        studio.set_prompt("a fox");
        assert_eq!(studio.begin_optimize().as_deref(), Some("a fox"));
        assert!(studio.begin_optimize().is_none());
        studio.finish_optimize(Ok("a red fox".to_string()));
        assert_eq!(studio.prompt, "a red fox");
    }

    #[test]
    fn library_selection_replaces_prompt() {
        let mut studio = Studio::new();
        studio.set_prompt("old");
        assert!(studio.select_library_prompt(1).is_some());
        assert_ne!(studio.prompt, "old");
        assert!(studio.select_library_prompt(99).is_none());
    }

    #[test]
    fn image_file_selection_uses_mime_type() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let jpeg = dir.path().join("photo.JPG");
        fs::write(&jpeg, b"not really a jpeg")?;

        let mut studio = Studio::new();
        let selected = studio.select_image_file(&jpeg)?;
        assert_eq!(selected.name, "photo.JPG");
        assert!(selected.data_uri.starts_with("data:image/jpeg;base64,"));

        let sniffed = dir.path().join("upload");
        fs::write(&sniffed, b"\x89PNG\r\n\x1a\n0000")?;
        let selected = studio.select_image_file(&sniffed)?;
        assert!(selected.data_uri.starts_with("data:image/png;base64,"));

        let unknown = dir.path().join("notes");
        fs::write(&unknown, b"plain text")?;
        assert!(studio.select_image_file(&unknown).is_err());

        studio.clear_image();
        assert!(studio.selected_image.is_none());
        Ok(())
    }

    #[test]
    fn download_writes_decoded_png() -> Result<()> {
        let backend = DirectBackend::new(Arc::new(DryrunProvider), "dryrun", "dryrun");
        let mut studio = Studio::new();
        studio.set_prompt("a quiet forest");
        let id = studio
            .generate(&backend)
            .map(|image| image.id.clone())
            .ok_or_else(|| anyhow!("expected an image"))?;

        let dir = tempfile::tempdir()?;
        let by_id = studio.download(&id, dir.path())?;
        assert_eq!(
            by_id.file_name().and_then(|name| name.to_str()),
            Some(format!("nano-banana-{id}.png").as_str())
        );
        let bytes = fs::read(&by_id)?;
        assert_eq!(image::guess_format(&bytes)?, image::ImageFormat::Png);

        let by_position = studio.download("1", &dir.path().join("nested"))?;
        assert!(by_position.exists());
        assert!(studio.download("missing", dir.path()).is_err());
        Ok(())
    }
}
