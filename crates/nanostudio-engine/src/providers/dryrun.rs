use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::{ContentProvider, ImageGenerationRequest, InlineImage, TextGenerationRequest};
use crate::prompts::original_prompt_from_contents;

const DRYRUN_LONG_EDGE: u32 = 256;
const DRYRUN_STYLE_SUFFIX: &str =
    "cinematic lighting, rich surface texture, intricate detail, artistic composition, 8k";

/// Offline provider: solid-colour PNGs keyed on the prompt, canned prompt rewrites.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunProvider;

impl ContentProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_image(&self, request: &ImageGenerationRequest) -> Result<Option<InlineImage>> {
        let (width, height) = request
            .aspect_ratio
            .unwrap_or_default()
            .dimensions(DRYRUN_LONG_EDGE);
        let reference = request
            .reference_image
            .as_ref()
            .map(|image| image.data.as_str())
            .unwrap_or_default();
        let (r, g, b) = color_from_prompt(&request.prompt, reference);
        let bytes = encode_solid_png(width, height, [r, g, b])?;
        Ok(Some(InlineImage {
            mime_type: "image/png".to_string(),
            data: BASE64.encode(bytes),
        }))
    }

    fn generate_text(&self, request: &TextGenerationRequest) -> Result<Option<String>> {
        let Some(prompt) = original_prompt_from_contents(&request.contents) else {
            return Ok(None);
        };
        let prompt = prompt.trim().trim_end_matches(['.', ',']);
        if prompt.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("{prompt}, {DRYRUN_STYLE_SUFFIX}")))
    }
}

fn color_from_prompt(prompt: &str, reference: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(reference.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn encode_solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
    let image = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode dryrun PNG")?;
    Ok(out.into_inner())
}
