use std::fmt;

use serde::{Deserialize, Serialize};

/// What the studio is asked to do with the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMode {
    #[default]
    TextToImage,
    ImageToImage,
    ImageEdit,
}

impl AppMode {
    pub const ALL: [AppMode; 3] = [
        AppMode::TextToImage,
        AppMode::ImageToImage,
        AppMode::ImageEdit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::TextToImage => "TEXT_TO_IMAGE",
            AppMode::ImageToImage => "IMAGE_TO_IMAGE",
            AppMode::ImageEdit => "IMAGE_EDIT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppMode::TextToImage => "Text to Image",
            AppMode::ImageToImage => "Image to Image",
            AppMode::ImageEdit => "Image Edit",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AppMode::TextToImage => "Create from Text",
            AppMode::ImageToImage => "Reimagine Image",
            AppMode::ImageEdit => "Edit with Instructions",
        }
    }

    pub fn prompt_label(&self) -> &'static str {
        match self {
            AppMode::ImageEdit => "Instructions",
            _ => "Prompt",
        }
    }

    pub fn tip(&self) -> &'static str {
        match self {
            AppMode::TextToImage => {
                "Use the 'Optimize' button to turn simple ideas into detailed, artistic prompts."
            }
            AppMode::ImageToImage => {
                "The model will use your image as a structural reference. Strong prompts work best."
            }
            AppMode::ImageEdit => "Describe exactly what you want to change or add to the scene.",
        }
    }

    /// Image modes cannot be submitted without a reference image.
    pub fn requires_image(&self) -> bool {
        matches!(self, AppMode::ImageToImage | AppMode::ImageEdit)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "text" | "text_to_image" | "t2i" => Some(AppMode::TextToImage),
            "image" | "image_to_image" | "i2i" | "reimagine" => Some(AppMode::ImageToImage),
            "edit" | "image_edit" => Some(AppMode::ImageEdit),
            _ => None,
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Wide,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .or(match normalized.as_str() {
                "square" => Some(AspectRatio::Square),
                "portrait" => Some(AspectRatio::Portrait),
                "landscape" => Some(AspectRatio::Landscape),
                "wide" => Some(AspectRatio::Wide),
                "tall" => Some(AspectRatio::Tall),
                _ => None,
            })
    }

    /// Pixel dimensions whose longest side is `long_edge`.
    pub fn dimensions(&self, long_edge: u32) -> (u32, u32) {
        let (w, h) = match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Landscape => (4, 3),
            AspectRatio::Wide => (16, 9),
            AspectRatio::Tall => (9, 16),
        };
        let long_edge = long_edge.max(1);
        if w >= h {
            (long_edge, (long_edge * h / w).max(1))
        } else {
            ((long_edge * w / h).max(1), long_edge)
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub aspect_ratio: AspectRatio,
}
