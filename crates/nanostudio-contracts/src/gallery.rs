use std::collections::VecDeque;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::modes::AppMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub prompt: String,
    pub mode: AppMode,
    pub timestamp: i64,
}

impl GeneratedImage {
    pub fn download_file_name(&self) -> String {
        format!("nano-banana-{}.png", self.id)
    }
}

/// Session-only list of generated images, most recent first.
///
/// Ids come from the millisecond clock; a second image in the same
/// millisecond takes the next free value so ids never repeat.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    images: VecDeque<GeneratedImage>,
    last_id: Option<i64>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        url: impl Into<String>,
        prompt: impl Into<String>,
        mode: AppMode,
    ) -> &GeneratedImage {
        self.record_at(Utc::now().timestamp_millis(), url, prompt, mode)
    }

    pub fn record_at(
        &mut self,
        timestamp_ms: i64,
        url: impl Into<String>,
        prompt: impl Into<String>,
        mode: AppMode,
    ) -> &GeneratedImage {
        let id = match self.last_id {
            Some(last) if timestamp_ms <= last => last + 1,
            _ => timestamp_ms,
        };
        self.last_id = Some(id);
        self.images.push_front(GeneratedImage {
            id: id.to_string(),
            url: url.into(),
            prompt: prompt.into(),
            mode,
            timestamp: timestamp_ms,
        });
        &self.images[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.images.iter()
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.images.iter().find(|image| image.id == id)
    }

    /// 1-based position as shown in listings.
    pub fn nth(&self, position: usize) -> Option<&GeneratedImage> {
        position
            .checked_sub(1)
            .and_then(|index| self.images.get(index))
    }

    pub fn latest(&self) -> Option<&GeneratedImage> {
        self.images.front()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
