pub mod api;
pub mod chat;
pub mod data_uri;
pub mod gallery;
pub mod library;
pub mod modes;

pub use gallery::{Gallery, GeneratedImage};
pub use modes::{AppMode, AspectRatio, GenerationConfig};
