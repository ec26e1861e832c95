use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Upload prefixes removed before an image is forwarded to the provider.
const STRIPPABLE_IMAGE_SUBTYPES: &[&str] = &["png", "jpeg", "jpg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: String,
}

impl DataUri {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.data.as_bytes())
    }
}

/// Drops a leading `data:image/(png|jpeg|jpg|webp);base64,` declaration.
/// Anything else is returned untouched.
pub fn strip_image_data_prefix(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("data:image/") else {
        return raw;
    };
    for subtype in STRIPPABLE_IMAGE_SUBTYPES {
        if let Some(payload) = rest
            .strip_prefix(subtype)
            .and_then(|tail| tail.strip_prefix(";base64,"))
        {
            return payload;
        }
    }
    raw
}

pub fn png_data_uri(base64_payload: &str) -> String {
    format!("{PNG_DATA_URI_PREFIX}{base64_payload}")
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// Parses `data:<mime>;base64,<payload>`. Non-base64 data URIs are rejected.
pub fn parse_data_uri(raw: &str) -> Option<DataUri> {
    let rest = raw.trim().strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    if mime_type.is_empty() {
        return None;
    }
    Some(DataUri {
        mime_type: mime_type.to_ascii_lowercase(),
        data: data.to_string(),
    })
}

pub fn image_mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}
