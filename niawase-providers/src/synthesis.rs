use anyhow::{Context, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

pub const BASE_IMAGE_MIME_TYPE: &str = "image/jpeg";
pub const RESULT_IMAGE_MIME_TYPE: &str = "image/png";

pub fn build_synthesis_payload(prompt: &str, original_image_url: &str) -> Value {
    json!({
        "prompt": prompt,
        "originalImageUrl": original_image_url,
        "originalImageMimeType": BASE_IMAGE_MIME_TYPE,
    })
}

#[derive(Debug, Deserialize)]
struct SynthesisResult {
    #[serde(alias = "imageData")]
    #[serde(rename = "base64Image")]
    image: Option<String>,
}

/// Decodes the inline image returned by the synthesis function.
pub fn parse_synthesis_result(result: Value) -> anyhow::Result<Vec<u8>> {
    let parsed: SynthesisResult =
        serde_json::from_value(result).context("decode synthesis result")?;
    let encoded = parsed
        .image
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("no image data in synthesis result"))?;
    STANDARD
        .decode(encoded.trim())
        .context("image data is not valid base64")
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}
