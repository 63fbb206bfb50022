use crate::request::{Body, HttpRequest, join_url};
use anyhow::{Context, anyhow};
use serde::Deserialize;
use url::form_urlencoded::byte_serialize;

#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    /// Bucket endpoint, e.g. `https://firebasestorage.googleapis.com/v0/b/<bucket>`.
    pub base_url: String,
    pub id_token: String,
}

impl std::fmt::Debug for ObjectStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageConfig")
            .field("base_url", &self.base_url)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// `users/{owner}/{slot}-{file_name}`
pub fn object_name(owner: &str, slot: &str, file_name: &str) -> String {
    format!("users/{owner}/{slot}-{file_name}")
}

fn encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

pub fn build_upload_request(
    cfg: &ObjectStorageConfig,
    name: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> HttpRequest {
    let url = join_url(
        &cfg.base_url,
        &format!("o?uploadType=media&name={}", encode(name)),
    );

    let mut headers = vec![("Content-Type".into(), content_type.to_string())];
    if !cfg.id_token.is_empty() {
        headers.push(("Authorization".into(), format!("Bearer {}", cfg.id_token)));
    }

    HttpRequest {
        method: "POST".into(),
        url,
        headers,
        body: Body::Bytes {
            content_type: content_type.to_string(),
            bytes,
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Turns the upload metadata into a download URL for the stored object.
pub fn parse_upload_response(cfg: &ObjectStorageConfig, body: &[u8]) -> anyhow::Result<String> {
    let meta: UploadMetadata = serde_json::from_slice(body).context("decode upload metadata")?;
    if meta.name.is_empty() {
        return Err(anyhow!("upload metadata has no object name"));
    }

    let mut url = join_url(
        &cfg.base_url,
        &format!("o/{}?alt=media", encode(&meta.name)),
    );
    // Tokens are comma-separated; any one of them grants read access.
    if let Some(token) = meta
        .download_tokens
        .as_deref()
        .and_then(|t| t.split(',').next())
        .filter(|t| !t.is_empty())
    {
        url.push_str("&token=");
        url.push_str(&encode(token));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ObjectStorageConfig {
        ObjectStorageConfig {
            base_url: "https://storage.example.com/v0/b/demo".into(),
            id_token: "tok".into(),
        }
    }

    #[test]
    fn names_objects_per_owner_and_slot() {
        assert_eq!(
            object_name("u1", "frontImage", "me.jpg"),
            "users/u1/frontImage-me.jpg"
        );
    }

    #[test]
    fn upload_request_encodes_object_name() {
        let req = build_upload_request(&cfg(), "users/u1/frontImage-me.jpg", "image/jpeg", vec![1]);
        assert_eq!(
            req.url,
            "https://storage.example.com/v0/b/demo/o?uploadType=media&name=users%2Fu1%2FfrontImage-me.jpg"
        );
        assert_eq!(req.header("content-type"), Some("image/jpeg"));
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn download_url_carries_first_token() {
        let body = br#"{"name":"users/u1/frontImage-me.jpg","downloadTokens":"t1,t2"}"#;
        let url = parse_upload_response(&cfg(), body).unwrap();
        assert_eq!(
            url,
            "https://storage.example.com/v0/b/demo/o/users%2Fu1%2FfrontImage-me.jpg?alt=media&token=t1"
        );
    }

    #[test]
    fn metadata_without_name_is_rejected() {
        assert!(parse_upload_response(&cfg(), br#"{"name":""}"#).is_err());
        assert!(parse_upload_response(&cfg(), b"oops").is_err());
    }
}
