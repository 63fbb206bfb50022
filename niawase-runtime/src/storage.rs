use crate::callable::map_transport_error;
use niawase_core::types::{Locator, MediaFile, SlotId};
use niawase_engine::error::WorkflowError;
use niawase_engine::traits::{Identity, ObjectStorage};
use niawase_providers::runtime::execute;
use niawase_providers::storage::{
    ObjectStorageConfig, build_upload_request, object_name, parse_upload_response,
};
use std::time::Duration;

/// Uploads media over the bucket's REST endpoint with the caller's ID token.
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    base_url: String,
    timeout: Duration,
}

impl HttpObjectStorage {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(
        &self,
        identity: &Identity,
        slot: SlotId,
        file: &MediaFile,
    ) -> Result<Locator, WorkflowError> {
        let failure = |message: String| WorkflowError::UploadFailure { slot, message };

        let cfg = ObjectStorageConfig {
            base_url: self.base_url.clone(),
            id_token: identity.id_token.clone(),
        };
        let name = object_name(identity.owner.as_str(), slot.as_str(), &file.file_name);
        let req = build_upload_request(&cfg, &name, &file.mime_type, file.bytes.clone());

        log::debug!("uploading {name} ({} bytes)", file.bytes.len());
        let resp = execute(&req, self.timeout)
            .await
            .map_err(|e| failure(map_transport_error("upload", e).to_string()))?;
        if !resp.is_success() {
            return Err(failure(format!(
                "status={} body={}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            )));
        }

        let url = parse_upload_response(&cfg, &resp.body).map_err(|e| failure(format!("{e:#}")))?;
        Ok(Locator::new(url))
    }
}
