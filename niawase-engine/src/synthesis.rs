use crate::error::WorkflowError;
use crate::session::ImageResult;
use crate::traits::{Identity, SynthesisRequest, SynthesisService};
use niawase_core::diagnosis::DiagnosisResult;
use niawase_core::prompt::build_synthesis_prompt;
use niawase_core::types::{Locator, StyleKey};
use std::sync::Arc;
use std::time::Duration;

pub const RESULT_MIME_TYPE: &str = "image/png";

/// Builds style prompts and calls the remote synthesis procedure.
#[derive(Clone)]
pub struct ImageSynthesisClient {
    service: Arc<dyn SynthesisService>,
    timeout: Duration,
}

impl ImageSynthesisClient {
    pub fn new(service: Arc<dyn SynthesisService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Resolves the effective prompt for `key`; fails if the diagnosis has no
    /// base prompt for it.
    pub fn prepare(
        diagnosis: &DiagnosisResult,
        key: &StyleKey,
        original_image: Locator,
        adjustment: Option<&str>,
    ) -> Result<SynthesisRequest, WorkflowError> {
        let base = diagnosis.base_prompt(key).ok_or_else(|| {
            WorkflowError::InvalidArgument(format!("no image prompt for style {key}"))
        })?;
        if base.trim().is_empty() {
            return Err(WorkflowError::InvalidArgument(format!(
                "image prompt for style {key} is empty"
            )));
        }
        Ok(SynthesisRequest {
            prompt: build_synthesis_prompt(base, adjustment),
            original_image,
        })
    }

    pub async fn request(
        &self,
        identity: &Identity,
        key: &StyleKey,
        request: &SynthesisRequest,
    ) -> Result<ImageResult, WorkflowError> {
        if !identity.is_authenticated() {
            return Err(WorkflowError::Unauthenticated);
        }

        let image_data = tokio::time::timeout(
            self.timeout,
            self.service.synthesize(identity, request),
        )
        .await
        .map_err(|_| {
            WorkflowError::RemoteFailure(format!(
                "image generation timed out after {}s",
                self.timeout.as_secs()
            ))
        })??;

        if image_data.is_empty() {
            return Err(WorkflowError::MalformedResponse(
                "image generation returned no data".into(),
            ));
        }

        Ok(ImageResult {
            style_key: key.clone(),
            mime_type: RESULT_MIME_TYPE.into(),
            image_data,
            prompt: request.prompt.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use niawase_core::diagnosis::parse_diagnosis;
    use niawase_core::types::OwnerId;
    use serde_json::json;

    fn diagnosis() -> DiagnosisResult {
        parse_diagnosis(json!({
            "analysis": {},
            "proposals": {"hairstyles": [], "hair_colors": []},
            "image_generation_prompts": {"style_1": "layered medium", "style_2": "  "}
        }))
        .unwrap()
    }

    #[test]
    fn prompt_is_base_plus_latest_adjustment() {
        let d = diagnosis();
        let key = StyleKey::new("style_1");
        let plain = ImageSynthesisClient::prepare(&d, &key, Locator::new("f"), None).unwrap();
        assert_eq!(plain.prompt, "layered medium");
        let adjusted =
            ImageSynthesisClient::prepare(&d, &key, Locator::new("f"), Some("前髪を短く")).unwrap();
        assert_eq!(adjusted.prompt, "layered medium, 前髪を短く");
        assert_eq!(adjusted.original_image, Locator::new("f"));
    }

    #[test]
    fn unknown_or_blank_style_is_invalid() {
        let d = diagnosis();
        for key in ["style_3", "style_2"] {
            let err = ImageSynthesisClient::prepare(&d, &StyleKey::new(key), Locator::new("f"), None)
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidArgument(_)));
        }
    }

    struct Empty;

    #[async_trait::async_trait]
    impl SynthesisService for Empty {
        async fn synthesize(
            &self,
            _identity: &Identity,
            _request: &SynthesisRequest,
        ) -> Result<Vec<u8>, WorkflowError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn empty_image_is_malformed() {
        let c = ImageSynthesisClient::new(Arc::new(Empty), Duration::from_secs(5));
        let req = SynthesisRequest {
            prompt: "p".into(),
            original_image: Locator::new("f"),
        };
        let err = c
            .request(&Identity::new(OwnerId::new("u"), "t"), &StyleKey::default(), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedResponse(_)));
    }
}
