use crate::error::WorkflowError;
use crate::traits::{DiagnosisService, Identity};
use niawase_core::config::MIN_DIAGNOSIS_TIMEOUT_SECS;
use niawase_core::diagnosis::{DiagnosisResult, parse_diagnosis};
use std::sync::Arc;
use std::time::Duration;

/// Calls the remote diagnosis procedure and validates what comes back.
#[derive(Clone)]
pub struct DiagnosisClient {
    service: Arc<dyn DiagnosisService>,
    timeout: Duration,
}

impl DiagnosisClient {
    pub const MIN_TIMEOUT: Duration = Duration::from_secs(MIN_DIAGNOSIS_TIMEOUT_SECS);

    /// `timeout` is raised to `MIN_TIMEOUT` when shorter.
    pub fn new(service: Arc<dyn DiagnosisService>, timeout: Duration) -> Self {
        Self {
            service,
            timeout: timeout.max(Self::MIN_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn request(&self, identity: &Identity) -> Result<DiagnosisResult, WorkflowError> {
        if !identity.is_authenticated() {
            return Err(WorkflowError::Unauthenticated);
        }

        let raw = tokio::time::timeout(self.timeout, self.service.diagnose(identity))
            .await
            .map_err(|_| {
                WorkflowError::RemoteFailure(format!(
                    "diagnosis timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        parse_diagnosis(raw).map_err(|e| WorkflowError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use niawase_core::types::OwnerId;
    use serde_json::{Value, json};

    struct Fixed(Result<Value, WorkflowError>);

    #[async_trait]
    impl DiagnosisService for Fixed {
        async fn diagnose(&self, _identity: &Identity) -> Result<Value, WorkflowError> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl DiagnosisService for Slow {
        async fn diagnose(&self, _identity: &Identity) -> Result<Value, WorkflowError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(Value::Null)
        }
    }

    fn identity() -> Identity {
        Identity::new(OwnerId::new("u1"), "tok")
    }

    fn client(svc: impl DiagnosisService + 'static) -> DiagnosisClient {
        DiagnosisClient::new(Arc::new(svc), Duration::from_secs(240))
    }

    #[test]
    fn short_timeouts_are_raised_to_the_floor() {
        let c = DiagnosisClient::new(Arc::new(Slow), Duration::from_secs(5));
        assert_eq!(c.timeout(), Duration::from_secs(240));
    }

    #[tokio::test]
    async fn accepts_valid_document() {
        let doc = json!({
            "analysis": {"face": {"目": "丸い"}},
            "proposals": {"hairstyles": [], "hair_colors": []},
            "image_generation_prompts": {"style_1": "bob"}
        });
        let d = client(Fixed(Ok(doc))).request(&identity()).await.unwrap();
        assert_eq!(d.analysis["face"]["目"], "丸い");
    }

    #[tokio::test]
    async fn missing_proposals_is_malformed() {
        let doc = json!({"analysis": {}});
        let err = client(Fixed(Ok(doc))).request(&identity()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn remote_errors_pass_through() {
        let err = client(Fixed(Err(WorkflowError::NotFound("profile".into()))))
            .request(&identity())
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::NotFound("profile".into()));
    }

    #[tokio::test]
    async fn unauthenticated_identity_never_reaches_the_service() {
        let c = client(Fixed(Ok(Value::Null)));
        let err = c
            .request(&Identity::new(OwnerId::new("u1"), ""))
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_retryable_remote_failure() {
        let err = client(Slow).request(&identity()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RemoteFailure(ref m) if m.contains("timed out")));
        assert!(err.is_retryable());
    }
}
