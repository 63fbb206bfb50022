use niawase_engine::error::WorkflowError;
use niawase_engine::traits::{DiagnosisService, Identity, SynthesisRequest, SynthesisService};
use niawase_providers::callable::{
    CallableConfig, CallableError, CallableStatus, DIAGNOSIS_FUNCTION, SYNTHESIS_FUNCTION,
    build_callable_request, parse_callable_response,
};
use niawase_providers::runtime::{execute, is_timeout};
use niawase_providers::synthesis::{build_synthesis_payload, parse_synthesis_result};
use serde_json::Value;
use std::time::Duration;

/// Statuses the workflow distinguishes keep their own variant; the rest are
/// remote failures.
pub fn map_callable_error(e: CallableError) -> WorkflowError {
    match e.status {
        CallableStatus::Unauthenticated => WorkflowError::Unauthenticated,
        CallableStatus::NotFound => WorkflowError::NotFound(e.message),
        CallableStatus::InvalidArgument => WorkflowError::InvalidArgument(e.message),
        CallableStatus::DeadlineExceeded
        | CallableStatus::Unavailable
        | CallableStatus::Internal
        | CallableStatus::Other => WorkflowError::RemoteFailure(e.to_string()),
    }
}

pub(crate) fn map_transport_error(what: &str, e: anyhow::Error) -> WorkflowError {
    if is_timeout(&e) {
        WorkflowError::RemoteFailure(format!("{what} timed out"))
    } else {
        WorkflowError::RemoteFailure(format!("{what}: {e:#}"))
    }
}

async fn call(
    base_url: &str,
    function: &str,
    identity: &Identity,
    data: Value,
    timeout: Duration,
) -> Result<Value, WorkflowError> {
    let cfg = CallableConfig {
        base_url: base_url.to_string(),
        id_token: identity.id_token.clone(),
    };
    let req = build_callable_request(&cfg, function, data);
    let resp = execute(&req, timeout)
        .await
        .map_err(|e| map_transport_error(function, e))?;
    parse_callable_response(&resp).map_err(map_callable_error)
}

#[derive(Debug, Clone)]
pub struct CallableDiagnosisService {
    base_url: String,
    timeout: Duration,
}

impl CallableDiagnosisService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl DiagnosisService for CallableDiagnosisService {
    async fn diagnose(&self, identity: &Identity) -> Result<Value, WorkflowError> {
        // The function reads the caller's uploads server-side; no payload.
        call(
            &self.base_url,
            DIAGNOSIS_FUNCTION,
            identity,
            Value::Null,
            self.timeout,
        )
        .await
    }
}

#[derive(Debug, Clone)]
pub struct CallableSynthesisService {
    base_url: String,
    timeout: Duration,
}

impl CallableSynthesisService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl SynthesisService for CallableSynthesisService {
    async fn synthesize(
        &self,
        identity: &Identity,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, WorkflowError> {
        let data = build_synthesis_payload(&request.prompt, request.original_image.as_str());
        let result = call(
            &self.base_url,
            SYNTHESIS_FUNCTION,
            identity,
            data,
            self.timeout,
        )
        .await?;
        parse_synthesis_result(result).map_err(|e| WorkflowError::MalformedResponse(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses_into_the_taxonomy() {
        let err = |status| CallableError {
            status,
            message: "m".into(),
        };
        assert_eq!(
            map_callable_error(err(CallableStatus::Unauthenticated)),
            WorkflowError::Unauthenticated
        );
        assert_eq!(
            map_callable_error(err(CallableStatus::InvalidArgument)),
            WorkflowError::InvalidArgument("m".into())
        );
        assert_eq!(
            map_callable_error(err(CallableStatus::NotFound)),
            WorkflowError::NotFound("m".into())
        );
        assert!(matches!(
            map_callable_error(err(CallableStatus::Unavailable)),
            WorkflowError::RemoteFailure(_)
        ));
    }
}
