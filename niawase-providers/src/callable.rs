use crate::request::{Body, HttpRequest, join_url};
use crate::runtime::HttpResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

pub const DIAGNOSIS_FUNCTION: &str = "generateDiagnosis";
pub const SYNTHESIS_FUNCTION: &str = "generateImage";

#[derive(Clone, PartialEq, Eq)]
pub struct CallableConfig {
    pub base_url: String,
    pub id_token: String,
}

impl std::fmt::Debug for CallableConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableConfig")
            .field("base_url", &self.base_url)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// Canonical status codes carried in a callable error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableStatus {
    Unauthenticated,
    NotFound,
    InvalidArgument,
    DeadlineExceeded,
    Unavailable,
    Internal,
    Other,
}

impl CallableStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "NOT_FOUND" => Self::NotFound,
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "DEADLINE_EXCEEDED" => Self::DeadlineExceeded,
            "UNAVAILABLE" => Self::Unavailable,
            "INTERNAL" => Self::Internal,
            _ => Self::Other,
        }
    }

    fn from_http(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 | 403 => Self::Unauthenticated,
            404 => Self::NotFound,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{status:?}: {message}")]
pub struct CallableError {
    pub status: CallableStatus,
    pub message: String,
}

pub fn build_callable_request(cfg: &CallableConfig, function: &str, data: Value) -> HttpRequest {
    let mut headers = vec![("Content-Type".into(), "application/json".into())];
    if !cfg.id_token.is_empty() {
        headers.push(("Authorization".into(), format!("Bearer {}", cfg.id_token)));
    }

    HttpRequest {
        method: "POST".into(),
        url: join_url(&cfg.base_url, function),
        headers,
        body: Body::Json(json!({ "data": data }).to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, alias = "data")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Unwraps the `result` of a callable response or maps its error envelope.
pub fn parse_callable_response(resp: &HttpResponse) -> Result<Value, CallableError> {
    let envelope: Option<Envelope> = serde_json::from_slice(&resp.body).ok();

    if let Some(err) = envelope.as_ref().and_then(|e| e.error.as_ref()) {
        let message = if err.message.is_empty() {
            format!("remote call failed (http {})", resp.status)
        } else {
            err.message.clone()
        };
        return Err(CallableError {
            status: CallableStatus::parse(&err.status),
            message,
        });
    }

    if !resp.is_success() {
        return Err(CallableError {
            status: CallableStatus::from_http(resp.status),
            message: format!(
                "remote call failed: status={} body={}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            ),
        });
    }

    match envelope {
        Some(Envelope {
            result: Some(v), ..
        }) => Ok(v),
        Some(_) => Err(CallableError {
            status: CallableStatus::Internal,
            message: "response did not contain a result".into(),
        }),
        None => Err(CallableError {
            status: CallableStatus::Internal,
            message: "response was not a JSON envelope".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn builds_authorized_envelope_request() {
        let cfg = CallableConfig {
            base_url: "https://asia-northeast1-demo.cloudfunctions.net/".into(),
            id_token: "tok".into(),
        };
        let req = build_callable_request(&cfg, SYNTHESIS_FUNCTION, json!({"prompt": "p"}));
        assert_eq!(req.method, "POST");
        assert_eq!(
            req.url,
            "https://asia-northeast1-demo.cloudfunctions.net/generateImage"
        );
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        match req.body {
            Body::Json(s) => {
                let v: Value = serde_json::from_str(&s).unwrap();
                assert_eq!(v["data"]["prompt"], "p");
            }
            _ => panic!("expected json"),
        }
        assert!(!format!("{cfg:?}").contains("tok"));
    }

    #[test]
    fn no_token_means_no_authorization_header() {
        let cfg = CallableConfig {
            base_url: "https://fn.example.com".into(),
            id_token: String::new(),
        };
        let req = build_callable_request(&cfg, DIAGNOSIS_FUNCTION, Value::Null);
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn unwraps_result() {
        let v = parse_callable_response(&resp(200, r#"{"result":{"base64Image":"AA=="}}"#)).unwrap();
        assert_eq!(v["base64Image"], "AA==");
    }

    #[test]
    fn maps_error_envelope_status() {
        let err = parse_callable_response(&resp(
            400,
            r#"{"error":{"status":"INVALID_ARGUMENT","message":"missing images"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.status, CallableStatus::InvalidArgument);
        assert_eq!(err.message, "missing images");

        let err = parse_callable_response(&resp(
            401,
            r#"{"error":{"status":"unauthenticated","message":"login"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.status, CallableStatus::Unauthenticated);
    }

    #[test]
    fn non_json_failure_falls_back_to_http_status() {
        let err = parse_callable_response(&resp(404, "<html>nope</html>")).unwrap_err();
        assert_eq!(err.status, CallableStatus::NotFound);
        let err = parse_callable_response(&resp(502, "bad gateway")).unwrap_err();
        assert_eq!(err.status, CallableStatus::Internal);
    }

    #[test]
    fn success_without_result_is_an_error() {
        let err = parse_callable_response(&resp(200, r#"{}"#)).unwrap_err();
        assert_eq!(err.status, CallableStatus::Internal);
        let err = parse_callable_response(&resp(200, "plain")).unwrap_err();
        assert_eq!(err.status, CallableStatus::Internal);
    }
}
