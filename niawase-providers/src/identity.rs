use crate::request::{Body, HttpRequest, join_url};
use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::json;

#[derive(Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

pub fn build_anonymous_sign_up_request(cfg: &IdentityConfig) -> HttpRequest {
    HttpRequest {
        method: "POST".into(),
        url: join_url(&cfg.base_url, "/v1/accounts:signUp"),
        headers: vec![
            ("Content-Type".into(), "application/json".into()),
            ("X-Goog-Api-Key".into(), cfg.api_key.clone()),
        ],
        body: Body::Json(json!({ "returnSecureToken": true }).to_string()),
    }
}

/// Exchanges a refresh token from an earlier sign-up for a new ID token.
/// The token service answers with the same account, so uploads stay keyed
/// by one owner across runs.
pub fn build_token_refresh_request(
    token_base_url: &str,
    cfg: &IdentityConfig,
    refresh_token: &str,
) -> HttpRequest {
    HttpRequest {
        method: "POST".into(),
        url: join_url(token_base_url, "/v1/token"),
        headers: vec![
            ("Content-Type".into(), "application/json".into()),
            ("X-Goog-Api-Key".into(), cfg.api_key.clone()),
        ],
        body: Body::Json(
            json!({ "grant_type": "refresh_token", "refresh_token": refresh_token }).to_string(),
        ),
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub id_token: String,
    pub local_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for SignUpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpResponse")
            .field("id_token", &"[REDACTED]")
            .field("local_id", &self.local_id)
            .field("display_name", &self.display_name)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The token service uses snake_case, unlike the sign-up endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenRefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

impl std::fmt::Debug for TokenRefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshResponse")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

pub fn parse_token_refresh_response(body: &[u8]) -> anyhow::Result<TokenRefreshResponse> {
    let resp: TokenRefreshResponse =
        serde_json::from_slice(body).context("decode token refresh JSON")?;
    if resp.id_token.is_empty() || resp.user_id.is_empty() {
        return Err(anyhow!("token refresh response is missing id_token or user_id"));
    }
    Ok(resp)
}

pub fn parse_sign_up_response(body: &[u8]) -> anyhow::Result<SignUpResponse> {
    let resp: SignUpResponse = serde_json::from_slice(body).context("decode sign-up JSON")?;
    if resp.id_token.is_empty() || resp.local_id.is_empty() {
        return Err(anyhow!("sign-up response is missing idToken or localId"));
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_sends_key_in_header() {
        let cfg = IdentityConfig {
            base_url: "https://identitytoolkit.example.com".into(),
            api_key: "AIza-test".into(),
        };
        let req = build_anonymous_sign_up_request(&cfg);
        assert_eq!(
            req.url,
            "https://identitytoolkit.example.com/v1/accounts:signUp"
        );
        assert_eq!(req.header("x-goog-api-key"), Some("AIza-test"));
        assert!(!req.url.contains("AIza-test"));
        assert!(!format!("{req:?}").contains("AIza-test"));
    }

    #[test]
    fn parses_tokens() {
        let r = parse_sign_up_response(br#"{"idToken":"t","localId":"u1","refreshToken":"r"}"#)
            .unwrap();
        assert_eq!(r.local_id, "u1");
        assert_eq!(r.display_name, None);
        assert_eq!(r.refresh_token.as_deref(), Some("r"));
        let dbg = format!("{r:?}");
        assert!(!dbg.contains("\"t\""));
        assert!(!dbg.contains("\"r\""));
    }

    #[test]
    fn refresh_posts_the_stored_token() {
        let cfg = IdentityConfig {
            base_url: "https://identitytoolkit.example.com".into(),
            api_key: "AIza-test".into(),
        };
        let req = build_token_refresh_request("https://securetoken.example.com/", &cfg, "rt-1");
        assert_eq!(req.url, "https://securetoken.example.com/v1/token");
        assert_eq!(req.header("x-goog-api-key"), Some("AIza-test"));
        let Body::Json(body) = &req.body else {
            panic!("expected a JSON body");
        };
        let v: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(v["grant_type"], "refresh_token");
        assert_eq!(v["refresh_token"], "rt-1");
    }

    #[test]
    fn parses_refreshed_tokens() {
        let r = parse_token_refresh_response(
            br#"{"id_token":"t2","refresh_token":"r2","user_id":"u1","expires_in":"3600"}"#,
        )
        .unwrap();
        assert_eq!(r.user_id, "u1");
        assert_eq!(r.refresh_token, "r2");
        assert!(!format!("{r:?}").contains("t2"));
        assert!(parse_token_refresh_response(br#"{"id_token":"t","refresh_token":"r","user_id":""}"#).is_err());
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(parse_sign_up_response(br#"{"idToken":"","localId":"u1"}"#).is_err());
        assert!(parse_sign_up_response(br#"{"localId":"u1"}"#).is_err());
    }
}
