use crate::callable::map_transport_error;
use crate::session_cache::SessionCache;
use niawase_core::types::OwnerId;
use niawase_engine::error::InitError;
use niawase_engine::traits::{Identity, IdentityProvider};
use niawase_providers::identity::{
    IdentityConfig, build_anonymous_sign_up_request, build_token_refresh_request,
    parse_sign_up_response, parse_token_refresh_response,
};
use niawase_providers::request::HttpRequest;
use niawase_providers::runtime::{HttpResponse, execute};
use std::sync::Arc;
use std::time::Duration;

const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(30);

/// Signs in anonymously. With a session cache the account is reused across
/// runs through its refresh token; without one every bootstrap signs up anew.
#[derive(Clone)]
pub struct AnonymousIdentityProvider {
    cfg: IdentityConfig,
    refresh: Option<(String, Arc<dyn SessionCache>)>,
}

impl std::fmt::Debug for AnonymousIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymousIdentityProvider")
            .field("cfg", &self.cfg)
            .field("token_base_url", &self.refresh.as_ref().map(|(url, _)| url))
            .finish()
    }
}

impl AnonymousIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            cfg: IdentityConfig {
                base_url: base_url.into(),
                api_key: api_key.into(),
            },
            refresh: None,
        }
    }

    pub fn with_session_cache(
        mut self,
        token_base_url: impl Into<String>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        self.refresh = Some((token_base_url.into(), cache));
        self
    }

    async fn sign_up(&self) -> Result<Identity, InitError> {
        let req = build_anonymous_sign_up_request(&self.cfg);
        let resp = send(&req, "sign-up").await?;
        if !resp.is_success() {
            return Err(rejected(&resp));
        }

        let signed_up =
            parse_sign_up_response(&resp.body).map_err(|e| InitError::SignIn(format!("{e:#}")))?;
        if let (Some((_, cache)), Some(token)) = (&self.refresh, &signed_up.refresh_token) {
            if let Err(e) = cache.save(token) {
                log::warn!("could not keep the session for the next run: {e:#}");
            }
        }

        let mut identity = Identity::new(OwnerId::new(signed_up.local_id), signed_up.id_token);
        identity.display_name = signed_up.display_name.filter(|n| !n.trim().is_empty());
        Ok(identity)
    }

    /// `Ok(None)` when there is no stored session or the service no longer
    /// accepts it.
    async fn refresh_stored(
        &self,
        token_base_url: &str,
        cache: &dyn SessionCache,
    ) -> Result<Option<Identity>, InitError> {
        let stored = match cache.load() {
            Ok(Some(t)) => t,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("session cache unavailable: {e:#}");
                return Ok(None);
            }
        };

        let req = build_token_refresh_request(token_base_url, &self.cfg, &stored);
        let resp = send(&req, "token refresh").await?;
        if !resp.is_success() {
            log::warn!("stored session rejected (status={}); signing up again", resp.status);
            if let Err(e) = cache.clear() {
                log::warn!("could not clear the stored session: {e:#}");
            }
            return Ok(None);
        }

        let refreshed = parse_token_refresh_response(&resp.body)
            .map_err(|e| InitError::SignIn(format!("{e:#}")))?;
        if let Err(e) = cache.save(&refreshed.refresh_token) {
            log::warn!("could not keep the session for the next run: {e:#}");
        }
        log::debug!("reusing account {}", refreshed.user_id);
        Ok(Some(Identity::new(
            OwnerId::new(refreshed.user_id),
            refreshed.id_token,
        )))
    }
}

async fn send(req: &HttpRequest, what: &str) -> Result<HttpResponse, InitError> {
    execute(req, SIGN_IN_TIMEOUT)
        .await
        .map_err(|e| InitError::SignIn(map_transport_error(what, e).to_string()))
}

fn rejected(resp: &HttpResponse) -> InitError {
    InitError::SignIn(format!(
        "status={} body={}",
        resp.status,
        String::from_utf8_lossy(&resp.body)
    ))
}

#[async_trait::async_trait]
impl IdentityProvider for AnonymousIdentityProvider {
    async fn sign_in(&self) -> Result<Identity, InitError> {
        if let Some((token_base_url, cache)) = &self.refresh {
            if let Some(identity) = self.refresh_stored(token_base_url, cache.as_ref()).await? {
                return Ok(identity);
            }
        }
        self.sign_up().await
    }
}
