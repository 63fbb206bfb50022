use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use niawase_core::config::AppConfig;
use niawase_engine::controller::{Collaborators, ControllerConfig, WorkflowController};
use thiserror::Error;

use crate::callable::{CallableDiagnosisService, CallableSynthesisService};
use crate::identity::AnonymousIdentityProvider;
use crate::profile_store::JsonFileProfileStore;
use crate::secrets::{API_KEY_ENV, resolve_api_key};
use crate::session_cache::{KeyringSessionCache, SessionCache};
use crate::storage::HttpObjectStorage;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no API key configured; run `niawase set-api-key` or set {API_KEY_ENV}")]
    MissingApiKey,
}

pub fn controller_config(cfg: &AppConfig) -> ControllerConfig {
    ControllerConfig {
        default_style: cfg.default_style.clone(),
        restart_policy: cfg.restart_policy,
        diagnosis_timeout: Duration::from_secs(cfg.effective_diagnosis_timeout_secs()),
        synthesis_timeout: Duration::from_secs(cfg.synthesis_timeout_secs),
    }
}

/// Wire the HTTP-backed collaborators described by `cfg`.
///
/// A relative `profile_store_path` is resolved against `base_dir`. The
/// account's refresh token goes to `sessions`, so a later run signs in as
/// the same owner and can resume its uploads.
pub fn build_controller_with_key(
    cfg: &AppConfig,
    api_key: &str,
    sessions: Arc<dyn SessionCache>,
    base_dir: &Path,
) -> WorkflowController {
    let profile_path = base_dir.join(&cfg.profile_store_path);
    let controller_cfg = controller_config(cfg);

    // The engine enforces the real deadline; the HTTP layer gets a little
    // slack so the engine's timeout is the one that fires.
    let slack = Duration::from_secs(5);
    let collaborators = Collaborators {
        identity: Arc::new(
            AnonymousIdentityProvider::new(cfg.identity_base_url.clone(), api_key)
                .with_session_cache(cfg.token_base_url.clone(), sessions),
        ),
        storage: Arc::new(HttpObjectStorage::new(
            cfg.storage_base_url.clone(),
            UPLOAD_TIMEOUT,
        )),
        profiles: Arc::new(JsonFileProfileStore::at_path(profile_path)),
        diagnosis: Arc::new(CallableDiagnosisService::new(
            cfg.functions_base_url.clone(),
            controller_cfg.diagnosis_timeout + slack,
        )),
        synthesis: Arc::new(CallableSynthesisService::new(
            cfg.functions_base_url.clone(),
            controller_cfg.synthesis_timeout + slack,
        )),
    };

    log::debug!("building controller: {controller_cfg:?}");
    WorkflowController::new(controller_cfg, collaborators)
}

/// Like [`build_controller_with_key`], reading the API key from the
/// environment or the OS keyring and keeping the session in the keyring.
pub fn build_controller_from_config(
    cfg: &AppConfig,
    base_dir: &Path,
) -> anyhow::Result<WorkflowController> {
    let api_key = resolve_api_key()?.ok_or(BuildError::MissingApiKey)?;
    Ok(build_controller_with_key(
        cfg,
        &api_key,
        Arc::new(KeyringSessionCache),
        base_dir,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_app_config;

    #[test]
    fn controller_config_applies_the_diagnosis_floor() {
        let mut cfg = default_app_config();
        cfg.diagnosis_timeout_secs = 10;
        cfg.synthesis_timeout_secs = 90;
        let c = controller_config(&cfg);
        assert_eq!(c.diagnosis_timeout, Duration::from_secs(240));
        assert_eq!(c.synthesis_timeout, Duration::from_secs(90));
    }
}
