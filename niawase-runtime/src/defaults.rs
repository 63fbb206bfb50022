use niawase_core::config::{AppConfig, MIN_DIAGNOSIS_TIMEOUT_SECS, RestartPolicy};
use niawase_core::types::StyleKey;

pub const CONFIG_FILE_NAME: &str = "niawase.json";

pub fn default_app_config() -> AppConfig {
    AppConfig {
        functions_base_url: "https://asia-northeast1-niawase.cloudfunctions.net".into(),
        storage_base_url: "https://firebasestorage.googleapis.com/v0/b/niawase.appspot.com".into(),
        identity_base_url: "https://identitytoolkit.googleapis.com".into(),
        token_base_url: "https://securetoken.googleapis.com".into(),
        profile_store_path: "niawase-profiles.json".into(),
        diagnosis_timeout_secs: MIN_DIAGNOSIS_TIMEOUT_SECS,
        synthesis_timeout_secs: 300,
        default_style: StyleKey::default(),
        restart_policy: RestartPolicy::KeepUploads,
    }
}
