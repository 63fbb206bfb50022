use crate::types::StyleKey;
use serde::{Deserialize, Serialize};

pub const MIN_DIAGNOSIS_TIMEOUT_SECS: u64 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Restart clears diagnosis and images but leaves uploads completed.
    #[default]
    KeepUploads,
    ResetUploads,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub functions_base_url: String,
    pub storage_base_url: String,
    pub identity_base_url: String,
    /// Exchanges a stored refresh token for a fresh ID token.
    #[serde(default = "default_token_base_url")]
    pub token_base_url: String,
    pub profile_store_path: String,

    #[serde(default = "default_diagnosis_timeout_secs")]
    pub diagnosis_timeout_secs: u64,
    #[serde(default = "default_synthesis_timeout_secs")]
    pub synthesis_timeout_secs: u64,

    #[serde(default)]
    pub default_style: StyleKey,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

impl AppConfig {
    pub fn effective_diagnosis_timeout_secs(&self) -> u64 {
        self.diagnosis_timeout_secs.max(MIN_DIAGNOSIS_TIMEOUT_SECS)
    }
}

fn default_token_base_url() -> String {
    "https://securetoken.googleapis.com".into()
}

fn default_diagnosis_timeout_secs() -> u64 {
    MIN_DIAGNOSIS_TIMEOUT_SECS
}

fn default_synthesis_timeout_secs() -> u64 {
    300
}
