use crate::error::{InitError, WorkflowError};
use async_trait::async_trait;
use niawase_core::types::{Gender, Locator, MediaFile, OwnerId, SlotId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Authenticated principal produced once by the bootstrap step.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub owner: OwnerId,
    pub id_token: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(owner: OwnerId, id_token: impl Into<String>) -> Self {
        Self {
            owner,
            id_token: id_token.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        !self.owner.as_str().is_empty() && !self.id_token.is_empty()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("owner", &self.owner)
            .field("id_token", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Partial profile write; `None` fields and absent slots are left untouched.
/// `reset_uploads` drops every stored locator before `uploads` is applied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub uploads: BTreeMap<SlotId, Locator>,
    #[serde(default)]
    pub reset_uploads: bool,
}

impl ProfilePatch {
    pub fn upload(slot: SlotId, locator: Locator) -> Self {
        Self {
            uploads: BTreeMap::from([(slot, locator)]),
            ..Default::default()
        }
    }

    pub fn forget_uploads() -> Self {
        Self {
            reset_uploads: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub uploads: BTreeMap<SlotId, Locator>,
}

impl ProfileRecord {
    pub fn merge(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(gender) = patch.gender {
            self.gender = Some(gender);
        }
        if patch.reset_uploads {
            self.uploads.clear();
        }
        self.uploads.extend(patch.uploads);
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self) -> Result<Identity, InitError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(
        &self,
        identity: &Identity,
        slot: SlotId,
        file: &MediaFile,
    ) -> Result<Locator, WorkflowError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn merge(&self, identity: &Identity, patch: ProfilePatch) -> Result<(), WorkflowError>;
    async fn load(&self, identity: &Identity) -> Result<Option<ProfileRecord>, WorkflowError>;
}

/// Remote diagnosis procedure. Returns the raw result document; shape
/// validation is the caller's job.
#[async_trait]
pub trait DiagnosisService: Send + Sync {
    async fn diagnose(&self, identity: &Identity) -> Result<Value, WorkflowError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub original_image: Locator,
}

/// Remote image synthesis procedure. Returns decoded image bytes.
#[async_trait]
pub trait SynthesisService: Send + Sync {
    async fn synthesize(
        &self,
        identity: &Identity,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, WorkflowError>;
}
