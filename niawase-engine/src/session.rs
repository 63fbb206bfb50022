use crate::error::{ErrorInfo, Operation};
use crate::flight::SingleFlight;
use crate::traits::Identity;
use crate::uploads::UploadTracker;
use niawase_core::diagnosis::DiagnosisResult;
use niawase_core::types::{Profile, StyleKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Workflow phases in their forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Welcome,
    ProfileEntry,
    MediaCapture,
    /// Transient: a diagnosis request is outstanding.
    Diagnosing,
    DiagnosisReview,
    ProposalReview,
    ImageSimulation,
}

impl Phase {
    // A stable string label for UI display and logs.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Welcome => "welcome",
            Phase::ProfileEntry => "profile_entry",
            Phase::MediaCapture => "media_capture",
            Phase::Diagnosing => "diagnosing",
            Phase::DiagnosisReview => "diagnosis_review",
            Phase::ProposalReview => "proposal_review",
            Phase::ImageSimulation => "image_simulation",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub style_key: StyleKey,
    pub mime_type: String,
    pub image_data: Vec<u8>,
    pub prompt: String,
}

impl std::fmt::Debug for ImageResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResult")
            .field("style_key", &self.style_key)
            .field("mime_type", &self.mime_type)
            .field("image_len", &self.image_data.len())
            .field("prompt", &self.prompt)
            .finish()
    }
}

/// Everything one user's run through the workflow accumulates.
///
/// Fields are read through accessors; only `WorkflowController` mutates them.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) epoch: u64,
    pub(crate) phase: Phase,
    pub(crate) identity: Option<Identity>,
    pub(crate) profile: Profile,
    pub(crate) uploads: UploadTracker,
    pub(crate) diagnosis: Option<DiagnosisResult>,
    pub(crate) generated_images: BTreeMap<StyleKey, ImageResult>,
    pub(crate) selected_style: StyleKey,
    pub(crate) last_error: Option<ErrorInfo>,
    pub(crate) last_duration: Option<Duration>,
    pub(crate) diagnosing: SingleFlight,
    pub(crate) generating: SingleFlight,
}

impl Session {
    pub fn new(identity: Option<Identity>, default_style: StyleKey) -> Self {
        let profile = Profile {
            name: identity
                .as_ref()
                .and_then(|i| i.display_name.clone())
                .unwrap_or_default(),
            ..Default::default()
        };
        Self {
            epoch: 0,
            phase: Phase::Welcome,
            identity,
            profile,
            uploads: UploadTracker::new(),
            diagnosis: None,
            generated_images: BTreeMap::new(),
            selected_style: default_style,
            last_error: None,
            last_duration: None,
            diagnosing: SingleFlight::new(Operation::Diagnosis),
            generating: SingleFlight::new(Operation::Synthesis),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisResult> {
        self.diagnosis.as_ref()
    }

    pub fn image(&self, key: &StyleKey) -> Option<&ImageResult> {
        self.generated_images.get(key)
    }

    pub fn generated_images(&self) -> &BTreeMap<StyleKey, ImageResult> {
        &self.generated_images
    }

    pub fn selected_style(&self) -> &StyleKey {
        &self.selected_style
    }

    /// The image shown for the currently selected style, if any.
    pub fn displayed_image(&self) -> Option<&ImageResult> {
        self.image(&self.selected_style)
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Wall time of the most recent remote diagnosis or synthesis call.
    pub fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    pub fn is_diagnosing(&self) -> bool {
        self.diagnosing.is_busy()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.is_busy()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

pub fn ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
