use crate::diagnosis::DiagnosisClient;
use crate::error::{ErrorInfo, InitError, Operation, WorkflowError};
use crate::flight::FlightPermit;
use crate::session::{ImageResult, Phase, Session, ms};
use crate::synthesis::ImageSynthesisClient;
use crate::traits::{
    DiagnosisService, Identity, IdentityProvider, ObjectStorage, ProfilePatch, ProfileStore,
    SynthesisRequest, SynthesisService,
};
use crate::uploads::UploadTracker;
use futures_util::future::join_all;
use niawase_core::config::RestartPolicy;
use niawase_core::diagnosis::DiagnosisResult;
use niawase_core::types::{Locator, MediaFile, Profile, SlotId, StyleKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const DIAGNOSIS_FAILED: &str = "AI diagnosis failed";
const SYNTHESIS_FAILED: &str = "image generation failed";

/// The photo whose locator is sent as the synthesis base image.
pub const BASE_IMAGE_SLOT: SlotId = SlotId::FrontImage;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub default_style: StyleKey,
    pub restart_policy: RestartPolicy,
    pub diagnosis_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_style: StyleKey::default(),
            restart_policy: RestartPolicy::default(),
            diagnosis_timeout: DiagnosisClient::MIN_TIMEOUT,
            synthesis_timeout: Duration::from_secs(300),
        }
    }
}

/// External collaborators the workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub profiles: Arc<dyn ProfileStore>,
    pub diagnosis: Arc<dyn DiagnosisService>,
    pub synthesis: Arc<dyn SynthesisService>,
}

/// Owns every phase transition of a `Session`.
pub struct WorkflowController {
    cfg: ControllerConfig,
    identity_provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn ObjectStorage>,
    profiles: Arc<dyn ProfileStore>,
    diagnosis: DiagnosisClient,
    synthesis: ImageSynthesisClient,
}

pub struct UploadJob {
    slot: SlotId,
    epoch: u64,
    file: MediaFile,
    identity: Identity,
    storage: Arc<dyn ObjectStorage>,
    profiles: Arc<dyn ProfileStore>,
}

pub struct UploadOutcome {
    slot: SlotId,
    epoch: u64,
    result: Result<Locator, WorkflowError>,
}

pub struct DiagnosisJob {
    epoch: u64,
    identity: Identity,
    client: DiagnosisClient,
    permit: FlightPermit,
}

pub struct DiagnosisOutcome {
    epoch: u64,
    result: Result<DiagnosisResult, WorkflowError>,
    elapsed: Duration,
    // Released when the outcome has been applied (or dropped).
    _permit: FlightPermit,
}

pub struct SynthesisJob {
    epoch: u64,
    key: StyleKey,
    request: SynthesisRequest,
    identity: Identity,
    client: ImageSynthesisClient,
    permit: FlightPermit,
}

impl std::fmt::Debug for SynthesisJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisJob")
            .field("epoch", &self.epoch)
            .field("key", &self.key)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

pub struct SynthesisOutcome {
    epoch: u64,
    key: StyleKey,
    result: Result<ImageResult, WorkflowError>,
    elapsed: Duration,
    _permit: FlightPermit,
}

impl UploadJob {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Transfers the file, then persists its locator. Both must succeed for
    /// the slot to complete.
    pub async fn run(self) -> UploadOutcome {
        let slot = self.slot;
        let result = async {
            let locator = self.storage.put(&self.identity, slot, &self.file).await?;
            self.profiles
                .merge(&self.identity, ProfilePatch::upload(slot, locator.clone()))
                .await?;
            Ok::<_, WorkflowError>(locator)
        }
        .await
        .map_err(|e| match e {
            WorkflowError::UploadFailure { .. } => e,
            other => WorkflowError::UploadFailure {
                slot,
                message: other.to_string(),
            },
        });

        UploadOutcome {
            slot,
            epoch: self.epoch,
            result,
        }
    }
}

impl DiagnosisJob {
    pub async fn run(self) -> DiagnosisOutcome {
        let t0 = Instant::now();
        let result = self.client.request(&self.identity).await;
        DiagnosisOutcome {
            epoch: self.epoch,
            result,
            elapsed: t0.elapsed(),
            _permit: self.permit,
        }
    }
}

impl SynthesisJob {
    pub fn prompt(&self) -> &str {
        &self.request.prompt
    }

    pub fn style_key(&self) -> &StyleKey {
        &self.key
    }

    pub async fn run(self) -> SynthesisOutcome {
        let t0 = Instant::now();
        let result = self
            .client
            .request(&self.identity, &self.key, &self.request)
            .await;
        SynthesisOutcome {
            epoch: self.epoch,
            key: self.key,
            result,
            elapsed: t0.elapsed(),
            _permit: self.permit,
        }
    }
}

impl WorkflowController {
    pub fn new(cfg: ControllerConfig, collaborators: Collaborators) -> Self {
        let diagnosis = DiagnosisClient::new(collaborators.diagnosis, cfg.diagnosis_timeout);
        let synthesis = ImageSynthesisClient::new(collaborators.synthesis, cfg.synthesis_timeout);
        Self {
            cfg,
            identity_provider: collaborators.identity,
            storage: collaborators.storage,
            profiles: collaborators.profiles,
            diagnosis,
            synthesis,
        }
    }

    /// Signs in once and returns a fresh session bound to that identity.
    pub async fn bootstrap(&self) -> Result<Session, InitError> {
        let identity = self.identity_provider.sign_in().await?;
        if !identity.is_authenticated() {
            return Err(InitError::NoPrincipal);
        }
        log::info!("signed in as {}", identity.owner);
        Ok(Session::new(Some(identity), self.cfg.default_style.clone()))
    }

    /// Rehydrates profile fields and completed uploads from the profile store.
    /// Returns whether a stored record was found.
    pub async fn resume(&self, session: &mut Session) -> Result<bool, WorkflowError> {
        let identity = Self::identity(session)?;
        let Some(record) = self.profiles.load(&identity).await? else {
            return Ok(false);
        };

        if let Some(name) = record.name.filter(|n| !n.trim().is_empty()) {
            session.profile.name = name;
        }
        if let Some(gender) = record.gender {
            session.profile.gender = gender;
        }
        let mut restored = 0;
        for (slot, locator) in record.uploads {
            session.uploads.restore(slot, locator);
            restored += 1;
        }
        log::info!("resumed session: {restored} upload(s) restored");
        Ok(true)
    }

    pub fn start(&self, session: &mut Session) -> Result<(), WorkflowError> {
        Self::expect_phase(session, Phase::Welcome, "start")?;
        Self::transition(session, Phase::ProfileEntry);
        Ok(())
    }

    pub async fn save_profile(
        &self,
        session: &mut Session,
        profile: Profile,
    ) -> Result<(), WorkflowError> {
        Self::expect_phase(session, Phase::ProfileEntry, "save the profile")?;
        if !profile.is_complete() {
            return Err(WorkflowError::Precondition("name is required".into()));
        }
        let identity = Self::identity(session)?;

        let patch = ProfilePatch {
            name: Some(profile.name.trim().to_string()),
            gender: Some(profile.gender),
            ..Default::default()
        };
        if let Err(e) = self.profiles.merge(&identity, patch).await {
            log::warn!("saving profile failed: {e}");
            session.last_error = Some(ErrorInfo::from_error("saving the profile failed", &e));
            return Err(e);
        }

        session.profile = profile;
        session.last_error = None;
        Self::transition(session, Phase::MediaCapture);
        Ok(())
    }

    pub fn begin_upload(
        &self,
        session: &mut Session,
        slot: SlotId,
        file: MediaFile,
    ) -> Result<UploadJob, WorkflowError> {
        Self::expect_phase(session, Phase::MediaCapture, "upload media")?;
        let identity = Self::identity(session)?;
        session
            .uploads
            .begin_upload(slot)
            .map_err(|e| WorkflowError::Precondition(e.to_string()))?;

        Ok(UploadJob {
            slot,
            epoch: session.epoch,
            file,
            identity,
            storage: self.storage.clone(),
            profiles: self.profiles.clone(),
        })
    }

    /// Applies a finished transfer. Failures only revert the slot; they are
    /// returned but not recorded as the session error.
    pub fn finish_upload(
        &self,
        session: &mut Session,
        outcome: UploadOutcome,
    ) -> Result<(), WorkflowError> {
        // Uploads survive a restart unless the tracker was reset with it.
        if outcome.epoch != session.epoch
            && self.cfg.restart_policy == RestartPolicy::ResetUploads
        {
            log::info!("dropping upload of {} from before restart", outcome.slot);
            return Ok(());
        }

        let applied = match outcome.result {
            Ok(locator) => session.uploads.complete_upload(outcome.slot, locator),
            Err(e) => {
                log::error!("{e}");
                // A stale outcome finds the slot no longer uploading; nothing to revert then.
                let _ = session.uploads.fail_upload(outcome.slot);
                return Err(e);
            }
        };
        applied.map_err(|e| WorkflowError::Precondition(e.to_string()))
    }

    pub async fn upload(
        &self,
        session: &mut Session,
        slot: SlotId,
        file: MediaFile,
    ) -> Result<(), WorkflowError> {
        let job = self.begin_upload(session, slot, file)?;
        let outcome = job.run().await;
        self.finish_upload(session, outcome)
    }

    /// Uploads several slots concurrently; each slot's result is independent.
    pub async fn upload_all(
        &self,
        session: &mut Session,
        files: Vec<(SlotId, MediaFile)>,
    ) -> Vec<(SlotId, Result<(), WorkflowError>)> {
        let mut results = Vec::new();
        let mut jobs = Vec::new();
        for (slot, file) in files {
            match self.begin_upload(session, slot, file) {
                Ok(job) => jobs.push(job),
                Err(e) => results.push((slot, Err(e))),
            }
        }

        let outcomes = join_all(jobs.into_iter().map(UploadJob::run)).await;
        for outcome in outcomes {
            let slot = outcome.slot;
            results.push((slot, self.finish_upload(session, outcome)));
        }
        results
    }

    /// MediaCapture -> Diagnosing. Rejected unless every slot is completed.
    pub fn begin_diagnosis(&self, session: &mut Session) -> Result<DiagnosisJob, WorkflowError> {
        Self::expect_phase(session, Phase::MediaCapture, "request a diagnosis")?;
        if !session.uploads.is_all_complete() {
            let missing: Vec<&str> = session
                .uploads
                .missing()
                .into_iter()
                .map(SlotId::as_str)
                .collect();
            return Err(WorkflowError::Precondition(format!(
                "uploads not completed: {}",
                missing.join(", ")
            )));
        }
        let identity = match Self::identity(session) {
            Ok(identity) => identity,
            Err(e) => {
                session.last_error = Some(ErrorInfo::from_error(DIAGNOSIS_FAILED, &e));
                return Err(e);
            }
        };
        let permit = session.diagnosing.try_acquire()?;

        session.last_error = None;
        Self::transition(session, Phase::Diagnosing);
        Ok(DiagnosisJob {
            epoch: session.epoch,
            identity,
            client: self.diagnosis.clone(),
            permit,
        })
    }

    /// Diagnosing -> DiagnosisReview on success, back to MediaCapture with a
    /// user-visible error otherwise. Uploads are left as they are.
    pub fn finish_diagnosis(
        &self,
        session: &mut Session,
        outcome: DiagnosisOutcome,
    ) -> Result<(), WorkflowError> {
        if outcome.epoch != session.epoch || session.phase != Phase::Diagnosing {
            log::info!("dropping stale diagnosis result");
            return Ok(());
        }
        session.last_duration = Some(outcome.elapsed);

        match outcome.result {
            Ok(result) => {
                log::info!(
                    "diagnosis ready in {}ms: {} style prompt(s)",
                    ms(outcome.elapsed),
                    result.image_prompts.len()
                );
                session.diagnosis = Some(result);
                Self::transition(session, Phase::DiagnosisReview);
                Ok(())
            }
            Err(e) => {
                log::warn!("diagnosis failed after {}ms: {e}", ms(outcome.elapsed));
                session.last_error = Some(ErrorInfo::from_error(DIAGNOSIS_FAILED, &e));
                Self::transition(session, Phase::MediaCapture);
                Err(e)
            }
        }
    }

    pub async fn request_diagnosis(&self, session: &mut Session) -> Result<(), WorkflowError> {
        let job = self.begin_diagnosis(session)?;
        let outcome = job.run().await;
        self.finish_diagnosis(session, outcome)
    }

    pub fn view_proposals(&self, session: &mut Session) -> Result<(), WorkflowError> {
        Self::expect_phase(session, Phase::DiagnosisReview, "view proposals")?;
        if session.diagnosis.is_none() {
            return Err(WorkflowError::Precondition("no diagnosis result".into()));
        }
        Self::transition(session, Phase::ProposalReview);
        Ok(())
    }

    /// ProposalReview -> ImageSimulation, then generates the default style if
    /// it has no image yet. An `Err` means the automatic generation failed;
    /// the phase change has still happened.
    pub async fn enter_simulation(&self, session: &mut Session) -> Result<(), WorkflowError> {
        Self::expect_phase(session, Phase::ProposalReview, "open the image simulation")?;
        let Some(diagnosis) = session.diagnosis.as_ref() else {
            return Err(WorkflowError::Precondition("no diagnosis result".into()));
        };

        let default_key = if diagnosis.base_prompt(&self.cfg.default_style).is_some() {
            Some(self.cfg.default_style.clone())
        } else {
            diagnosis.style_keys().next().cloned()
        };

        Self::transition(session, Phase::ImageSimulation);

        let Some(key) = default_key else {
            log::warn!("diagnosis has no image prompts; nothing to generate");
            return Ok(());
        };
        session.selected_style = key.clone();
        if session.generated_images.contains_key(&key) {
            return Ok(());
        }
        self.generate_image(session, key, None).await
    }

    /// Changes which style's image is displayed without generating anything.
    pub fn select_style(&self, session: &mut Session, key: StyleKey) -> Result<(), WorkflowError> {
        Self::expect_phase(session, Phase::ImageSimulation, "select a style")?;
        let known = session
            .diagnosis
            .as_ref()
            .is_some_and(|d| d.base_prompt(&key).is_some());
        if !known {
            return Err(WorkflowError::InvalidArgument(format!("unknown style {key}")));
        }
        session.selected_style = key;
        Ok(())
    }

    /// Starts a synthesis for `key`. Rejected with `Busy` while another
    /// synthesis is in flight, in which case the session is not touched.
    pub fn begin_synthesis(
        &self,
        session: &mut Session,
        key: StyleKey,
        adjustment: Option<&str>,
    ) -> Result<SynthesisJob, WorkflowError> {
        Self::expect_phase(session, Phase::ImageSimulation, "generate an image")?;
        if session.is_generating() {
            return Err(WorkflowError::Busy(Operation::Synthesis));
        }

        let prepared = Self::prepare_synthesis(session, &key, adjustment);
        let (identity, request) = match prepared {
            Ok(v) => v,
            Err(e) => {
                session.last_error = Some(ErrorInfo::from_error(SYNTHESIS_FAILED, &e));
                return Err(e);
            }
        };
        let permit = session.generating.try_acquire()?;

        session.selected_style = key.clone();
        session.last_error = None;
        log::info!("generating {key}: {}", request.prompt);
        Ok(SynthesisJob {
            epoch: session.epoch,
            key,
            request,
            identity,
            client: self.synthesis.clone(),
            permit,
        })
    }

    /// Stores the new image, or records the error and keeps the previous one.
    pub fn finish_synthesis(
        &self,
        session: &mut Session,
        outcome: SynthesisOutcome,
    ) -> Result<(), WorkflowError> {
        if outcome.epoch != session.epoch {
            log::info!("dropping image for {} from before restart", outcome.key);
            return Ok(());
        }
        session.last_duration = Some(outcome.elapsed);

        match outcome.result {
            Ok(image) => {
                log::info!(
                    "image for {} ready in {}ms ({} bytes)",
                    outcome.key,
                    ms(outcome.elapsed),
                    image.image_data.len()
                );
                session.generated_images.insert(outcome.key, image);
                Ok(())
            }
            Err(e) => {
                log::warn!("image generation for {} failed: {e}", outcome.key);
                session.last_error = Some(ErrorInfo::from_error(SYNTHESIS_FAILED, &e));
                Err(e)
            }
        }
    }

    pub async fn generate_image(
        &self,
        session: &mut Session,
        key: StyleKey,
        adjustment: Option<&str>,
    ) -> Result<(), WorkflowError> {
        let job = self.begin_synthesis(session, key, adjustment)?;
        let outcome = job.run().await;
        self.finish_synthesis(session, outcome)
    }

    /// Returns to Welcome, dropping diagnosis, images and style selection.
    /// Uploads follow the configured `RestartPolicy`; under `ResetUploads`
    /// the stored locators are forgotten too, so a later `resume` starts
    /// from an empty tracker. The session is reset even when that write
    /// fails.
    pub async fn restart(&self, session: &mut Session) -> Result<(), WorkflowError> {
        session.epoch += 1;
        session.diagnosis = None;
        session.generated_images.clear();
        session.selected_style = self.cfg.default_style.clone();
        session.last_error = None;
        session.last_duration = None;
        Self::transition(session, Phase::Welcome);
        if self.cfg.restart_policy != RestartPolicy::ResetUploads {
            return Ok(());
        }

        session.uploads = UploadTracker::new();
        let Some(identity) = session.identity.clone() else {
            return Ok(());
        };
        if let Err(e) = self
            .profiles
            .merge(&identity, ProfilePatch::forget_uploads())
            .await
        {
            log::warn!("forgetting stored uploads failed: {e}");
            session.last_error = Some(ErrorInfo::from_error("clearing saved uploads failed", &e));
            return Err(e);
        }
        Ok(())
    }

    fn prepare_synthesis(
        session: &Session,
        key: &StyleKey,
        adjustment: Option<&str>,
    ) -> Result<(Identity, SynthesisRequest), WorkflowError> {
        let diagnosis = session
            .diagnosis
            .as_ref()
            .ok_or_else(|| WorkflowError::Precondition("no diagnosis result".into()))?;
        let identity = Self::identity(session)?;
        let base = session.uploads.locator(BASE_IMAGE_SLOT).cloned().ok_or_else(|| {
            WorkflowError::InvalidArgument(format!("{BASE_IMAGE_SLOT} has no uploaded image"))
        })?;
        let request = ImageSynthesisClient::prepare(diagnosis, key, base, adjustment)?;
        Ok((identity, request))
    }

    fn identity(session: &Session) -> Result<Identity, WorkflowError> {
        session
            .identity
            .as_ref()
            .filter(|i| i.is_authenticated())
            .cloned()
            .ok_or(WorkflowError::Unauthenticated)
    }

    fn expect_phase(
        session: &Session,
        expected: Phase,
        action: &'static str,
    ) -> Result<(), WorkflowError> {
        if session.phase == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidPhase {
                action,
                phase: session.phase.label(),
            })
        }
    }

    fn transition(session: &mut Session, to: Phase) {
        if session.phase != to {
            log::info!("phase: {} -> {}", session.phase, to);
            session.phase = to;
        }
    }
}
