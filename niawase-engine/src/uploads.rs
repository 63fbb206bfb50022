use niawase_core::types::{Locator, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadState {
    pub status: UploadStatus,
    pub locator: Option<Locator>,
}

impl UploadState {
    fn pending() -> Self {
        Self {
            status: UploadStatus::Pending,
            locator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("{0} is already uploading")]
    AlreadyUploading(SlotId),
    #[error("{0} has no upload in progress")]
    NotUploading(SlotId),
}

/// Per-slot status for the fixed set of required media items.
///
/// Slots are independent: each transition only reads and writes its own slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTracker {
    slots: BTreeMap<SlotId, UploadState>,
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadTracker {
    pub fn new() -> Self {
        Self {
            slots: SlotId::ALL
                .into_iter()
                .map(|slot| (slot, UploadState::pending()))
                .collect(),
        }
    }

    pub fn state(&self, slot: SlotId) -> &UploadState {
        // Every SlotId is inserted in `new` and never removed.
        &self.slots[&slot]
    }

    pub fn status(&self, slot: SlotId) -> UploadStatus {
        self.state(slot).status
    }

    pub fn locator(&self, slot: SlotId) -> Option<&Locator> {
        self.state(slot).locator.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &UploadState)> {
        self.slots.iter().map(|(slot, state)| (*slot, state))
    }

    /// pending|completed -> uploading. A slot that is already uploading is
    /// left as it is.
    pub fn begin_upload(&mut self, slot: SlotId) -> Result<(), UploadError> {
        let state = self.slot_mut(slot);
        if state.status == UploadStatus::Uploading {
            return Err(UploadError::AlreadyUploading(slot));
        }
        state.status = UploadStatus::Uploading;
        state.locator = None;
        Ok(())
    }

    pub fn complete_upload(&mut self, slot: SlotId, locator: Locator) -> Result<(), UploadError> {
        let state = self.slot_mut(slot);
        if state.status != UploadStatus::Uploading {
            return Err(UploadError::NotUploading(slot));
        }
        state.status = UploadStatus::Completed;
        state.locator = Some(locator);
        Ok(())
    }

    /// uploading -> pending, dropping any locator.
    pub fn fail_upload(&mut self, slot: SlotId) -> Result<(), UploadError> {
        let state = self.slot_mut(slot);
        if state.status != UploadStatus::Uploading {
            return Err(UploadError::NotUploading(slot));
        }
        *state = UploadState::pending();
        Ok(())
    }

    /// Marks a slot completed from persisted state (session resume).
    pub fn restore(&mut self, slot: SlotId, locator: Locator) {
        *self.slot_mut(slot) = UploadState {
            status: UploadStatus::Completed,
            locator: Some(locator),
        };
    }

    pub fn is_all_complete(&self) -> bool {
        self.slots
            .values()
            .all(|s| s.status == UploadStatus::Completed)
    }

    pub fn missing(&self) -> Vec<SlotId> {
        self.iter()
            .filter(|(_, s)| s.status != UploadStatus::Completed)
            .map(|(slot, _)| slot)
            .collect()
    }

    fn slot_mut(&mut self, slot: SlotId) -> &mut UploadState {
        self.slots.entry(slot).or_insert_with(UploadState::pending)
    }
}
