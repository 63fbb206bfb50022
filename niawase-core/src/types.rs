use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five fixed media items a session must collect before diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotId {
    #[serde(rename = "frontImage")]
    FrontImage,
    #[serde(rename = "sideImage")]
    SideImage,
    #[serde(rename = "backImage")]
    BackImage,
    #[serde(rename = "frontVideo")]
    FrontVideo,
    #[serde(rename = "backVideo")]
    BackVideo,
}

impl SlotId {
    pub const ALL: [SlotId; 5] = [
        SlotId::FrontImage,
        SlotId::SideImage,
        SlotId::BackImage,
        SlotId::FrontVideo,
        SlotId::BackVideo,
    ];

    /// Stable identifier used in object names and the profile store.
    pub fn as_str(self) -> &'static str {
        match self {
            SlotId::FrontImage => "frontImage",
            SlotId::SideImage => "sideImage",
            SlotId::BackImage => "backImage",
            SlotId::FrontVideo => "frontVideo",
            SlotId::BackVideo => "backVideo",
        }
    }

    pub fn parse(s: &str) -> Option<SlotId> {
        SlotId::ALL.into_iter().find(|slot| slot.as_str() == s)
    }

    pub fn kind(self) -> MediaKind {
        match self {
            SlotId::FrontImage | SlotId::SideImage | SlotId::BackImage => MediaKind::Photo,
            SlotId::FrontVideo | SlotId::BackVideo => MediaKind::Video,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

/// Key shared by a proposal's base image prompt and its generated result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleKey(pub String);

impl StyleKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StyleKey {
    fn default() -> Self {
        Self::new("style_1")
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque principal id issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URI returned by object storage for an uploaded item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(pub String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "女性")]
    Female,
    #[serde(rename = "男性")]
    Male,
    #[serde(rename = "その他")]
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Female, Gender::Male, Gender::Other];

    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "女性",
            Gender::Male => "男性",
            Gender::Other => "その他",
        }
    }

    /// Accepts the stored label or a plain English name.
    pub fn parse(s: &str) -> Option<Gender> {
        let s = s.trim();
        Gender::ALL.into_iter().find(|g| {
            g.label() == s
                || match g {
                    Gender::Female => s.eq_ignore_ascii_case("female"),
                    Gender::Male => s.eq_ignore_ascii_case("male"),
                    Gender::Other => s.eq_ignore_ascii_case("other"),
                }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub gender: Gender,
}

impl Profile {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A media item read from the user's device, ready for transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
