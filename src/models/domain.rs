use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::engine::{Ciphertext, ExternalInput, Handle, Width};

/// Lowest age a profile may carry
pub const AGE_MIN: u8 = 1;
/// Highest age a profile may carry
pub const AGE_MAX: u8 = 120;

/// Reserved "any gender" code, outside every real [`Gender`] code
pub const WILDCARD_GENDER: u8 = u8::MAX;
/// Reserved "any region" code, outside every real region code
pub const WILDCARD_REGION: u16 = u16::MAX;

/// Attribute widths as stored in the engine
pub const AGE_WIDTH: Width = Width::U8;
pub const GENDER_WIDTH: Width = Width::U8;
pub const INTERESTS_WIDTH: Width = Width::U16;
pub const REGION_WIDTH: Width = Width::U16;
pub const MATCH_WIDTH: Width = Width::U8;

/// Account identity of a party (or of the system itself)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Trimmed, non-empty identity or nothing
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Sequential profile identifier, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

/// Sequential preference identifier, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceId(pub u64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PreferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gender codes carried (encrypted) by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Gender {
    Unknown = 0,
    Male = 1,
    Female = 2,
    Other = 3,
}

impl Gender {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Gender::Unknown),
            1 => Some(Gender::Male),
            2 => Some(Gender::Female),
            3 => Some(Gender::Other),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Encrypted attributes of a published profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedProfile {
    pub age: Ciphertext,
    pub gender: Ciphertext,
    pub interests: Ciphertext,
    pub region: Ciphertext,
}

impl EncryptedProfile {
    pub fn ciphertexts(&self) -> [Ciphertext; 4] {
        [self.age, self.gender, self.interests, self.region]
    }
}

/// Encrypted attributes of a submitted preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPreference {
    pub min_age: Ciphertext,
    pub max_age: Ciphertext,
    pub desired_gender: Ciphertext,
    pub interests_mask: Ciphertext,
    pub region: Ciphertext,
}

impl EncryptedPreference {
    pub fn ciphertexts(&self) -> [Ciphertext; 5] {
        [
            self.min_age,
            self.max_age,
            self.desired_gender,
            self.interests_mask,
            self.region,
        ]
    }
}

/// Client-encrypted profile attributes awaiting ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInputs {
    pub age: ExternalInput,
    pub gender: ExternalInput,
    pub interests: ExternalInput,
    pub region: ExternalInput,
}

/// Client-encrypted preference attributes awaiting ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceInputs {
    #[serde(rename = "minAge")]
    pub min_age: ExternalInput,
    #[serde(rename = "maxAge")]
    pub max_age: ExternalInput,
    #[serde(rename = "desiredGender")]
    pub desired_gender: ExternalInput,
    #[serde(rename = "interestsMask")]
    pub interests_mask: ExternalInput,
    pub region: ExternalInput,
}

/// Stored profile entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub owner: Identity,
    pub attributes: EncryptedProfile,
    pub published: bool,
}

/// Stored preference entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceRecord {
    pub requester: Identity,
    pub attributes: EncryptedPreference,
    pub submitted: bool,
}

/// Opaque handle to an encrypted match result for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchHandle {
    #[serde(rename = "profileId")]
    pub profile_id: ProfileId,
    #[serde(rename = "preferenceId")]
    pub preference_id: PreferenceId,
    pub handle: Handle,
}

/// Events emitted for external observers. Never carries attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    ProfilePublished {
        #[serde(rename = "profileId")]
        profile_id: ProfileId,
        owner: Identity,
    },
    PreferenceSubmitted {
        #[serde(rename = "preferenceId")]
        preference_id: PreferenceId,
        requester: Identity,
    },
    MatchComputed {
        #[serde(rename = "profileId")]
        profile_id: ProfileId,
        #[serde(rename = "preferenceId")]
        preference_id: PreferenceId,
        handle: Handle,
    },
    MatchMadePublic {
        #[serde(rename = "profileId")]
        profile_id: ProfileId,
        #[serde(rename = "preferenceId")]
        preference_id: PreferenceId,
        handle: Handle,
    },
}

impl MatchEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchEvent::ProfilePublished { .. } => "profile_published",
            MatchEvent::PreferenceSubmitted { .. } => "preference_submitted",
            MatchEvent::MatchComputed { .. } => "match_computed",
            MatchEvent::MatchMadePublic { .. } => "match_made_public",
        }
    }
}
