use serde::{Deserialize, Serialize};

use crate::core::ServiceStats;
use crate::models::domain::{Identity, MatchHandle, PreferenceId, PreferenceInputs, ProfileId, ProfileInputs};
use crate::services::engine::{Attestation, Handle};
use crate::services::events::EventRecord;

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine: String,
    pub stats: ServiceStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileIdResponse {
    #[serde(rename = "profileId")]
    pub profile_id: ProfileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceIdResponse {
    #[serde(rename = "preferenceId")]
    pub preference_id: PreferenceId,
}

/// Owner or requester of a registered entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub owner: Identity,
}

/// Public result lookup; `handle` is null until the pair is published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicHandleResponse {
    #[serde(rename = "profileId")]
    pub profile_id: ProfileId,
    #[serde(rename = "preferenceId")]
    pub preference_id: PreferenceId,
    pub handle: Option<Handle>,
}

impl From<MatchHandle> for PublicHandleResponse {
    fn from(value: MatchHandle) -> Self {
        Self {
            profile_id: value.profile_id,
            preference_id: value.preference_id,
            handle: Some(value.handle),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    pub count: usize,
}

/// Encrypted profile inputs produced by the development engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevProfileInputsResponse {
    #[serde(flatten)]
    pub inputs: ProfileInputs,
    pub attestation: Attestation,
}

/// Encrypted preference inputs produced by the development engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevPreferenceInputsResponse {
    #[serde(flatten)]
    pub inputs: PreferenceInputs,
    pub attestation: Attestation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub handle: Handle,
    pub value: u64,
}
