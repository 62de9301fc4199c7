use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::domain::{
    Gender, PreferenceInputs, ProfileInputs, WILDCARD_GENDER, WILDCARD_REGION,
};
use crate::services::engine::{Attestation, Handle};

/// Request to publish an encrypted profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishProfileRequest {
    #[serde(flatten)]
    pub inputs: ProfileInputs,
    pub attestation: Attestation,
}

/// Request to submit an encrypted preference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPreferenceRequest {
    #[serde(flatten)]
    pub inputs: PreferenceInputs,
    pub attestation: Attestation,
}

/// Request naming one profile/preference pair
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MatchPairRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "profile_id", rename = "profileId")]
    pub profile_id: u64,
    #[validate(range(min = 1))]
    #[serde(alias = "preference_id", rename = "preferenceId")]
    pub preference_id: u64,
}

/// Query for the recent event feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EventsQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

/// Plaintext profile values for the development engine
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_profile_codes"))]
pub struct DevProfileInputRequest {
    #[validate(range(min = 1, max = 120))]
    pub age: u8,
    pub gender: u8,
    pub interests: u16,
    pub region: u16,
}

/// Plaintext preference values for the development engine
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_preference_codes"))]
pub struct DevPreferenceInputRequest {
    #[validate(range(min = 1, max = 120))]
    #[serde(alias = "min_age", rename = "minAge")]
    pub min_age: u8,
    #[validate(range(min = 1, max = 120))]
    #[serde(alias = "max_age", rename = "maxAge")]
    pub max_age: u8,
    #[serde(alias = "desired_gender", rename = "desiredGender", default = "wildcard_gender")]
    pub desired_gender: u8,
    #[serde(alias = "interests_mask", rename = "interestsMask")]
    pub interests_mask: u16,
    #[serde(default = "wildcard_region")]
    pub region: u16,
}

/// Request to decrypt a handle through the development engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevDecryptRequest {
    pub handle: Handle,
}

fn wildcard_gender() -> u8 {
    WILDCARD_GENDER
}

fn wildcard_region() -> u16 {
    WILDCARD_REGION
}

/// Profiles carry real codes only; the wildcards are reserved for preferences
fn validate_profile_codes(request: &DevProfileInputRequest) -> Result<(), ValidationError> {
    if Gender::from_code(request.gender).is_none() {
        return Err(ValidationError::new("unknown_gender"));
    }
    if request.region == WILDCARD_REGION {
        return Err(ValidationError::new("reserved_region"));
    }
    Ok(())
}

fn validate_preference_codes(request: &DevPreferenceInputRequest) -> Result<(), ValidationError> {
    if request.desired_gender != WILDCARD_GENDER && Gender::from_code(request.desired_gender).is_none() {
        return Err(ValidationError::new("unknown_gender"));
    }
    if request.min_age > request.max_age {
        return Err(ValidationError::new("min_age_above_max_age"));
    }
    Ok(())
}
