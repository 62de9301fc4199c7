//! Encrypted sub-predicates of the match policy
//!
//! Each filter is a pure composition of engine primitives. None of them
//! branches on an attribute value; wildcard handling is an encrypted OR.

use crate::models::{EncryptedPreference, EncryptedProfile, WILDCARD_GENDER, WILDCARD_REGION};
use crate::services::engine::{Ciphertext, EncryptionEngine, EngineResult};

/// `min_age <= age <= max_age`
#[inline]
pub fn age_in_range(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let above_min = engine.ge(&profile.age, &preference.min_age)?;
    let below_max = engine.le(&profile.age, &preference.max_age)?;
    engine.and(&above_min, &below_max)
}

/// Desired gender is the wildcard or equals the profile's gender
#[inline]
pub fn gender_matches(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let any = engine.eq_scalar(&preference.desired_gender, WILDCARD_GENDER as u64)?;
    let same = engine.eq(&profile.gender, &preference.desired_gender)?;
    engine.or(&any, &same)
}

/// Preferred region is the wildcard or equals the profile's region
#[inline]
pub fn region_matches(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let any = engine.eq_scalar(&preference.region, WILDCARD_REGION as u64)?;
    let same = engine.eq(&profile.region, &preference.region)?;
    engine.or(&any, &same)
}

/// Profile interests share at least one flag with the preference mask
#[inline]
pub fn interests_overlap(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let shared = engine.bitand(&profile.interests, &preference.interests_mask)?;
    engine.ne_scalar(&shared, 0)
}
