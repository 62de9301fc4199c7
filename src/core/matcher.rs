use std::sync::Arc;

use crate::core::error::{MatchError, MatchResult};
use crate::core::filters::{age_in_range, gender_matches, interests_overlap, region_matches};
use crate::models::{
    EncryptedPreference, EncryptedProfile, PreferenceRecord, ProfileRecord, MATCH_WIDTH,
};
use crate::services::engine::{Ciphertext, EncryptionEngine, EngineResult};

/// Compose the full match policy into one encrypted boolean
///
/// # Policy
/// 1. Age within the preferred range
/// 2. Gender wildcard or exact
/// 3. Region wildcard or exact
/// 4. At least one shared interest flag
///
/// All four terms are always evaluated; the conjunction is encrypted, so a
/// false term forces a false result without any plaintext short-circuit.
pub fn match_predicate(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let age_ok = age_in_range(engine, profile, preference)?;
    let gender_ok = gender_matches(engine, profile, preference)?;
    let region_ok = region_matches(engine, profile, preference)?;
    let interests_ok = interests_overlap(engine, profile, preference)?;

    let demographics = engine.and(&age_ok, &gender_ok)?;
    let placement = engine.and(&demographics, &region_ok)?;
    engine.and(&placement, &interests_ok)
}

/// Encode the policy result as a fixed-width integer: 1 on match, 0 otherwise
pub fn encoded_match(
    engine: &dyn EncryptionEngine,
    profile: &EncryptedProfile,
    preference: &EncryptedPreference,
) -> EngineResult<Ciphertext> {
    let matched = match_predicate(engine, profile, preference)?;
    let one = engine.trivial_encrypt(1, MATCH_WIDTH)?;
    let zero = engine.trivial_encrypt(0, MATCH_WIDTH)?;
    engine.select(&matched, &one, &zero)
}

/// Match evaluator shared by every entry point that derives a result
///
/// Holds no state besides the engine; evaluating the same pair twice yields
/// two distinct ciphertexts that decrypt to the same value.
#[derive(Clone)]
pub struct Matcher {
    engine: Arc<dyn EncryptionEngine>,
}

impl Matcher {
    pub fn new(engine: Arc<dyn EncryptionEngine>) -> Self {
        Self { engine }
    }

    /// Evaluate a stored profile against a stored preference
    ///
    /// Only the plaintext registration flags are inspected before the
    /// encrypted evaluation starts.
    pub fn evaluate(
        &self,
        profile: &ProfileRecord,
        preference: &PreferenceRecord,
    ) -> MatchResult<Ciphertext> {
        if !profile.published {
            return Err(MatchError::NotRegistered("profile is not published".to_string()));
        }
        if !preference.submitted {
            return Err(MatchError::NotRegistered("preference is not submitted".to_string()));
        }

        Ok(encoded_match(
            self.engine.as_ref(),
            &profile.attributes,
            &preference.attributes,
        )?)
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("engine", &self.engine.name())
            .finish()
    }
}
