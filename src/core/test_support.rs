use crate::models::{EncryptedPreference, EncryptedProfile, Identity, WILDCARD_GENDER, WILDCARD_REGION};
use crate::services::engine::{Ciphertext, EncryptionEngine};
use crate::services::ClearEngine;

pub const TEST_ORACLE: &str = "test-oracle";

#[derive(Debug, Clone, Copy)]
pub struct PlainProfile {
    pub age: u8,
    pub gender: u8,
    pub interests: u16,
    pub region: u16,
}

impl PlainProfile {
    pub fn sample() -> Self {
        Self {
            age: 25,
            gender: 2,
            interests: 0b0101,
            region: 7,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlainPreference {
    pub min_age: u8,
    pub max_age: u8,
    pub desired_gender: u8,
    pub interests_mask: u16,
    pub region: u16,
}

impl PlainPreference {
    /// Accepts any profile with at least one interest flag
    pub fn open() -> Self {
        Self {
            min_age: 1,
            max_age: 120,
            desired_gender: WILDCARD_GENDER,
            interests_mask: 0xFFFF,
            region: WILDCARD_REGION,
        }
    }
}

/// Ingest both sides and authorize them for computation
pub fn ingest_pair(
    engine: &ClearEngine,
    profile: &PlainProfile,
    preference: &PlainPreference,
) -> (EncryptedProfile, EncryptedPreference) {
    let owner = Identity::new("profile-owner");
    let (inputs, proof) = engine
        .input_builder(&owner)
        .add_u8(profile.age)
        .add_u8(profile.gender)
        .add_u16(profile.interests)
        .add_u16(profile.region)
        .seal();
    let cts: Vec<Ciphertext> = inputs
        .iter()
        .map(|input| engine.verify_input(input, &proof, &owner).unwrap())
        .collect();
    let encrypted_profile = EncryptedProfile {
        age: cts[0],
        gender: cts[1],
        interests: cts[2],
        region: cts[3],
    };

    let requester = Identity::new("requester");
    let (inputs, proof) = engine
        .input_builder(&requester)
        .add_u8(preference.min_age)
        .add_u8(preference.max_age)
        .add_u8(preference.desired_gender)
        .add_u16(preference.interests_mask)
        .add_u16(preference.region)
        .seal();
    let cts: Vec<Ciphertext> = inputs
        .iter()
        .map(|input| engine.verify_input(input, &proof, &requester).unwrap())
        .collect();
    let encrypted_preference = EncryptedPreference {
        min_age: cts[0],
        max_age: cts[1],
        desired_gender: cts[2],
        interests_mask: cts[3],
        region: cts[4],
    };

    for ct in encrypted_profile
        .ciphertexts()
        .iter()
        .chain(encrypted_preference.ciphertexts().iter())
    {
        engine.allow_computation(ct).unwrap();
    }

    (encrypted_profile, encrypted_preference)
}

pub fn decrypt_value(engine: &ClearEngine, ct: &Ciphertext) -> u64 {
    let oracle = Identity::new(TEST_ORACLE);
    engine.allow(ct, &oracle).unwrap();
    engine.decrypt(&ct.handle, &oracle).unwrap()
}

pub fn decrypt_bool(engine: &ClearEngine, ct: &Ciphertext) -> bool {
    decrypt_value(engine, ct) == 1
}
