use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::error::{MatchError, MatchResult};
use crate::models::{
    EncryptedPreference, EncryptedProfile, Identity, PreferenceId, PreferenceRecord, ProfileId,
    ProfileRecord,
};
use crate::services::engine::Ciphertext;

#[derive(Debug)]
struct Registries {
    next_profile_id: u64,
    next_preference_id: u64,
    profiles: BTreeMap<ProfileId, ProfileRecord>,
    preferences: BTreeMap<PreferenceId, PreferenceRecord>,
    public_results: HashMap<(ProfileId, PreferenceId), Ciphertext>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            next_profile_id: 1,
            next_preference_id: 1,
            profiles: BTreeMap::new(),
            preferences: BTreeMap::new(),
            public_results: HashMap::new(),
        }
    }
}

/// Append-only registries of encrypted profiles and preferences
///
/// Identifiers come from two independent monotonic counters starting at 1.
/// Records are never updated or removed once inserted, so readers holding a
/// cloned record never observe a change.
#[derive(Debug, Default)]
pub struct AttributeStore {
    inner: RwLock<Registries>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registries> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registries> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a published profile under the next identifier
    pub fn register_profile(&self, owner: Identity, attributes: EncryptedProfile) -> ProfileId {
        let mut registries = self.write();
        let id = ProfileId(registries.next_profile_id);
        registries.next_profile_id += 1;
        registries.profiles.insert(
            id,
            ProfileRecord {
                owner,
                attributes,
                published: true,
            },
        );
        id
    }

    /// Store a submitted preference under the next identifier
    pub fn register_preference(
        &self,
        requester: Identity,
        attributes: EncryptedPreference,
    ) -> PreferenceId {
        let mut registries = self.write();
        let id = PreferenceId(registries.next_preference_id);
        registries.next_preference_id += 1;
        registries.preferences.insert(
            id,
            PreferenceRecord {
                requester,
                attributes,
                submitted: true,
            },
        );
        id
    }

    pub fn get_profile(&self, id: ProfileId) -> Option<ProfileRecord> {
        self.read().profiles.get(&id).cloned()
    }

    pub fn get_preference(&self, id: PreferenceId) -> Option<PreferenceRecord> {
        self.read().preferences.get(&id).cloned()
    }

    /// Fetch both sides of a pair or fail with `NotRegistered`
    pub fn pair(
        &self,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> MatchResult<(ProfileRecord, PreferenceRecord)> {
        let registries = self.read();
        let profile = registries
            .profiles
            .get(&profile_id)
            .cloned()
            .ok_or_else(|| MatchError::NotRegistered(format!("profile {}", profile_id)))?;
        let preference = registries
            .preferences
            .get(&preference_id)
            .cloned()
            .ok_or_else(|| MatchError::NotRegistered(format!("preference {}", preference_id)))?;
        Ok((profile, preference))
    }

    /// Result previously made public for this pair, if any
    pub fn public_result(
        &self,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> Option<Ciphertext> {
        self.read()
            .public_results
            .get(&(profile_id, preference_id))
            .copied()
    }

    /// Remember the public result for a pair; the first one recorded wins
    ///
    /// Returns the stored result and whether this call recorded it.
    pub fn record_public_result(
        &self,
        profile_id: ProfileId,
        preference_id: PreferenceId,
        result: Ciphertext,
    ) -> (Ciphertext, bool) {
        let mut registries = self.write();
        match registries.public_results.entry((profile_id, preference_id)) {
            Entry::Occupied(existing) => (*existing.get(), false),
            Entry::Vacant(slot) => {
                slot.insert(result);
                (result, true)
            }
        }
    }

    pub fn profile_count(&self) -> usize {
        self.read().profiles.len()
    }

    pub fn preference_count(&self) -> usize {
        self.read().preferences.len()
    }

    pub fn public_result_count(&self) -> usize {
        self.read().public_results.len()
    }
}
