use std::sync::{Arc, Mutex};

use crate::core::error::{MatchError, MatchResult};
use crate::core::grants::{ensure_party, AccessGrantCoordinator};
use crate::core::matcher::Matcher;
use crate::core::store::AttributeStore;
use crate::models::{
    EncryptedPreference, EncryptedProfile, Identity, MatchEvent, MatchHandle, PreferenceId,
    PreferenceInputs, ProfileId, ProfileInputs, AGE_WIDTH, GENDER_WIDTH, INTERESTS_WIDTH,
    REGION_WIDTH,
};
use crate::services::engine::{Attestation, Ciphertext, EncryptionEngine, ExternalInput, Handle, Width};
use crate::services::events::EventSink;

/// Version string reported by the service
pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// Registry sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ServiceStats {
    pub profiles: usize,
    pub preferences: usize,
    #[serde(rename = "publicResults")]
    pub public_results: usize,
}

/// Registration and request handlers
///
/// Orchestrates ingestion, storage, evaluation and grant issuance. Every
/// fallible check of a call runs before the first grant or store write, so a
/// failed call leaves no partial registration behind.
pub struct MatchService {
    engine: Arc<dyn EncryptionEngine>,
    store: AttributeStore,
    matcher: Matcher,
    grants: AccessGrantCoordinator,
    events: Arc<dyn EventSink>,
    publish_lock: Mutex<()>,
}

impl MatchService {
    pub fn new(
        engine: Arc<dyn EncryptionEngine>,
        system: Identity,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            matcher: Matcher::new(engine.clone()),
            grants: AccessGrantCoordinator::new(engine.clone(), system),
            store: AttributeStore::new(),
            engine,
            events,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn EncryptionEngine> {
        &self.engine
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    /// Identity the service holds result grants under; never a valid caller
    pub fn system_identity(&self) -> &Identity {
        self.grants.system_identity()
    }

    /// Ingest and publish a profile owned by `caller`
    pub fn publish_profile(
        &self,
        caller: &Identity,
        inputs: &ProfileInputs,
        attestation: &Attestation,
    ) -> MatchResult<ProfileId> {
        self.ensure_user(caller)?;
        declared_width("age", &inputs.age, AGE_WIDTH)?;
        declared_width("gender", &inputs.gender, GENDER_WIDTH)?;
        declared_width("interests", &inputs.interests, INTERESTS_WIDTH)?;
        declared_width("region", &inputs.region, REGION_WIDTH)?;

        let attributes = EncryptedProfile {
            age: self.engine.verify_input(&inputs.age, attestation, caller)?,
            gender: self.engine.verify_input(&inputs.gender, attestation, caller)?,
            interests: self.engine.verify_input(&inputs.interests, attestation, caller)?,
            region: self.engine.verify_input(&inputs.region, attestation, caller)?,
        };

        self.authorize_ingested(&attributes.ciphertexts(), caller)?;
        let profile_id = self.store.register_profile(caller.clone(), attributes);

        tracing::info!(profile_id = profile_id.0, owner = %caller, "Profile registered");
        self.events.emit(&MatchEvent::ProfilePublished {
            profile_id,
            owner: caller.clone(),
        });

        Ok(profile_id)
    }

    /// Ingest and submit a preference requested by `caller`
    pub fn submit_preference(
        &self,
        caller: &Identity,
        inputs: &PreferenceInputs,
        attestation: &Attestation,
    ) -> MatchResult<PreferenceId> {
        self.ensure_user(caller)?;
        declared_width("minAge", &inputs.min_age, AGE_WIDTH)?;
        declared_width("maxAge", &inputs.max_age, AGE_WIDTH)?;
        declared_width("desiredGender", &inputs.desired_gender, GENDER_WIDTH)?;
        declared_width("interestsMask", &inputs.interests_mask, INTERESTS_WIDTH)?;
        declared_width("region", &inputs.region, REGION_WIDTH)?;

        let attributes = EncryptedPreference {
            min_age: self.engine.verify_input(&inputs.min_age, attestation, caller)?,
            max_age: self.engine.verify_input(&inputs.max_age, attestation, caller)?,
            desired_gender: self.engine.verify_input(&inputs.desired_gender, attestation, caller)?,
            interests_mask: self.engine.verify_input(&inputs.interests_mask, attestation, caller)?,
            region: self.engine.verify_input(&inputs.region, attestation, caller)?,
        };

        self.authorize_ingested(&attributes.ciphertexts(), caller)?;
        let preference_id = self.store.register_preference(caller.clone(), attributes);

        tracing::info!(preference_id = preference_id.0, requester = %caller, "Preference registered");
        self.events.emit(&MatchEvent::PreferenceSubmitted {
            preference_id,
            requester: caller.clone(),
        });

        Ok(preference_id)
    }

    /// Evaluate a pair and grant the result to its two parties
    ///
    /// Each call derives a fresh ciphertext, so the returned handle differs
    /// between calls even though the decrypted value does not.
    pub fn compute_match_handle(
        &self,
        caller: &Identity,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> MatchResult<MatchHandle> {
        let (profile, preference) = self.store.pair(profile_id, preference_id)?;
        let result = self.matcher.evaluate(&profile, &preference)?;
        self.grants
            .grant_result_access(&result, &profile.owner, &preference.requester)?;

        let handle = self.engine.export_handle(&result);
        tracing::info!(
            profile_id = profile_id.0,
            preference_id = preference_id.0,
            caller = %caller,
            handle = %handle,
            "Match computed"
        );
        self.events.emit(&MatchEvent::MatchComputed {
            profile_id,
            preference_id,
            handle,
        });

        Ok(MatchHandle {
            profile_id,
            preference_id,
            handle,
        })
    }

    /// Read accessor for a pair's match handle
    ///
    /// A handle for an uncached ciphertext cannot be recovered without
    /// evaluating again, so this runs the same path as
    /// [`MatchService::compute_match_handle`].
    pub fn match_handle(
        &self,
        caller: &Identity,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> MatchResult<MatchHandle> {
        self.compute_match_handle(caller, profile_id, preference_id)
    }

    /// Re-derive a pair's result and make it decryptable by anyone
    ///
    /// Only the profile owner or the preference requester may call this. The
    /// first published result is kept; later calls return it unchanged.
    pub fn make_match_public(
        &self,
        caller: &Identity,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> MatchResult<MatchHandle> {
        self.ensure_user(caller)?;
        let _guard = self.publish_lock.lock().unwrap_or_else(|e| e.into_inner());

        let (profile, preference) = self.store.pair(profile_id, preference_id)?;
        ensure_party(caller, &profile.owner, &preference.requester)?;

        if let Some(existing) = self.store.public_result(profile_id, preference_id) {
            tracing::debug!(profile_id = profile_id.0, preference_id = preference_id.0, "Match already public");
            return Ok(MatchHandle {
                profile_id,
                preference_id,
                handle: self.engine.export_handle(&existing),
            });
        }

        let result = self.matcher.evaluate(&profile, &preference)?;
        self.grants
            .grant_result_access(&result, &profile.owner, &preference.requester)?;
        self.grants
            .make_public(&result, caller, &profile.owner, &preference.requester)?;
        let (stored, _) = self
            .store
            .record_public_result(profile_id, preference_id, result);

        let handle = self.engine.export_handle(&stored);
        tracing::info!(
            profile_id = profile_id.0,
            preference_id = preference_id.0,
            caller = %caller,
            handle = %handle,
            "Match made public"
        );
        self.events.emit(&MatchEvent::MatchMadePublic {
            profile_id,
            preference_id,
            handle,
        });

        Ok(MatchHandle {
            profile_id,
            preference_id,
            handle,
        })
    }

    /// Handle of the public result for a pair, if one was published
    pub fn public_match_handle(
        &self,
        profile_id: ProfileId,
        preference_id: PreferenceId,
    ) -> Option<Handle> {
        self.store
            .public_result(profile_id, preference_id)
            .map(|result| self.engine.export_handle(&result))
    }

    pub fn owner_of_profile(&self, profile_id: ProfileId) -> MatchResult<Identity> {
        self.store
            .get_profile(profile_id)
            .map(|record| record.owner)
            .ok_or_else(|| MatchError::NotRegistered(format!("profile {}", profile_id)))
    }

    pub fn owner_of_preference(&self, preference_id: PreferenceId) -> MatchResult<Identity> {
        self.store
            .get_preference(preference_id)
            .map(|record| record.requester)
            .ok_or_else(|| MatchError::NotRegistered(format!("preference {}", preference_id)))
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            profiles: self.store.profile_count(),
            preferences: self.store.preference_count(),
            public_results: self.store.public_result_count(),
        }
    }

    /// The system identity holds every result grant, so it may not act as a party
    fn ensure_user(&self, caller: &Identity) -> MatchResult<()> {
        if caller == self.system_identity() {
            return Err(MatchError::PermissionDenied(format!(
                "{} is reserved for the match service",
                caller
            )));
        }
        Ok(())
    }

    /// Self-grant and computation grant for every ingested attribute
    fn authorize_ingested(&self, ciphertexts: &[Ciphertext], owner: &Identity) -> MatchResult<()> {
        for ciphertext in ciphertexts {
            self.grants.grant_self_access(ciphertext, owner)?;
            self.grants.grant_computation_access(ciphertext)?;
        }
        Ok(())
    }
}

fn declared_width(field: &str, input: &ExternalInput, expected: Width) -> MatchResult<()> {
    if input.width == expected {
        Ok(())
    } else {
        Err(MatchError::InvalidInput(format!(
            "{} must be an encrypted {}, got {}",
            field, expected, input.width
        )))
    }
}

impl std::fmt::Debug for MatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchService")
            .field("engine", &self.engine.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, WILDCARD_GENDER, WILDCARD_REGION};
    use crate::services::events::EventLog;
    use crate::services::ClearEngine;

    struct Harness {
        engine: Arc<ClearEngine>,
        events: Arc<EventLog>,
        service: MatchService,
    }

    fn harness() -> Harness {
        let engine = Arc::new(ClearEngine::new());
        let events = Arc::new(EventLog::new(64));
        let service = MatchService::new(engine.clone(), Identity::new("system"), events.clone());
        Harness { engine, events, service }
    }

    fn publish(h: &Harness, owner: &str, age: u8, gender: u8, interests: u16, region: u16) -> ProfileId {
        let owner = Identity::new(owner);
        let (inputs, proof) = h
            .engine
            .input_builder(&owner)
            .add_u8(age)
            .add_u8(gender)
            .add_u16(interests)
            .add_u16(region)
            .seal();
        let inputs = ProfileInputs {
            age: inputs[0],
            gender: inputs[1],
            interests: inputs[2],
            region: inputs[3],
        };
        h.service.publish_profile(&owner, &inputs, &proof).unwrap()
    }

    fn submit(h: &Harness, requester: &str, min: u8, max: u8, gender: u8, mask: u16, region: u16) -> PreferenceId {
        let requester = Identity::new(requester);
        let (inputs, proof) = h
            .engine
            .input_builder(&requester)
            .add_u8(min)
            .add_u8(max)
            .add_u8(gender)
            .add_u16(mask)
            .add_u16(region)
            .seal();
        let inputs = PreferenceInputs {
            min_age: inputs[0],
            max_age: inputs[1],
            desired_gender: inputs[2],
            interests_mask: inputs[3],
            region: inputs[4],
        };
        h.service.submit_preference(&requester, &inputs, &proof).unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let h = harness();
        let profile = publish(&h, "alice", 25, Gender::Female.code(), 0b0101, 7);
        let matching = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 0b0100, WILDCARD_REGION);
        let too_old = submit(&h, "bob", 26, 30, WILDCARD_GENDER, 0b0100, WILDCARD_REGION);

        let handle = h.service.compute_match_handle(&"bob".into(), profile, matching).unwrap();
        assert_eq!(h.engine.decrypt(&handle.handle, &"bob".into()).unwrap(), 1);

        let handle = h.service.compute_match_handle(&"bob".into(), profile, too_old).unwrap();
        assert_eq!(h.engine.decrypt(&handle.handle, &"alice".into()).unwrap(), 0);
    }

    #[test]
    fn test_registration_grants_owner_and_computation_only() {
        let h = harness();
        let id = publish(&h, "alice", 25, 2, 1, 7);
        let record = h.service.store().get_profile(id).unwrap();

        for ct in record.attributes.ciphertexts() {
            assert_eq!(h.engine.grantees(&ct.handle), vec![Identity::new("alice")]);
            assert!(h.engine.decrypt(&ct.handle, &"system".into()).is_err());
        }
    }

    #[test]
    fn test_result_grants_exactly_parties_and_system() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);

        let handle = h.service.compute_match_handle(&"carol".into(), profile, preference).unwrap();

        assert_eq!(
            h.engine.grantees(&handle.handle),
            vec![Identity::new("alice"), Identity::new("bob"), Identity::new("system")]
        );
        assert!(h.engine.decrypt(&handle.handle, &"carol".into()).is_err());
    }

    #[test]
    fn test_attestation_failure_leaves_no_record() {
        let h = harness();
        let alice = Identity::new("alice");
        let (inputs, _) = h.engine.input_builder(&alice).add_u8(25).add_u8(2).add_u16(1).add_u16(7).seal();
        let (_, wrong_proof) = h.engine.input_builder(&alice).add_u8(1).seal();
        let inputs = ProfileInputs { age: inputs[0], gender: inputs[1], interests: inputs[2], region: inputs[3] };

        let err = h.service.publish_profile(&alice, &inputs, &wrong_proof).unwrap_err();

        assert!(matches!(err, MatchError::AttestationInvalid(_)));
        assert_eq!(h.service.stats().profiles, 0);
        assert!(h.events.is_empty());
        assert!(h.engine.grantees(&inputs.age.handle).is_empty());
    }

    #[test]
    fn test_inputs_from_other_identity_rejected() {
        let h = harness();
        let alice = Identity::new("alice");
        let (inputs, proof) = h.engine.input_builder(&alice).add_u8(25).add_u8(2).add_u16(1).add_u16(7).seal();
        let inputs = ProfileInputs { age: inputs[0], gender: inputs[1], interests: inputs[2], region: inputs[3] };

        let err = h.service.publish_profile(&"mallory".into(), &inputs, &proof).unwrap_err();
        assert!(matches!(err, MatchError::AttestationInvalid(_)));
    }

    #[test]
    fn test_wrong_width_rejected_before_ingestion() {
        let h = harness();
        let alice = Identity::new("alice");
        let (inputs, proof) = h.engine.input_builder(&alice).add_u16(25).add_u8(2).add_u16(1).add_u16(7).seal();
        let inputs = ProfileInputs { age: inputs[0], gender: inputs[1], interests: inputs[2], region: inputs[3] };

        let err = h.service.publish_profile(&alice, &inputs, &proof).unwrap_err();
        assert!(matches!(err, MatchError::InvalidInput(_)));
        assert_eq!(h.engine.ciphertext_count(), 0);
    }

    #[test]
    fn test_unknown_pair_not_registered() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);

        let err = h.service.compute_match_handle(&"bob".into(), profile, PreferenceId(1)).unwrap_err();
        assert!(matches!(err, MatchError::NotRegistered(_)));
        assert!(h.service.owner_of_preference(PreferenceId(1)).is_err());
    }

    #[test]
    fn test_make_public_gated_and_idempotent() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);

        let err = h.service.make_match_public(&"carol".into(), profile, preference).unwrap_err();
        assert!(matches!(err, MatchError::PermissionDenied(_)));
        assert_eq!(h.service.public_match_handle(profile, preference), None);

        let first = h.service.make_match_public(&"alice".into(), profile, preference).unwrap();
        assert_eq!(h.engine.decrypt(&first.handle, &"carol".into()).unwrap(), 1);

        let events_before = h.events.len();
        let second = h.service.make_match_public(&"bob".into(), profile, preference).unwrap();
        assert_eq!(first, second);
        assert_eq!(h.events.len(), events_before);
        assert_eq!(h.service.public_match_handle(profile, preference), Some(first.handle));
    }

    #[test]
    fn test_system_identity_cannot_act_as_party() {
        let h = harness();
        let system = h.service.system_identity().clone();
        let (inputs, proof) = h.engine.input_builder(&system).add_u8(25).add_u8(2).add_u16(1).add_u16(7).seal();
        let inputs = ProfileInputs { age: inputs[0], gender: inputs[1], interests: inputs[2], region: inputs[3] };

        let err = h.service.publish_profile(&system, &inputs, &proof).unwrap_err();
        assert!(matches!(err, MatchError::PermissionDenied(_)));
        assert_eq!(h.service.stats().profiles, 0);
        assert!(h.engine.grantees(&inputs.age.handle).is_empty());

        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);
        let err = h.service.make_match_public(&system, profile, preference).unwrap_err();
        assert!(matches!(err, MatchError::PermissionDenied(_)));
        assert_eq!(h.service.public_match_handle(profile, preference), None);
    }

    #[test]
    fn test_compute_handles_are_fresh() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);

        let first = h.service.compute_match_handle(&"bob".into(), profile, preference).unwrap();
        let second = h.service.match_handle(&"bob".into(), profile, preference).unwrap();

        assert_ne!(first.handle, second.handle);
        assert_eq!(
            h.engine.decrypt(&first.handle, &"bob".into()).unwrap(),
            h.engine.decrypt(&second.handle, &"bob".into()).unwrap()
        );
    }

    #[test]
    fn test_events_in_order() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);
        let computed = h.service.compute_match_handle(&"bob".into(), profile, preference).unwrap();
        let public = h.service.make_match_public(&"bob".into(), profile, preference).unwrap();

        assert_eq!(
            h.events.events(),
            vec![
                MatchEvent::ProfilePublished { profile_id: profile, owner: "alice".into() },
                MatchEvent::PreferenceSubmitted { preference_id: preference, requester: "bob".into() },
                MatchEvent::MatchComputed { profile_id: profile, preference_id: preference, handle: computed.handle },
                MatchEvent::MatchMadePublic { profile_id: profile, preference_id: preference, handle: public.handle },
            ]
        );
    }

    #[test]
    fn test_owners_and_version() {
        let h = harness();
        let profile = publish(&h, "alice", 25, 2, 1, 7);
        let preference = submit(&h, "bob", 20, 30, WILDCARD_GENDER, 1, WILDCARD_REGION);

        assert_eq!(h.service.owner_of_profile(profile).unwrap(), Identity::new("alice"));
        assert_eq!(h.service.owner_of_preference(preference).unwrap(), Identity::new("bob"));
        assert!(h.service.version().starts_with("lume-confidential-match v"));
    }
}
