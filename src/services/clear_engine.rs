//! In-process development engine
//!
//! NOT SECURE - plaintexts are kept in memory behind random handles.
//! It enforces the same attestation, computation-authorization and grant
//! rules a real engine does, so the matching core can be exercised end to end
//! without an FHE backend.

use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Identity, PreferenceInputs, ProfileInputs};
use crate::services::engine::{
    Attestation, Ciphertext, EncryptionEngine, EngineError, EngineResult, ExternalInput, Handle,
    Width,
};

#[derive(Debug, Clone, Copy)]
struct Plaintext {
    value: u64,
    width: Width,
}

#[derive(Debug)]
struct PendingInput {
    owner: Identity,
    attestation: Vec<u8>,
    plaintext: Plaintext,
}

#[derive(Debug, Default)]
struct EngineState {
    values: HashMap<Handle, Plaintext>,
    pending: HashMap<Handle, PendingInput>,
    computable: HashSet<Handle>,
    grants: HashSet<(Identity, Handle)>,
    public: HashSet<Handle>,
}

/// Plaintext-backed engine for tests, benchmarks and the dev server
#[derive(Debug, Default)]
pub struct ClearEngine {
    state: RwLock<EngineState>,
}

impl ClearEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a batch of client-side inputs for `owner`
    pub fn input_builder(&self, owner: &Identity) -> InputBuilder<'_> {
        InputBuilder {
            engine: self,
            owner: owner.clone(),
            values: Vec::new(),
        }
    }

    /// Decrypt `handle` on behalf of `requester`, honoring grants
    pub fn decrypt(&self, handle: &Handle, requester: &Identity) -> EngineResult<u64> {
        let state = self.read();
        let plaintext = state
            .values
            .get(handle)
            .ok_or(EngineError::UnknownHandle(*handle))?;

        if state.public.contains(handle) || state.grants.contains(&(requester.clone(), *handle)) {
            Ok(plaintext.value)
        } else {
            Err(EngineError::DecryptionDenied {
                handle: *handle,
                identity: requester.clone(),
            })
        }
    }

    /// Identities holding a decryption grant on `handle`
    pub fn grantees(&self, handle: &Handle) -> Vec<Identity> {
        let state = self.read();
        let mut identities: Vec<Identity> = state
            .grants
            .iter()
            .filter(|(_, h)| h == handle)
            .map(|(identity, _)| identity.clone())
            .collect();
        identities.sort();
        identities
    }

    pub fn ciphertext_count(&self) -> usize {
        self.read().values.len()
    }

    /// Encrypt a profile's plaintext attributes under one attestation
    pub fn encrypt_profile(
        &self,
        owner: &Identity,
        age: u8,
        gender: u8,
        interests: u16,
        region: u16,
    ) -> (ProfileInputs, Attestation) {
        let ([age, gender, interests, region], attestation) = self.seal_array(
            owner,
            [
                Plaintext { value: age as u64, width: Width::U8 },
                Plaintext { value: gender as u64, width: Width::U8 },
                Plaintext { value: interests as u64, width: Width::U16 },
                Plaintext { value: region as u64, width: Width::U16 },
            ],
        );
        (ProfileInputs { age, gender, interests, region }, attestation)
    }

    /// Encrypt a preference's plaintext attributes under one attestation
    pub fn encrypt_preference(
        &self,
        owner: &Identity,
        min_age: u8,
        max_age: u8,
        desired_gender: u8,
        interests_mask: u16,
        region: u16,
    ) -> (PreferenceInputs, Attestation) {
        let ([min_age, max_age, desired_gender, interests_mask, region], attestation) = self.seal_array(
            owner,
            [
                Plaintext { value: min_age as u64, width: Width::U8 },
                Plaintext { value: max_age as u64, width: Width::U8 },
                Plaintext { value: desired_gender as u64, width: Width::U8 },
                Plaintext { value: interests_mask as u64, width: Width::U16 },
                Plaintext { value: region as u64, width: Width::U16 },
            ],
        );
        (
            PreferenceInputs { min_age, max_age, desired_gender, interests_mask, region },
            attestation,
        )
    }

    fn seal_array<const N: usize>(
        &self,
        owner: &Identity,
        values: [Plaintext; N],
    ) -> ([ExternalInput; N], Attestation) {
        let proof = fresh_proof();
        let mut state = self.write();
        let inputs = values.map(|plaintext| Self::stage(&mut state, owner, &proof, plaintext));
        (inputs, Attestation(proof))
    }

    fn stage(state: &mut EngineState, owner: &Identity, proof: &[u8], plaintext: Plaintext) -> ExternalInput {
        let handle = Handle::random();
        state.pending.insert(
            handle,
            PendingInput {
                owner: owner.clone(),
                attestation: proof.to_vec(),
                plaintext,
            },
        );
        ExternalInput {
            handle,
            width: plaintext.width,
        }
    }

    fn operand(state: &EngineState, ct: &Ciphertext) -> EngineResult<Plaintext> {
        let plaintext = *state
            .values
            .get(&ct.handle)
            .ok_or(EngineError::UnknownHandle(ct.handle))?;
        if plaintext.width != ct.width {
            return Err(EngineError::WidthMismatch {
                expected: ct.width,
                actual: plaintext.width,
            });
        }
        if !state.computable.contains(&ct.handle) {
            return Err(EngineError::NotAuthorized(ct.handle));
        }
        Ok(plaintext)
    }

    fn same_width(lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<()> {
        rhs.expect_width(lhs.width).map(|_| ())
    }

    fn check_range(value: u64, width: Width) -> EngineResult<()> {
        if value > width.max_value() {
            Err(EngineError::ValueOutOfRange { value, width })
        } else {
            Ok(())
        }
    }

    /// Store a freshly computed value; results are operand-usable but ungranted
    fn produce(&self, state: &mut EngineState, value: u64, width: Width) -> Ciphertext {
        let handle = Handle::random();
        state.values.insert(handle, Plaintext { value, width });
        state.computable.insert(handle);
        Ciphertext::new(handle, width)
    }

    fn binary<F>(&self, lhs: &Ciphertext, rhs: &Ciphertext, out: Width, f: F) -> EngineResult<Ciphertext>
    where
        F: Fn(u64, u64) -> u64,
    {
        Self::same_width(lhs, rhs)?;
        let mut state = self.write();
        let a = Self::operand(&state, lhs)?;
        let b = Self::operand(&state, rhs)?;
        let value = f(a.value, b.value);
        Ok(self.produce(&mut state, value, out))
    }

    fn scalar<F>(&self, lhs: &Ciphertext, rhs: u64, f: F) -> EngineResult<Ciphertext>
    where
        F: Fn(u64, u64) -> bool,
    {
        Self::check_range(rhs, lhs.width)?;
        let mut state = self.write();
        let a = Self::operand(&state, lhs)?;
        let value = f(a.value, rhs) as u64;
        Ok(self.produce(&mut state, value, Width::Bool))
    }

    fn registered(state: &EngineState, ct: &Ciphertext) -> EngineResult<()> {
        if state.values.contains_key(&ct.handle) {
            Ok(())
        } else {
            Err(EngineError::UnknownHandle(ct.handle))
        }
    }
}

impl EncryptionEngine for ClearEngine {
    fn name(&self) -> &'static str {
        "clear (TESTING ONLY)"
    }

    fn verify_input(
        &self,
        input: &ExternalInput,
        attestation: &Attestation,
        owner: &Identity,
    ) -> EngineResult<Ciphertext> {
        let mut state = self.write();

        let pending = state.pending.get(&input.handle).ok_or_else(|| {
            EngineError::AttestationInvalid(format!("no pending input {}", input.handle))
        })?;
        if &pending.owner != owner {
            return Err(EngineError::AttestationInvalid(format!(
                "input {} was not produced by {}",
                input.handle, owner
            )));
        }
        if pending.attestation != attestation.as_bytes() {
            return Err(EngineError::AttestationInvalid(format!(
                "proof does not cover input {}",
                input.handle
            )));
        }
        if pending.plaintext.width != input.width {
            return Err(EngineError::AttestationInvalid(format!(
                "input {} declared as {} but proven as {}",
                input.handle, input.width, pending.plaintext.width
            )));
        }

        // Verification is repeatable; the same input always maps to the same ciphertext
        let plaintext = pending.plaintext;
        state.values.entry(input.handle).or_insert(plaintext);
        Ok(Ciphertext::new(input.handle, input.width))
    }

    fn ge(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        self.binary(lhs, rhs, Width::Bool, |a, b| (a >= b) as u64)
    }

    fn le(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        self.binary(lhs, rhs, Width::Bool, |a, b| (a <= b) as u64)
    }

    fn eq(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        self.binary(lhs, rhs, Width::Bool, |a, b| (a == b) as u64)
    }

    fn ne(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        self.binary(lhs, rhs, Width::Bool, |a, b| (a != b) as u64)
    }

    fn eq_scalar(&self, lhs: &Ciphertext, rhs: u64) -> EngineResult<Ciphertext> {
        self.scalar(lhs, rhs, |a, b| a == b)
    }

    fn ne_scalar(&self, lhs: &Ciphertext, rhs: u64) -> EngineResult<Ciphertext> {
        self.scalar(lhs, rhs, |a, b| a != b)
    }

    fn and(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        lhs.expect_width(Width::Bool)?;
        self.binary(lhs, rhs, Width::Bool, |a, b| a & b)
    }

    fn or(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        lhs.expect_width(Width::Bool)?;
        self.binary(lhs, rhs, Width::Bool, |a, b| a | b)
    }

    fn bitand(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext> {
        self.binary(lhs, rhs, lhs.width, |a, b| a & b)
    }

    fn select(
        &self,
        condition: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> EngineResult<Ciphertext> {
        condition.expect_width(Width::Bool)?;
        Self::same_width(if_true, if_false)?;

        let mut state = self.write();
        let cond = Self::operand(&state, condition)?;
        let a = Self::operand(&state, if_true)?;
        let b = Self::operand(&state, if_false)?;
        // Both arms are read before picking
        let mask = cond.value.wrapping_neg();
        let value = (a.value & mask) | (b.value & !mask);
        Ok(self.produce(&mut state, value, if_true.width))
    }

    fn trivial_encrypt(&self, value: u64, width: Width) -> EngineResult<Ciphertext> {
        Self::check_range(value, width)?;
        let mut state = self.write();
        Ok(self.produce(&mut state, value, width))
    }

    fn allow(&self, ciphertext: &Ciphertext, identity: &Identity) -> EngineResult<()> {
        let mut state = self.write();
        Self::registered(&state, ciphertext)?;
        state.grants.insert((identity.clone(), ciphertext.handle));
        Ok(())
    }

    fn allow_computation(&self, ciphertext: &Ciphertext) -> EngineResult<()> {
        let mut state = self.write();
        Self::registered(&state, ciphertext)?;
        state.computable.insert(ciphertext.handle);
        Ok(())
    }

    fn make_publicly_decryptable(&self, ciphertext: &Ciphertext) -> EngineResult<()> {
        let mut state = self.write();
        Self::registered(&state, ciphertext)?;
        state.public.insert(ciphertext.handle);
        Ok(())
    }

    fn is_allowed(&self, ciphertext: &Ciphertext, identity: &Identity) -> bool {
        self.read()
            .grants
            .contains(&(identity.clone(), ciphertext.handle))
    }

    fn is_publicly_decryptable(&self, ciphertext: &Ciphertext) -> bool {
        self.read().public.contains(&ciphertext.handle)
    }
}

/// Client-side batch of inputs sharing one attestation
pub struct InputBuilder<'a> {
    engine: &'a ClearEngine,
    owner: Identity,
    values: Vec<Plaintext>,
}

impl<'a> InputBuilder<'a> {
    pub fn add_u8(mut self, value: u8) -> Self {
        self.values.push(Plaintext {
            value: value as u64,
            width: Width::U8,
        });
        self
    }

    pub fn add_u16(mut self, value: u16) -> Self {
        self.values.push(Plaintext {
            value: value as u64,
            width: Width::U16,
        });
        self
    }

    /// Encrypt the batch, returning the inputs in insertion order
    pub fn seal(self) -> (Vec<ExternalInput>, Attestation) {
        let proof = fresh_proof();
        let mut state = self.engine.write();
        let inputs = self
            .values
            .into_iter()
            .map(|plaintext| ClearEngine::stage(&mut state, &self.owner, &proof, plaintext))
            .collect();
        (inputs, Attestation(proof))
    }
}

fn fresh_proof() -> Vec<u8> {
    let mut proof = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut proof);
    proof
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_u8(engine: &ClearEngine, owner: &Identity, value: u8) -> Ciphertext {
        let (inputs, proof) = engine.input_builder(owner).add_u8(value).seal();
        let ct = engine.verify_input(&inputs[0], &proof, owner).unwrap();
        engine.allow_computation(&ct).unwrap();
        ct
    }

    #[test]
    fn test_verify_input_accepts_owner_proof() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let (inputs, proof) = engine.input_builder(&alice).add_u8(25).add_u16(7).seal();

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].width, Width::U16);
        let ct = engine.verify_input(&inputs[1], &proof, &alice).unwrap();
        assert_eq!(ct.handle, inputs[1].handle);
    }

    #[test]
    fn test_verify_input_rejects_other_owner() {
        let engine = ClearEngine::new();
        let (inputs, proof) = engine.input_builder(&"alice".into()).add_u8(25).seal();

        let err = engine
            .verify_input(&inputs[0], &proof, &"mallory".into())
            .unwrap_err();
        assert!(matches!(err, EngineError::AttestationInvalid(_)));
    }

    #[test]
    fn test_verify_input_rejects_foreign_proof() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let (inputs, _) = engine.input_builder(&alice).add_u8(25).seal();
        let (_, other_proof) = engine.input_builder(&alice).add_u8(30).seal();

        let err = engine.verify_input(&inputs[0], &other_proof, &alice).unwrap_err();
        assert!(matches!(err, EngineError::AttestationInvalid(_)));
    }

    #[test]
    fn test_verify_input_is_repeatable() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let (inputs, proof) = engine.input_builder(&alice).add_u8(25).seal();

        let first = engine.verify_input(&inputs[0], &proof, &alice).unwrap();
        let second = engine.verify_input(&inputs[0], &proof, &alice).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.ciphertext_count(), 1);
    }

    #[test]
    fn test_operands_need_computation_grant() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let (inputs, proof) = engine.input_builder(&alice).add_u8(1).add_u8(2).seal();
        let a = engine.verify_input(&inputs[0], &proof, &alice).unwrap();
        let b = engine.verify_input(&inputs[1], &proof, &alice).unwrap();

        assert_eq!(engine.ge(&a, &b).unwrap_err(), EngineError::NotAuthorized(a.handle));

        engine.allow_computation(&a).unwrap();
        engine.allow_computation(&b).unwrap();
        assert!(engine.ge(&a, &b).is_ok());
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let engine = ClearEngine::new();
        let a = engine.trivial_encrypt(1, Width::U8).unwrap();
        let b = engine.trivial_encrypt(1, Width::U16).unwrap();
        assert!(matches!(
            engine.eq(&a, &b),
            Err(EngineError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn test_results_are_not_granted() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let a = ingest_u8(&engine, &alice, 25);
        let result = engine.eq_scalar(&a, 25).unwrap();

        assert!(engine.grantees(&result.handle).is_empty());
        assert!(engine.decrypt(&result.handle, &alice).is_err());

        engine.allow(&result, &alice).unwrap();
        assert_eq!(engine.decrypt(&result.handle, &alice).unwrap(), 1);
    }

    #[test]
    fn test_select_picks_obliviously() {
        let engine = ClearEngine::new();
        let system = Identity::new("system");
        let yes = engine.trivial_encrypt(1, Width::Bool).unwrap();
        let no = engine.trivial_encrypt(0, Width::Bool).unwrap();
        let one = engine.trivial_encrypt(1, Width::U8).unwrap();
        let zero = engine.trivial_encrypt(0, Width::U8).unwrap();

        let picked_one = engine.select(&yes, &one, &zero).unwrap();
        let picked_zero = engine.select(&no, &one, &zero).unwrap();
        engine.allow(&picked_one, &system).unwrap();
        engine.allow(&picked_zero, &system).unwrap();

        assert_eq!(engine.decrypt(&picked_one.handle, &system).unwrap(), 1);
        assert_eq!(engine.decrypt(&picked_zero.handle, &system).unwrap(), 0);
    }

    #[test]
    fn test_trivial_encrypt_range() {
        let engine = ClearEngine::new();
        assert!(engine.trivial_encrypt(256, Width::U8).is_err());
        assert!(engine.eq_scalar(&engine.trivial_encrypt(3, Width::U8).unwrap(), 300).is_err());
    }

    #[test]
    fn test_public_decryption() {
        let engine = ClearEngine::new();
        let ct = engine.trivial_encrypt(1, Width::U8).unwrap();
        let anyone = Identity::new("anyone");

        assert!(engine.decrypt(&ct.handle, &anyone).is_err());
        engine.make_publicly_decryptable(&ct).unwrap();
        engine.make_publicly_decryptable(&ct).unwrap();
        assert!(engine.is_publicly_decryptable(&ct));
        assert_eq!(engine.decrypt(&ct.handle, &anyone).unwrap(), 1);
    }

    #[test]
    fn test_grants_on_unknown_handle_fail() {
        let engine = ClearEngine::new();
        let ghost = Ciphertext::new(Handle::random(), Width::U8);
        assert!(matches!(
            engine.allow(&ghost, &"alice".into()),
            Err(EngineError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_encrypt_profile_shares_one_attestation() {
        let engine = ClearEngine::new();
        let alice = Identity::new("alice");
        let (inputs, proof) = engine.encrypt_profile(&alice, 30, 1, 0b11, 4);

        assert_eq!(inputs.interests.width, Width::U16);
        let region = engine.verify_input(&inputs.region, &proof, &alice).unwrap();
        let age = engine.verify_input(&inputs.age, &proof, &alice).unwrap();
        engine.allow(&region, &alice).unwrap();
        engine.allow(&age, &alice).unwrap();
        assert_eq!(engine.decrypt(&region.handle, &alice).unwrap(), 4);
        assert_eq!(engine.decrypt(&age.handle, &alice).unwrap(), 30);
    }
}
