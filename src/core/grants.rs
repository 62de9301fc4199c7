use std::sync::Arc;

use crate::core::error::{MatchError, MatchResult};
use crate::models::Identity;
use crate::services::engine::{Ciphertext, EncryptionEngine};

/// Decides who may decrypt each ciphertext the system holds or derives
///
/// Grants only ever widen: there is no revoke, and public decryptability is a
/// one-way flag. The coordinator owns no data; it attaches capabilities to
/// ciphertexts owned by the store or produced by the matcher.
#[derive(Clone)]
pub struct AccessGrantCoordinator {
    engine: Arc<dyn EncryptionEngine>,
    system: Identity,
}

impl AccessGrantCoordinator {
    pub fn new(engine: Arc<dyn EncryptionEngine>, system: Identity) -> Self {
        Self { engine, system }
    }

    /// Identity the system acts under when it holds grants itself
    pub fn system_identity(&self) -> &Identity {
        &self.system
    }

    /// Let the owner of a freshly ingested attribute decrypt it
    pub fn grant_self_access(&self, ciphertext: &Ciphertext, owner: &Identity) -> MatchResult<()> {
        self.engine.allow(ciphertext, owner)?;
        Ok(())
    }

    /// Let the system use a ciphertext as an operand in later evaluations
    pub fn grant_computation_access(&self, ciphertext: &Ciphertext) -> MatchResult<()> {
        self.engine.allow_computation(ciphertext)?;
        Ok(())
    }

    /// Grant a match result to exactly the two parties and the system
    pub fn grant_result_access(
        &self,
        result: &Ciphertext,
        profile_owner: &Identity,
        requester: &Identity,
    ) -> MatchResult<()> {
        self.engine.allow(result, &self.system)?;
        self.engine.allow(result, profile_owner)?;
        self.engine.allow(result, requester)?;
        tracing::debug!(handle = %result.handle, owner = %profile_owner, requester = %requester, "Result grants issued");
        Ok(())
    }

    /// Mark a result decryptable by anyone, on behalf of one of its two parties
    pub fn make_public(
        &self,
        result: &Ciphertext,
        caller: &Identity,
        profile_owner: &Identity,
        requester: &Identity,
    ) -> MatchResult<()> {
        ensure_party(caller, profile_owner, requester)?;
        self.engine.make_publicly_decryptable(result)?;
        tracing::debug!(handle = %result.handle, caller = %caller, "Result made publicly decryptable");
        Ok(())
    }
}

/// Only the profile owner or the preference requester may widen a result
pub fn ensure_party(caller: &Identity, profile_owner: &Identity, requester: &Identity) -> MatchResult<()> {
    if caller == profile_owner || caller == requester {
        Ok(())
    } else {
        Err(MatchError::PermissionDenied(format!(
            "{} is neither the profile owner nor the preference requester",
            caller
        )))
    }
}

impl std::fmt::Debug for AccessGrantCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrantCoordinator")
            .field("system", &self.system)
            .finish()
    }
}
