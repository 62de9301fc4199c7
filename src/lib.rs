//! Lume Confidential Match - encrypted match predicates for the Lume dating app
//!
//! Profiles and preferences are published as ciphertexts produced on the
//! client. The service evaluates the match policy homomorphically through an
//! [`EncryptionEngine`] and hands out opaque result handles that only the two
//! parties (and the service itself) may decrypt, unless a party elects to make
//! a result public.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{MatchError, MatchResult, MatchService, Matcher};
pub use crate::models::{EncryptedPreference, EncryptedProfile, Identity, MatchEvent, MatchHandle, PreferenceId, ProfileId};
pub use crate::services::{ClearEngine, EncryptionEngine, EventLog, EventSink, Handle};
