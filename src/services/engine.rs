use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::Identity;

/// Errors surfaced by an encryption engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Attestation invalid: {0}")]
    AttestationInvalid(String),

    #[error("Width mismatch: expected {expected}, got {actual}")]
    WidthMismatch { expected: Width, actual: Width },

    #[error("Value {value} does not fit in {width}")]
    ValueOutOfRange { value: u64, width: Width },

    #[error("Ciphertext {0} is not authorized for computation")]
    NotAuthorized(Handle),

    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(Handle),

    #[error("Decryption denied for {identity} on {handle}")]
    DecryptionDenied { handle: Handle, identity: Identity },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Opaque 256-bit reference into the engine's ciphertext space
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle([u8; 32]);

impl Handle {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh handle from the thread RNG
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.to_hex())
    }
}

impl FromStr for Handle {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Handle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Bit width of an encrypted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    Bool,
    U8,
    U16,
}

impl Width {
    /// Largest plaintext representable at this width
    pub fn max_value(self) -> u64 {
        match self {
            Width::Bool => 1,
            Width::U8 => u8::MAX as u64,
            Width::U16 => u16::MAX as u64,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Bool => write!(f, "bool"),
            Width::U8 => write!(f, "u8"),
            Width::U16 => write!(f, "u16"),
        }
    }
}

/// A ciphertext living inside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ciphertext {
    pub handle: Handle,
    pub width: Width,
}

impl Ciphertext {
    pub fn new(handle: Handle, width: Width) -> Self {
        Self { handle, width }
    }

    /// Fail unless this ciphertext has the given width
    pub fn expect_width(&self, expected: Width) -> EngineResult<&Self> {
        if self.width == expected {
            Ok(self)
        } else {
            Err(EngineError::WidthMismatch {
                expected,
                actual: self.width,
            })
        }
    }
}

/// Ciphertext produced client-side, not yet ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalInput {
    pub handle: Handle,
    pub width: Width,
}

/// Proof that a batch of external inputs was formed correctly by their owner
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl Attestation {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attestation({} bytes)", self.0.len())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

/// Homomorphic encryption engine consumed by the matching core
///
/// Every operation over ciphertexts is synchronous and returns a fresh
/// ciphertext. Results are usable as operands by the system but are never
/// decryptable by anyone until a grant is issued.
pub trait EncryptionEngine: Send + Sync {
    /// Human readable engine label
    fn name(&self) -> &'static str;

    /// Verify and ingest an external ciphertext supplied by `owner`
    fn verify_input(
        &self,
        input: &ExternalInput,
        attestation: &Attestation,
        owner: &Identity,
    ) -> EngineResult<Ciphertext>;

    fn ge(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn le(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn eq(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn ne(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn eq_scalar(&self, lhs: &Ciphertext, rhs: u64) -> EngineResult<Ciphertext>;
    fn ne_scalar(&self, lhs: &Ciphertext, rhs: u64) -> EngineResult<Ciphertext>;
    fn and(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn or(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;
    fn bitand(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> EngineResult<Ciphertext>;

    /// Oblivious select: `if_true` where `condition` holds, `if_false` otherwise
    fn select(
        &self,
        condition: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> EngineResult<Ciphertext>;

    /// Encrypt a public constant
    fn trivial_encrypt(&self, value: u64, width: Width) -> EngineResult<Ciphertext>;

    /// Let `identity` request decryption of `ciphertext`
    fn allow(&self, ciphertext: &Ciphertext, identity: &Identity) -> EngineResult<()>;

    /// Let the system use `ciphertext` as an operand
    fn allow_computation(&self, ciphertext: &Ciphertext) -> EngineResult<()>;

    /// Irreversibly mark `ciphertext` as decryptable by anyone
    fn make_publicly_decryptable(&self, ciphertext: &Ciphertext) -> EngineResult<()>;

    fn is_allowed(&self, ciphertext: &Ciphertext, identity: &Identity) -> bool;

    fn is_publicly_decryptable(&self, ciphertext: &Ciphertext) -> bool;

    /// Export a ciphertext as an opaque external handle
    fn export_handle(&self, ciphertext: &Ciphertext) -> Handle {
        ciphertext.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_hex_roundtrip() {
        let handle = Handle::random();
        let parsed: Handle = handle.to_hex().parse().unwrap();
        assert_eq!(parsed, handle);
        assert!(handle.to_hex().starts_with("0x"));
        assert_eq!(handle.to_hex().len(), 2 + Handle::LEN * 2);
    }

    #[test]
    fn test_handle_rejects_short_hex() {
        assert!("0xabcd".parse::<Handle>().is_err());
    }

    #[test]
    fn test_random_handles_differ() {
        assert_ne!(Handle::random(), Handle::random());
    }

    #[test]
    fn test_expect_width() {
        let ct = Ciphertext::new(Handle::random(), Width::U8);
        assert!(ct.expect_width(Width::U8).is_ok());
        assert_eq!(
            ct.expect_width(Width::U16).unwrap_err(),
            EngineError::WidthMismatch {
                expected: Width::U16,
                actual: Width::U8
            }
        );
    }

    #[test]
    fn test_width_max_value() {
        assert_eq!(Width::Bool.max_value(), 1);
        assert_eq!(Width::U8.max_value(), 255);
        assert_eq!(Width::U16.max_value(), 65535);
    }
}
