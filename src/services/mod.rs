// Service exports
pub mod auth;
pub mod clear_engine;
pub mod engine;
pub mod events;

pub use auth::{AuthError, Claims, JwtVerifier};
pub use clear_engine::{ClearEngine, InputBuilder};
pub use engine::{Attestation, Ciphertext, EncryptionEngine, EngineError, EngineResult, ExternalInput, Handle, Width};
pub use events::{EventLog, EventRecord, EventSink, FanoutSink, TracingEventSink};
