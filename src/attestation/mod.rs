pub mod chain;
pub mod config;
pub mod document;
pub mod envelope;
pub mod errors;
pub mod policy;
pub mod signature;
pub mod types;
pub mod verifier;

mod util;

pub use chain::TrustedRoot;
pub use config::VerificationPolicy;
pub use errors::{ChainError, DecodeError, PolicyError, SignatureError, VerificationError};
pub use types::{AttestationDocument, ResourceClaim, VerifiedAttestation};
pub use verifier::{verify, Verifier};
