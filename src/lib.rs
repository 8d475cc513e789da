//! Verification of AWS Nitro Enclave attestation documents.
//!
//! The entry point is [`attestation::Verifier`]: construct it with a
//! [`attestation::VerificationPolicy`] (expected measurements, pinned trust
//! root, minimum resources, freshness window) and feed it the raw COSE_Sign1
//! bytes returned by the enclave's attestation endpoint. On success the
//! verified document's embedded public key is returned so the caller can set
//! up a secure channel with the enclave.
//!
//! Verification is fail-fast and stateless: envelope decode, payload decode,
//! COSE signature check against the leaf certificate, certificate path
//! validation to the pinned root, then measurement/resource/freshness policy.
//! Any anomaly discards the document entirely.

pub mod attestation;
pub mod fetch;

pub use attestation::{
    verify, AttestationDocument, ChainError, DecodeError, PolicyError, SignatureError,
    VerificationError, VerificationPolicy, VerifiedAttestation, Verifier,
};
pub use fetch::TransportError;
