use super::chain::{verify_chain, TrustedRoot};
use super::config::VerificationPolicy;
use super::document::decode_document;
use super::envelope::decode_envelope;
use super::errors::{ChainError, VerificationError};
use super::policy::evaluate_policy;
use super::signature::verify_signature;
use super::types::VerifiedAttestation;
use std::collections::BTreeMap;
use std::time::Duration;

/// Attestation verifier with a pre-parsed trust anchor.
///
/// Construction parses the pinned root once; after that every call to
/// [`Verifier::verify`] is a pure function of the document bytes and may run
/// from any number of threads concurrently.
pub struct Verifier {
    policy: VerificationPolicy,
    root: Option<TrustedRoot>,
}

impl Verifier {
    pub fn new(policy: VerificationPolicy) -> Result<Self, ChainError> {
        let root = policy
            .trusted_root
            .as_deref()
            .map(TrustedRoot::from_bytes)
            .transpose()?;
        if let Some(root) = &root {
            log::debug!(
                "pinned trust root: subject={} fingerprint={}",
                root.subject(),
                root.fingerprint()
            );
        }
        Ok(Self { policy, root })
    }

    /// Runs the full pipeline over a raw attestation document: envelope
    /// decode, payload decode, signature, chain, policy, key presence.
    /// Fail-fast, no retries; a failure at any stage discards every claim.
    pub fn verify(&self, document_bytes: &[u8]) -> Result<VerifiedAttestation, VerificationError> {
        let envelope = decode_envelope(document_bytes)?;
        let document = decode_document(envelope.payload()?)?;
        log::debug!(
            "decoded document: module_id={} timestamp_ms={} registers={}",
            document.module_id,
            document.timestamp_ms,
            document.measurements.len()
        );

        verify_signature(&envelope, &document.leaf_certificate)?;
        let chain = verify_chain(
            &document.leaf_certificate,
            &document.ca_chain,
            self.root.as_ref(),
        )?;
        evaluate_policy(&document, &self.policy)?;

        if self.policy.require_public_key && document.embedded_public_key.is_none() {
            return Err(VerificationError::NoPublicKey);
        }

        log::debug!(
            "attestation verified: module_id={} leaf={}",
            document.module_id,
            chain.leaf_fingerprint
        );
        Ok(VerifiedAttestation {
            module_id: document.module_id,
            timestamp_ms: document.timestamp_ms,
            public_key: document.embedded_public_key,
            leaf_fingerprint_sha256: chain.leaf_fingerprint,
            root_fingerprint_sha256: chain.root_fingerprint,
        })
    }
}

/// One-shot verification returning the embedded public key.
///
/// Convenience form of [`Verifier`] for callers that verify a single
/// document: the public key is always required here.
pub fn verify(
    document_bytes: &[u8],
    expected_measurements: BTreeMap<u32, Vec<u8>>,
    trusted_root: Option<Vec<u8>>,
    min_cpus: u64,
    min_memory: u64,
    max_age: Duration,
) -> Result<Vec<u8>, VerificationError> {
    let policy = VerificationPolicy {
        expected_measurements,
        trusted_root,
        min_cpus,
        min_memory,
        max_age,
        require_public_key: true,
    };
    let verified = Verifier::new(policy)?.verify(document_bytes)?;
    verified.public_key.ok_or(VerificationError::NoPublicKey)
}
