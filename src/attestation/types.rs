use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
/// Decoded payload of the COSE_Sign1 attestation envelope.
///
/// Nothing in here is trustworthy until the envelope signature and the
/// certificate chain have been verified; the struct is just the parsed shape.
pub struct AttestationDocument {
    pub module_id: String,
    /// Issuance time claimed by the platform, milliseconds since epoch.
    pub timestamp_ms: u64,
    /// Hash algorithm the platform used for the measurement registers.
    pub digest_algorithm: String,
    /// Measurement register index -> measured value (raw bytes).
    pub measurements: BTreeMap<u32, Vec<u8>>,
    /// DER certificate of the envelope signer.
    pub leaf_certificate: Vec<u8>,
    /// DER intermediates as bundled by the platform. Platform order, not
    /// verification order.
    pub ca_chain: Vec<Vec<u8>>,
    /// Ephemeral channel key the enclave bound to this attestation.
    pub embedded_public_key: Option<Vec<u8>>,
    /// Opaque caller data; interpreted as a JSON [`ResourceClaim`] by policy.
    pub user_data: Option<Vec<u8>>,
    /// Caller-supplied challenge echo. Carried, not checked here.
    pub nonce: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
/// Resource allocation claimed by the enclave, JSON-encoded in `user_data`.
pub struct ResourceClaim {
    pub total_cpus: u64,
    pub total_memory: u64,
}

#[derive(Debug)]
/// Summary returned to callers after a document passed every stage.
pub struct VerifiedAttestation {
    pub module_id: String,
    pub timestamp_ms: u64,
    /// Present unless the policy explicitly waived `require_public_key`.
    pub public_key: Option<Vec<u8>>,
    pub leaf_fingerprint_sha256: String,
    /// `None` when verification ran without a pinned root (untrusted mode).
    pub root_fingerprint_sha256: Option<String>,
}
