use thiserror::Error;

#[derive(Debug, Error)]
/// Structural failures while decoding the signed envelope or its payload.
pub enum DecodeError {
    #[error("malformed COSE envelope: {0}")]
    MalformedEnvelope(String),
    #[error("malformed attestation document: {0}")]
    MalformedDocument(String),
}

#[derive(Debug, Error)]
/// Failures while checking the envelope signature against the leaf certificate.
pub enum SignatureError {
    #[error("leaf certificate parse failed: {0}")]
    MalformedCertificate(String),
    #[error("unsupported signing key type: {0}")]
    UnsupportedKeyType(String),
    #[error("unsupported COSE algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("COSE algorithm {algorithm} incompatible with {key_type} leaf key")]
    AlgorithmKeyMismatch {
        algorithm: String,
        key_type: String,
    },
    #[error("envelope signature verification failed")]
    InvalidSignature,
}

#[derive(Debug, Error)]
/// Failures while building or validating the certificate path.
pub enum ChainError {
    #[error("trusted root parse failed: {0}")]
    MalformedRoot(String),
    #[error("certificate bundle parse failed: {0}")]
    MalformedChain(String),
    #[error("certificate chain validation failed: {0}")]
    ChainValidationFailed(String),
}

#[derive(Debug, Error)]
/// Policy rejections for an otherwise authentic document.
pub enum PolicyError {
    #[error("measurement register {0} missing from document")]
    MeasurementMissing(u32),
    #[error("measurement register {0} does not match expected value")]
    MeasurementMismatch(u32),
    #[error("resource claim malformed: {0}")]
    ResourceClaimMalformed(String),
    #[error("insufficient enclave resources (claimed cpus={total_cpus}, memory={total_memory})")]
    InsufficientResources {
        total_cpus: u64,
        total_memory: u64,
    },
    #[error("attestation expired (issued at {timestamp_ms}ms, now {now_ms}ms)")]
    Expired { timestamp_ms: u64, now_ms: u64 },
}

#[derive(Debug, Error)]
/// Top-level error returned by the verification pipeline, tagged by stage.
pub enum VerificationError {
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("document carries no embedded public key")]
    NoPublicKey,
}
