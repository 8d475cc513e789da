use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
/// Caller-supplied policy a document must satisfy to be trusted.
///
/// Constructed once, read-only afterwards; the pipeline is a pure function of
/// `(document_bytes, policy)`.
pub struct VerificationPolicy {
    /// Measurement register index -> expected value (raw bytes). Only the
    /// indices listed here are checked; others in the document are ignored.
    pub expected_measurements: BTreeMap<u32, Vec<u8>>,
    /// Pinned trust anchor, DER or PEM. With `None` the certificate chain is
    /// only structurally parsed, never validated -- acceptable for debugging,
    /// never for production trust decisions.
    pub trusted_root: Option<Vec<u8>>,
    pub min_cpus: u64,
    pub min_memory: u64,
    /// Maximum accepted age of the document timestamp.
    pub max_age: Duration,
    /// When set, a document without an embedded public key fails with
    /// `VerificationError::NoPublicKey` even if everything else holds.
    pub require_public_key: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            expected_measurements: BTreeMap::new(),
            trusted_root: None,
            min_cpus: 0,
            min_memory: 0,
            max_age: Duration::from_secs(300),
            require_public_key: true,
        }
    }
}

impl VerificationPolicy {
    /// Adds an expected measurement register value as raw bytes.
    pub fn expect_measurement(&mut self, index: u32, value: Vec<u8>) -> &mut Self {
        self.expected_measurements.insert(index, value);
        self
    }

    /// Adds an expected measurement from a hex string (optionally `0x`
    /// prefixed). Hex is accepted only here, at the interface boundary; the
    /// canonical internal representation is raw bytes.
    pub fn expect_measurement_hex(
        &mut self,
        index: u32,
        hex_value: &str,
    ) -> Result<&mut Self, hex::FromHexError> {
        let value = hex::decode(hex_value.trim_start_matches("0x"))?;
        self.expected_measurements.insert(index, value);
        Ok(self)
    }
}
