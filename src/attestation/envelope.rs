use crate::attestation::errors::DecodeError;
use coset::{CborSerializable, CoseSign1, TaggedCborSerializable};

/// Single-signer signed envelope: the COSE_Sign1 four-tuple of protected
/// header, unprotected header, payload, and signature. Headers are opaque at
/// this stage; the protected algorithm is read later by the signature
/// verifier.
#[derive(Debug)]
pub struct SignedEnvelope {
    pub(crate) inner: CoseSign1,
}

/// Decodes a COSE_Sign1 envelope, accepting both the tag-18-wrapped form and
/// the bare four-element array. Any parse, arity, or field-type failure is a
/// `MalformedEnvelope`; pure decode, no interpretation.
pub fn decode_envelope(bytes: &[u8]) -> Result<SignedEnvelope, DecodeError> {
    let inner = CoseSign1::from_tagged_slice(bytes)
        .or_else(|_| CoseSign1::from_slice(bytes))
        .map_err(|e| DecodeError::MalformedEnvelope(format!("parse COSE_Sign1: {e:?}")))?;
    Ok(SignedEnvelope { inner })
}

impl SignedEnvelope {
    /// Payload bytes carried by the envelope. An attestation envelope without
    /// a payload is structurally invalid.
    pub fn payload(&self) -> Result<&[u8], DecodeError> {
        self.inner
            .payload
            .as_deref()
            .ok_or_else(|| DecodeError::MalformedEnvelope("missing payload".into()))
    }

    /// Algorithm identifier from the protected header, if present.
    pub fn algorithm(&self) -> Option<&coset::Algorithm> {
        self.inner.protected.header.alg.as_ref()
    }

    pub fn signature(&self) -> &[u8] {
        &self.inner.signature
    }
}
