use crate::attestation::envelope::SignedEnvelope;
use crate::attestation::errors::SignatureError;
use ring::signature::{self, UnparsedPublicKey};
use x509_parser::prelude::*;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";
const OID_ED25519: &str = "1.3.101.112";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Rsa,
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl KeyType {
    fn name(self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::EcdsaP256 => "ECDSA P-256",
            KeyType::EcdsaP384 => "ECDSA P-384",
            KeyType::Ed25519 => "Ed25519",
        }
    }
}

/// Verifies the envelope signature against the leaf certificate's public key.
///
/// The algorithm comes from the protected header and must be compatible with
/// the key type found in the certificate SPKI. Verification runs over the
/// canonical COSE Sig_structure with empty external AAD. This must pass
/// before any other claim in the payload is trusted.
pub fn verify_signature(
    envelope: &SignedEnvelope,
    leaf_cert: &[u8],
) -> Result<(), SignatureError> {
    let (_, cert) = parse_x509_certificate(leaf_cert)
        .map_err(|e| SignatureError::MalformedCertificate(e.to_string()))?;

    let spki = &cert.tbs_certificate.subject_pki;
    let key_type = key_type_from_spki(spki)?;
    let key_bytes = spki.subject_public_key.data.as_ref();

    let alg = envelope
        .algorithm()
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm("missing in protected header".into()))?;
    let (ring_alg, fixed_ecdsa_len) = ring_algorithm(alg, key_type)?;

    let verifier = UnparsedPublicKey::new(ring_alg, key_bytes);
    envelope.inner.verify_signature(&[], |sig, data| {
        let normalized;
        let sig_bytes = match fixed_ecdsa_len {
            Some(len) => {
                normalized = normalize_ecdsa_signature(sig, len)?;
                normalized.as_slice()
            }
            None => sig,
        };
        verifier
            .verify(data, sig_bytes)
            .map_err(|_| SignatureError::InvalidSignature)
    })
}

fn key_type_from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<KeyType, SignatureError> {
    let alg_oid = spki.algorithm.algorithm.to_string();
    match alg_oid.as_str() {
        OID_RSA_ENCRYPTION => Ok(KeyType::Rsa),
        OID_ED25519 => Ok(KeyType::Ed25519),
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|oid| oid.to_string());
            match curve.as_deref() {
                Some(OID_CURVE_P256) => Ok(KeyType::EcdsaP256),
                Some(OID_CURVE_P384) => Ok(KeyType::EcdsaP384),
                other => Err(SignatureError::UnsupportedKeyType(format!(
                    "EC curve {other:?}"
                ))),
            }
        }
        other => Err(SignatureError::UnsupportedKeyType(format!("OID {other}"))),
    }
}

/// Maps (COSE algorithm, key type) to a ring verification algorithm. ECDSA
/// variants also report the raw signature width for normalisation.
fn ring_algorithm(
    alg: &coset::Algorithm,
    key_type: KeyType,
) -> Result<(&'static dyn signature::VerificationAlgorithm, Option<usize>), SignatureError> {
    use coset::iana::Algorithm as Iana;

    let assigned = match alg {
        coset::Algorithm::Assigned(a) => *a,
        other => {
            return Err(SignatureError::UnsupportedAlgorithm(format!("{other:?}")));
        }
    };

    let mismatch = |name: &str| SignatureError::AlgorithmKeyMismatch {
        algorithm: name.to_string(),
        key_type: key_type.name().to_string(),
    };

    match assigned {
        Iana::ES256 => match key_type {
            KeyType::EcdsaP256 => Ok((&signature::ECDSA_P256_SHA256_FIXED, Some(64))),
            _ => Err(mismatch("ES256")),
        },
        Iana::ES384 => match key_type {
            KeyType::EcdsaP384 => Ok((&signature::ECDSA_P384_SHA384_FIXED, Some(96))),
            _ => Err(mismatch("ES384")),
        },
        Iana::EdDSA => match key_type {
            KeyType::Ed25519 => Ok((&signature::ED25519, None)),
            _ => Err(mismatch("EdDSA")),
        },
        Iana::PS256 => rsa_only(key_type, &signature::RSA_PSS_2048_8192_SHA256, mismatch("PS256")),
        Iana::PS384 => rsa_only(key_type, &signature::RSA_PSS_2048_8192_SHA384, mismatch("PS384")),
        Iana::PS512 => rsa_only(key_type, &signature::RSA_PSS_2048_8192_SHA512, mismatch("PS512")),
        Iana::RS256 => rsa_only(
            key_type,
            &signature::RSA_PKCS1_2048_8192_SHA256,
            mismatch("RS256"),
        ),
        Iana::RS384 => rsa_only(
            key_type,
            &signature::RSA_PKCS1_2048_8192_SHA384,
            mismatch("RS384"),
        ),
        Iana::RS512 => rsa_only(
            key_type,
            &signature::RSA_PKCS1_2048_8192_SHA512,
            mismatch("RS512"),
        ),
        other => Err(SignatureError::UnsupportedAlgorithm(format!("{other:?}"))),
    }
}

fn rsa_only(
    key_type: KeyType,
    alg: &'static dyn signature::VerificationAlgorithm,
    mismatch: SignatureError,
) -> Result<(&'static dyn signature::VerificationAlgorithm, Option<usize>), SignatureError> {
    match key_type {
        KeyType::Rsa => Ok((alg, None)),
        _ => Err(mismatch),
    }
}

/// COSE carries ECDSA signatures as raw fixed-width r||s; some producers emit
/// DER instead. Accept both, normalising to raw. Anything else is an invalid
/// signature.
fn normalize_ecdsa_signature(sig: &[u8], expected_len: usize) -> Result<Vec<u8>, SignatureError> {
    if sig.len() == expected_len {
        return Ok(sig.to_vec());
    }
    if sig.len() < 8 || sig.first() != Some(&0x30) {
        return Err(SignatureError::InvalidSignature);
    }
    let total_len = sig[1] as usize;
    if total_len + 2 != sig.len() {
        return Err(SignatureError::InvalidSignature);
    }
    let mut idx = 2;
    let r = der_read_int(sig, &mut idx, expected_len / 2)?;
    let s = der_read_int(sig, &mut idx, expected_len / 2)?;
    if idx != sig.len() {
        return Err(SignatureError::InvalidSignature);
    }
    let mut out = Vec::with_capacity(expected_len);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

fn der_read_int(sig: &[u8], idx: &mut usize, part_len: usize) -> Result<Vec<u8>, SignatureError> {
    if *idx >= sig.len() || sig[*idx] != 0x02 {
        return Err(SignatureError::InvalidSignature);
    }
    *idx += 1;
    if *idx >= sig.len() {
        return Err(SignatureError::InvalidSignature);
    }
    let mut len = sig[*idx] as usize;
    *idx += 1;
    if len & 0x80 != 0 {
        let bytes = len & 0x7F;
        if bytes == 0 || bytes > 2 || *idx + bytes > sig.len() {
            return Err(SignatureError::InvalidSignature);
        }
        len = 0;
        for _ in 0..bytes {
            len = (len << 8) | sig[*idx] as usize;
            *idx += 1;
        }
    }
    if *idx + len > sig.len() {
        return Err(SignatureError::InvalidSignature);
    }
    let mut value = &sig[*idx..*idx + len];
    *idx += len;
    while !value.is_empty() && value[0] == 0 {
        value = &value[1..];
    }
    if value.len() > part_len {
        return Err(SignatureError::InvalidSignature);
    }
    let mut out = vec![0u8; part_len];
    let start = part_len - value.len();
    out[start..].copy_from_slice(value);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_fixed_width_signature_passes_through() {
        let sig = vec![0x11u8; 96];
        assert_eq!(normalize_ecdsa_signature(&sig, 96).unwrap(), sig);
    }

    #[test]
    fn der_signature_is_normalized() {
        // r = 1, s = 2 as minimal DER, expanded to 32-byte halves.
        let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
        let raw = normalize_ecdsa_signature(&der, 64).unwrap();
        assert_eq!(raw.len(), 64);
        assert_eq!(raw[31], 1);
        assert_eq!(raw[63], 2);
    }

    #[test]
    fn truncated_der_signature_is_invalid() {
        let der = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02];
        assert!(matches!(
            normalize_ecdsa_signature(&der, 64),
            Err(SignatureError::InvalidSignature)
        ));
    }
}
