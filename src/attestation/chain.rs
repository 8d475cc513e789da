use crate::attestation::errors::ChainError;
use crate::attestation::util::{now_millis, sha256_fingerprint};
use ring::signature::{self, UnparsedPublicKey};
use rustls_pemfile as pemfile;
use std::io::Cursor;
use x509_parser::prelude::*;

/// Pinned trust anchor, parsed once at verifier construction and read-only
/// for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct TrustedRoot {
    der: Vec<u8>,
    subject_raw: Vec<u8>,
    subject_display: String,
    fingerprint: String,
}

impl TrustedRoot {
    /// Accepts either a DER certificate or a PEM-armored one; the two are
    /// distinguished explicitly, never guessed from parse failures alone.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if looks_like_pem(bytes) {
            Self::from_pem(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    pub fn from_der(der: &[u8]) -> Result<Self, ChainError> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| ChainError::MalformedRoot(format!("parse root certificate: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            subject_raw: cert.subject().as_raw().to_vec(),
            subject_display: format!("{}", cert.subject()),
            fingerprint: sha256_fingerprint(der),
        })
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, ChainError> {
        let mut cursor = Cursor::new(pem);
        let der = pemfile::certs(&mut cursor)
            .next()
            .ok_or_else(|| ChainError::MalformedRoot("no certificate in PEM".into()))?
            .map_err(|e| ChainError::MalformedRoot(format!("parse PEM: {e:?}")))?;
        Self::from_der(der.as_ref())
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn subject(&self) -> &str {
        &self.subject_display
    }
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    bytes
        .windows(b"-----BEGIN".len())
        .any(|w| w == b"-----BEGIN")
}

/// Outcome of a successful chain validation, for caller-side logging.
#[derive(Debug)]
pub struct ChainSummary {
    pub leaf_fingerprint: String,
    /// `None` in untrusted (parse-only) mode.
    pub root_fingerprint: Option<String>,
    pub root_subject: Option<String>,
}

/// Validates the path from `leaf_der` to the pinned root through zero or more
/// of the bundled intermediates.
///
/// The bundle is treated as an unordered pool: the path is constructed by
/// subject/issuer matching, so platform-defined bundle order (including a
/// bundled copy of the root itself) does not matter. Signatures are verified
/// root-down, with validity windows and basic-constraints/keyUsage checked
/// for the role each certificate plays.
///
/// Without a root, only structural parsing happens and no trust is
/// established.
pub fn verify_chain(
    leaf_der: &[u8],
    ca_chain: &[Vec<u8>],
    trusted_root: Option<&TrustedRoot>,
) -> Result<ChainSummary, ChainError> {
    let (_, leaf_cert) = parse_x509_certificate(leaf_der)
        .map_err(|e| ChainError::MalformedChain(format!("parse leaf certificate: {e}")))?;
    for (idx, der) in ca_chain.iter().enumerate() {
        parse_x509_certificate(der)
            .map_err(|e| ChainError::MalformedChain(format!("parse cabundle[{idx}]: {e}")))?;
    }

    let Some(root) = trusted_root else {
        log::warn!("no trusted root supplied; certificate chain NOT validated");
        return Ok(ChainSummary {
            leaf_fingerprint: sha256_fingerprint(leaf_der),
            root_fingerprint: None,
            root_subject: None,
        });
    };

    let now = (now_millis() / 1000) as i64;

    // Build the path leaf-first by following issuer links through the pool.
    let mut ordered: Vec<Vec<u8>> = vec![leaf_der.to_vec()];
    let mut remaining: Vec<Vec<u8>> = ca_chain.to_vec();
    let mut issuer_raw = leaf_cert.tbs_certificate.issuer.as_raw().to_vec();

    for _ in 0..=remaining.len() {
        if issuer_raw == root.subject_raw {
            return verify_signatures(ordered, root, now);
        }

        let position = remaining.iter().position(|der| {
            parse_x509_certificate(der)
                .map(|(_, cert)| cert.tbs_certificate.subject.as_raw() == issuer_raw.as_slice())
                .unwrap_or(false)
        });

        let idx = match position {
            Some(i) => i,
            None => break,
        };

        let parent_der = remaining.swap_remove(idx);
        let (_, cert) = parse_x509_certificate(&parent_der)
            .map_err(|e| ChainError::MalformedChain(format!("parse intermediate: {e}")))?;
        issuer_raw = cert.tbs_certificate.issuer.as_raw().to_vec();
        ordered.push(parent_der);
    }

    Err(ChainError::ChainValidationFailed(
        "no path from leaf to trusted root".into(),
    ))
}

/// Walks the constructed path top-down from the pinned root, verifying each
/// certificate's signature with its issuer's key.
fn verify_signatures(
    ordered: Vec<Vec<u8>>,
    root: &TrustedRoot,
    now: i64,
) -> Result<ChainSummary, ChainError> {
    let (_, root_cert) = parse_x509_certificate(&root.der)
        .map_err(|e| ChainError::MalformedRoot(format!("parse root certificate: {e}")))?;
    ensure_validity(&root_cert, now, "root")?;
    ensure_basic_constraints(&root_cert, true, "root")?;

    let mut parent_subject_raw = root_cert.tbs_certificate.subject.as_raw().to_vec();
    let mut parent_pub_key = root_cert
        .tbs_certificate
        .subject_pki
        .subject_public_key
        .data
        .to_vec();

    for (idx, der) in ordered.iter().enumerate().rev() {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| ChainError::MalformedChain(format!("parse chain certificate: {e}")))?;
        let role = if idx == 0 { "leaf" } else { "intermediate" };
        ensure_validity(&cert, now, role)?;
        ensure_basic_constraints(&cert, idx != 0, role)?;

        if cert.tbs_certificate.issuer.as_raw() != parent_subject_raw.as_slice() {
            return Err(ChainError::ChainValidationFailed(format!(
                "issuer mismatch (role={role})"
            )));
        }

        let alg = map_signature_oid(&cert.signature_algorithm.algorithm)
            .map_err(ChainError::ChainValidationFailed)?;
        let verifier = UnparsedPublicKey::new(alg, &parent_pub_key);
        verifier
            .verify(
                cert.tbs_certificate.as_ref(),
                cert.signature_value.data.as_ref(),
            )
            .map_err(|_| {
                ChainError::ChainValidationFailed(format!(
                    "certificate signature verification failed ({role})"
                ))
            })?;

        parent_subject_raw = cert.tbs_certificate.subject.as_raw().to_vec();
        parent_pub_key = cert
            .tbs_certificate
            .subject_pki
            .subject_public_key
            .data
            .to_vec();
    }

    Ok(ChainSummary {
        leaf_fingerprint: sha256_fingerprint(ordered.first().expect("leaf exists").as_slice()),
        root_fingerprint: Some(root.fingerprint.clone()),
        root_subject: Some(root.subject_display.clone()),
    })
}

fn ensure_validity(cert: &X509Certificate<'_>, now: i64, role: &str) -> Result<(), ChainError> {
    let not_before = cert.validity().not_before.timestamp();
    let not_after = cert.validity().not_after.timestamp();
    if now < not_before || now > not_after {
        return Err(ChainError::ChainValidationFailed(format!(
            "{role} certificate not valid at current time (nb={not_before} na={not_after} now={now})"
        )));
    }
    Ok(())
}

fn ensure_basic_constraints(
    cert: &X509Certificate<'_>,
    expect_ca: bool,
    role: &str,
) -> Result<(), ChainError> {
    let bc = cert.basic_constraints().map_err(|e| {
        ChainError::ChainValidationFailed(format!("basicConstraints parse error ({role}): {e}"))
    })?;
    if expect_ca {
        let bc = bc.ok_or_else(|| {
            ChainError::ChainValidationFailed(format!("missing basicConstraints on {role}"))
        })?;
        if !bc.value.ca {
            return Err(ChainError::ChainValidationFailed(format!(
                "{role} certificate missing CA=true in basicConstraints"
            )));
        }
    } else if let Some(bc) = bc {
        if bc.value.ca {
            return Err(ChainError::ChainValidationFailed(
                "leaf certificate unexpectedly marked as CA".into(),
            ));
        }
    }

    let ku = cert.key_usage().map_err(|e| {
        ChainError::ChainValidationFailed(format!("keyUsage parse error ({role}): {e}"))
    })?;
    if expect_ca {
        let ku = ku.ok_or_else(|| {
            ChainError::ChainValidationFailed(format!("missing keyUsage on {role}"))
        })?;
        if !ku.value.key_cert_sign() {
            return Err(ChainError::ChainValidationFailed(format!(
                "{role} certificate missing keyCertSign usage"
            )));
        }
    } else if let Some(ku) = ku {
        if ku.value.key_cert_sign() {
            return Err(ChainError::ChainValidationFailed(
                "leaf certificate unexpectedly has keyCertSign usage".into(),
            ));
        }
    }

    Ok(())
}

fn map_signature_oid(
    oid: &x509_parser::der_parser::oid::Oid<'_>,
) -> Result<&'static dyn signature::VerificationAlgorithm, String> {
    let oid_str = oid.to_string();
    let alg: &'static dyn signature::VerificationAlgorithm = match oid_str.as_str() {
        "1.2.840.10045.4.3.2" => &signature::ECDSA_P256_SHA256_ASN1,
        "1.2.840.10045.4.3.3" => &signature::ECDSA_P384_SHA384_ASN1,
        "1.2.840.113549.1.1.11" => &signature::RSA_PKCS1_2048_8192_SHA256,
        "1.2.840.113549.1.1.12" => &signature::RSA_PKCS1_2048_8192_SHA384,
        "1.2.840.113549.1.1.13" => &signature::RSA_PKCS1_2048_8192_SHA512,
        "1.3.101.112" => &signature::ED25519,
        other => {
            return Err(format!(
                "unsupported certificate signature algorithm OID {other}"
            ))
        }
    };
    Ok(alg)
}
