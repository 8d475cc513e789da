use crate::attestation::config::VerificationPolicy;
use crate::attestation::errors::PolicyError;
use crate::attestation::types::{AttestationDocument, ResourceClaim};
use crate::attestation::util::{constant_time_eq, now_millis};

/// Checks the (already signature- and chain-verified) document against the
/// caller's policy: measurements, then resource claim, then freshness, each
/// short-circuiting on first failure.
pub fn evaluate_policy(
    document: &AttestationDocument,
    policy: &VerificationPolicy,
) -> Result<(), PolicyError> {
    evaluate_at(document, policy, now_millis())
}

/// `now_ms` is always evaluator-local in production; it is a parameter only
/// so the freshness boundary can be pinned in tests.
fn evaluate_at(
    document: &AttestationDocument,
    policy: &VerificationPolicy,
    now_ms: u64,
) -> Result<(), PolicyError> {
    for (&index, expected) in &policy.expected_measurements {
        let actual = document
            .measurements
            .get(&index)
            .ok_or(PolicyError::MeasurementMissing(index))?;
        if !constant_time_eq(actual, expected) {
            return Err(PolicyError::MeasurementMismatch(index));
        }
    }

    let claim = decode_resource_claim(document)?;
    if claim.total_cpus < policy.min_cpus || claim.total_memory < policy.min_memory {
        return Err(PolicyError::InsufficientResources {
            total_cpus: claim.total_cpus,
            total_memory: claim.total_memory,
        });
    }

    let max_age_ms = policy.max_age.as_millis() as u64;
    if now_ms.saturating_sub(max_age_ms) > document.timestamp_ms {
        return Err(PolicyError::Expired {
            timestamp_ms: document.timestamp_ms,
            now_ms,
        });
    }

    Ok(())
}

fn decode_resource_claim(document: &AttestationDocument) -> Result<ResourceClaim, PolicyError> {
    let user_data = document
        .user_data
        .as_deref()
        .ok_or_else(|| PolicyError::ResourceClaimMalformed("user_data absent".into()))?;
    serde_json::from_slice(user_data)
        .map_err(|e| PolicyError::ResourceClaimMalformed(e.to_string()))
}
