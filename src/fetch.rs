//! Convenience transport for pulling a raw attestation document from an
//! enclave-local endpoint. Adds only I/O; all verification stays in
//! [`crate::attestation`]. Transport failures are a distinct error kind so
//! callers can tell "could not reach the enclave" from "the enclave is not
//! trustworthy".

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("attestation fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("attestation endpoint returned empty body")]
    EmptyBody,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches the raw attestation document bytes via HTTP GET.
pub async fn fetch_document(endpoint: &str) -> Result<Vec<u8>, TransportError> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let response = client.get(endpoint).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    if body.is_empty() {
        return Err(TransportError::EmptyBody);
    }
    Ok(body.to_vec())
}
