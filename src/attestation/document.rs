use crate::attestation::errors::DecodeError;
use crate::attestation::types::AttestationDocument;
use ciborium::value::Value as CborValue;
use std::collections::BTreeMap;

/// Decodes the envelope payload into an [`AttestationDocument`].
///
/// The payload is a CBOR map keyed by field name. `module_id`, `timestamp`,
/// `digest`, `pcrs`, and `certificate` are required; `cabundle`,
/// `public_key`, `user_data`, and `nonce` are optional. A repeated field or
/// a repeated measurement register is a decode failure, never a silent
/// overwrite. Certificates stay raw DER here; parsing them is the chain
/// validator's job and may fail independently.
pub fn decode_document(payload_bytes: &[u8]) -> Result<AttestationDocument, DecodeError> {
    let payload: CborValue = ciborium::de::from_reader(payload_bytes)
        .map_err(|e| DecodeError::MalformedDocument(format!("decode CBOR payload: {e}")))?;

    let entries = match &payload {
        CborValue::Map(m) => m,
        _ => return Err(DecodeError::MalformedDocument("payload is not a map".into())),
    };

    let mut module_id: Option<String> = None;
    let mut timestamp: Option<u64> = None;
    let mut digest: Option<String> = None;
    let mut measurements: Option<BTreeMap<u32, Vec<u8>>> = None;
    let mut leaf_certificate: Option<Vec<u8>> = None;
    let mut ca_chain: Option<Vec<Vec<u8>>> = None;
    let mut embedded_public_key: Option<Option<Vec<u8>>> = None;
    let mut user_data: Option<Option<Vec<u8>>> = None;
    let mut nonce: Option<Option<Vec<u8>>> = None;

    for (key, value) in entries {
        let CborValue::Text(name) = key else { continue };
        match name.as_str() {
            "module_id" => set_once(&mut module_id, string_from_value(value, "module_id")?, name)?,
            "timestamp" => set_once(&mut timestamp, uint_from_value(value, "timestamp")?, name)?,
            "digest" => set_once(&mut digest, string_from_value(value, "digest")?, name)?,
            "pcrs" => set_once(&mut measurements, measurement_map_from_value(value)?, name)?,
            "certificate" => set_once(
                &mut leaf_certificate,
                bytes_from_value(value, "certificate")?,
                name,
            )?,
            "cabundle" => set_once(&mut ca_chain, cabundle_from_value(value)?, name)?,
            "public_key" => set_once(
                &mut embedded_public_key,
                optional_bytes(value, "public_key")?,
                name,
            )?,
            "user_data" => set_once(&mut user_data, optional_bytes(value, "user_data")?, name)?,
            "nonce" => set_once(&mut nonce, optional_bytes(value, "nonce")?, name)?,
            _ => {}
        }
    }

    Ok(AttestationDocument {
        module_id: module_id
            .ok_or_else(|| DecodeError::MalformedDocument("module_id missing".into()))?,
        timestamp_ms: timestamp
            .ok_or_else(|| DecodeError::MalformedDocument("timestamp missing".into()))?,
        digest_algorithm: digest
            .ok_or_else(|| DecodeError::MalformedDocument("digest missing".into()))?,
        measurements: measurements
            .ok_or_else(|| DecodeError::MalformedDocument("pcrs missing".into()))?,
        leaf_certificate: leaf_certificate
            .ok_or_else(|| DecodeError::MalformedDocument("certificate missing".into()))?,
        ca_chain: ca_chain.unwrap_or_default(),
        embedded_public_key: embedded_public_key.flatten(),
        user_data: user_data.flatten(),
        nonce: nonce.flatten(),
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<(), DecodeError> {
    if slot.replace(value).is_some() {
        return Err(DecodeError::MalformedDocument(format!(
            "duplicate field {field}"
        )));
    }
    Ok(())
}

fn string_from_value(value: &CborValue, field: &str) -> Result<String, DecodeError> {
    match value {
        CborValue::Text(s) => Ok(s.clone()),
        other => Err(DecodeError::MalformedDocument(format!(
            "{field} expected text, got {other:?}"
        ))),
    }
}

fn bytes_from_value(value: &CborValue, field: &str) -> Result<Vec<u8>, DecodeError> {
    match value {
        CborValue::Bytes(b) => Ok(b.clone()),
        other => Err(DecodeError::MalformedDocument(format!(
            "{field} expected bytes, got {other:?}"
        ))),
    }
}

/// Optional fields may be omitted or explicitly null.
fn optional_bytes(value: &CborValue, field: &str) -> Result<Option<Vec<u8>>, DecodeError> {
    match value {
        CborValue::Null => Ok(None),
        other => bytes_from_value(other, field).map(Some),
    }
}

fn uint_from_value(value: &CborValue, field: &str) -> Result<u64, DecodeError> {
    match value {
        CborValue::Integer(i) => {
            let v = i128::from(*i);
            if (0..=u64::MAX as i128).contains(&v) {
                Ok(v as u64)
            } else {
                Err(DecodeError::MalformedDocument(format!(
                    "{field} out of range: {v}"
                )))
            }
        }
        other => Err(DecodeError::MalformedDocument(format!(
            "{field} expected non-negative integer, got {other:?}"
        ))),
    }
}

/// Measurement register keys must be unique unsigned integers; anything else
/// is a decode failure rather than a silently skipped or overwritten entry.
fn measurement_map_from_value(
    value: &CborValue,
) -> Result<BTreeMap<u32, Vec<u8>>, DecodeError> {
    let entries = match value {
        CborValue::Map(m) => m,
        other => {
            return Err(DecodeError::MalformedDocument(format!(
                "pcrs expected map, got {other:?}"
            )))
        }
    };
    let mut out = BTreeMap::new();
    for (key, val) in entries {
        let index = match key {
            CborValue::Integer(i) if (0..=u32::MAX as i128).contains(&i128::from(*i)) => {
                i128::from(*i) as u32
            }
            other => {
                return Err(DecodeError::MalformedDocument(format!(
                    "pcrs key expected unsigned integer, got {other:?}"
                )))
            }
        };
        if out.insert(index, bytes_from_value(val, "pcr value")?).is_some() {
            return Err(DecodeError::MalformedDocument(format!(
                "duplicate measurement register {index}"
            )));
        }
    }
    Ok(out)
}

/// The bundle must be an array of byte strings; reject any other element
/// shape instead of trusting an implicit runtime layout.
fn cabundle_from_value(value: &CborValue) -> Result<Vec<Vec<u8>>, DecodeError> {
    let entries = match value {
        CborValue::Array(a) => a,
        other => {
            return Err(DecodeError::MalformedDocument(format!(
                "cabundle expected array, got {other:?}"
            )))
        }
    };
    entries
        .iter()
        .map(|entry| bytes_from_value(entry, "cabundle entry"))
        .collect()
}
