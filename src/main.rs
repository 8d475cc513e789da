use anyhow::Context;
use env_logger::Env;
use nitro_attestor::attestation::{VerificationPolicy, Verifier};
use nitro_attestor::fetch::fetch_document;
use serde_json::Value as JsonValue;
use std::{env, fs, path::PathBuf, time::Duration};

type CliResult<T> = Result<T, anyhow::Error>;

/// CLI entrypoint: builds the policy from environment variables, obtains the
/// attestation document, verifies it, and prints a summary.
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init()
        .ok();

    let mut policy = VerificationPolicy::default();
    policy.trusted_root = Some(load_trusted_root()?);
    policy.expected_measurements = load_expected_measurements()?;
    policy.min_cpus = env_u64("ATTESTOR_MIN_CPUS")?.unwrap_or(0);
    policy.min_memory = env_u64("ATTESTOR_MIN_MEMORY")?.unwrap_or(0);
    policy.max_age = Duration::from_secs(env_u64("ATTESTOR_MAX_AGE_SECS")?.unwrap_or(300));

    let verifier = Verifier::new(policy).context("construct verifier")?;
    let document = obtain_document().await?;

    match verifier.verify(&document) {
        Ok(result) => {
            println!("attestation verified:");
            println!("  module_id    : {}", result.module_id);
            println!("  timestamp_ms : {}", result.timestamp_ms);
            println!("  leaf SHA256  : {}", result.leaf_fingerprint_sha256);
            if let Some(root_fp) = &result.root_fingerprint_sha256 {
                println!("  root SHA256  : {root_fp}");
            }
            if let Some(key) = &result.public_key {
                println!("  public key   : {}", hex::encode(key));
            }
            Ok(())
        }
        Err(err) => Err(anyhow::anyhow!("verification failed: {err}")),
    }
}

/// Attestation source: `ATTESTOR_ENDPOINT` (HTTP GET, raw bytes) or the first
/// CLI argument, a file holding the document as a hex string.
async fn obtain_document() -> CliResult<Vec<u8>> {
    if let Ok(endpoint) = env::var("ATTESTOR_ENDPOINT") {
        return fetch_document(&endpoint)
            .await
            .with_context(|| format!("fetch attestation from {endpoint}"));
    }
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("provide an attestation hex file as first argument or set ATTESTOR_ENDPOINT")?;
    let contents = fs::read_to_string(&path).with_context(|| format!("read {path:?}"))?;
    hex::decode(contents.trim()).with_context(|| format!("decode attestation hex from {path:?}"))
}

fn load_trusted_root() -> CliResult<Vec<u8>> {
    let path = env::var("ATTESTOR_ROOT_PEM_PATH")
        .map(PathBuf::from)
        .context("ATTESTOR_ROOT_PEM_PATH not set")?;
    fs::read(&path).with_context(|| format!("read trusted root from {path:?}"))
}

/// Expected measurements come from a JSON file mapping register index to a
/// hex value, e.g. `{"0": "ab...", "1": "0xcd..."}`.
fn load_expected_measurements() -> CliResult<std::collections::BTreeMap<u32, Vec<u8>>> {
    let mut out = std::collections::BTreeMap::new();
    let Ok(path) = env::var("ATTESTOR_EXPECTED_PCRS_PATH").map(PathBuf::from) else {
        return Ok(out);
    };
    let contents = fs::read_to_string(&path).with_context(|| format!("read {path:?}"))?;
    let json: JsonValue =
        serde_json::from_str(&contents).with_context(|| format!("parse JSON from {path:?}"))?;
    let map = json
        .as_object()
        .context("expected PCRs file must be a JSON object")?;
    for (key, value) in map {
        let index: u32 = key
            .parse()
            .with_context(|| format!("non-integer register index {key:?}"))?;
        let hex_value = value
            .as_str()
            .with_context(|| format!("register {key} value must be a hex string"))?;
        let bytes = hex::decode(hex_value.trim_start_matches("0x"))
            .with_context(|| format!("register {key} hex decode"))?;
        out.insert(index, bytes);
    }
    Ok(out)
}

fn env_u64(var: &str) -> CliResult<Option<u64>> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("{var} must be an unsigned integer")),
        Err(_) => Ok(None),
    }
}
