//! Content integrity digests.
//!
//! Lockfile entries and cache files identify content by SHA-256. The
//! lockfile carries the subresource-style form `sha256-<base64>`; cache
//! filenames carry the hex form `sha256-<hex>.tgz` so the cache is
//! self-describing. Both encode the same digest and convert losslessly.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::{PspmError, Result};

const PREFIX: &str = "sha256-";

/// Compute the integrity string for a byte payload.
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{PREFIX}{}", BASE64_STANDARD.encode(hasher.finalize()))
}

/// Convert a registry hex checksum into the integrity string form.
pub fn from_hex_checksum(checksum: &str) -> Result<String> {
    let raw = hex::decode(checksum.trim())
        .map_err(|err| PspmError::InvalidLockfile(format!("bad hex checksum: {err}")))?;
    if raw.len() != 32 {
        return Err(PspmError::InvalidLockfile(format!(
            "checksum must be 32 bytes, got {}",
            raw.len()
        )));
    }
    Ok(format!("{PREFIX}{}", BASE64_STANDARD.encode(raw)))
}

/// The cache filename for an integrity string: `sha256-<hex>.tgz`.
pub fn cache_file_name(integrity: &str) -> Result<String> {
    let raw = decode(integrity)?;
    Ok(format!("{PREFIX}{}.tgz", hex::encode(raw)))
}

/// Verify bytes against an expected integrity string.
pub fn verify(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    // Normalise through the raw digest so equivalent encodings compare equal.
    decode(expected)?;
    let actual = digest(bytes);
    if actual != expected {
        return Err(PspmError::IntegrityMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn decode(integrity: &str) -> Result<Vec<u8>> {
    let encoded = integrity
        .strip_prefix(PREFIX)
        .ok_or_else(|| PspmError::InvalidLockfile(format!("bad integrity string: {integrity}")))?;
    let raw = BASE64_STANDARD
        .decode(encoded)
        .map_err(|err| PspmError::InvalidLockfile(format!("bad integrity string: {err}")))?;
    if raw.len() != 32 {
        return Err(PspmError::InvalidLockfile(format!(
            "integrity digest must be 32 bytes, got {}",
            raw.len()
        )));
    }
    Ok(raw)
}
