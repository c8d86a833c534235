//! Registry tarball fetching.

use crate::error::Result;
use crate::fetcher::FetchedSkill;
use crate::integrity;
use crate::registry::RegistryClient;

/// Download a resolved registry version and verify it byte-exactly against
/// the expected integrity (derived from the registry's hex checksum at
/// resolution time, or carried by the lockfile). The download honours the
/// presigned-URL rule via the client.
pub fn fetch(
    client: &RegistryClient,
    identity: &str,
    version: &str,
    download_url: &str,
    expected_integrity: &str,
) -> Result<FetchedSkill> {
    let bytes = client.download(download_url)?;
    integrity::verify(identity, &bytes, expected_integrity)?;
    Ok(FetchedSkill {
        bytes,
        version: version.to_string(),
        integrity: expected_integrity.to_string(),
    })
}
