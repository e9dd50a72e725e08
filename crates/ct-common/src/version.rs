//! Semantic version comparison for chart versions

use std::cmp::Ordering;

use semver::{Version, VersionReq};

use crate::{Error, Result};

/// Parse a chart version, tolerating a leading `v`.
pub fn parse_version(version: &str) -> Result<Version> {
    let trimmed = version.trim();
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(stripped).map_err(|source| Error::Version {
        version: version.to_string(),
        source,
    })
}

/// Order `old` relative to `new`.
pub fn compare_versions(old: &str, new: &str) -> Result<Ordering> {
    Ok(parse_version(old)?.cmp(&parse_version(new)?))
}

/// Whether moving from `old` to `new` may break existing installs.
///
/// `new` must satisfy `^old` to count as compatible: for `1.x` that means the
/// same major version, for `0.x` the same minor version.
pub fn breaking_change_allowed(old: &str, new: &str) -> Result<bool> {
    let old_version = parse_version(old)?;
    let new_version = parse_version(new)?;
    let req = VersionReq::parse(&format!("^{}", old_version)).map_err(|source| Error::Version {
        version: old.to_string(),
        source,
    })?;
    Ok(!req.matches(&new_version))
}
