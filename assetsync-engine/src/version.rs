//! Version arithmetic for write-back updates.

use std::cmp::Ordering;

/// Next patch release of `version`: `1.2.3` → `1.2.4`.
///
/// Pre-release and build metadata are dropped (`1.2.3-beta` → `1.2.4`).
/// Versions `semver` rejects but that still have three numeric parts (such
/// as `01.2.3`) are bumped textually. `None` when there is no patch number
/// or the patch number is already `u64::MAX`.
pub fn bump_patch(version: &str) -> Option<String> {
    if let Ok(mut v) = semver::Version::parse(version) {
        v.patch = v.patch.checked_add(1)?;
        v.pre = semver::Prerelease::EMPTY;
        v.build = semver::BuildMetadata::EMPTY;
        return Some(v.to_string());
    }
    let (major, minor, patch) = split_core(version)?;
    let next = patch.parse::<u64>().ok()?.checked_add(1)?;
    Some(format!("{major}.{minor}.{next}"))
}

/// Order two versions by semver precedence, falling back to the numeric
/// `major.minor.patch` core. `None` when either side has no numeric core.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    if let (Ok(a), Ok(b)) = (semver::Version::parse(a), semver::Version::parse(b)) {
        return Some(a.cmp_precedence(&b));
    }
    Some(numeric_core(a)?.cmp(&numeric_core(b)?))
}

/// True when `proposed` sorts strictly below `current`.
pub fn is_regression(current: &str, proposed: &str) -> bool {
    compare_versions(proposed, current) == Some(Ordering::Less)
}

fn split_core(version: &str) -> Option<(&str, &str, &str)> {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts = core.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(major), Some(minor), Some(patch), None) => Some((major, minor, patch)),
        _ => None,
    }
}

fn numeric_core(version: &str) -> Option<(u64, u64, u64)> {
    let (major, minor, patch) = split_core(version)?;
    Some((major.parse().ok()?, minor.parse().ok()?, patch.parse().ok()?))
}
