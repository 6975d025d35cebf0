use std::cmp::Ordering;

use crate::maven::coordinates::is_snapshot_version;
use crate::maven::metadata_xml::*;
use crate::maven::version::{compare_versions, max_version};

/// Merges the metadata documents of several repositories into one synthetic document:
///
/// * the version lists are united and ordered by Maven version ordering
/// * `latest` / `release` are the greatest of the members' values; if no member declares one,
///   they are derived from the merged version list
/// * `lastUpdated` is the latest of all members' timestamps
/// * snapshot info and snapshot versions prefer the newest build
/// * plugins are united by prefix, first occurrence wins
pub fn merge_metadata(documents: &[Metadata]) -> Metadata {
    let versionings: Vec<&Versioning> = documents.iter()
        .filter_map(|d| d.versioning.as_ref())
        .collect();

    Metadata {
        group_id: documents.iter().find_map(|d| d.group_id.clone()),
        artifact_id: documents.iter().find_map(|d| d.artifact_id.clone()),
        version: documents.iter().find_map(|d| d.version.clone()),
        versioning: if versionings.is_empty() { None } else { Some(merge_versioning(&versionings)) },
        plugins: merge_plugins(documents),
    }
}

fn merge_versioning(versionings: &[&Versioning]) -> Versioning {
    let mut versions: Vec<String> = Vec::new();
    for version in versionings.iter()
        .filter_map(|v| v.versions.as_ref())
        .flat_map(|v| v.version.iter())
    {
        if !versions.contains(version) {
            versions.push(version.clone());
        }
    }
    versions.sort_by(|a, b| compare_versions(a, b));

    let latest = max_version(versionings.iter().filter_map(|v| v.latest.as_deref()))
        .or_else(|| max_version(versions.iter().map(String::as_str)))
        .map(str::to_string);

    let release = max_version(versionings.iter().filter_map(|v| v.release.as_deref()))
        .or_else(|| max_version(versions.iter().map(String::as_str).filter(|v| !is_snapshot_version(v))))
        .map(str::to_string);

    let last_updated = versionings.iter()
        .filter_map(|v| v.last_updated.as_deref())
        .max_by(|a, b| compare_timestamps(a, b))
        .map(str::to_string);

    let snapshot = versionings.iter()
        .filter_map(|v| v.snapshot.as_ref())
        .max_by(|a, b| compare_timestamps(a.timestamp.as_deref().unwrap_or(""), b.timestamp.as_deref().unwrap_or(""))
            .then_with(|| a.build_number.cmp(&b.build_number)))
        .cloned();

    Versioning {
        latest,
        release,
        snapshot,
        versions: if versions.is_empty() { None } else { Some(Versions { version: versions }) },
        last_updated,
        snapshot_versions: merge_snapshot_versions(versionings),
    }
}

fn merge_snapshot_versions(versionings: &[&Versioning]) -> Option<SnapshotVersions> {
    let lists: Vec<&SnapshotVersions> = versionings.iter()
        .filter_map(|v| v.snapshot_versions.as_ref())
        .collect();
    if lists.is_empty() {
        return None;
    }

    let mut merged: Vec<SnapshotVersion> = Vec::new();
    for candidate in lists.iter().flat_map(|sv| sv.snapshot_version.iter()) {
        match merged.iter_mut().find(|m| m.classifier == candidate.classifier && m.extension == candidate.extension) {
            Some(existing) => {
                let newer = compare_timestamps(
                    candidate.updated.as_deref().unwrap_or(""),
                    existing.updated.as_deref().unwrap_or(""),
                ) == Ordering::Greater;
                if newer {
                    *existing = candidate.clone();
                }
            }
            None => merged.push(candidate.clone()),
        }
    }

    Some(SnapshotVersions { snapshot_version: merged })
}

fn merge_plugins(documents: &[Metadata]) -> Option<Plugins> {
    if documents.iter().all(|d| d.plugins.is_none()) {
        return None;
    }
    let all = documents.iter()
        .filter_map(|d| d.plugins.as_ref())
        .flat_map(|p| p.plugin.iter());

    let key = |p: &Plugin| p.prefix.clone().or_else(|| p.artifact_id.clone());
    let mut merged: Vec<Plugin> = Vec::new();
    for plugin in all {
        if !merged.iter().any(|m| key(m) == key(plugin)) {
            merged.push(plugin.clone());
        }
    }
    Some(Plugins { plugin: merged })
}

/// `yyyyMMddHHmmss` and `yyyyMMdd.HHmmss` timestamps order by their digits
fn compare_timestamps(a: &str, b: &str) -> Ordering {
    let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
    let (a, b) = (digits(a), digits(b));
    a.trim_start_matches('0').len().cmp(&b.trim_start_matches('0').len())
        .then_with(|| a.trim_start_matches('0').cmp(b.trim_start_matches('0')))
}
