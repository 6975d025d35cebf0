use anyhow::anyhow;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::maven::coordinates::*;
use crate::util::checksum::ChecksumAlgorithm;

lazy_static! {
    static ref SNAPSHOT_TIMESTAMP_PREFIX_REGEX: Regex = Regex::new(r"^(\d{8}\.\d{6})-(\d+)").unwrap();
    static ref VERSION_QUALIFIER_REGEX: Regex = Regex::new(
        r"(?i)^(snapshot|alpha\d*|beta\d*|rc\d*|cr\d*|m\d+|milestone\d*|final|ga|release|sp\d*|dev|incubating|patch\d*)$"
    ).unwrap();
}

pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

const MULTI_DOT_EXTENSIONS: [&str; 2] = ["tar.gz", "tar.bz2"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryLayout {
    /// Maven 2: `group/as/path/artifact/version/artifact-version[-classifier].ext`
    #[default]
    Default,
    /// Maven 1: `group/types/artifact-version[-classifier].ext`
    Legacy,
}

#[derive(Debug, thiserror::Error)]
#[error("not an artifact path: {path:?} ({reason})")]
pub struct NotAnArtifact {
    pub path: String,
    pub reason: String,
}

/// What a repository-relative path refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    Artifact(MavenArtifactRef),
    ArtifactChecksum {
        artifact: MavenArtifactRef,
        algorithm: ChecksumAlgorithm,
    },
    Metadata,
    MetadataChecksum(ChecksumAlgorithm),
    SupportFile,
    Unknown,
}
impl PathKind {
    /// the artifact a path refers to, directly or through its checksum
    pub fn artifact(&self) -> Option<&MavenArtifactRef> {
        match self {
            PathKind::Artifact(a) => Some(a),
            PathKind::ArtifactChecksum { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Converts between artifact coordinates and repository paths for both layouts.
///
/// Legacy paths can not always be parsed unambiguously, so an explicit table of
///  path overrides takes precedence over the derived mapping for that layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutTranslator {
    legacy_overrides: Vec<(String, MavenArtifactRef)>,
}
impl LayoutTranslator {
    pub fn new() -> LayoutTranslator {
        Default::default()
    }

    /// `overrides` are (path, `group:artifact:version:classifier:type`) pairs; invalid
    ///  coordinate strings are logged and skipped
    pub fn with_legacy_overrides<'a>(overrides: impl IntoIterator<Item = (&'a str, &'a str)>) -> LayoutTranslator {
        let legacy_overrides = overrides.into_iter()
            .filter_map(|(path, artifact)| match MavenArtifactRef::parse_coordinate_string(artifact) {
                Ok(artifact_ref) => Some((normalize_separators(path), artifact_ref)),
                Err(e) => {
                    warn!(path, "ignoring legacy artifact path override: {}", e);
                    None
                }
            })
            .collect();

        LayoutTranslator { legacy_overrides }
    }

    pub fn to_path(&self, artifact_ref: &MavenArtifactRef, layout: RepositoryLayout) -> String {
        match layout {
            RepositoryLayout::Default => as_maven_path(artifact_ref),
            RepositoryLayout::Legacy => {
                if let Some((path, _)) = self.legacy_overrides.iter().find(|(_, a)| a == artifact_ref) {
                    return path.clone();
                }
                as_legacy_path(artifact_ref)
            }
        }
    }

    pub fn to_artifact(&self, path: &str, layout: RepositoryLayout) -> Result<MavenArtifactRef, NotAnArtifact> {
        let result = match layout {
            RepositoryLayout::Default => parse_maven_path(path),
            RepositoryLayout::Legacy => {
                if let Some((_, artifact_ref)) = self.legacy_overrides.iter().find(|(p, _)| p == path) {
                    return Ok(artifact_ref.clone());
                }
                parse_legacy_path(path)
            }
        };

        result.map_err(|e| NotAnArtifact {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn classify(&self, path: &str, layout: RepositoryLayout) -> PathKind {
        if let Some(algorithm) = ChecksumAlgorithm::from_path(path) {
            let checksummed = match algorithm.strip_suffix(path) {
                Some(p) => p,
                None => return PathKind::Unknown,
            };
            return match self.classify(checksummed, layout) {
                PathKind::Artifact(artifact) => PathKind::ArtifactChecksum { artifact, algorithm },
                PathKind::Metadata => PathKind::MetadataChecksum(algorithm),
                PathKind::SupportFile => PathKind::SupportFile,
                _ => PathKind::Unknown,
            };
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        if file_name == METADATA_FILE_NAME {
            // Maven 1 repositories have no metadata documents
            return match layout {
                RepositoryLayout::Default => PathKind::Metadata,
                RepositoryLayout::Legacy => PathKind::Unknown,
            };
        }
        if is_support_file(path, file_name) {
            return PathKind::SupportFile;
        }

        match self.to_artifact(path, layout) {
            Ok(artifact) => PathKind::Artifact(artifact),
            Err(_) => PathKind::Unknown,
        }
    }

    /// Translates a path from one layout to another. Only artifacts and their checksums
    ///  can be translated; everything else has no counterpart in the other layout.
    pub fn translate(&self, path: &str, from: RepositoryLayout, to: RepositoryLayout) -> Option<String> {
        if from == to {
            return Some(path.to_string());
        }

        match self.classify(path, from) {
            PathKind::Artifact(artifact) => Some(self.to_path(&artifact, to)),
            PathKind::ArtifactChecksum { artifact, algorithm } => Some(algorithm.companion_path(&self.to_path(&artifact, to))),
            _ => None,
        }
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

fn is_support_file(path: &str, file_name: &str) -> bool {
    file_name.ends_with(".asc")
        || file_name == "archetype-catalog.xml"
        || path.starts_with(".index/")
}

pub fn as_maven_path(artifact_ref: &MavenArtifactRef) -> String {
    format!(
        "{}/{}/{}/{}",
        artifact_ref.coordinates.group_id.as_path(),
        artifact_ref.coordinates.artifact_id.0,
        artifact_ref.coordinates.version.base_version(),
        maven_file_name(artifact_ref),
    )
}

pub fn as_legacy_path(artifact_ref: &MavenArtifactRef) -> String {
    format!(
        "{}/{}s/{}",
        artifact_ref.coordinates.group_id.0,
        artifact_ref.artifact_type,
        maven_file_name(artifact_ref),
    )
}

/// `<artifactId>-<version>[-<classifier>].<extension>` - both layouts share the file name
fn maven_file_name(artifact_ref: &MavenArtifactRef) -> String {
    let classifier_string = match &artifact_ref.classifier {
        MavenClassifier::Unclassified => "".to_string(),
        MavenClassifier::Classified(c) => format!("-{}", c),
    };

    format!("{}-{}{}.{}",
            artifact_ref.coordinates.artifact_id.0,
            artifact_ref.coordinates.version.file_version(),
            classifier_string,
            artifact_ref.extension(),
    )
}

/// splits `"-cla.tar.gz"` into `("-cla", "tar.gz")`
fn split_extension(rest: &str) -> (&str, &str) {
    for multi in MULTI_DOT_EXTENSIONS {
        if let Some(prefix) = rest.strip_suffix(multi) {
            if let Some(prefix) = prefix.strip_suffix('.') {
                return (prefix, multi);
            }
        }
    }
    match rest.rfind('.') {
        Some(last_dot) => (&rest[..last_dot], &rest[last_dot + 1..]),
        None => (rest, ""),
    }
}

fn parse_classifier<'a>(raw: &'a str, full_file_name: &str) -> anyhow::Result<Option<&'a str>> {
    if raw.is_empty() {
        Ok(None)
    }
    else if let Some(classifier) = raw.strip_prefix('-') {
        if classifier.is_empty() {
            return Err(anyhow!("not a valid maven file name - empty classifier: {}", full_file_name));
        }
        Ok(Some(classifier))
    }
    else {
        Err(anyhow!("not a valid maven file name - invalid classifier format: {}", full_file_name))
    }
}

fn parse_maven_filename<'a>(file_name: &'a str, artifact_id: &str, version_string: &str) -> anyhow::Result<ParseFilenameResult<'a>> {
    let full_file_name = file_name;

    let file_name = file_name.strip_prefix(artifact_id)
        .and_then(|f| f.strip_prefix('-'))
        .ok_or_else(|| anyhow!("{} is not a valid maven file name: expected to start with artifact id {}", full_file_name, artifact_id))?;

    let (version, rest) = if let Some(rest) = file_name.strip_prefix(version_string) {
        (MavenVersion::parse(version_string), rest)
    }
    else if let Some(base) = version_string.strip_suffix(SNAPSHOT_SUFFIX) {
        // <artifactId>-<base>-<timestamp>-<buildNumber>[-<classifier>].<extension>
        let after_base = file_name.strip_prefix(base)
            .and_then(|f| f.strip_prefix('-'))
            .ok_or_else(|| anyhow!("{} is not a valid maven file name: expected to have version string {}", full_file_name, version_string))?;

        let captures = SNAPSHOT_TIMESTAMP_PREFIX_REGEX.captures(after_base)
            .ok_or_else(|| anyhow!("snapshot file name without timestamp: {}", full_file_name))?;
        let build_number = captures[2].parse::<u32>()?;
        let consumed = captures[0].len();

        (
            MavenVersion::Snapshot {
                version: version_string.to_string(),
                timestamp: Some(SnapshotTimestamp {
                    timestamp: captures[1].to_string(),
                    build_number,
                }),
            },
            &after_base[consumed..],
        )
    }
    else {
        return Err(anyhow!("{} is not a valid maven file name: expected to have version string {}", full_file_name, version_string));
    };

    let (raw_classifier, extension) = split_extension(rest);
    if extension.is_empty() {
        return Err(anyhow!("not a valid maven file name - no extension: {}", full_file_name));
    }

    Ok(ParseFilenameResult {
        version,
        classifier: parse_classifier(raw_classifier, full_file_name)?,
        extension,
    })
}

/// path is the relative path inside a maven repository, i.e. it starts with something like
///  "org/..." or "com/..."
pub fn parse_maven_path(path: &str) -> anyhow::Result<MavenArtifactRef> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 || segments.iter().any(|s| s.is_empty()) {
        return Err(anyhow!("not a valid Maven artifact path: {:?}", path));
    }

    let file_name = segments[segments.len() - 1];
    let version = segments[segments.len() - 2];
    let artifact_id = segments[segments.len() - 3];
    let group_id = segments[..segments.len() - 3].join(".");

    let parsed_filename = parse_maven_filename(file_name, artifact_id, version)?;

    Ok(MavenArtifactRef {
        coordinates: MavenCoordinates {
            group_id: MavenGroupId(group_id),
            artifact_id: MavenArtifactId(artifact_id.to_string()),
            version: parsed_filename.version,
        },
        classifier: MavenClassifier::from_optional(parsed_filename.classifier),
        artifact_type: parsed_filename.extension.to_string(),
    })
}

fn is_version_segment(segment: &str, first: bool) -> bool {
    if segment.starts_with(|c: char| c.is_ascii_digit()) {
        return true;
    }
    !first && VERSION_QUALIFIER_REGEX.is_match(segment)
}

/// `group/types/artifact-version[-classifier].ext`
///
/// The version starts at the first '-' followed by a digit and extends over all following
///  '-' separated segments that look like version parts; anything after that is the classifier.
pub fn parse_legacy_path(path: &str) -> anyhow::Result<MavenArtifactRef> {
    let segments: Vec<&str> = path.split('/').collect();
    let (group_id, type_dir, file_name) = match segments.as_slice() {
        [g, t, f] if !g.is_empty() && !t.is_empty() && !f.is_empty() => (*g, *t, *f),
        _ => return Err(anyhow!("not a valid legacy artifact path: {:?}", path)),
    };

    let artifact_type = type_dir.strip_suffix('s')
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("legacy type directory does not end in 's': {:?}", path))?;

    let extension = extension_for_type(artifact_type);
    let base_name = file_name.strip_suffix(extension)
        .and_then(|f| f.strip_suffix('.'))
        .ok_or_else(|| anyhow!("legacy file name does not match type {}: {:?}", artifact_type, path))?;

    let version_start = base_name.char_indices()
        .find(|(idx, c)| *c == '-' && base_name[idx + 1..].starts_with(|n: char| n.is_ascii_digit()))
        .map(|(idx, _)| idx)
        .ok_or_else(|| anyhow!("no version in legacy file name: {:?}", path))?;

    let artifact_id = &base_name[..version_start];
    if artifact_id.is_empty() {
        return Err(anyhow!("no artifact id in legacy file name: {:?}", path));
    }

    let parts: Vec<&str> = base_name[version_start + 1..].split('-').collect();
    let version_len = parts.iter()
        .enumerate()
        .take_while(|(idx, part)| is_version_segment(part, *idx == 0))
        .count();
    let version = parts[..version_len].join("-");
    let classifier = parts[version_len..].join("-");

    Ok(MavenArtifactRef::new(group_id, artifact_id, &version, Some(&classifier), artifact_type))
}

#[derive(Debug, Eq, PartialEq)]
struct ParseFilenameResult<'a> {
    version: MavenVersion,
    classifier: Option<&'a str>,
    extension: &'a str, // without leading '.', e.g. "jar"
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    fn release(v: &str) -> MavenVersion {
        MavenVersion::Release(v.to_string())
    }

    fn snapshot(v: &str, ts: &str, build_number: u32) -> MavenVersion {
        MavenVersion::Snapshot { version: v.to_string(), timestamp: Some(SnapshotTimestamp { timestamp: ts.to_string(), build_number }) }
    }

    #[rstest]
    #[case::release("a-1.0.0.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: "jar"} ))]
    #[case::release_with_dash("x-y-1.0.0.jar", "x-y", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: "jar"} ))]
    #[case::release_version_with_dash_prefix("x-y-1.0.0.jar", "x", "y-1.0.0", Some(ParseFilenameResult{ version: release("y-1.0.0"), classifier: None, extension: "jar"} ))]
    #[case::release_version_with_dash_suffix("x-1.0.0-y.jar", "x", "1.0.0-y", Some(ParseFilenameResult{ version: release("1.0.0-y"), classifier: None, extension: "jar"} ))]
    #[case::release_extension("q-1.0.0.abc", "q", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: "abc"} ))]
    #[case::release_tar_gz("q-1.0.0-bin.tar.gz", "q", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("bin"), extension: "tar.gz"} ))]
    #[case::release_classifier("a-1.0.0-cla.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("cla"), extension: "jar"} ))]
    #[case::release_classifier_with_dash("a-1.0.0-cla-rst.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("cla-rst"), extension: "jar"} ))]
    #[case::release_classifier_with_dash_suffix("a-1.0.0-cla-rst.jar", "a", "1.0.0-cla", Some(ParseFilenameResult{ version: release("1.0.0-cla"), classifier: Some("rst"), extension: "jar"} ))]
    #[case::release_invalid_too_short_1("xxxxxx", "a", "1.0.0", None)]
    #[case::release_invalid_too_short_2("", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_artifact("a-1.0.0.jar", "b", "1.0.0", None)]
    #[case::release_invalid_no_dash_after_artifact("a1.0.0.jar", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_version("a-1.0.0.jar", "a", "1.0.1", None)]
    #[case::release_invalid_no_version("a.jar", "a", "1.0.0", None)]
    #[case::release_invalid_no_dash_before_classifier("a-1.0.0xyz.jar", "a", "1.0.0", None)]
    #[case::release_invalid_empty_classifier("a-1.0.0-.jar", "a", "1.0.0", None)]

    #[case::snapshot_plain("a-1.0.0-SNAPSHOT.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: MavenVersion::Snapshot { version: "1.0.0-SNAPSHOT".to_string(), timestamp: None }, classifier: None, extension: "jar"}))]
    #[case::snapshot("a-1.0.0-20230102.030405-5.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: snapshot("1.0.0-SNAPSHOT", "20230102.030405", 5), classifier: None, extension: "jar"}))]
    #[case::snapshot_classifier("a-1.0.0-20230102.030405-5-cla.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: snapshot("1.0.0-SNAPSHOT", "20230102.030405", 5), classifier: Some("cla"), extension: "jar"}))]
    #[case::snapshot_classifier_with_dash("a-1.0.0-20230102.030405-12-a-b-c.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: snapshot("1.0.0-SNAPSHOT", "20230102.030405", 12), classifier: Some("a-b-c"), extension: "jar"}))]
    #[case::snapshot_classifier_like_timestamp("a-1.0.0-11111111.111111-1-22222222.222222.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: snapshot("1.0.0-SNAPSHOT", "11111111.111111", 1), classifier: Some("22222222.222222"), extension: "jar"}))]
    #[case::snapshot_without_build_number("a-1.0.0-20230102.030405.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_without_timestamp_but_classifier("a-1.0.0-a-b-c.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_too_short("", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_wrong_artifact("a-1.0.0-20230102.030405-1.jar", "b", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_wrong_version("a-1.0.0-20230102.030405-1.jar", "a", "1.0.1-SNAPSHOT", None)]
    #[case::snapshot_invalid_build_number("a-1.0.0-20230102.030405-a.jar", "a", "1.0.0-SNAPSHOT", None)]

    #[case::lowercase_snapshot_is_release("a-1.0.0-snapshot-cla.jar", "a", "1.0.0-snapshot", Some(ParseFilenameResult{ version: release("1.0.0-snapshot"), classifier: Some("cla"), extension: "jar"}))]
    fn test_parse_filename(#[case] file_name: &str, #[case] artifact_id: &str, #[case] version_string: &str, #[case] expected: Option<ParseFilenameResult>) {
        let actual = parse_maven_filename(file_name, artifact_id, version_string);

        if let Some(expected) = expected {
            let actual = actual.unwrap();
            assert_eq!(actual, expected);
        }
        else {
            assert!(actual.is_err());
        }
    }

    #[test]
    fn test_parse_maven_path() {
        let parsed = parse_maven_path("org/apache/commons/commons-lang3/3.12.0/commons-lang3-3.12.0-sources.jar").unwrap();
        assert_eq!(parsed, MavenArtifactRef::new("org.apache.commons", "commons-lang3", "3.12.0", Some("sources"), "jar"));
        assert_eq!(as_maven_path(&parsed), "org/apache/commons/commons-lang3/3.12.0/commons-lang3-3.12.0-sources.jar");

        assert!(parse_maven_path("commons-lang3/3.12.0/commons-lang3-3.12.0.jar").is_err());
        assert!(parse_maven_path("org//commons-lang3/3.12.0/commons-lang3-3.12.0.jar").is_err());
    }

    #[test]
    fn test_snapshot_path_uses_base_version_directory() {
        let artifact = MavenArtifactRef::new("org.x", "y", "1.0-20230102.030405-3", None, "jar");
        let path = as_maven_path(&artifact);
        assert_eq!(path, "org/x/y/1.0-SNAPSHOT/y-1.0-20230102.030405-3.jar");
        assert_eq!(parse_maven_path(&path).unwrap(), artifact);
    }

    #[rstest]
    #[case::plain("org.x/jars/y-1.0.jar", MavenArtifactRef::new("org.x", "y", "1.0", None, "jar"))]
    #[case::pom("org.x/poms/y-1.0.pom", MavenArtifactRef::new("org.x", "y", "1.0", None, "pom"))]
    #[case::dashed_artifact("org.x/jars/y-z-1.0.jar", MavenArtifactRef::new("org.x", "y-z", "1.0", None, "jar"))]
    #[case::qualified_version("org.x/jars/y-1.0-beta-2.jar", MavenArtifactRef::new("org.x", "y", "1.0-beta-2", None, "jar"))]
    #[case::classifier("org.x/jars/y-1.0-jdk15.jar", MavenArtifactRef::new("org.x", "y", "1.0", Some("jdk15"), "jar"))]
    #[case::sources("org.x/java-sources/y-1.0-sources.jar", MavenArtifactRef::new("org.x", "y", "1.0", Some("sources"), "java-source"))]
    #[case::snapshot("org.x/jars/y-1.0-SNAPSHOT.jar", MavenArtifactRef::new("org.x", "y", "1.0-SNAPSHOT", None, "jar"))]
    #[case::timestamped("org.x/jars/y-1.0-20230102.030405-3.jar", MavenArtifactRef::new("org.x", "y", "1.0-20230102.030405-3", None, "jar"))]
    fn test_parse_legacy_path(#[case] path: &str, #[case] expected: MavenArtifactRef) {
        assert_eq!(parse_legacy_path(path).unwrap(), expected);
    }

    #[rstest]
    #[case::too_deep("org/x/jars/y-1.0.jar")]
    #[case::no_type_dir("org.x/jar/y-1.0.jar")]
    #[case::wrong_extension("org.x/jars/y-1.0.pom")]
    #[case::no_version("org.x/jars/y.jar")]
    fn test_parse_legacy_path_invalid(#[case] path: &str) {
        assert!(parse_legacy_path(path).is_err());
    }

    #[rstest]
    #[case(MavenArtifactRef::new("org.x", "y", "1.0", None, "jar"))]
    #[case(MavenArtifactRef::new("org.x", "y-z", "2.3.4", Some("tests"), "jar"))]
    #[case(MavenArtifactRef::new("x", "y", "1.0-rc1", None, "pom"))]
    #[case(MavenArtifactRef::new("org.x", "y", "1.0-SNAPSHOT", Some("sources"), "java-source"))]
    #[case(MavenArtifactRef::new("org.x", "y", "1.0-20230102.030405-3", Some("jdk15"), "jar"))]
    #[case(MavenArtifactRef::new("org.x", "y", "1.0", None, "distribution-tgz"))]
    fn test_legacy_round_trip(#[case] artifact: MavenArtifactRef) {
        let translator = LayoutTranslator::new();
        let path = translator.to_path(&artifact, RepositoryLayout::Legacy);
        assert_eq!(translator.to_artifact(&path, RepositoryLayout::Legacy).unwrap(), artifact);
    }

    #[test]
    fn test_legacy_override_takes_precedence() {
        let translator = LayoutTranslator::with_legacy_overrides([
            ("org.x/jars/y-1.0-custom.jar", "org.x:y-1.0:custom::jar"),
            ("org.x/jars/broken.jar", "not:a:coordinate"),
        ]);

        let expected = MavenArtifactRef::new("org.x", "y-1.0", "custom", None, "jar");
        assert_eq!(translator.to_artifact("org.x/jars/y-1.0-custom.jar", RepositoryLayout::Legacy).unwrap(), expected);
        assert_eq!(translator.to_path(&expected, RepositoryLayout::Legacy), "org.x/jars/y-1.0-custom.jar");

        // overrides only apply to the legacy layout
        assert_eq!(translator.to_path(&expected, RepositoryLayout::Default), "org/x/y-1.0/custom/y-1.0-custom.jar");
        assert!(translator.to_artifact("org.x/jars/broken.jar", RepositoryLayout::Legacy).is_err());
    }

    #[rstest]
    #[case::artifact("a/a/1.0/a-1.0.jar", RepositoryLayout::Default, PathKind::Artifact(MavenArtifactRef::new("a", "a", "1.0", None, "jar")))]
    #[case::artifact_checksum("a/a/1.0/a-1.0.jar.sha1", RepositoryLayout::Default, PathKind::ArtifactChecksum { artifact: MavenArtifactRef::new("a", "a", "1.0", None, "jar"), algorithm: ChecksumAlgorithm::Sha1 })]
    #[case::metadata("a/a/maven-metadata.xml", RepositoryLayout::Default, PathKind::Metadata)]
    #[case::metadata_checksum("a/a/maven-metadata.xml.md5", RepositoryLayout::Default, PathKind::MetadataChecksum(ChecksumAlgorithm::Md5))]
    #[case::signature("a/a/1.0/a-1.0.jar.asc", RepositoryLayout::Default, PathKind::SupportFile)]
    #[case::signature_checksum("a/a/1.0/a-1.0.jar.asc.sha1", RepositoryLayout::Default, PathKind::SupportFile)]
    #[case::index(".index/nexus-maven-repository-index.gz", RepositoryLayout::Default, PathKind::SupportFile)]
    #[case::unknown("a/readme.txt", RepositoryLayout::Default, PathKind::Unknown)]
    #[case::legacy_artifact("a/jars/a-1.0.jar", RepositoryLayout::Legacy, PathKind::Artifact(MavenArtifactRef::new("a", "a", "1.0", None, "jar")))]
    #[case::legacy_metadata("a/a/maven-metadata.xml", RepositoryLayout::Legacy, PathKind::Unknown)]
    fn test_classify(#[case] path: &str, #[case] layout: RepositoryLayout, #[case] expected: PathKind) {
        assert_eq!(LayoutTranslator::new().classify(path, layout), expected);
    }

    #[rstest]
    #[case::to_legacy("org/x/y/1.0/y-1.0.jar", RepositoryLayout::Default, RepositoryLayout::Legacy, Some("org.x/jars/y-1.0.jar"))]
    #[case::to_default("org.x/jars/y-1.0.jar.sha1", RepositoryLayout::Legacy, RepositoryLayout::Default, Some("org/x/y/1.0/y-1.0.jar.sha1"))]
    #[case::same_layout("anything/at/all", RepositoryLayout::Default, RepositoryLayout::Default, Some("anything/at/all"))]
    #[case::metadata_has_no_legacy_form("org/x/y/maven-metadata.xml", RepositoryLayout::Default, RepositoryLayout::Legacy, None)]
    fn test_translate(#[case] path: &str, #[case] from: RepositoryLayout, #[case] to: RepositoryLayout, #[case] expected: Option<&str>) {
        assert_eq!(LayoutTranslator::new().translate(path, from, to).as_deref(), expected);
    }
}
