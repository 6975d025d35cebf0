use std::fmt::{Display, Formatter};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `<base>-<yyyyMMdd.HHmmss>-<buildNumber>`, the file-level form of a deployed snapshot
    static ref TIMESTAMPED_SNAPSHOT_REGEX: Regex = Regex::new(r"^(.+)-(\d{8}\.\d{6})-(\d+)$").unwrap();
}

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub struct SnapshotTimestamp {
    pub timestamp: String, // yyyyMMdd.HHmmss
    pub build_number: u32,
}

#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum MavenVersion {
    Release(String),
    Snapshot {
        version: String, // ending in '-SNAPSHOT'
        timestamp: Option<SnapshotTimestamp>,
    }
}
impl MavenVersion {
    pub fn parse(version: &str) -> MavenVersion {
        if version.ends_with(SNAPSHOT_SUFFIX) {
            return MavenVersion::Snapshot {
                version: version.to_string(),
                timestamp: None,
            };
        }

        if let Some(captures) = TIMESTAMPED_SNAPSHOT_REGEX.captures(version) {
            if let Ok(build_number) = captures[3].parse::<u32>() {
                return MavenVersion::Snapshot {
                    version: format!("{}{}", &captures[1], SNAPSHOT_SUFFIX),
                    timestamp: Some(SnapshotTimestamp {
                        timestamp: captures[2].to_string(),
                        build_number,
                    }),
                };
            }
        }

        MavenVersion::Release(version.to_string())
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, MavenVersion::Snapshot { .. })
    }

    /// The version as it appears in the version directory, i.e. `1.0-SNAPSHOT` for all
    ///  snapshot builds of `1.0`
    pub fn base_version(&self) -> &str {
        match self {
            MavenVersion::Release(v) => v,
            MavenVersion::Snapshot { version, .. } => version,
        }
    }

    /// The version as it appears in file names
    pub fn file_version(&self) -> String {
        match self {
            MavenVersion::Release(v) => v.clone(),
            MavenVersion::Snapshot { version, timestamp: None } => version.clone(),
            MavenVersion::Snapshot { version, timestamp: Some(ts) } => format!(
                "{}-{}-{}",
                version.trim_end_matches(SNAPSHOT_SUFFIX),
                ts.timestamp,
                ts.build_number,
            ),
        }
    }
}
impl Display for MavenVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_version())
    }
}

/// Snapshot classification of a raw version string: `-SNAPSHOT` suffix or a
///  timestamped snapshot build
pub fn is_snapshot_version(version: &str) -> bool {
    MavenVersion::parse(version).is_snapshot()
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenGroupId(pub String);
impl MavenGroupId {
    pub fn as_path(&self) -> String {
        self.0.replace('.', "/")
    }
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenCoordinates {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: MavenVersion,
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}
impl MavenClassifier {
    /// an empty classifier string means 'no classifier'
    pub fn from_optional(classifier: Option<&str>) -> MavenClassifier {
        match classifier {
            None | Some("") => MavenClassifier::Unclassified,
            Some(s) => MavenClassifier::Classified(s.to_string()),
        }
    }

    pub fn as_option(&self) -> Option<&str> {
        match self {
            MavenClassifier::Unclassified => None,
            MavenClassifier::Classified(c) => Some(c),
        }
    }
}

/// A single file of an artifact: coordinates plus classifier and type
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactRef {
    pub coordinates: MavenCoordinates,
    pub classifier: MavenClassifier,
    pub artifact_type: String,
}
impl MavenArtifactRef {
    pub fn new(group_id: &str, artifact_id: &str, version: &str, classifier: Option<&str>, artifact_type: &str) -> MavenArtifactRef {
        MavenArtifactRef {
            coordinates: MavenCoordinates {
                group_id: MavenGroupId(group_id.to_string()),
                artifact_id: MavenArtifactId(artifact_id.to_string()),
                version: MavenVersion::parse(version),
            },
            classifier: MavenClassifier::from_optional(classifier),
            artifact_type: artifact_type.to_string(),
        }
    }

    /// Parses `group:artifact:version:classifier:type` as used by legacy path overrides
    pub fn parse_coordinate_string(s: &str) -> anyhow::Result<MavenArtifactRef> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [group_id, artifact_id, version, classifier, artifact_type]
                if !group_id.is_empty() && !artifact_id.is_empty() && !version.is_empty() && !artifact_type.is_empty() =>
            {
                Ok(MavenArtifactRef::new(group_id, artifact_id, version, Some(classifier), artifact_type))
            }
            _ => Err(anyhow::anyhow!("not a valid artifact coordinate (group:artifact:version:classifier:type): {:?}", s)),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.coordinates.version.is_snapshot()
    }

    /// File extension for the artifact's type, without leading '.'
    pub fn extension(&self) -> &str {
        extension_for_type(&self.artifact_type)
    }
}
impl Display for MavenArtifactRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.coordinates.group_id.0,
            self.coordinates.artifact_id.0,
            self.coordinates.version,
            self.classifier.as_option().unwrap_or(""),
            self.artifact_type,
        )
    }
}

pub fn extension_for_type(artifact_type: &str) -> &str {
    match artifact_type {
        "maven-plugin" | "ejb" | "ejb-client" | "java-source" | "javadoc" | "test-jar" => "jar",
        "distribution-tgz" => "tar.gz",
        "distribution-zip" => "zip",
        other => other,
    }
}
