//! Data model: flavours, flavour sets, release manifests and the promotion enums.
//!
//! Release manifests are stored as YAML documents. A manifest read back from
//! storage is wrapped in an [`OnlineReleaseManifest`], which remembers where it
//! was read from; [`OnlineReleaseManifest::stripped_manifest`] drops that again
//! before a single manifest is uploaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// CPU architecture of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One architecture/platform/feature combination a build supports.
///
/// Modifiers are kept sorted so two flavours with the same features compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flavour {
    pub architecture: Architecture,
    pub platform: String,
    pub modifiers: Vec<String>,
}

impl Flavour {
    pub fn new(architecture: Architecture, platform: impl Into<String>, modifiers: &[String]) -> Self {
        let mut modifiers = modifiers.to_vec();
        modifiers.sort();
        modifiers.dedup();
        Self {
            architecture,
            platform: platform.into(),
            modifiers,
        }
    }

    /// `{platform}-{modifiers joined by "_"}-{architecture}`; the modifier part is
    /// left out for flavours without modifiers.
    pub fn filename_prefix(&self) -> String {
        let mut parts = vec![self.platform.clone()];
        if !self.modifiers.is_empty() {
            parts.push(self.modifiers.join("_"));
        }
        parts.push(self.architecture.to_string());
        parts.join("-")
    }
}

/// A group of flavours declared as the cartesian product of its lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavourCombination {
    pub architectures: Vec<Architecture>,
    pub platforms: Vec<String>,
    /// Each entry is one feature list; no entry means a single flavour without modifiers.
    #[serde(default)]
    pub modifiers: Vec<Vec<String>>,
}

/// Named, ordered collection of flavours that together make up one complete build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavourSet {
    pub name: String,
    pub flavour_combinations: Vec<FlavourCombination>,
}

impl FlavourSet {
    /// Expands all combinations in declaration order, dropping duplicates.
    pub fn flavours(&self) -> Vec<Flavour> {
        let no_modifiers = vec![Vec::new()];
        let mut flavours: Vec<Flavour> = Vec::new();
        for combination in &self.flavour_combinations {
            let modifier_sets = if combination.modifiers.is_empty() {
                &no_modifiers
            } else {
                &combination.modifiers
            };
            for architecture in &combination.architectures {
                for platform in &combination.platforms {
                    for modifiers in modifier_sets {
                        let flavour = Flavour::new(*architecture, platform.as_str(), modifiers);
                        if !flavours.contains(&flavour) {
                            flavours.push(flavour);
                        }
                    }
                }
            }
        }
        flavours
    }
}

/// A file belonging to a release, stored in S3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFile {
    pub name: String,
    pub suffix: String,
    pub s3_key: String,
    pub s3_bucket_name: String,
}

/// Image published to one AWS region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsPublishedImage {
    pub ami_id: String,
    pub aws_region: String,
    pub image_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsPublishedImageSet {
    pub published_aws_images: Vec<AwsPublishedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpPublishedImage {
    pub gcp_image_name: String,
    pub gcp_project_name: String,
}

/// Where a release's machine image was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PublishedImageMetadata {
    Aws(AwsPublishedImageSet),
    Gcp(GcpPublishedImage),
}

impl fmt::Display for PublishedImageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishedImageMetadata::Aws(set) => {
                let images: Vec<String> = set
                    .published_aws_images
                    .iter()
                    .map(|image| format!("{}:{}", image.aws_region, image.ami_id))
                    .collect();
                write!(f, "aws[{}]", images.join(", "))
            }
            PublishedImageMetadata::Gcp(image) => {
                write!(f, "gcp[{}/{}]", image.gcp_project_name, image.gcp_image_name)
            }
        }
    }
}

/// One build artifact for one flavour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub version: String,
    pub build_committish: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub architecture: Architecture,
    pub platform: String,
    pub build_timestamp: String,
    pub gardenlinux_epoch: u32,
    #[serde(default)]
    pub paths: Vec<ReleaseFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_image_metadata: Option<PublishedImageMetadata>,
}

impl ReleaseManifest {
    pub fn flavour(&self) -> Flavour {
        Flavour::new(self.architecture, self.platform.as_str(), &self.modifiers)
    }

    pub fn path_by_suffix(&self, suffix: &str) -> Option<&ReleaseFile> {
        self.paths.iter().find(|path| path.suffix == suffix)
    }
}

/// A release manifest together with the storage location it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineReleaseManifest {
    #[serde(flatten)]
    pub manifest: ReleaseManifest,
    pub s3_key: String,
    pub s3_bucket: String,
}

impl OnlineReleaseManifest {
    pub fn flavour(&self) -> Flavour {
        self.manifest.flavour()
    }

    pub fn stripped_manifest(&self) -> ReleaseManifest {
        self.manifest.clone()
    }

    /// Returns a copy of this release carrying the given publish result.
    pub fn with_published_image_metadata(self, metadata: PublishedImageMetadata) -> Self {
        Self {
            manifest: ReleaseManifest {
                published_image_metadata: Some(metadata),
                ..self.manifest
            },
            ..self
        }
    }
}

/// Aggregation of the manifests of all flavours of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifestSet {
    pub manifests: Vec<OnlineReleaseManifest>,
    pub flavour_set_name: String,
}

/// Build-type namespace a promotion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Snapshot,
    Daily,
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Snapshot => "snapshot",
            BuildType::Daily => "daily",
            BuildType::Release => "release",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot" => Ok(BuildType::Snapshot),
            "daily" => Ok(BuildType::Daily),
            "release" => Ok(BuildType::Release),
            other => Err(ConfigError::InvalidValue {
                kind: "build type",
                value: other.to_string(),
                expected: "snapshot, daily, release",
            }),
        }
    }
}

/// Whether a promotion also publishes machine images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoteMode {
    ManifestsOnly,
    ManifestsAndPublish,
}

impl PromoteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoteMode::ManifestsOnly => "manifests_only",
            PromoteMode::ManifestsAndPublish => "manifests_and_publish",
        }
    }
}

impl fmt::Display for PromoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromoteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manifests_only" => Ok(PromoteMode::ManifestsOnly),
            "manifests_and_publish" => Ok(PromoteMode::ManifestsAndPublish),
            other => Err(ConfigError::InvalidValue {
                kind: "promote mode",
                value: other.to_string(),
                expected: "manifests_only, manifests_and_publish",
            }),
        }
    }
}

/// Manifest representation to upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestType {
    Single,
    Set,
}

impl ManifestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestType::Single => "single",
            ManifestType::Set => "set",
        }
    }
}

impl fmt::Display for ManifestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifestType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ManifestType::Single),
            "set" => Ok(ManifestType::Set),
            other => Err(ConfigError::InvalidValue {
                kind: "manifest type",
                value: other.to_string(),
                expected: "single, set",
            }),
        }
    }
}
