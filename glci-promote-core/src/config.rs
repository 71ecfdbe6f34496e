use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::model::FlavourSet;

/// Root of all manifest keys; sources and promotion targets live below it.
pub const MANIFEST_KEY_ROOT: &str = "meta";

/// Contents of the CI/CD configuration file (`cicd.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CicdCfgFile {
    pub cicd_cfgs: Vec<CicdCfg>,
}

impl CicdCfgFile {
    pub fn find(&self, name: &str) -> Result<&CicdCfg, ConfigError> {
        self.cicd_cfgs
            .iter()
            .find(|cfg| cfg.name == name)
            .ok_or_else(|| ConfigError::UnknownCicdCfg(name.to_string()))
    }
}

/// Contents of the flavours file (`flavours.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavoursFile {
    pub flavour_sets: Vec<FlavourSet>,
}

impl FlavoursFile {
    pub fn find(&self, name: &str) -> Result<&FlavourSet, ConfigError> {
        self.flavour_sets
            .iter()
            .find(|set| set.name == name)
            .ok_or_else(|| ConfigError::UnknownFlavourSet(name.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CicdCfg {
    pub name: String,
    pub build: BuildCfg,
}

impl CicdCfg {
    pub fn trace_loaded(&self) {
        info!(
            cicd_cfg = %self.name,
            aws_cfg_name = %self.build.aws_cfg_name,
            aws_region = %self.build.aws_region,
            gcp = self.build.gcp.is_some(),
            "Loaded cicd config"
        );
        debug!(?self, "Cicd config loaded (full debug)");
    }
}

/// Build settings: cloud accounts, buckets and the manifest store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCfg {
    /// AWS profile used for every AWS call
    pub aws_cfg_name: String,
    /// Region images are imported into
    pub aws_region: String,
    /// Additional regions the registered AMI is copied to
    #[serde(default)]
    pub aws_target_regions: Vec<String>,
    pub s3_bucket_name: String,
    #[serde(default)]
    pub gcp: Option<GcpCfg>,
    pub manifest_store: ManifestStoreCfg,
}

impl BuildCfg {
    /// Key prefix of the manifests of one source, e.g. `meta/snapshots`.
    pub fn manifest_key_prefix(&self, name: &str) -> String {
        format!("{MANIFEST_KEY_ROOT}/{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpCfg {
    pub cfg_name: String,
    pub project: String,
    /// Bucket images are staged in before they are created
    pub bucket_name: String,
}

/// Backend holding the release manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestStoreCfg {
    /// Keys map to files below `root`
    Filesystem { root: PathBuf },
    /// Keys map to `{endpoint}/{bucket}/{key}`
    Http { endpoint: String, bucket: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const CICD_YAML: &str = r#"
cicd_cfgs:
  - name: default
    build:
      aws_cfg_name: gardenlinux
      aws_region: eu-central-1
      aws_target_regions: [eu-west-1]
      s3_bucket_name: gardenlinux-build
      gcp:
        cfg_name: gardenlinux
        project: gardenlinux-images
        bucket_name: gardenlinux-images
      manifest_store:
        type: http
        endpoint: http://localhost:9000
        bucket: gardenlinux-build
  - name: local
    build:
      aws_cfg_name: dev
      aws_region: eu-central-1
      s3_bucket_name: dev-build
      manifest_store:
        type: filesystem
        root: ./bucket
"#;

    #[test]
    fn finds_cicd_cfg_by_name() {
        let file: CicdCfgFile = serde_yaml::from_str(CICD_YAML).unwrap();
        let local = file.find("local").unwrap();
        assert!(local.build.gcp.is_none());
        assert!(local.build.aws_target_regions.is_empty());
        assert!(matches!(
            local.build.manifest_store,
            ManifestStoreCfg::Filesystem { .. }
        ));
        assert_eq!(local.build.manifest_key_prefix("snapshots"), "meta/snapshots");
    }

    #[test]
    fn unknown_cicd_cfg_is_a_config_error() {
        let file: CicdCfgFile = serde_yaml::from_str(CICD_YAML).unwrap();
        let err = file.find("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCicdCfg(name) if name == "nope"));
    }
}
