#![allow(unused)]

//! # contract: collaborator interfaces of the promotion workflow
//!
//! The promotion orchestrator never talks to storage or a cloud provider
//! directly. It goes through the traits defined here:
//!
//! - [`ManifestStore`]: reads and writes YAML documents keyed by a string path.
//! - [`ReleaseFinder`]: looks up the release manifests of one build.
//! - [`ImagePublisher`]: publishes the machine image of one release.
//! - [`AwsImageUploader`] / [`GcpImageUploader`]: the platform-specific image
//!   tooling the default [`ImagePublisher`] delegates to.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the mocks are exported with the
//!   `test-export-mocks` feature so the CLI crate and integration tests can use them.

use async_trait::async_trait;

use mockall::{automock, predicate::*};

use crate::config::{BuildCfg, CicdCfg, GcpCfg};
use crate::error::{PublishError, StoreError};
use crate::model::{FlavourSet, OnlineReleaseManifest, PublishedImageMetadata};

/// Document storage keyed by slash-separated paths such as `meta/daily/1443-abcdef-testing`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Location reported in `s3_bucket` of manifests read from this store.
    fn bucket_name(&self) -> String;

    /// Reads the document at `key`. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes (or overwrites) the document at `key`.
    async fn put(&self, key: &str, body: String) -> Result<(), StoreError>;
}

/// Identifies the build whose releases are looked up.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseQuery<'a> {
    pub flavour_set: &'a FlavourSet,
    pub version: &'a str,
    pub build_committish: &'a str,
    pub gardenlinux_epoch: u32,
    /// Key prefix of the source, e.g. `meta/snapshots`
    pub prefix: &'a str,
}

/// Returns the subset of a build's release manifests that exist in a source location.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ReleaseFinder: Send + Sync {
    async fn find_releases<'a>(
        &self,
        query: ReleaseQuery<'a>,
    ) -> Result<Vec<OnlineReleaseManifest>, StoreError>;
}

/// Publishes the machine image of a single release.
///
/// Returns the release carrying published-image metadata, or the release
/// unchanged when its platform is not publishable.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(
        &self,
        release: OnlineReleaseManifest,
        cicd_cfg: &CicdCfg,
    ) -> Result<OnlineReleaseManifest, PublishError>;
}

/// Credentials context for AWS calls: a named profile in one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSession {
    pub profile: String,
    pub region: String,
}

/// Creates [`AwsSession`]s bound to one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSessionFactory {
    profile: String,
}

impl AwsSessionFactory {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn session(&self, region: &str) -> AwsSession {
        AwsSession {
            profile: self.profile.clone(),
            region: region.to_string(),
        }
    }
}

/// Imports a release's raw image into EC2 and registers it as an AMI.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AwsImageUploader: Send + Sync {
    async fn upload_and_register(
        &self,
        sessions: &AwsSessionFactory,
        build_cfg: &BuildCfg,
        release: &OnlineReleaseManifest,
    ) -> Result<PublishedImageMetadata, PublishError>;
}

/// The clients a GCP image upload needs: S3 to read the image, GCS to stage
/// it, and the compute project to create it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpClients {
    pub s3_session: AwsSession,
    pub storage_bucket: String,
    pub compute_project: String,
    pub gcp_cfg_name: String,
}

impl GcpClients {
    pub fn from_cfg(gcp_cfg: &GcpCfg, build_cfg: &BuildCfg) -> Self {
        Self {
            s3_session: AwsSessionFactory::new(build_cfg.aws_cfg_name.as_str())
                .session(&build_cfg.aws_region),
            storage_bucket: gcp_cfg.bucket_name.clone(),
            compute_project: gcp_cfg.project.clone(),
            gcp_cfg_name: gcp_cfg.cfg_name.clone(),
        }
    }
}

/// Copies a release's image from S3 to GCS and creates a compute image from it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GcpImageUploader: Send + Sync {
    async fn upload_and_publish(
        &self,
        clients: &GcpClients,
        build_cfg: &BuildCfg,
        release: &OnlineReleaseManifest,
    ) -> Result<PublishedImageMetadata, PublishError>;
}
