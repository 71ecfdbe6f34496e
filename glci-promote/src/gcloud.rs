//! GCP image publishing through the `aws` and `gcloud` command line tools.
//!
//! The GCP image tarball of a release lives in S3. It is staged through a local
//! temporary file into the configured GCS bucket, and a compute image is created
//! from the uploaded object.

use async_trait::async_trait;
use glci_promote_core::config::BuildCfg;
use glci_promote_core::contract::{GcpClients, GcpImageUploader};
use glci_promote_core::error::PublishError;
use glci_promote_core::model::{GcpPublishedImage, OnlineReleaseManifest, PublishedImageMetadata};
use tracing::info;

use crate::command::{args, Tool};

/// Suffix of the release file turned into a compute image.
pub const GCP_IMAGE_SUFFIX: &str = "rootfs-gcpimage.tar.gz";

/// Compute image names: lowercase letters, digits and dashes, at most 63 characters.
pub fn gcp_image_name(release: &OnlineReleaseManifest) -> String {
    let raw = format!(
        "gardenlinux-{}-{}",
        release.flavour().filename_prefix(),
        release.manifest.version
    );
    let mut name: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    name.truncate(63);
    name.trim_end_matches('-').to_string()
}

pub struct GcloudCli {
    aws: Tool,
    gcloud: Tool,
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new(Tool::new("aws"), Tool::new("gcloud"))
    }
}

impl GcloudCli {
    pub fn new(aws: Tool, gcloud: Tool) -> Self {
        Self { aws, gcloud }
    }
}

#[async_trait]
impl GcpImageUploader for GcloudCli {
    async fn upload_and_publish(
        &self,
        clients: &GcpClients,
        _build_cfg: &BuildCfg,
        release: &OnlineReleaseManifest,
    ) -> Result<PublishedImageMetadata, PublishError> {
        let image_file = release
            .manifest
            .path_by_suffix(GCP_IMAGE_SUFFIX)
            .ok_or_else(|| PublishError::MissingImageFile {
                flavour: release.flavour().filename_prefix(),
                suffix: GCP_IMAGE_SUFFIX.to_string(),
            })?;
        let image_name = gcp_image_name(release);
        let staging = tempfile::Builder::new()
            .prefix("glci-gcp-")
            .suffix(".tar.gz")
            .tempfile()?;
        let staging_path = staging.path().display().to_string();

        let s3_uri = format!("s3://{}/{}", image_file.s3_bucket_name, image_file.s3_key);
        let s3 = &clients.s3_session;
        let mut download = args(["--profile", s3.profile.as_str(), "--region", s3.region.as_str()]);
        download.extend(args(["s3", "cp", s3_uri.as_str(), staging_path.as_str()]));
        self.aws.run(&download).await?;
        info!(source = %s3_uri, "Downloaded GCP image from S3");

        let gcs_uri = format!("gs://{}/{}.tar.gz", clients.storage_bucket, image_name);
        let project = clients.compute_project.as_str();
        let configuration = clients.gcp_cfg_name.as_str();
        self.gcloud
            .run(&args([
                "storage",
                "cp",
                staging_path.as_str(),
                gcs_uri.as_str(),
                "--project",
                project,
                "--configuration",
                configuration,
            ]))
            .await?;
        info!(target = %gcs_uri, "Uploaded GCP image to storage bucket");

        self.gcloud
            .run(&args([
                "compute",
                "images",
                "create",
                image_name.as_str(),
                "--project",
                project,
                "--configuration",
                configuration,
                "--source-uri",
                gcs_uri.as_str(),
                "--guest-os-features",
                "VIRTIO_SCSI_MULTIQUEUE,UEFI_COMPATIBLE,GVNIC",
                "--quiet",
            ]))
            .await?;
        info!(image = %image_name, project, "Created GCP compute image");

        Ok(PublishedImageMetadata::Gcp(GcpPublishedImage {
            gcp_image_name: image_name,
            gcp_project_name: clients.compute_project.clone(),
        }))
    }
}
