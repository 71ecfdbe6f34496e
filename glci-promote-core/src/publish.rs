//! Image publishing: dispatches a release to the uploader of its cloud platform.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::config::CicdCfg;
use crate::contract::{
    AwsImageUploader, AwsSessionFactory, GcpClients, GcpImageUploader, ImagePublisher,
};
use crate::error::PublishError;
use crate::model::OnlineReleaseManifest;

/// Cloud platform a release is published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Aws,
    Gcp,
    /// Any platform we do not publish images for; carries the platform name
    Unsupported(String),
}

impl PublishTarget {
    pub fn from_platform(platform: &str) -> Self {
        match platform {
            "aws" => PublishTarget::Aws,
            "gcp" => PublishTarget::Gcp,
            other => PublishTarget::Unsupported(other.to_string()),
        }
    }
}

/// [`ImagePublisher`] backed by one uploader per supported platform.
pub struct CloudImagePublisher<A, G> {
    aws: A,
    gcp: G,
}

impl<A, G> CloudImagePublisher<A, G>
where
    A: AwsImageUploader,
    G: GcpImageUploader,
{
    pub fn new(aws: A, gcp: G) -> Self {
        Self { aws, gcp }
    }
}

#[async_trait]
impl<A, G> ImagePublisher for CloudImagePublisher<A, G>
where
    A: AwsImageUploader,
    G: GcpImageUploader,
{
    #[instrument(skip_all, fields(flavour = %release.flavour().filename_prefix()))]
    async fn publish(
        &self,
        release: OnlineReleaseManifest,
        cicd_cfg: &CicdCfg,
    ) -> Result<OnlineReleaseManifest, PublishError> {
        let build_cfg = &cicd_cfg.build;
        match PublishTarget::from_platform(&release.manifest.platform) {
            PublishTarget::Unsupported(platform) => {
                info!(platform = %platform, "Do not know how to publish this platform yet, passing release through");
                Ok(release)
            }
            PublishTarget::Aws => {
                let sessions = AwsSessionFactory::new(build_cfg.aws_cfg_name.as_str());
                info!(profile = sessions.profile(), "Publishing AWS image");
                let metadata = self
                    .aws
                    .upload_and_register(&sessions, build_cfg, &release)
                    .await?;
                Ok(release.with_published_image_metadata(metadata))
            }
            PublishTarget::Gcp => {
                let gcp_cfg = build_cfg
                    .gcp
                    .as_ref()
                    .ok_or_else(|| PublishError::MissingGcpCfg(cicd_cfg.name.clone()))?;
                let clients = GcpClients::from_cfg(gcp_cfg, build_cfg);
                info!(project = %clients.compute_project, "Publishing GCP image");
                let metadata = self
                    .gcp
                    .upload_and_publish(&clients, build_cfg, &release)
                    .await?;
                Ok(release.with_published_image_metadata(metadata))
            }
        }
    }
}
