//! AWS image publishing through the `aws` command line tool.
//!
//! The raw root filesystem of a release is imported as an EBS snapshot, the
//! snapshot is registered as an AMI, and the AMI is copied into every additional
//! target region. Credentials come from the AWS profile of the session.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use glci_promote_core::config::BuildCfg;
use glci_promote_core::contract::{AwsImageUploader, AwsSession, AwsSessionFactory};
use glci_promote_core::error::PublishError;
use glci_promote_core::model::{
    Architecture, AwsPublishedImage, AwsPublishedImageSet, OnlineReleaseManifest,
    PublishedImageMetadata, ReleaseFile,
};
use tracing::{debug, info};

use crate::command::{args, Tool};

/// Suffix of the release file imported into EC2.
pub const RAW_IMAGE_SUFFIX: &str = "rootfs.raw";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub struct AwsCli {
    tool: Tool,
    poll_interval: Duration,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new(Tool::new("aws"), DEFAULT_POLL_INTERVAL)
    }
}

impl AwsCli {
    pub fn new(tool: Tool, poll_interval: Duration) -> Self {
        Self {
            tool,
            poll_interval,
        }
    }

    async fn ec2(&self, session: &AwsSession, ec2_args: Vec<String>) -> Result<serde_json::Value, PublishError> {
        let mut cmd = session_args(session);
        cmd.push("ec2".to_string());
        cmd.extend(ec2_args);
        self.tool.run_json(&cmd).await
    }

    /// Imports the raw image and waits until the snapshot is ready; returns the snapshot id.
    async fn import_snapshot(
        &self,
        session: &AwsSession,
        image_file: &ReleaseFile,
        description: &str,
    ) -> Result<String, PublishError> {
        let mut import_args = args(["import-snapshot", "--description"]);
        import_args.push(description.to_string());
        import_args.push("--disk-container".to_string());
        import_args.push(format!(
            "Format=raw,UserBucket={{S3Bucket={},S3Key={}}}",
            image_file.s3_bucket_name, image_file.s3_key
        ));
        let started = self.ec2(session, import_args).await?;
        let task_id = self.tool.json_str(&started, "/ImportTaskId")?;
        info!(task_id = %task_id, region = %session.region, "Started snapshot import");

        loop {
            let mut describe_args = args(["describe-import-snapshot-tasks", "--import-task-ids"]);
            describe_args.push(task_id.clone());
            let described = self.ec2(session, describe_args).await?;
            let status = self
                .tool
                .json_str(&described, "/ImportSnapshotTasks/0/SnapshotTaskDetail/Status")?;
            match status.as_str() {
                "completed" => {
                    let snapshot_id = self
                        .tool
                        .json_str(&described, "/ImportSnapshotTasks/0/SnapshotTaskDetail/SnapshotId")?;
                    info!(task_id = %task_id, snapshot_id = %snapshot_id, "Snapshot import completed");
                    return Ok(snapshot_id);
                }
                "deleting" | "deleted" => {
                    return Err(PublishError::ImportFailed {
                        task_id,
                        state: status,
                    });
                }
                _ => {
                    debug!(task_id = %task_id, status = %status, "Snapshot import in progress");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn register_image(
        &self,
        session: &AwsSession,
        image_name: &str,
        snapshot_id: &str,
        architecture: Architecture,
    ) -> Result<String, PublishError> {
        let mut register_args = args(["register-image", "--name"]);
        register_args.push(image_name.to_string());
        register_args.extend(args([
            "--architecture",
            aws_architecture(architecture),
            "--root-device-name",
            "/dev/xvda",
            "--virtualization-type",
            "hvm",
            "--ena-support",
            "--block-device-mappings",
        ]));
        register_args.push(format!(
            "DeviceName=/dev/xvda,Ebs={{SnapshotId={snapshot_id},VolumeType=gp3,DeleteOnTermination=true}}"
        ));
        let registered = self.ec2(session, register_args).await?;
        self.tool.json_str(&registered, "/ImageId")
    }

    async fn copy_image(
        &self,
        target: &AwsSession,
        source_region: &str,
        source_image_id: &str,
        image_name: &str,
    ) -> Result<String, PublishError> {
        let copy_args = args([
            "copy-image",
            "--source-region",
            source_region,
            "--source-image-id",
            source_image_id,
            "--name",
            image_name,
        ]);
        let copied = self.ec2(target, copy_args).await?;
        self.tool.json_str(&copied, "/ImageId")
    }
}

fn session_args(session: &AwsSession) -> Vec<String> {
    args([
        "--profile",
        session.profile.as_str(),
        "--region",
        session.region.as_str(),
        "--output",
        "json",
    ])
}

fn aws_architecture(architecture: Architecture) -> &'static str {
    match architecture {
        Architecture::Amd64 => "x86_64",
        Architecture::Arm64 => "arm64",
    }
}

/// `gardenlinux-{flavour}-{version}`
pub fn image_name(release: &OnlineReleaseManifest) -> String {
    format!(
        "gardenlinux-{}-{}",
        release.flavour().filename_prefix(),
        release.manifest.version
    )
}

#[async_trait]
impl AwsImageUploader for AwsCli {
    async fn upload_and_register(
        &self,
        sessions: &AwsSessionFactory,
        build_cfg: &BuildCfg,
        release: &OnlineReleaseManifest,
    ) -> Result<PublishedImageMetadata, PublishError> {
        let image_file = release
            .manifest
            .path_by_suffix(RAW_IMAGE_SUFFIX)
            .ok_or_else(|| PublishError::MissingImageFile {
                flavour: release.flavour().filename_prefix(),
                suffix: RAW_IMAGE_SUFFIX.to_string(),
            })?;
        let session = sessions.session(&build_cfg.aws_region);
        let name = image_name(release);

        let snapshot_id = self.import_snapshot(&session, image_file, &name).await?;
        let ami_id = self
            .register_image(&session, &name, &snapshot_id, release.manifest.architecture)
            .await?;
        info!(ami_id = %ami_id, region = %session.region, image_name = %name, "Registered AMI");

        let source_region = build_cfg.aws_region.as_str();
        let source_ami = ami_id.as_str();
        let copy_name = name.as_str();
        let copies = build_cfg
            .aws_target_regions
            .iter()
            .filter(|region| region.as_str() != source_region)
            .map(|region| {
                let target = sessions.session(region);
                async move {
                    let copied = self
                        .copy_image(&target, source_region, source_ami, copy_name)
                        .await?;
                    info!(ami_id = %copied, region = %target.region, "Copied AMI");
                    Ok::<_, PublishError>(AwsPublishedImage {
                        ami_id: copied,
                        aws_region: target.region,
                        image_name: copy_name.to_string(),
                    })
                }
            });
        let copies = try_join_all(copies).await?;

        let mut published_aws_images = vec![AwsPublishedImage {
            ami_id: ami_id.clone(),
            aws_region: session.region.clone(),
            image_name: name.clone(),
        }];
        published_aws_images.extend(copies);

        Ok(PublishedImageMetadata::Aws(AwsPublishedImageSet {
            published_aws_images,
        }))
    }
}
