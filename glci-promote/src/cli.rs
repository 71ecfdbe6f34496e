//! Command line interface of glci-promote.
//!
//! The binary takes flat flags (no subcommands) that select the build to promote,
//! the promotion target and which manifests to write. All promotion logic lives in
//! [`glci_promote_core`]; this module loads configuration, wires the concrete
//! store and cloud backends together and hands over to
//! [`glci_promote_core::promote::promote_build`].

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use glci_promote_core::finder::StoreReleaseFinder;
use glci_promote_core::model::{BuildType, ManifestType, PromoteMode};
use glci_promote_core::promote::{promote_build, BuildPromotion, PromoteReport};
use glci_promote_core::publish::CloudImagePublisher;
use glci_promote_core::store::open_manifest_store;

use crate::aws::AwsCli;
use crate::gcloud::GcloudCli;
use crate::load_config::{load_cicd_cfg, load_flavour_set};

/// Promote Garden Linux build results to a build-type namespace.
#[derive(Debug, Parser)]
#[command(
    name = "glci-promote",
    about = "Promote Garden Linux release manifests and optionally publish their cloud images"
)]
pub struct Cli {
    /// Name of the flavour set making up a complete build
    #[arg(long, default_value = "testing")]
    pub flavourset: String,

    /// Commit the build was made from
    #[arg(long)]
    pub committish: String,

    /// Garden Linux epoch of the build
    #[arg(long)]
    pub gardenlinux_epoch: u32,

    /// manifests_only or manifests_and_publish
    #[arg(long, default_value = "manifests_only")]
    pub promote_mode: PromoteMode,

    /// Explicit version; defaults to `{epoch}-{committish[:6]}`
    #[arg(long)]
    pub version: Option<String>,

    /// Build-type prefix to read the release manifests from
    #[arg(long, default_value = "snapshots")]
    pub source: String,

    /// snapshot, daily or release
    #[arg(long, default_value = "daily")]
    pub target: BuildType,

    /// Name of the CI/CD configuration to use
    #[arg(long, default_value = "default")]
    pub cicd_cfg: String,

    /// Promote even if some flavours of the set have no release
    #[arg(long)]
    pub allow_partial: bool,

    /// Manifest types to write (single, set); may be repeated
    #[arg(long = "manifest-type", default_value = "set")]
    pub manifest_types: Vec<ManifestType>,

    #[arg(long, env = "GLCI_CICD_CFG_FILE", default_value = "cicd.yaml")]
    pub cicd_cfg_file: PathBuf,

    #[arg(long, env = "GLCI_FLAVOURS_FILE", default_value = "flavours.yaml")]
    pub flavours_file: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "GLCI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Loads configuration, promotes the build and returns what was done.
pub async fn run(cli: Cli) -> Result<PromoteReport> {
    tracing::info!(
        cicd_cfg = %cli.cicd_cfg,
        flavourset = %cli.flavourset,
        committish = %cli.committish,
        gardenlinux_epoch = cli.gardenlinux_epoch,
        "Starting promotion"
    );

    let cicd_cfg = load_cicd_cfg(&cli.cicd_cfg_file, &cli.cicd_cfg)?;
    let flavour_set = load_flavour_set(&cli.flavours_file, &cli.flavourset)?;

    let store = open_manifest_store(&cicd_cfg.build.manifest_store);
    let finder = StoreReleaseFinder::new(store.clone());
    let publisher = CloudImagePublisher::new(AwsCli::default(), GcloudCli::default());

    let promotion = BuildPromotion {
        cicd_cfg: &cicd_cfg,
        flavour_set: &flavour_set,
        version: cli.version,
        committish: cli.committish,
        gardenlinux_epoch: cli.gardenlinux_epoch,
        source: cli.source,
        target: cli.target,
        mode: cli.promote_mode,
        allow_partial: cli.allow_partial,
        manifest_types: cli.manifest_types,
    };

    match promote_build(&finder, store.as_ref(), &publisher, promotion).await {
        Ok(report) => {
            tracing::info!(
                uploaded = report.uploaded_keys.len(),
                published = report.published.len(),
                "Promotion complete"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Promotion failed");
            Err(e.into())
        }
    }
}
