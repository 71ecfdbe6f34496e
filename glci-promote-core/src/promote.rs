//! High-level pipeline: locate a build's releases, check completeness, publish, upload manifests.
//!
//! # Major Types
//! - [`BuildPromotion`]: everything one promotion run needs to know
//! - [`PromoteRequest`]: input of the orchestration step [`promote`]
//! - [`PromoteReport`]: what was published and which keys were written
//!
//! # Responsibilities
//! - Version derivation and completeness check ([`effective_version`], [`check_completeness`])
//! - Parallel image publishing, one task per release, results in submission order
//! - Upload of the manifest set and/or the single manifests below `meta/{target}`
//!
//! # Error Handling
//! Publish results are captured per release. If any release fails to publish,
//! every failure is reported and no manifest is uploaded. Store errors abort
//! immediately.
//!
//! # Navigation
//! - Main entrypoint: [`promote_build`]
//! - Orchestration step: [`promote`]

use futures::future::join_all;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{CicdCfg, MANIFEST_KEY_ROOT};
use crate::contract::{ImagePublisher, ManifestStore, ReleaseFinder, ReleaseQuery};
use crate::error::{ConfigError, PromoteError, PublishFailure};
use crate::model::{
    BuildType, Flavour, FlavourSet, ManifestType, OnlineReleaseManifest, PromoteMode,
    PublishedImageMetadata, ReleaseManifestSet,
};
use crate::store::{upload_release_manifest, upload_release_manifest_set};

/// The explicit version, or `{epoch}-{first 6 chars of committish}`.
pub fn effective_version(explicit: Option<&str>, gardenlinux_epoch: u32, committish: &str) -> String {
    match explicit {
        Some(version) => version.to_string(),
        None => {
            let short: String = committish.chars().take(6).collect();
            format!("{gardenlinux_epoch}-{short}")
        }
    }
}

/// `meta/{target}`
pub fn target_prefix(target: BuildType) -> String {
    format!("{MANIFEST_KEY_ROOT}/{target}")
}

fn join_key(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

pub fn manifest_set_key(target_prefix: &str, version: &str, flavour_set_name: &str) -> String {
    join_key(target_prefix, &format!("{version}-{flavour_set_name}"))
}

pub fn single_manifest_key(target_prefix: &str, version: &str, flavour: &Flavour) -> String {
    join_key(target_prefix, &format!("{version}-{}", flavour.filename_prefix()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Partial { found: usize, expected: usize },
}

/// Compares the number of releases found with the number of expected flavours.
///
/// Only counts are compared; which flavours were found is not checked.
pub fn check_completeness(
    found: usize,
    expected: usize,
    allow_partial: bool,
) -> Result<Completeness, PromoteError> {
    let is_complete = found == expected;
    info!(found, expected, is_complete, "Checked release completeness");
    if is_complete {
        return Ok(Completeness::Complete);
    }
    warn!("Release is not complete");
    if !allow_partial {
        error!(allow_partial, "Partial promotion not allowed, aborting");
        return Err(PromoteError::Incomplete { found, expected });
    }
    Ok(Completeness::Partial { found, expected })
}

/// Input of the orchestration step.
#[derive(Debug)]
pub struct PromoteRequest<'a> {
    pub target_prefix: String,
    pub version: String,
    pub mode: PromoteMode,
    pub cicd_cfg: &'a CicdCfg,
    pub flavour_set: &'a FlavourSet,
    pub manifest_types: Vec<ManifestType>,
}

#[derive(Debug)]
pub struct PublishedRelease {
    pub flavour: String,
    pub metadata: Option<PublishedImageMetadata>,
}

#[derive(Debug, Default)]
pub struct PromoteReport {
    pub published: Vec<PublishedRelease>,
    pub uploaded_keys: Vec<String>,
}

/// Publishes every release concurrently. Results keep the input order; all
/// failures are collected before returning.
pub async fn publish_releases<P>(
    publisher: &P,
    releases: Vec<OnlineReleaseManifest>,
    cicd_cfg: &CicdCfg,
) -> Result<Vec<OnlineReleaseManifest>, PromoteError>
where
    P: ImagePublisher + ?Sized,
{
    info!(jobs = releases.len(), "[PROMOTE] Running publishing jobs in parallel");
    let jobs = releases.into_iter().map(|release| {
        let flavour = release.flavour().filename_prefix();
        async move { (flavour, publisher.publish(release, cicd_cfg).await) }
    });

    let mut published = Vec::new();
    let mut failures = Vec::new();
    for (flavour, outcome) in join_all(jobs).await {
        match outcome {
            Ok(release) => published.push(release),
            Err(e) => {
                error!(flavour = %flavour, error = %e, "[PROMOTE][ERROR] Publishing failed");
                failures.push(PublishFailure { flavour, error: e });
            }
        }
    }

    if !failures.is_empty() {
        return Err(PromoteError::Publish { failures });
    }
    Ok(published)
}

/// Orchestration step: optional publish, then upload of the requested manifest types.
pub async fn promote<S, P>(
    store: &S,
    publisher: &P,
    releases: Vec<OnlineReleaseManifest>,
    request: &PromoteRequest<'_>,
) -> Result<PromoteReport, PromoteError>
where
    S: ManifestStore + ?Sized,
    P: ImagePublisher + ?Sized,
{
    if request.manifest_types.is_empty() {
        return Err(ConfigError::NoManifestTypes.into());
    }

    let mut report = PromoteReport::default();

    let releases = match request.mode {
        PromoteMode::ManifestsAndPublish => {
            let published = publish_releases(publisher, releases, request.cicd_cfg).await?;
            for release in &published {
                let metadata = release.manifest.published_image_metadata.clone();
                match &metadata {
                    Some(metadata) => {
                        info!(flavour = %release.flavour().filename_prefix(), metadata = %metadata, "[PROMOTE] Published image");
                        if let Ok(json) = serde_json::to_string(metadata) {
                            debug!(flavour = %release.flavour().filename_prefix(), metadata = %json, "[PROMOTE] Published image metadata");
                        }
                    }
                    None => {
                        info!(flavour = %release.flavour().filename_prefix(), "[PROMOTE] No image published")
                    }
                }
                report.published.push(PublishedRelease {
                    flavour: release.flavour().filename_prefix(),
                    metadata,
                });
            }
            published
        }
        PromoteMode::ManifestsOnly => releases,
    };

    if request.manifest_types.contains(&ManifestType::Set) {
        let key = manifest_set_key(
            &request.target_prefix,
            &request.version,
            &request.flavour_set.name,
        );
        let manifest_set = ReleaseManifestSet {
            manifests: releases.clone(),
            flavour_set_name: request.flavour_set.name.clone(),
        };
        upload_release_manifest_set(store, &key, &manifest_set).await?;
        info!(manifest_path = %key, manifests = releases.len(), "[PROMOTE] Uploaded manifest-set");
        report.uploaded_keys.push(key);
    }

    if request.manifest_types.contains(&ManifestType::Single) {
        for release in &releases {
            let manifest = release.stripped_manifest();
            let key = single_manifest_key(&request.target_prefix, &request.version, &manifest.flavour());
            upload_release_manifest(store, &key, &manifest).await?;
            info!(manifest_path = %key, "[PROMOTE] Promoted release manifest");
            report.uploaded_keys.push(key);
        }
    }

    Ok(report)
}

/// Everything one promotion run needs to know.
#[derive(Debug)]
pub struct BuildPromotion<'a> {
    pub cicd_cfg: &'a CicdCfg,
    pub flavour_set: &'a FlavourSet,
    pub version: Option<String>,
    pub committish: String,
    pub gardenlinux_epoch: u32,
    pub source: String,
    pub target: BuildType,
    pub mode: PromoteMode,
    pub allow_partial: bool,
    pub manifest_types: Vec<ManifestType>,
}

/// Entrypoint: finds the build's releases, checks completeness and promotes them.
pub async fn promote_build<F, S, P>(
    finder: &F,
    store: &S,
    publisher: &P,
    promotion: BuildPromotion<'_>,
) -> Result<PromoteReport, PromoteError>
where
    F: ReleaseFinder + ?Sized,
    S: ManifestStore + ?Sized,
    P: ImagePublisher + ?Sized,
{
    let version = effective_version(
        promotion.version.as_deref(),
        promotion.gardenlinux_epoch,
        &promotion.committish,
    );
    let target_prefix = target_prefix(promotion.target);
    let span = info_span!(
        "promote",
        flavour_set = %promotion.flavour_set.name,
        version = %version,
        target = %promotion.target,
        mode = %promotion.mode,
    );

    async move {
        let expected = promotion.flavour_set.flavours().len();
        info!(expected, "[PROMOTE] Flavour set loaded");

        let source_prefix = promotion.cicd_cfg.build.manifest_key_prefix(&promotion.source);
        let releases = finder
            .find_releases(ReleaseQuery {
                flavour_set: promotion.flavour_set,
                version: &version,
                build_committish: &promotion.committish,
                gardenlinux_epoch: promotion.gardenlinux_epoch,
                prefix: &source_prefix,
            })
            .await?;
        info!(found = releases.len(), source = %source_prefix, "[PROMOTE] Found matching release(s)");

        check_completeness(releases.len(), expected, promotion.allow_partial)?;

        let request = PromoteRequest {
            target_prefix,
            version: version.clone(),
            mode: promotion.mode,
            cicd_cfg: promotion.cicd_cfg,
            flavour_set: promotion.flavour_set,
            manifest_types: promotion.manifest_types,
        };
        promote(store, publisher, releases, &request).await
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Architecture;

    #[test]
    fn explicit_version_is_used_verbatim() {
        assert_eq!(
            effective_version(Some("1443.1"), 1443, "abcdef123456"),
            "1443.1"
        );
    }

    #[test]
    fn derived_version_uses_epoch_and_short_committish() {
        assert_eq!(effective_version(None, 1443, "abcdef123456"), "1443-abcdef");
        assert_eq!(effective_version(None, 7, "abc"), "7-abc");
    }

    #[test]
    fn key_layout() {
        let prefix = target_prefix(BuildType::Daily);
        assert_eq!(prefix, "meta/daily");
        assert_eq!(
            manifest_set_key(&prefix, "1443-abcdef", "testing"),
            "meta/daily/1443-abcdef-testing"
        );
        let flavour = Flavour::new(Architecture::Amd64, "gcp", &["gardener".to_string()]);
        assert_eq!(
            single_manifest_key(&target_prefix(BuildType::Release), "1443.1", &flavour),
            "meta/release/1443.1-gcp-gardener-amd64"
        );
    }

    #[test]
    fn incomplete_release_aborts_unless_partial_allowed() {
        assert_eq!(check_completeness(2, 2, false).unwrap(), Completeness::Complete);
        assert!(matches!(
            check_completeness(1, 2, false),
            Err(PromoteError::Incomplete {
                found: 1,
                expected: 2
            })
        ));
        assert_eq!(
            check_completeness(1, 2, true).unwrap(),
            Completeness::Partial {
                found: 1,
                expected: 2
            }
        );
    }
}
