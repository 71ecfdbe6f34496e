use std::sync::{Arc, Mutex};

use glci_promote_core::config::{BuildCfg, CicdCfg, ManifestStoreCfg};
use glci_promote_core::contract::{
    MockImagePublisher, MockManifestStore, MockReleaseFinder, ReleaseQuery,
};
use glci_promote_core::error::{ConfigError, PromoteError, PublishError};
use glci_promote_core::model::{
    Architecture, BuildType, FlavourCombination, FlavourSet, GcpPublishedImage, ManifestType,
    OnlineReleaseManifest, PromoteMode, PublishedImageMetadata, ReleaseManifest,
    ReleaseManifestSet,
};
use glci_promote_core::promote::{promote, promote_build, BuildPromotion, PromoteRequest};

type Uploads = Arc<Mutex<Vec<(String, String)>>>;

fn cicd_cfg() -> CicdCfg {
    CicdCfg {
        name: "default".into(),
        build: BuildCfg {
            aws_cfg_name: "gardenlinux".into(),
            aws_region: "eu-central-1".into(),
            aws_target_regions: vec![],
            s3_bucket_name: "gardenlinux-build".into(),
            gcp: None,
            manifest_store: ManifestStoreCfg::Filesystem {
                root: "./bucket".into(),
            },
        },
    }
}

/// Two flavours: aws and gcp on amd64 with the `_prod` modifier.
fn testing_flavour_set() -> FlavourSet {
    FlavourSet {
        name: "testing".into(),
        flavour_combinations: vec![FlavourCombination {
            architectures: vec![Architecture::Amd64],
            platforms: vec!["aws".into(), "gcp".into()],
            modifiers: vec![vec!["_prod".into()]],
        }],
    }
}

fn release(platform: &str) -> OnlineReleaseManifest {
    OnlineReleaseManifest {
        manifest: ReleaseManifest {
            version: "1443-abcdef".into(),
            build_committish: "abcdef123456".into(),
            modifiers: vec!["_prod".into()],
            architecture: Architecture::Amd64,
            platform: platform.into(),
            build_timestamp: "20240101".into(),
            gardenlinux_epoch: 1443,
            paths: vec![],
            base_image: None,
            published_image_metadata: None,
        },
        s3_key: format!("meta/snapshots/{platform}-_prod-amd64-1443-abcdef-abcdef123456"),
        s3_bucket: "gardenlinux-build".into(),
    }
}

fn recording_store() -> (MockManifestStore, Uploads) {
    let uploads: Uploads = Arc::new(Mutex::new(Vec::new()));
    let recorded = uploads.clone();
    let mut store = MockManifestStore::new();
    store.expect_put().returning(move |key: &str, body: String| {
        recorded.lock().unwrap().push((key.to_string(), body));
        Ok(())
    });
    (store, uploads)
}

fn finder_returning(releases: Vec<OnlineReleaseManifest>) -> MockReleaseFinder {
    let mut finder = MockReleaseFinder::new();
    finder
        .expect_find_releases()
        .times(1)
        .returning(move |query: ReleaseQuery<'_>| {
            assert_eq!(query.prefix, "meta/snapshots");
            assert_eq!(query.version, "1443-abcdef");
            assert_eq!(query.build_committish, "abcdef123456");
            assert_eq!(query.gardenlinux_epoch, 1443);
            Ok(releases.clone())
        });
    finder
}

fn build_promotion<'a>(
    cicd_cfg: &'a CicdCfg,
    flavour_set: &'a FlavourSet,
    mode: PromoteMode,
    allow_partial: bool,
    manifest_types: Vec<ManifestType>,
) -> BuildPromotion<'a> {
    BuildPromotion {
        cicd_cfg,
        flavour_set,
        version: None,
        committish: "abcdef123456".into(),
        gardenlinux_epoch: 1443,
        source: "snapshots".into(),
        target: BuildType::Daily,
        mode,
        allow_partial,
        manifest_types,
    }
}

#[tokio::test]
async fn complete_build_uploads_exactly_one_manifest_set() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let finder = finder_returning(vec![release("aws"), release("gcp")]);
    let (store, uploads) = recording_store();
    let mut publisher = MockImagePublisher::new();
    publisher.expect_publish().never();

    let report = promote_build(
        &finder,
        &store,
        &publisher,
        build_promotion(&cfg, &set, PromoteMode::ManifestsOnly, false, vec![ManifestType::Set]),
    )
    .await
    .expect("promotion should succeed");

    let uploads = uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "meta/daily/1443-abcdef-testing");
    assert_eq!(report.uploaded_keys, vec!["meta/daily/1443-abcdef-testing"]);
    assert!(report.published.is_empty());

    let manifest_set: ReleaseManifestSet = serde_yaml::from_str(&uploads[0].1).unwrap();
    assert_eq!(manifest_set.flavour_set_name, "testing");
    assert_eq!(manifest_set.manifests, vec![release("aws"), release("gcp")]);
}

#[tokio::test]
async fn incomplete_build_aborts_without_uploads() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let finder = finder_returning(vec![release("aws")]);
    let mut store = MockManifestStore::new();
    store.expect_put().never();
    let mut publisher = MockImagePublisher::new();
    publisher.expect_publish().never();

    let err = promote_build(
        &finder,
        &store,
        &publisher,
        build_promotion(
            &cfg,
            &set,
            PromoteMode::ManifestsAndPublish,
            false,
            vec![ManifestType::Set],
        ),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PromoteError::Incomplete {
            found: 1,
            expected: 2
        }
    ));
}

#[tokio::test]
async fn partial_build_is_promoted_when_allowed() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let finder = finder_returning(vec![release("gcp")]);
    let (store, uploads) = recording_store();
    let publisher = MockImagePublisher::new();

    promote_build(
        &finder,
        &store,
        &publisher,
        build_promotion(
            &cfg,
            &set,
            PromoteMode::ManifestsOnly,
            true,
            vec![ManifestType::Set, ManifestType::Single],
        ),
    )
    .await
    .expect("partial promotion should succeed");

    let keys: Vec<String> = uploads.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(
        keys,
        vec![
            "meta/daily/1443-abcdef-testing",
            "meta/daily/1443-abcdef-gcp-_prod-amd64",
        ]
    );
}

#[tokio::test]
async fn single_manifests_are_stripped_and_keyed_per_flavour() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let (store, uploads) = recording_store();
    let publisher = MockImagePublisher::new();
    let request = PromoteRequest {
        target_prefix: "meta/release".into(),
        version: "1443.1".into(),
        mode: PromoteMode::ManifestsOnly,
        cicd_cfg: &cfg,
        flavour_set: &set,
        manifest_types: vec![ManifestType::Single],
    };

    let report = promote(&store, &publisher, vec![release("aws"), release("gcp")], &request)
        .await
        .unwrap();

    assert_eq!(
        report.uploaded_keys,
        vec![
            "meta/release/1443.1-aws-_prod-amd64",
            "meta/release/1443.1-gcp-_prod-amd64",
        ]
    );
    let uploads = uploads.lock().unwrap();
    for (_, body) in uploads.iter() {
        assert!(!body.contains("s3_bucket:"), "single manifest must be stripped: {body}");
        let manifest: ReleaseManifest = serde_yaml::from_str(body).unwrap();
        assert_eq!(manifest.version, "1443-abcdef");
    }
}

#[tokio::test]
async fn publish_mode_publishes_every_release_and_uploads_updated_manifests() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let (store, uploads) = recording_store();
    let mut publisher = MockImagePublisher::new();
    publisher
        .expect_publish()
        .times(2)
        .returning(|release: OnlineReleaseManifest, _cfg: &CicdCfg| {
            if release.manifest.platform == "gcp" {
                Ok(release.with_published_image_metadata(PublishedImageMetadata::Gcp(
                    GcpPublishedImage {
                        gcp_image_name: "gardenlinux-gcp-1443".into(),
                        gcp_project_name: "gardenlinux".into(),
                    },
                )))
            } else {
                Ok(release)
            }
        });
    let request = PromoteRequest {
        target_prefix: "meta/daily".into(),
        version: "1443-abcdef".into(),
        mode: PromoteMode::ManifestsAndPublish,
        cicd_cfg: &cfg,
        flavour_set: &set,
        manifest_types: vec![ManifestType::Set],
    };

    let report = promote(&store, &publisher, vec![release("kvm"), release("gcp")], &request)
        .await
        .unwrap();

    let flavours: Vec<&str> = report.published.iter().map(|p| p.flavour.as_str()).collect();
    assert_eq!(flavours, vec!["kvm-_prod-amd64", "gcp-_prod-amd64"]);
    assert!(report.published[0].metadata.is_none());
    assert!(report.published[1].metadata.is_some());

    let uploads = uploads.lock().unwrap();
    let manifest_set: ReleaseManifestSet = serde_yaml::from_str(&uploads[0].1).unwrap();
    assert_eq!(manifest_set.manifests[0].manifest.platform, "kvm");
    assert!(manifest_set.manifests[1]
        .manifest
        .published_image_metadata
        .is_some());
}

#[tokio::test]
async fn failed_publish_reports_every_failure_and_uploads_nothing() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let mut store = MockManifestStore::new();
    store.expect_put().never();
    let mut publisher = MockImagePublisher::new();
    publisher
        .expect_publish()
        .times(2)
        .returning(|release: OnlineReleaseManifest, _cfg: &CicdCfg| {
            if release.manifest.platform == "aws" {
                Err(PublishError::Command {
                    program: "aws".into(),
                    status: "exit status: 255".into(),
                    stderr: "AccessDenied".into(),
                })
            } else {
                Ok(release)
            }
        });
    let request = PromoteRequest {
        target_prefix: "meta/daily".into(),
        version: "1443-abcdef".into(),
        mode: PromoteMode::ManifestsAndPublish,
        cicd_cfg: &cfg,
        flavour_set: &set,
        manifest_types: vec![ManifestType::Set, ManifestType::Single],
    };

    let err = promote(&store, &publisher, vec![release("aws"), release("gcp")], &request)
        .await
        .unwrap_err();

    match err {
        PromoteError::Publish { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].flavour, "aws-_prod-amd64");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_manifest_types_are_rejected() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let mut store = MockManifestStore::new();
    store.expect_put().never();
    let publisher = MockImagePublisher::new();
    let request = PromoteRequest {
        target_prefix: "meta/daily".into(),
        version: "1443-abcdef".into(),
        mode: PromoteMode::ManifestsOnly,
        cicd_cfg: &cfg,
        flavour_set: &set,
        manifest_types: vec![],
    };

    let err = promote(&store, &publisher, vec![release("aws")], &request)
        .await
        .unwrap_err();
    assert!(matches!(err, PromoteError::Config(ConfigError::NoManifestTypes)));
}

#[tokio::test]
async fn explicit_version_is_used_for_lookup_and_target_keys() {
    let cfg = cicd_cfg();
    let set = testing_flavour_set();
    let mut finder = MockReleaseFinder::new();
    finder
        .expect_find_releases()
        .times(1)
        .returning(|query: ReleaseQuery<'_>| {
            assert_eq!(query.version, "1443.1");
            assert_eq!(query.build_committish, "abcdef123456");
            Ok(vec![release("aws"), release("gcp")])
        });
    let (store, uploads) = recording_store();
    let mut publisher = MockImagePublisher::new();
    publisher.expect_publish().never();

    let mut promotion = build_promotion(
        &cfg,
        &set,
        PromoteMode::ManifestsOnly,
        false,
        vec![ManifestType::Set, ManifestType::Single],
    );
    promotion.version = Some("1443.1".into());

    let report = promote_build(&finder, &store, &publisher, promotion)
        .await
        .expect("promotion should succeed");

    assert_eq!(
        report.uploaded_keys,
        vec![
            "meta/daily/1443.1-testing",
            "meta/daily/1443.1-aws-_prod-amd64",
            "meta/daily/1443.1-gcp-_prod-amd64",
        ]
    );
    assert_eq!(uploads.lock().unwrap().len(), 3);
}
