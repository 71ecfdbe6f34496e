//! Looks up the release manifests of one build in a manifest store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::contract::{ManifestStore, ReleaseFinder, ReleaseQuery};
use crate::error::StoreError;
use crate::model::{Flavour, OnlineReleaseManifest};
use crate::store::load_release_manifest;

/// Key of a flavour's release manifest in a source location.
pub fn release_manifest_key(
    prefix: &str,
    flavour: &Flavour,
    version: &str,
    build_committish: &str,
) -> String {
    format!(
        "{}/{}-{}-{}",
        prefix.trim_end_matches('/'),
        flavour.filename_prefix(),
        version,
        build_committish
    )
}

/// Reads one manifest per expected flavour; absent flavours are left out.
pub struct StoreReleaseFinder {
    store: Arc<dyn ManifestStore>,
}

impl StoreReleaseFinder {
    pub fn new(store: Arc<dyn ManifestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReleaseFinder for StoreReleaseFinder {
    async fn find_releases<'a>(
        &self,
        query: ReleaseQuery<'a>,
    ) -> Result<Vec<OnlineReleaseManifest>, StoreError> {
        let flavours = query.flavour_set.flavours();
        info!(
            flavour_set = %query.flavour_set.name,
            flavours = flavours.len(),
            prefix = query.prefix,
            "Looking up releases"
        );

        let lookups = flavours.iter().map(|flavour| {
            let key = release_manifest_key(
                query.prefix,
                flavour,
                query.version,
                query.build_committish,
            );
            async move {
                let found = load_release_manifest(self.store.as_ref(), &key).await?;
                Ok::<_, StoreError>((key, found))
            }
        });
        let results = try_join_all(lookups).await?;

        let mut releases = Vec::new();
        for (key, found) in results {
            match found {
                None => debug!(key = %key, "No release manifest found"),
                Some(release)
                    if release.manifest.build_committish != query.build_committish
                        || release.manifest.gardenlinux_epoch != query.gardenlinux_epoch =>
                {
                    warn!(
                        key = %key,
                        build_committish = %release.manifest.build_committish,
                        gardenlinux_epoch = release.manifest.gardenlinux_epoch,
                        "Release manifest does not match the requested build, ignoring it"
                    );
                }
                Some(release) => releases.push(release),
            }
        }
        Ok(releases)
    }
}
