//! Error types for glci-promote-core

use std::fmt;

use thiserror::Error;

/// Errors resolving the CI/CD configuration or the promotion request.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No CI/CD configuration with the requested name
    #[error("unknown cicd config: {0}")]
    UnknownCicdCfg(String),

    /// No flavour set with the requested name
    #[error("unknown flavour set: {0}")]
    UnknownFlavourSet(String),

    /// A promotion must upload the manifest set, the single manifests, or both
    #[error("at least one manifest type (single, set) must be requested")]
    NoManifestTypes,

    /// A value that should name an enum variant did not
    #[error("invalid {kind}: {value:?} (expected one of: {expected})")]
    InvalidValue {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Errors reading or writing documents in a manifest store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Keys are relative, slash-separated paths without `..` components
    #[error("invalid manifest key: {0:?}")]
    InvalidKey(String),

    /// The http store endpoint is not an absolute base url
    #[error("invalid manifest store endpoint {endpoint:?}: {detail}")]
    InvalidEndpoint { endpoint: String, detail: String },

    #[error("i/o error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http request for key {key} failed: {source}")]
    Http {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected http status {status} for key {key}")]
    Status { key: String, status: u16 },

    #[error("failed to serialize manifest for key {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse manifest at key {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors raised while uploading and registering a machine image.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The release does not reference the image file the platform needs
    #[error("release {flavour} has no file with suffix {suffix}")]
    MissingImageFile { flavour: String, suffix: String },

    /// The cicd config has no `gcp` section
    #[error("cicd config {0} has no gcp configuration")]
    MissingGcpCfg(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from {program}: {detail}")]
    UnexpectedOutput { program: String, detail: String },

    #[error("import task {task_id} ended in state {state}")]
    ImportFailed { task_id: String, state: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A publish failure for one release of the batch.
#[derive(Debug)]
pub struct PublishFailure {
    /// Filename prefix of the flavour whose image failed to publish
    pub flavour: String,
    pub error: PublishError,
}

impl fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.flavour, self.error)
    }
}

/// Errors that abort a promotion run.
#[derive(Error, Debug)]
pub enum PromoteError {
    /// Fewer releases were found than the flavour set expects
    #[error("release is not complete: found {found} of {expected} release(s)")]
    Incomplete { found: usize, expected: usize },

    /// One or more images could not be published; nothing was uploaded
    #[error("publishing failed for {} release(s): {}", .failures.len(), join_failures(.failures))]
    Publish { failures: Vec<PublishFailure> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn join_failures(failures: &[PublishFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
