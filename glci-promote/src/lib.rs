//! glci-promote: promotes Garden Linux build results.
//!
//! The binary reads `cicd.yaml` and `flavours.yaml`, looks up the release
//! manifests of one build in the configured manifest store and writes them to a
//! build-type namespace, optionally publishing the machine images to AWS and GCP
//! first. Promotion logic lives in `glci-promote-core`; this crate holds the
//! command line surface and the cloud tool backends.

pub mod aws;
pub mod cli;
pub mod command;
pub mod gcloud;
pub mod load_config;
pub mod logging;

pub use cli::{run, Cli};
