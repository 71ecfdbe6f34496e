#![doc = "glci-promote-core: core logic library for glci-promote."]

//! This crate contains the data model, collaborator interfaces and the
//! promotion pipeline for Garden Linux build results.
//! Cloud tooling backends live in the CLI crate and plug in through [`contract`].
//!
//! # Usage
//! Build a [`contract::ManifestStore`] (see [`store::open_manifest_store`]), a
//! [`contract::ReleaseFinder`] and a [`contract::ImagePublisher`], then call
//! [`promote::promote_build`].

pub mod config;
pub mod contract;
pub mod error;
pub mod finder;
pub mod model;
pub mod promote;
pub mod publish;
pub mod store;
