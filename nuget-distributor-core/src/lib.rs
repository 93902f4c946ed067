#![doc = "nuget-distributor-core: repository-to-package pipeline for nuget-distributor."]

//! This crate holds the data model, the collaborator contracts and the
//! pipeline that turns cloned repositories into published NuGet packages.
//! The GitHub client and the command line surface live in the
//! `nuget-distributor` crate.
//!
//! # Usage
//! Build a [`pipeline::Collaborators`] from concrete implementations of the
//! [`contract`] traits and hand it to [`pipeline::run`].

pub mod contract;
pub mod discover;
pub mod error;
pub mod git;
pub mod manifest;
pub mod nuget;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod report;
pub mod toolchain;
pub mod version;
pub mod workspace;
