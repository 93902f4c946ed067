//! Error taxonomy for the pipeline.
//!
//! Each enum maps to one failure class and its blast radius:
//! - [`ConfigurationError`], [`IdentityError`]: the whole run stops.
//! - [`WorkspaceError`], [`UpstreamError`], [`DiscoverError`]: the current
//!   repository stops; the next one is attempted.
//! - [`ToolchainError`], [`ManifestError`]: the current unit stops; sibling
//!   units and later repositories are attempted.
//!
//! [`PipelineError`] wraps the run-fatal cases returned from
//! [`crate::pipeline::run`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by collaborator implementations (HTTP clients, mocks).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Required run input was not supplied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing GitHub username")]
    MissingLogin,

    #[error("missing NuGet API key")]
    MissingApiKey,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("the GitHub user '{login}' does not exist")]
    NotFound { login: String },

    #[error("could not look up the GitHub user '{login}': {source}")]
    Lookup {
        login: String,
        #[source]
        source: CollaboratorError,
    },
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("could not create or delete '{}' since access was denied; is the working directory protected?", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not create or delete '{}' since the path was too long", path.display())]
    PathTooLong {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not create or delete '{}': {source}", path.display())]
    UnknownIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("hosting service unavailable while {operation}: {source}")]
    Unavailable {
        operation: String,
        #[source]
        source: CollaboratorError,
    },
}

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("could not scan the cloned tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("could not delete '{}': {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not write manifest '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {}", exit_code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("no MSBuild installation found under '{}'", root.display())]
    NotFound { root: PathBuf },

    #[error("could not read toolchain directory '{}': {source}", root.display())]
    Locate {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("package '{}' was not produced by the pack step", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("could not remove previous package '{}': {source}", path.display())]
    StaleArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that end the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not configure the NuGet API key: {0}")]
    Registry(#[source] ToolchainError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("could not list repositories: {0}")]
    Listing(#[source] UpstreamError),

    #[error("aborting run at repository '{repository}': {source}")]
    Workspace {
        repository: String,
        #[source]
        source: WorkspaceError,
    },
}
