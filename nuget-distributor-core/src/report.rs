//! Operator-facing progress narration.
//!
//! The pipeline describes what it is doing through [`PipelineEvent`]s sent to
//! a [`ProgressReporter`]. The binary prints them to the console; tests
//! record them. Structured logs go to `tracing` independently.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use mockall::automock;

use crate::version::PackageVersion;

/// Pipeline stage at which a repository or unit can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Workspace,
    Clone,
    Discover,
    Version,
    Manifest,
    Build,
    Pack,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Workspace => "workspace",
            Stage::Clone => "clone",
            Stage::Discover => "discover",
            Stage::Version => "version",
            Stage::Manifest => "manifest",
            Stage::Build => "build",
            Stage::Pack => "pack",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    ConfiguringRegistry,
    RegistryUpdateFailed { error: String },
    AccountResolved { login: String, display_name: String },
    RepositoriesListed { total: usize, forks: usize },
    RepositorySkipped { repository: String },
    Cloning { repository: String, url: String },
    NoUnitsFound { repository: String },
    UnitsDiscovered { repository: String, count: usize },
    VersionResolved { repository: String, version: PackageVersion },
    Compiling { unit: String },
    Packing { unit: String },
    Publishing { unit: String, artifact: PathBuf },
    Published { unit: String, artifact: PathBuf },
    StageFailed {
        repository: String,
        unit: Option<String>,
        stage: Stage,
        error: String,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PipelineEvent::*;
        match self {
            ConfiguringRegistry => write!(f, "Configuring NuGet ..."),
            RegistryUpdateFailed { error } => {
                write!(f, "Could not update NuGet, continuing with the installed version: {error}")
            }
            AccountResolved { login, display_name } => {
                write!(f, "Packaging repositories of {display_name} ({login}) ...")
            }
            RepositoriesListed { total, forks } => {
                write!(f, "Found {total} repositories ({forks} forks skipped).")
            }
            RepositorySkipped { repository } => write!(f, "Skipping fork {repository}."),
            Cloning { url, .. } => write!(f, "Cloning {url} ..."),
            NoUnitsFound { repository } => write!(f, " - No projects found in {repository}."),
            UnitsDiscovered { count, .. } => write!(f, " - {count} project(s) found."),
            VersionResolved { version, .. } => write!(f, " - Version {version}."),
            Compiling { unit } => write!(f, " - Compiling {unit} ..."),
            Packing { unit } => write!(f, " - Creating NuGet package {unit} ..."),
            Publishing { artifact, .. } => write!(f, " - Pushing {} ...", artifact.display()),
            Published { unit, .. } => write!(f, " - Published {unit}."),
            StageFailed {
                repository,
                unit,
                stage,
                error,
            } => match unit {
                Some(unit) => write!(f, " - {stage} failed for {repository}/{unit}: {error}"),
                None => write!(f, " - {stage} failed for {repository}: {error}"),
            },
        }
    }
}

impl PipelineEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PipelineEvent::StageFailed { .. } | PipelineEvent::RegistryUpdateFailed { .. }
        )
    }
}

/// Receives narration events from the pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &PipelineEvent);
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
