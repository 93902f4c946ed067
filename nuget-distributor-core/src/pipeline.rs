//! High-level pipeline: turns every repository of an account into published packages.
//!
//! This module drives the collaborators from [`crate::contract`] through one
//! run:
//!   - configures the registry credential once,
//!   - resolves the account and lists its repositories,
//!   - skips forks,
//!   - for each remaining repository: prepares a clean workspace, clones,
//!     discovers project units (trimming deny-listed files) and resolves the
//!     package version,
//!   - for each unit: renders and writes the manifest, builds, packs, publishes.
//!
//! # Failure containment
//! Only configuration, identity and listing failures end the run. A failed
//! workspace, clone, discovery or version lookup ends the current repository;
//! a failed manifest, build, pack or push ends the current unit. Under
//! [`WorkspaceFailurePolicy::AbortRun`] a workspace failure ends the run.
//! Nothing is retried and nothing already written is rolled back.
//!
//! # Narration
//! Every step is reported through the [`ProgressReporter`] and logged with
//! `tracing` inside a `repository` span.
//!
//! # Navigation
//! - Main entrypoint: [`run`]
//! - Supporting types: [`PipelineSettings`], [`Collaborators`], [`PipelineReport`].

use std::fmt::Display;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, info_span, Instrument};

use crate::contract::{
    Account, BuildToolchain, HostingService, PackageManager, RepositoryRef, SourceControl,
};
use crate::discover::{DiscoveryRules, Discoverer, ProjectUnit};
use crate::error::{IdentityError, PipelineError, UpstreamError};
use crate::manifest::{self, ManifestFields};
use crate::nuget;
use crate::publish;
use crate::report::{PipelineEvent, ProgressReporter, Stage};
use crate::version::{self, PackageVersion};
use crate::workspace::{self, Workspace};

/// What to do when a repository's workspace cannot be prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceFailurePolicy {
    /// Report the failure and continue with the next repository.
    #[default]
    SkipRepository,
    /// Stop the whole run.
    AbortRun,
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub login: String,
    pub api_key: String,
    /// Root of all per-repository workspaces.
    pub staging_root: PathBuf,
    pub discovery: DiscoveryRules,
    pub on_workspace_failure: WorkspaceFailurePolicy,
    /// Run `nuget update -self` before configuring the API key.
    pub self_update: bool,
}

impl PipelineSettings {
    pub fn new(login: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            api_key: api_key.into(),
            staging_root: PathBuf::from("Repositories"),
            discovery: DiscoveryRules::default(),
            on_workspace_failure: WorkspaceFailurePolicy::default(),
            self_update: true,
        }
    }
}

/// Concrete collaborators for a run.
pub struct Collaborators<'a> {
    pub hosting: &'a dyn HostingService,
    pub source_control: &'a dyn SourceControl,
    pub toolchain: &'a dyn BuildToolchain,
    pub package_manager: &'a dyn PackageManager,
    pub reporter: &'a dyn ProgressReporter,
}

/// Terminal state of every repository seen during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub account: Account,
    pub repositories: Vec<RepositoryReport>,
}

impl PipelineReport {
    /// Number of units that reached `Published`.
    pub fn published(&self) -> usize {
        self.units()
            .filter(|u| matches!(u.outcome, UnitOutcome::Published { .. }))
            .count()
    }

    /// Number of failed repositories plus failed units.
    pub fn failures(&self) -> usize {
        let repositories = self
            .repositories
            .iter()
            .filter(|r| matches!(r.state, RepositoryState::Failed { .. }))
            .count();
        let units = self
            .units()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed { .. }))
            .count();
        repositories + units
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryReport> {
        self.repositories.iter().find(|r| r.name == name)
    }

    fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.repositories.iter().flat_map(|r| match &r.state {
            RepositoryState::Processed { units, .. } => units.as_slice(),
            _ => &[],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    pub name: String,
    pub state: RepositoryState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryState {
    /// Forks are never packaged.
    Skipped,
    NoUnitsFound,
    Processed {
        version: PackageVersion,
        units: Vec<UnitReport>,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Published { artifact: PathBuf },
    Failed { stage: Stage, error: String },
}

/// Looks up `login`; a missing account is an [`IdentityError::NotFound`].
pub async fn resolve_account(
    hosting: &dyn HostingService,
    login: &str,
) -> Result<Account, IdentityError> {
    match hosting.find_account(login).await {
        Ok(Some(account)) => {
            info!(login = %account.login, "Resolved GitHub account");
            Ok(account)
        }
        Ok(None) => {
            error!(login, "GitHub account does not exist");
            Err(IdentityError::NotFound {
                login: login.to_string(),
            })
        }
        Err(e) => {
            error!(error = ?e, login, "Failed to look up GitHub account");
            Err(IdentityError::Lookup {
                login: login.to_string(),
                source: e,
            })
        }
    }
}

/// Runs the whole pipeline for `settings.login`.
pub async fn run(
    settings: &PipelineSettings,
    collaborators: &Collaborators<'_>,
) -> Result<PipelineReport, PipelineError> {
    let reporter = collaborators.reporter;
    info!(login = %settings.login, "[PIPELINE] Starting run");

    publish::configure_registry(
        collaborators.package_manager,
        &settings.api_key,
        settings.self_update,
        reporter,
    )
    .await
    .map_err(PipelineError::Registry)?;

    let account = resolve_account(collaborators.hosting, &settings.login).await?;
    reporter.report(&PipelineEvent::AccountResolved {
        login: account.login.clone(),
        display_name: account.display_name().to_string(),
    });

    let repositories = collaborators
        .hosting
        .list_repositories(&account)
        .await
        .map_err(|e| {
            error!(error = ?e, login = %account.login, "[PIPELINE] Failed to list repositories");
            PipelineError::Listing(UpstreamError::Unavailable {
                operation: format!("listing repositories of {}", account.login),
                source: e,
            })
        })?;
    let forks = repositories.iter().filter(|r| r.fork).count();
    info!(total = repositories.len(), forks, "[PIPELINE] Listed repositories");
    reporter.report(&PipelineEvent::RepositoriesListed {
        total: repositories.len(),
        forks,
    });

    let staging_root =
        std::path::absolute(&settings.staging_root).unwrap_or_else(|_| settings.staging_root.clone());
    let discoverer = Discoverer::new(settings.discovery.clone());
    let mut reports = Vec::with_capacity(repositories.len());

    for repository in &repositories {
        if repository.fork {
            info!(repository = %repository.name, "[PIPELINE] Skipping fork");
            reporter.report(&PipelineEvent::RepositorySkipped {
                repository: repository.name.clone(),
            });
            reports.push(RepositoryReport {
                name: repository.name.clone(),
                state: RepositoryState::Skipped,
            });
            continue;
        }

        let workspace = match workspace::prepare(&staging_root, &repository.name) {
            Ok(workspace) => workspace,
            Err(e) => {
                let message = fail(reporter, &repository.name, None, Stage::Workspace, &e);
                if settings.on_workspace_failure == WorkspaceFailurePolicy::AbortRun {
                    return Err(PipelineError::Workspace {
                        repository: repository.name.clone(),
                        source: e,
                    });
                }
                reports.push(RepositoryReport {
                    name: repository.name.clone(),
                    state: RepositoryState::Failed {
                        stage: Stage::Workspace,
                        error: message,
                    },
                });
                continue;
            }
        };

        let span = info_span!("repository", repository = %repository.name);
        let state = process_repository(repository, &workspace, &account, &discoverer, collaborators)
            .instrument(span)
            .await;
        reports.push(RepositoryReport {
            name: repository.name.clone(),
            state,
        });
    }

    let report = PipelineReport {
        account,
        repositories: reports,
    };
    info!(
        published = report.published(),
        failures = report.failures(),
        "[PIPELINE] Run finished"
    );
    Ok(report)
}

/// Clone, discover and version one repository, then process each unit.
pub async fn process_repository(
    repository: &RepositoryRef,
    workspace: &Workspace,
    account: &Account,
    discoverer: &Discoverer,
    collaborators: &Collaborators<'_>,
) -> RepositoryState {
    let reporter = collaborators.reporter;
    let name = repository.name.as_str();
    let failed = |stage: Stage, error: &dyn Display| RepositoryState::Failed {
        stage,
        error: fail(reporter, name, None, stage, error),
    };

    reporter.report(&PipelineEvent::Cloning {
        repository: name.to_string(),
        url: repository.clone_url.clone(),
    });
    let cloned = match collaborators
        .source_control
        .clone_repository(&repository.clone_url, &workspace.clone_path)
        .await
    {
        Ok(outcome) => outcome.into_result("git clone"),
        Err(e) => Err(e),
    };
    if let Err(e) = cloned {
        return failed(Stage::Clone, &e);
    }

    let units = match discoverer.discover(&workspace.clone_path) {
        Ok(units) => units,
        Err(e) => return failed(Stage::Discover, &e),
    };
    if units.is_empty() {
        info!("No project units found");
        reporter.report(&PipelineEvent::NoUnitsFound {
            repository: name.to_string(),
        });
        return RepositoryState::NoUnitsFound;
    }
    reporter.report(&PipelineEvent::UnitsDiscovered {
        repository: name.to_string(),
        count: units.len(),
    });

    let version = match version::resolve(collaborators.hosting, &account.login, name).await {
        Ok(version) => version,
        Err(e) => return failed(Stage::Version, &e),
    };
    reporter.report(&PipelineEvent::VersionResolved {
        repository: name.to_string(),
        version,
    });

    let mut unit_reports = Vec::with_capacity(units.len());
    for unit in &units {
        let span = info_span!("unit", unit = %unit.name);
        let outcome = process_unit(unit, version, repository, workspace, collaborators)
            .instrument(span)
            .await;
        unit_reports.push(UnitReport {
            name: unit.name.clone(),
            outcome,
        });
    }

    RepositoryState::Processed {
        version,
        units: unit_reports,
    }
}

/// Manifest, build, pack and publish for one unit.
async fn process_unit(
    unit: &ProjectUnit,
    version: PackageVersion,
    repository: &RepositoryRef,
    workspace: &Workspace,
    collaborators: &Collaborators<'_>,
) -> UnitOutcome {
    let reporter = collaborators.reporter;
    let failed = |stage: Stage, error: &dyn Display| UnitOutcome::Failed {
        stage,
        error: fail(reporter, &repository.name, Some(&unit.name), stage, error),
    };

    let fields = ManifestFields::for_unit(unit, version, repository);
    let text = manifest::render(&fields);
    if let Err(e) = manifest::write_manifest(unit, &text) {
        return failed(Stage::Manifest, &e);
    }

    reporter.report(&PipelineEvent::Compiling {
        unit: unit.name.clone(),
    });
    let built = match collaborators.toolchain.build(&unit.descriptor).await {
        Ok(outcome) => outcome.into_result("msbuild"),
        Err(e) => Err(e),
    };
    if let Err(e) = built {
        return failed(Stage::Build, &e);
    }

    reporter.report(&PipelineEvent::Packing {
        unit: unit.name.clone(),
    });
    let artifact = match nuget::pack_unit(
        collaborators.package_manager,
        &unit.descriptor,
        &unit.name,
        version,
        &workspace.package_path,
    )
    .await
    {
        Ok(artifact) => artifact,
        Err(e) => return failed(Stage::Pack, &e),
    };

    reporter.report(&PipelineEvent::Publishing {
        unit: unit.name.clone(),
        artifact: artifact.clone(),
    });
    if let Err(e) = publish::publish(collaborators.package_manager, &artifact).await {
        return failed(Stage::Publish, &e);
    }

    reporter.report(&PipelineEvent::Published {
        unit: unit.name.clone(),
        artifact: artifact.clone(),
    });
    UnitOutcome::Published { artifact }
}

/// Logs and narrates a stage failure; returns the rendered message.
fn fail(
    reporter: &dyn ProgressReporter,
    repository: &str,
    unit: Option<&str>,
    stage: Stage,
    error: &dyn Display,
) -> String {
    let message = error.to_string();
    error!(repository, unit = ?unit, %stage, error = %message, "[PIPELINE] Stage failed");
    reporter.report(&PipelineEvent::StageFailed {
        repository: repository.to_string(),
        unit: unit.map(str::to_string),
        stage,
        error: message.clone(),
    });
    message
}
