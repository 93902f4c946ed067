//! # contract: collaborator interfaces for the pipeline
//!
//! The pipeline never talks to GitHub, git, MSBuild or NuGet directly. It
//! drives the traits in this module, and the binary crate (or a test) plugs
//! in concrete implementations:
//!
//! - [`HostingService`]: account lookup, repository listing, commit counts.
//! - [`SourceControl`]: cloning a repository into a workspace.
//! - [`BuildToolchain`]: compiling a project descriptor.
//! - [`PackageManager`]: registry configuration, pack and push.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; the generated `Mock*` types are
//! exported under the `test-export-mocks` feature so integration tests can
//! script collaborator behaviour.
//!
//! ## Tool results
//! Process-backed collaborators return [`ToolOutcome`] for a process that ran
//! to completion and `Err` only when it could not be started or located. The
//! orchestrator decides per stage what a `Failure` means.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::error::{CollaboratorError, ToolchainError};

/// A hosting-service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
    /// Configured display name, if any.
    pub name: Option<String>,
}

impl Account {
    /// Display name, falling back to the login when none is configured.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

/// A remote repository as listed by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub name: String,
    pub clone_url: String,
    /// Browser URL, used as the package project URL.
    pub html_url: String,
    pub owner_display_name: String,
    pub description: Option<String>,
    pub fork: bool,
}

/// Result of an external process that was started successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    Failure {
        exit_code: Option<i32>,
        /// Tail of the captured stdout/stderr.
        output: String,
    },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success)
    }

    /// Converts a `Failure` into [`ToolchainError::Failed`] attributed to `program`.
    pub fn into_result(self, program: &str) -> Result<(), ToolchainError> {
        match self {
            ToolOutcome::Success => Ok(()),
            ToolOutcome::Failure { exit_code, output } => Err(ToolchainError::Failed {
                program: program.to_string(),
                exit_code,
                output,
            }),
        }
    }
}

/// Read access to the hosting service (GitHub).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HostingService: Send + Sync {
    /// Look up an account by login. `Ok(None)` when it does not exist.
    async fn find_account(&self, login: &str) -> Result<Option<Account>, CollaboratorError>;

    /// All repositories owned by `account`, forks included.
    async fn list_repositories(
        &self,
        account: &Account,
    ) -> Result<Vec<RepositoryRef>, CollaboratorError>;

    /// Number of commits in `owner/repository`.
    async fn commit_count(&self, owner: &str, repository: &str)
        -> Result<u64, CollaboratorError>;
}

/// Populates a workspace with a repository's working tree.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn clone_repository(
        &self,
        remote_url: &str,
        destination: &Path,
    ) -> Result<ToolOutcome, ToolchainError>;
}

/// Compiles a project descriptor (`.csproj`, `.vbproj`).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    async fn build(&self, descriptor: &Path) -> Result<ToolOutcome, ToolchainError>;
}

/// The package-manager command line (NuGet).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Store the registry API key for subsequent pushes.
    async fn configure(&self, api_key: &str) -> Result<ToolOutcome, ToolchainError>;

    async fn self_update(&self) -> Result<ToolOutcome, ToolchainError>;

    /// Pack `descriptor` (and the projects it references) into `output_dir`.
    async fn pack(
        &self,
        descriptor: &Path,
        output_dir: &Path,
    ) -> Result<ToolOutcome, ToolchainError>;

    async fn push(&self, artifact: &Path) -> Result<ToolOutcome, ToolchainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_login() {
        let anonymous = Account {
            login: "alice".into(),
            name: None,
        };
        assert_eq!(anonymous.display_name(), "alice");

        let blank = Account {
            login: "alice".into(),
            name: Some("  ".into()),
        };
        assert_eq!(blank.display_name(), "alice");

        let named = Account {
            login: "alice".into(),
            name: Some("Alice Liddell".into()),
        };
        assert_eq!(named.display_name(), "Alice Liddell");
    }

    #[test]
    fn failure_outcome_converts_to_toolchain_error() {
        let outcome = ToolOutcome::Failure {
            exit_code: Some(1),
            output: "error CS1002".into(),
        };
        match outcome.into_result("msbuild") {
            Err(ToolchainError::Failed {
                program,
                exit_code,
                output,
            }) => {
                assert_eq!(program, "msbuild");
                assert_eq!(exit_code, Some(1));
                assert_eq!(output, "error CS1002");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(ToolOutcome::Success.into_result("msbuild").is_ok());
    }
}
