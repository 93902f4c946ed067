use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info};

use crate::contract::{SourceControl, ToolOutcome};
use crate::error::ToolchainError;
use crate::process::ToolCommand;

/// [`SourceControl`] backed by the `git` executable on PATH.
#[derive(Debug, Clone)]
pub struct GitCli {
    executable: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// `git clone <remote_url> <destination>`
    pub fn clone_command(&self, remote_url: &str, destination: &Path) -> ToolCommand {
        ToolCommand::new(&self.executable)
            .arg("clone")
            .arg(remote_url)
            .arg(destination)
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_repository(
        &self,
        remote_url: &str,
        destination: &Path,
    ) -> Result<ToolOutcome, ToolchainError> {
        let outcome = self.clone_command(remote_url, destination).run().await?;
        match &outcome {
            ToolOutcome::Success => info!(
                repo_url = remote_url,
                path = %destination.display(),
                "Successfully cloned git repository"
            ),
            ToolOutcome::Failure { exit_code, .. } => error!(
                repo_url = remote_url,
                path = %destination.display(),
                exit_code = ?exit_code,
                "Git clone exited with non-zero code"
            ),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_command_targets_destination() {
        let cmd = GitCli::default().clone_command(
            "https://github.com/alice/r2.git",
            Path::new("Repositories/r2/content/r2"),
        );
        let args: Vec<_> = cmd.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "clone",
                "https://github.com/alice/r2.git",
                "Repositories/r2/content/r2"
            ]
        );
        assert_eq!(cmd.program(), Path::new("git"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clones_a_local_repository() {
        let origin = tempfile::tempdir().unwrap();
        let init = ToolCommand::new("git")
            .arg("init")
            .arg("--quiet")
            .arg(origin.path())
            .run()
            .await;
        // git is not installed everywhere tests run
        if !matches!(init, Ok(ToolOutcome::Success)) {
            return;
        }

        let target = tempfile::tempdir().unwrap();
        let destination = target.path().join("clone");
        let outcome = GitCli::default()
            .clone_repository(&origin.path().to_string_lossy(), &destination)
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert!(destination.join(".git").is_dir());
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_failure() {
        let target = tempfile::tempdir().unwrap();
        let result = GitCli::default()
            .clone_repository(
                &target.path().join("no-such-origin").to_string_lossy(),
                &target.path().join("clone"),
            )
            .await;
        match result {
            Ok(outcome) => assert!(!outcome.is_success()),
            Err(e) => assert!(matches!(e, ToolchainError::Spawn { .. })),
        }
    }
}
