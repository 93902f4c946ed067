//! NuGet command line wrapper.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::contract::{PackageManager, ToolOutcome};
use crate::error::ToolchainError;
use crate::process::ToolCommand;
use crate::version::PackageVersion;

/// File extension of packages produced by `nuget pack`.
pub const PACKAGE_EXTENSION: &str = "nupkg";

/// Where `nuget pack` leaves the package for `unit_name` at `version`:
/// `<package_path>/<unit>.1.0.<n>.nupkg`.
pub fn artifact_path(package_path: &Path, unit_name: &str, version: PackageVersion) -> PathBuf {
    package_path.join(format!("{unit_name}.{version}.{PACKAGE_EXTENSION}"))
}

/// Packs `descriptor` into `package_path` and returns the produced artifact.
///
/// A package left at the expected path by an earlier run is removed first, so
/// a zero exit status without a fresh `.nupkg` on disk is reported as
/// [`ToolchainError::MissingArtifact`].
pub async fn pack_unit(
    package_manager: &dyn PackageManager,
    descriptor: &Path,
    unit_name: &str,
    version: PackageVersion,
    package_path: &Path,
) -> Result<PathBuf, ToolchainError> {
    let artifact = artifact_path(package_path, unit_name, version);
    remove_stale(&artifact)?;

    package_manager
        .pack(descriptor, package_path)
        .await?
        .into_result("nuget pack")?;

    if !artifact.is_file() {
        error!(path = %artifact.display(), "Pack succeeded but the package is missing");
        return Err(ToolchainError::MissingArtifact { path: artifact });
    }
    info!(path = %artifact.display(), "Created package");
    Ok(artifact)
}

fn remove_stale(artifact: &Path) -> Result<(), ToolchainError> {
    match fs::remove_file(artifact) {
        Ok(()) => {
            debug!(path = %artifact.display(), "Removed package from a previous run");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => {
            error!(error = ?source, path = %artifact.display(), "Failed to remove previous package");
            Err(ToolchainError::StaleArtifact {
                path: artifact.to_path_buf(),
                source,
            })
        }
    }
}

/// [`PackageManager`] backed by `nuget.exe` (or `nuget` on PATH).
#[derive(Debug, Clone)]
pub struct NuGetCli {
    executable: PathBuf,
    /// Registry URL passed as `-Source`; NuGet's default feed when absent.
    source: Option<String>,
}

impl Default for NuGetCli {
    fn default() -> Self {
        Self::new("nuget", None)
    }
}

impl NuGetCli {
    pub fn new(executable: impl Into<PathBuf>, source: Option<String>) -> Self {
        Self {
            executable: executable.into(),
            source,
        }
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.executable)
    }

    fn with_source(&self, cmd: ToolCommand) -> ToolCommand {
        match &self.source {
            Some(source) => cmd.arg("-Source").arg(source),
            None => cmd,
        }
    }

    pub fn pack_command(&self, descriptor: &Path, output_dir: &Path) -> ToolCommand {
        self.command()
            .arg("pack")
            .arg(descriptor)
            .arg("-IncludeReferencedProjects")
            .arg("-OutputDirectory")
            .arg(output_dir)
            .arg("-NonInteractive")
    }

    pub fn push_command(&self, artifact: &Path) -> ToolCommand {
        let cmd = self.command().arg("push").arg(artifact);
        self.with_source(cmd).arg("-NonInteractive")
    }

    pub fn configure_command(&self, api_key: &str) -> ToolCommand {
        let cmd = self.command().arg("setApiKey").secret_arg(api_key);
        self.with_source(cmd).arg("-NonInteractive")
    }
}

#[async_trait]
impl PackageManager for NuGetCli {
    async fn configure(&self, api_key: &str) -> Result<ToolOutcome, ToolchainError> {
        self.configure_command(api_key).echo(false).run().await
    }

    async fn self_update(&self) -> Result<ToolOutcome, ToolchainError> {
        self.command().arg("update").arg("-self").run().await
    }

    async fn pack(&self, descriptor: &Path, output_dir: &Path) -> Result<ToolOutcome, ToolchainError> {
        self.pack_command(descriptor, output_dir).run().await
    }

    async fn push(&self, artifact: &Path) -> Result<ToolOutcome, ToolchainError> {
        self.push_command(artifact).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_follows_version_scheme() {
        let path = artifact_path(Path::new("/stage/r2"), "Demo", PackageVersion(7));
        assert_eq!(path, PathBuf::from("/stage/r2/Demo.1.0.7.nupkg"));
    }

    fn args_of(cmd: &ToolCommand) -> Vec<String> {
        cmd.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn push_targets_configured_source() {
        let cli = NuGetCli::new("nuget", Some("https://example.test/v3/index.json".into()));
        let cmd = cli.push_command(Path::new("Demo.1.0.7.nupkg"));
        assert_eq!(
            args_of(&cmd),
            vec![
                "push",
                "Demo.1.0.7.nupkg",
                "-Source",
                "https://example.test/v3/index.json",
                "-NonInteractive"
            ]
        );
    }

    #[test]
    fn pack_includes_referenced_projects_into_output_dir() {
        let cli = NuGetCli::default();
        let cmd = cli.pack_command(Path::new("App/App.csproj"), Path::new("stage/r2"));
        assert_eq!(
            args_of(&cmd),
            vec![
                "pack",
                "App/App.csproj",
                "-IncludeReferencedProjects",
                "-OutputDirectory",
                "stage/r2",
                "-NonInteractive"
            ]
        );
        assert_eq!(cmd.program_name(), "nuget");
    }

    #[test]
    fn configure_sets_api_key() {
        let cli = NuGetCli::default();
        let cmd = cli.configure_command("secret");
        assert_eq!(args_of(&cmd), vec!["setApiKey", "secret", "-NonInteractive"]);
    }

    #[tokio::test]
    async fn pack_unit_checks_the_artifact_exists() {
        use crate::contract::MockPackageManager;

        let dir = tempfile::tempdir().unwrap();
        let mut silent = MockPackageManager::new();
        silent.expect_pack().returning(|_, _| Ok(ToolOutcome::Success));
        let err = pack_unit(&silent, Path::new("App.csproj"), "App", PackageVersion(2), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::MissingArtifact { .. }));

        let mut producing = MockPackageManager::new();
        producing.expect_pack().returning(|_, output_dir: &Path| {
            std::fs::write(output_dir.join("App.1.0.2.nupkg"), b"pk").unwrap();
            Ok(ToolOutcome::Success)
        });
        let artifact = pack_unit(&producing, Path::new("App.csproj"), "App", PackageVersion(2), dir.path())
            .await
            .unwrap();
        assert_eq!(artifact, dir.path().join("App.1.0.2.nupkg"));
    }

    #[tokio::test]
    async fn pack_unit_ignores_package_from_previous_run() {
        use crate::contract::MockPackageManager;

        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("Demo.1.0.7.nupkg");
        std::fs::write(&stale, b"OLD").unwrap();

        let mut pm = MockPackageManager::new();
        pm.expect_pack().times(1).returning(|_, _| Ok(ToolOutcome::Success));

        let err = pack_unit(&pm, Path::new("Demo.csproj"), "Demo", PackageVersion(7), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::MissingArtifact { ref path } if *path == stale));
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn pack_unit_replaces_package_from_previous_run() {
        use crate::contract::MockPackageManager;

        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("Demo.1.0.7.nupkg");
        std::fs::write(&stale, b"OLD").unwrap();

        let mut pm = MockPackageManager::new();
        pm.expect_pack().returning(|_, output_dir: &Path| {
            assert!(!output_dir.join("Demo.1.0.7.nupkg").exists());
            std::fs::write(output_dir.join("Demo.1.0.7.nupkg"), b"NEW").unwrap();
            Ok(ToolOutcome::Success)
        });

        let artifact = pack_unit(&pm, Path::new("Demo.csproj"), "Demo", PackageVersion(7), dir.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read(artifact).unwrap(), b"NEW");
    }

    #[tokio::test]
    async fn pack_unit_propagates_failure() {
        use crate::contract::MockPackageManager;

        let mut pm = MockPackageManager::new();
        pm.expect_pack().returning(|_, _| {
            Ok(ToolOutcome::Failure {
                exit_code: Some(1),
                output: "nuspec invalid".into(),
            })
        });
        let err = pack_unit(&pm, Path::new("App.csproj"), "App", PackageVersion(2), Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::Failed { exit_code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_executable_surfaces_as_failure() {
        let cli = NuGetCli::new("false", None);
        let outcome = cli.push(Path::new("Demo.1.0.7.nupkg")).await.unwrap();
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let cli = NuGetCli::new("nuget-executable-that-does-not-exist", None);
        let err = cli.self_update().await.unwrap_err();
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }
}
