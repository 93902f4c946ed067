//! Registry configuration and package publishing.

use std::path::Path;

use tracing::{error, info, warn};

use crate::contract::PackageManager;
use crate::error::ToolchainError;
use crate::report::{PipelineEvent, ProgressReporter};

/// One-time registry setup for a run: optional self-update, then the API key.
///
/// A failed self-update is narrated and ignored; a failed API-key
/// configuration is returned to the caller.
pub async fn configure_registry(
    package_manager: &dyn PackageManager,
    api_key: &str,
    self_update: bool,
    reporter: &dyn ProgressReporter,
) -> Result<(), ToolchainError> {
    reporter.report(&PipelineEvent::ConfiguringRegistry);

    if self_update {
        let updated = match package_manager.self_update().await {
            Ok(outcome) => outcome.into_result("nuget update"),
            Err(e) => Err(e),
        };
        if let Err(e) = updated {
            warn!(error = %e, "NuGet self-update failed");
            reporter.report(&PipelineEvent::RegistryUpdateFailed {
                error: e.to_string(),
            });
        }
    }

    package_manager
        .configure(api_key)
        .await?
        .into_result("nuget setApiKey")
        .map_err(|e| {
            error!(error = %e, "Failed to configure NuGet API key");
            e
        })?;
    info!("Configured NuGet API key");
    Ok(())
}

/// Pushes `artifact` to the configured registry. Never retried.
pub async fn publish(
    package_manager: &dyn PackageManager,
    artifact: &Path,
) -> Result<(), ToolchainError> {
    package_manager
        .push(artifact)
        .await?
        .into_result("nuget push")?;
    info!(path = %artifact.display(), "Published package");
    Ok(())
}
