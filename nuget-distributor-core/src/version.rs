use std::fmt;

use tracing::{error, info};

use crate::contract::HostingService;
use crate::error::UpstreamError;

/// Fixed prefix of every published version; the commit count is appended.
pub const VERSION_PREFIX: &str = "1.0";

/// Package version derived from the repository's commit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageVersion(pub u64);

impl PackageVersion {
    pub fn commits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VERSION_PREFIX}.{}", self.0)
    }
}

/// Asks the hosting service for the commit count of `owner/repository`.
pub async fn resolve(
    hosting: &dyn HostingService,
    owner: &str,
    repository: &str,
) -> Result<PackageVersion, UpstreamError> {
    match hosting.commit_count(owner, repository).await {
        Ok(count) => {
            let version = PackageVersion(count);
            info!(owner, repository, commits = count, %version, "Resolved package version");
            Ok(version)
        }
        Err(e) => {
            error!(error = ?e, owner, repository, "Failed to fetch commit count");
            Err(UpstreamError::Unavailable {
                operation: format!("counting commits of {owner}/{repository}"),
                source: e,
            })
        }
    }
}
