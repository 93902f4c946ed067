/// `load_config` module: loads the optional YAML settings file into [`Settings`].
///
/// Every key has a default, so an empty file (or no file at all) is a valid
/// configuration. Secrets never live here; see [`crate::credentials`].
///
/// # Accepted keys
/// ```yaml
/// staging_root: Repositories
/// github:
///   api_url: https://api.github.com
/// toolchain:
///   msbuild_path: C:/Tools/MSBuild.exe
///   framework_root: C:/Windows/Microsoft.NET/Framework64
/// nuget:
///   executable: nuget
///   source: https://api.nuget.org/v3/index.json
///   self_update: true
/// discovery:
///   project_extensions: [csproj, vbproj]
///   deny_extensions: [sln, suo, user, gitignore, gitattributes, vssscc, vspscc]
/// on_workspace_failure: skip-repository   # or abort-run
/// ```
///
/// # Errors
/// Read and parse failures are returned as `anyhow::Error` and surface at the
/// CLI boundary.
use anyhow::Result;
use nuget_distributor_core::discover::DiscoveryRules;
use nuget_distributor_core::pipeline::{PipelineSettings, WorkspaceFailurePolicy};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::credentials::Credentials;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub staging_root: PathBuf,
    pub github: GitHubSection,
    pub toolchain: ToolchainSection,
    pub nuget: NuGetSection,
    pub discovery: DiscoveryRules,
    pub on_workspace_failure: WorkspaceFailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("Repositories"),
            github: GitHubSection::default(),
            toolchain: ToolchainSection::default(),
            nuget: NuGetSection::default(),
            discovery: DiscoveryRules::default(),
            on_workspace_failure: WorkspaceFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub api_url: String,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolchainSection {
    /// Explicit MSBuild executable; skips framework discovery.
    pub msbuild_path: Option<PathBuf>,
    pub framework_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NuGetSection {
    pub executable: PathBuf,
    pub source: Option<String>,
    pub self_update: bool,
}

impl Default for NuGetSection {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("nuget"),
            source: None,
            self_update: true,
        }
    }
}

impl Settings {
    /// Combines these settings with resolved credentials into pipeline input.
    pub fn pipeline_settings(&self, credentials: &Credentials) -> PipelineSettings {
        PipelineSettings {
            login: credentials.login.clone(),
            api_key: credentials.api_key.clone(),
            staging_root: self.staging_root.clone(),
            discovery: self.discovery.clone(),
            on_workspace_failure: self.on_workspace_failure,
            self_update: self.nuget.self_update,
        }
    }
}

/// Loads a YAML settings file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path_ref.display(),
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(Settings::default());
    }

    match serde_yaml::from_str::<Settings>(&config_content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, ?settings, "Parsed config YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
