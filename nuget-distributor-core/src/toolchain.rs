//! MSBuild discovery and invocation.
//!
//! .NET Framework installs one directory per release under
//! `%WINDIR%\Microsoft.NET\Framework64` (or `Framework`), named `v<major>.<minor>.<build>`.
//! The highest release that actually ships an MSBuild executable is used.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::{Prerelease, Version};
use tracing::{debug, error, info};

use crate::contract::{BuildToolchain, ToolOutcome};
use crate::error::ToolchainError;
use crate::process::ToolCommand;

const MSBUILD_NAMES: [&str; 3] = ["MSBuild.exe", "msbuild.exe", "msbuild"];

/// Version key of a toolchain directory, ordered as a [`semver::Version`].
///
/// `v<a>[.<b>[.<c>]]` parses to `a.b.c` with missing parts as zero; parts
/// after the third are ignored. Comparison goes component by component:
/// numeric parts numerically, text parts lexically. The first non-numeric
/// part and everything after it (or a `-suffix`) become the pre-release, so
/// `v5.0-preview` sits between `v4.0.30319` and `v5.0`, and `vNext` below `v1.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolchainVersion(Version);

impl ToolchainVersion {
    /// Parses a directory name; `None` when it does not start with `v`.
    pub fn parse(dir_name: &str) -> Option<Self> {
        let rest = dir_name.strip_prefix('v')?;
        let (core, suffix) = match rest.split_once('-') {
            Some((core, suffix)) => (core, Some(suffix)),
            None => (rest, None),
        };

        let mut key = [0u64; 3];
        let mut text: Vec<&str> = Vec::new();
        for (i, part) in core.split('.').enumerate() {
            if !text.is_empty() {
                text.push(part);
                continue;
            }
            match part.parse::<u64>() {
                Ok(n) if i < key.len() => key[i] = n,
                Ok(_) => {}
                Err(_) => text.push(part),
            }
        }
        text.extend(suffix);

        let mut version = Version::new(key[0], key[1], key[2]);
        let pre = prerelease_identifiers(&text);
        if !pre.is_empty() {
            version.pre = Prerelease::new(&pre).ok()?;
        }
        Some(ToolchainVersion(version))
    }

    pub fn as_semver(&self) -> &Version {
        &self.0
    }
}

/// Joins text parts into a valid pre-release string: only ASCII
/// alphanumerics and `-`, no empty identifiers, no leading zeros.
fn prerelease_identifiers(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split('.'))
        .map(|ident| {
            let ident: String = ident
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            if !ident.is_empty() && ident.chars().all(|c| c.is_ascii_digit()) {
                let trimmed = ident.trim_start_matches('0');
                if trimmed.is_empty() {
                    "0".to_string()
                } else {
                    trimmed.to_string()
                }
            } else {
                ident
            }
        })
        .filter(|ident| !ident.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// `%WINDIR%\Microsoft.NET\Framework64`, or `Framework` when the 64-bit tree is absent.
pub fn default_framework_root() -> Option<PathBuf> {
    let windows = std::env::var_os("WINDIR").or_else(|| std::env::var_os("SystemRoot"))?;
    let dotnet = PathBuf::from(windows).join("Microsoft.NET");
    let framework64 = dotnet.join("Framework64");
    if framework64.is_dir() {
        Some(framework64)
    } else {
        Some(dotnet.join("Framework"))
    }
}

fn msbuild_in(dir: &Path) -> Option<PathBuf> {
    MSBUILD_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Finds the MSBuild executable of the highest installed release under `framework_root`.
pub fn locate_msbuild(framework_root: &Path) -> Result<PathBuf, ToolchainError> {
    let entries = fs::read_dir(framework_root).map_err(|source| {
        error!(error = ?source, root = %framework_root.display(), "Failed to read framework directory");
        ToolchainError::Locate {
            root: framework_root.to_path_buf(),
            source,
        }
    })?;

    let mut best: Option<(ToolchainVersion, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(version) = ToolchainVersion::parse(&name) else {
            continue;
        };
        let Some(exe) = msbuild_in(&path) else {
            debug!(dir = %path.display(), "Skipping framework release without MSBuild");
            continue;
        };
        if best.as_ref().map_or(true, |(v, _)| version > *v) {
            best = Some((version, exe));
        }
    }

    match best {
        Some((version, exe)) => {
            info!(?version, path = %exe.display(), "Selected MSBuild");
            Ok(exe)
        }
        None => Err(ToolchainError::NotFound {
            root: framework_root.to_path_buf(),
        }),
    }
}

/// [`BuildToolchain`] backed by MSBuild.
#[derive(Debug, Clone, Default)]
pub struct MsBuild {
    executable: Option<PathBuf>,
    framework_root: Option<PathBuf>,
}

impl MsBuild {
    /// `executable` wins over discovery; `framework_root` overrides the
    /// `%WINDIR%`-derived search root.
    pub fn new(executable: Option<PathBuf>, framework_root: Option<PathBuf>) -> Self {
        Self {
            executable,
            framework_root,
        }
    }

    pub fn resolve_executable(&self) -> Result<PathBuf, ToolchainError> {
        if let Some(exe) = &self.executable {
            return Ok(exe.clone());
        }
        let root = self
            .framework_root
            .clone()
            .or_else(default_framework_root)
            .ok_or_else(|| ToolchainError::NotFound {
                root: PathBuf::from("%WINDIR%/Microsoft.NET"),
            })?;
        locate_msbuild(&root)
    }
}

#[async_trait]
impl BuildToolchain for MsBuild {
    async fn build(&self, descriptor: &Path) -> Result<ToolOutcome, ToolchainError> {
        let exe = self.resolve_executable()?;
        ToolCommand::new(exe).arg(descriptor).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn v(s: &str) -> ToolchainVersion {
        ToolchainVersion::parse(s).unwrap()
    }

    #[test]
    fn parses_ragged_versions_with_zero_fill() {
        assert_eq!(v("v4.0.30319").as_semver(), &Version::new(4, 0, 30319));
        assert_eq!(v("v3.5").as_semver(), &Version::new(3, 5, 0));
        assert_eq!(v("v10").as_semver(), &Version::new(10, 0, 0));
        assert_eq!(v("v1.2.3.4").as_semver(), &Version::new(1, 2, 3));
        assert_eq!(v("vNext").as_semver(), &Version::parse("0.0.0-Next").unwrap());
        assert_eq!(v("v4.x").as_semver(), &Version::parse("4.0.0-x").unwrap());
        assert_eq!(ToolchainVersion::parse("Framework"), None);
    }

    #[test]
    fn ordering_is_numeric_not_lexical() {
        assert!(v("v10.0") > v("v4.0.30319"));
        assert!(v("v4.0.30319") > v("v3.5"));
        assert!(v("v2.0.50727") > v("v2.0"));
        assert!(v("v1.0") > v("vNext"));
        assert!(v("vbeta") > v("valpha"));
    }

    #[test]
    fn text_falls_back_per_component() {
        assert!(v("v5.0-preview") > v("v4.0.30319"));
        assert!(v("v5.0-preview") < v("v5.0"));
        assert!(v("v4.x") > v("v3.5"));
        assert!(v("v5.0-preview.10") > v("v5.0-preview.9"));
        assert!(v("v5.0-rc1") > v("v5.0-preview"));
    }

    fn install(root: &Path, release: &str, with_msbuild: bool) {
        let dir = root.join(release);
        fs::create_dir_all(&dir).unwrap();
        if with_msbuild {
            fs::write(dir.join("MSBuild.exe"), b"").unwrap();
        }
    }

    #[test]
    fn locates_highest_release_with_msbuild() {
        let root = tempdir().unwrap();
        install(root.path(), "v2.0.50727", true);
        install(root.path(), "v4.0.30319", true);
        install(root.path(), "v10.0", false);
        install(root.path(), "Config", true);

        let exe = locate_msbuild(root.path()).unwrap();
        assert_eq!(exe, root.path().join("v4.0.30319").join("MSBuild.exe"));

        install(root.path(), "v10.0", true);
        let exe = locate_msbuild(root.path()).unwrap();
        assert_eq!(exe, root.path().join("v10.0").join("MSBuild.exe"));
    }

    #[test]
    fn empty_framework_root_is_not_found() {
        let root = tempdir().unwrap();
        install(root.path(), "v1.0.3705", false);
        assert!(matches!(
            locate_msbuild(root.path()),
            Err(ToolchainError::NotFound { .. })
        ));
        assert!(matches!(
            locate_msbuild(&root.path().join("missing")),
            Err(ToolchainError::Locate { .. })
        ));
    }

    #[test]
    fn explicit_executable_wins() {
        let root = tempdir().unwrap();
        install(root.path(), "v4.0.30319", true);
        let msbuild = MsBuild::new(Some(PathBuf::from("/opt/msbuild")), Some(root.path().into()));
        assert_eq!(msbuild.resolve_executable().unwrap(), PathBuf::from("/opt/msbuild"));

        let discovered = MsBuild::new(None, Some(root.path().into()));
        assert_eq!(
            discovered.resolve_executable().unwrap(),
            root.path().join("v4.0.30319").join("MSBuild.exe")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn build_runs_the_resolved_executable() {
        let ok = MsBuild::new(Some("true".into()), None);
        let outcome = ok.build(Path::new("/tmp/App.csproj")).await.unwrap();
        assert!(outcome.is_success());

        let failing = MsBuild::new(Some("false".into()), None);
        let outcome = failing.build(Path::new("/tmp/App.csproj")).await.unwrap();
        assert!(!outcome.is_success());
    }
}
