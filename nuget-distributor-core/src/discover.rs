//! Project discovery over a cloned tree.
//!
//! A scan classifies every file by extension (case-insensitive):
//! project descriptors become [`ProjectUnit`]s, deny-listed files are deleted
//! on the spot, everything else is left alone and ships with the package.
//! Deletion happens while the scan advances, so callers that need the tree
//! trimmed before building must drain the scan first (see
//! [`Discoverer::discover`]).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DiscoverError;

/// A buildable unit identified by its project descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUnit {
    /// Path of the `.csproj` / `.vbproj` file.
    pub descriptor: PathBuf,
    /// Descriptor file name without extension.
    pub name: String,
    pub directory: PathBuf,
}

/// Extension sets used to classify files. Extensions are given without the
/// leading dot and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryRules {
    pub project_extensions: Vec<String>,
    pub deny_extensions: Vec<String>,
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        Self {
            project_extensions: vec!["csproj".into(), "vbproj".into()],
            deny_extensions: vec![
                "sln".into(),
                "suo".into(),
                "user".into(),
                "gitignore".into(),
                "gitattributes".into(),
                "vssscc".into(),
                "vspscc".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Project,
    Denied,
    Other,
}

impl DiscoveryRules {
    fn classify(&self, path: &Path) -> FileKind {
        let Some(ext) = extension_of(path) else {
            return FileKind::Other;
        };
        let matches = |set: &[String]| set.iter().any(|e| e.eq_ignore_ascii_case(&ext));
        if matches(&self.project_extensions) {
            FileKind::Project
        } else if matches(&self.deny_extensions) {
            FileKind::Denied
        } else {
            FileKind::Other
        }
    }
}

/// Extension of `path`; for dot-files without another dot (`.gitignore`)
/// the name after the leading dot.
fn extension_of(path: &Path) -> Option<String> {
    if let Some(ext) = path.extension() {
        return Some(ext.to_string_lossy().into_owned());
    }
    let name = path.file_name()?.to_string_lossy();
    name.strip_prefix('.')
        .filter(|rest| !rest.is_empty())
        .map(str::to_owned)
}

/// Scans cloned trees with a fixed set of rules.
#[derive(Debug, Clone, Default)]
pub struct Discoverer {
    rules: DiscoveryRules,
}

impl Discoverer {
    pub fn new(rules: DiscoveryRules) -> Self {
        Self { rules }
    }

    /// Lazily walks `clone_path`. Each call starts a fresh walk.
    pub fn scan<'a>(&'a self, clone_path: &Path) -> Scan<'a> {
        let walker = WalkDir::new(clone_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"));
        Scan {
            rules: &self.rules,
            walker: Box::new(walker),
        }
    }

    /// Runs a full scan, deleting every deny-listed file, and returns the units.
    pub fn discover(&self, clone_path: &Path) -> Result<Vec<ProjectUnit>, DiscoverError> {
        let units = self.scan(clone_path).collect::<Result<Vec<_>, _>>()?;
        info!(
            path = %clone_path.display(),
            units = units.len(),
            "Discovered project units"
        );
        Ok(units)
    }
}

/// Iterator returned by [`Discoverer::scan`].
pub struct Scan<'a> {
    rules: &'a DiscoveryRules,
    walker: Box<dyn Iterator<Item = walkdir::Result<walkdir::DirEntry>> + 'a>,
}

impl Iterator for Scan<'_> {
    type Item = Result<ProjectUnit, DiscoverError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(DiscoverError::Walk(e))),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            match self.rules.classify(path) {
                FileKind::Project => return Some(Ok(unit_for(path))),
                FileKind::Denied => {
                    if let Err(source) = fs::remove_file(path) {
                        return Some(Err(DiscoverError::Delete {
                            path: path.to_path_buf(),
                            source,
                        }));
                    }
                    debug!(path = %path.display(), "Deleted file excluded from packages");
                }
                FileKind::Other => {}
            }
        }
    }
}

fn unit_for(path: &Path) -> ProjectUnit {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    debug!(unit = %name, path = %path.display(), "Found project descriptor");
    ProjectUnit {
        descriptor: path.to_path_buf(),
        name,
        directory,
    }
}
