//! `.nuspec` rendering.
//!
//! The rendered text is consumed by `nuget pack`, which picks up a
//! `<unit>.nuspec` placed next to `<unit>.csproj`.

use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, Utc};
use tracing::{debug, error};

use crate::contract::RepositoryRef;
use crate::discover::ProjectUnit;
use crate::error::ManifestError;
use crate::version::PackageVersion;

/// Values substituted into the manifest template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFields {
    pub unit_name: String,
    pub version: PackageVersion,
    pub owner_display_name: String,
    pub description: String,
    pub year: i32,
    pub url: String,
}

impl ManifestFields {
    /// Fields for `unit`, stamped with the current UTC year.
    pub fn for_unit(unit: &ProjectUnit, version: PackageVersion, repository: &RepositoryRef) -> Self {
        Self {
            unit_name: unit.name.clone(),
            version,
            owner_display_name: repository.owner_display_name.clone(),
            description: repository.description.clone().unwrap_or_default(),
            year: Utc::now().year(),
            url: repository.html_url.clone(),
        }
    }
}

/// Renders the `.nuspec` document.
pub fn render(fields: &ManifestFields) -> String {
    let description = if fields.description.trim().is_empty() {
        &fields.unit_name
    } else {
        &fields.description
    };
    let id = escape(&fields.unit_name);
    let authors = escape(&fields.owner_display_name);

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package>
  <metadata>
    <id>{id}</id>
    <version>{version}</version>
    <title>{id}</title>
    <authors>{authors}</authors>
    <owners>{authors}</owners>
    <projectUrl>{url}</projectUrl>
    <requireLicenseAcceptance>false</requireLicenseAcceptance>
    <description>{description}</description>
    <copyright>Copyright {year} {authors}</copyright>
  </metadata>
</package>
"#,
        version = fields.version,
        url = escape(&fields.url),
        description = escape(description),
        year = fields.year,
    )
}

/// Writes `text` to `<unit dir>/<unit name>.nuspec`, replacing any previous file.
pub fn write_manifest(unit: &ProjectUnit, text: &str) -> Result<PathBuf, ManifestError> {
    let path = unit.directory.join(format!("{}.nuspec", unit.name));
    fs::write(&path, text).map_err(|source| {
        error!(error = ?source, path = %path.display(), "Failed to write manifest");
        ManifestError::Write {
            path: path.clone(),
            source,
        }
    })?;
    debug!(path = %path.display(), "Wrote manifest");
    Ok(path)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields() -> ManifestFields {
        ManifestFields {
            unit_name: "Demo.Core".into(),
            version: PackageVersion(7),
            owner_display_name: "Alice".into(),
            description: "demo".into(),
            year: 2026,
            url: "https://github.com/alice/r2".into(),
        }
    }

    #[test]
    fn render_substitutes_all_fields() {
        let text = render(&fields());
        assert!(text.contains("<id>Demo.Core</id>"));
        assert!(text.contains("<version>1.0.7</version>"));
        assert!(text.contains("<authors>Alice</authors>"));
        assert!(text.contains("<description>demo</description>"));
        assert!(text.contains("<projectUrl>https://github.com/alice/r2</projectUrl>"));
        assert!(text.contains("Copyright 2026 Alice"));
    }

    #[test]
    fn render_is_deterministic() {
        assert_eq!(render(&fields()), render(&fields()));
    }

    #[test]
    fn render_escapes_markup() {
        let mut f = fields();
        f.description = "Fast <xml> & \"json\"".into();
        let text = render(&f);
        assert!(text.contains("<description>Fast &lt;xml&gt; &amp; &quot;json&quot;</description>"));
    }

    #[test]
    fn empty_description_falls_back_to_unit_name() {
        let mut f = fields();
        f.description = String::new();
        assert!(render(&f).contains("<description>Demo.Core</description>"));
    }

    #[test]
    fn for_unit_uses_repository_metadata() {
        let unit = ProjectUnit {
            descriptor: PathBuf::from("/w/App/App.csproj"),
            name: "App".into(),
            directory: PathBuf::from("/w/App"),
        };
        let repo = RepositoryRef {
            name: "r2".into(),
            clone_url: "https://github.com/alice/r2.git".into(),
            html_url: "https://github.com/alice/r2".into(),
            owner_display_name: "Alice".into(),
            description: None,
            fork: false,
        };
        let f = ManifestFields::for_unit(&unit, PackageVersion(3), &repo);
        assert_eq!(f.unit_name, "App");
        assert_eq!(f.description, "");
        assert_eq!(f.url, "https://github.com/alice/r2");
        assert!(f.year >= 2024);
    }

    #[test]
    fn write_manifest_places_file_beside_descriptor() {
        let dir = tempdir().unwrap();
        let unit = ProjectUnit {
            descriptor: dir.path().join("App.csproj"),
            name: "App".into(),
            directory: dir.path().to_path_buf(),
        };
        let path = write_manifest(&unit, "<package/>").unwrap();
        assert_eq!(path, dir.path().join("App.nuspec"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<package/>");
    }
}
