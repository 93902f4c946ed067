/// # nuget-distributor CLI Interface (Module)
///
/// Command line glue for nuget-distributor: argument normalisation and
/// parsing, credential and settings resolution, and wiring of the concrete
/// collaborators into the core pipeline.
///
/// All pipeline logic lives in [`nuget-distributor-core`].
///
/// ## Arguments
/// Tokens are matched case-insensitively with any leading `-` or `/`
/// stripped, so `-u`, `--user`, `/U` and `user` are the same flag:
///
/// | flag       | aliases                   |
/// |------------|---------------------------|
/// | help       | `h`, `?`                  |
/// | version    | `v`                       |
/// | user       | `u`                       |
/// | apikey     | `api`, `a`, `key`, `k`    |
/// | password   | `pass`, `p`               |
/// | config     | `c`                       |
///
/// [`normalize_args`] rewrites them into the canonical `--flag=value` form
/// that [`Cli`] parses.
///
/// ## How To Use
/// - From a shell: `nuget-distributor -u <login> -k <api key>`.
/// - Programmatically: build a [`Cli`] and call [`run`].
///
/// [`nuget-distributor-core`]: ../../nuget_distributor_core/
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use nuget_distributor_core::git::GitCli;
use nuget_distributor_core::nuget::NuGetCli;
use nuget_distributor_core::pipeline::{self, Collaborators};
use nuget_distributor_core::toolchain::MsBuild;

use crate::console::ConsoleReporter;
use crate::credentials::{self, ExplicitCredentials};
use crate::github::GitHubClient;
use crate::load_config::{load_config, Settings};

/// Exit code for missing required input.
pub const USAGE_EXIT_CODE: u8 = 2;

/// Package every repository of a GitHub account as a NuGet package.
#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[clap(
    name = "nuget-distributor",
    version,
    about = "Build, pack and push every repository of a GitHub account as a NuGet package",
    after_help = "Flags are case-insensitive and may be prefixed with -, -- or /. \
                  The API key and GitHub password default to the contents of \
                  nuget.apikey and github.password in the working directory."
)]
pub struct Cli {
    /// GitHub login whose repositories are packaged
    #[clap(long = "user", value_name = "LOGIN")]
    pub user: Option<String>,

    /// NuGet API key used for pushing
    #[clap(long = "apikey", value_name = "KEY")]
    pub api_key: Option<String>,

    /// GitHub password or token for authenticated API calls
    #[clap(long = "password", value_name = "SECRET")]
    pub password: Option<String>,

    /// Path to the YAML settings file
    #[clap(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Normalises raw process arguments (program name first) and parses them.
    pub fn from_tokens<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    fn explicit_credentials(&self) -> ExplicitCredentials {
        ExplicitCredentials {
            login: self.user.clone(),
            api_key: self.api_key.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Help,
    Version,
    User,
    ApiKey,
    Password,
    Config,
}

impl Flag {
    fn parse(token: &str) -> Option<Self> {
        let name = token.trim_start_matches(['-', '/']).to_lowercase();
        match name.as_str() {
            "help" | "h" | "?" => Some(Flag::Help),
            "version" | "v" => Some(Flag::Version),
            "user" | "u" => Some(Flag::User),
            "apikey" | "api" | "a" | "key" | "k" => Some(Flag::ApiKey),
            "password" | "pass" | "p" => Some(Flag::Password),
            "config" | "c" => Some(Flag::Config),
            _ => None,
        }
    }

    fn long(self) -> &'static str {
        match self {
            Flag::Help => "--help",
            Flag::Version => "--version",
            Flag::User => "--user",
            Flag::ApiKey => "--apikey",
            Flag::Password => "--password",
            Flag::Config => "--config",
        }
    }
}

/// Converts raw process arguments to strings, replacing invalid UTF-8.
pub fn lossy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Rewrites free-form tokens into canonical clap arguments.
///
/// The first element is the program name and is passed through. A flag that
/// ends the list without a value is ignored, as are unknown tokens.
pub fn normalize_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut tokens = args.into_iter().map(Into::into);
    let mut normalized: Vec<String> = tokens.next().into_iter().collect();

    while let Some(token) = tokens.next() {
        match Flag::parse(&token) {
            Some(flag @ (Flag::Help | Flag::Version)) => normalized.push(flag.long().to_string()),
            Some(flag) => match tokens.next() {
                Some(value) => normalized.push(format!("{}={}", flag.long(), value)),
                None => tracing::warn!(flag = %token, "Ignoring flag without a value"),
            },
            None => tracing::warn!(token = %token, "Ignoring unknown argument"),
        }
    }
    normalized
}

/// Usage text printed when required input is missing.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Async entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    run_in(cli, Path::new(".")).await
}

/// Like [`run`], reading credential files from `dir`.
pub async fn run_in(cli: Cli, dir: &Path) -> Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => Settings::default(),
    };

    let credentials = match credentials::resolve(&cli.explicit_credentials(), dir) {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!(error = %e, "Missing required input");
            eprintln!("error: {e}\n\n{}", usage());
            return Ok(ExitCode::from(USAGE_EXIT_CODE));
        }
    };
    tracing::info!(?credentials, "Resolved credentials");

    let auth = credentials
        .password
        .clone()
        .map(|secret| (credentials.login.clone(), secret));
    let hosting = GitHubClient::new(&settings.github.api_url, auth)
        .context("Failed to construct GitHub client")?;
    let source_control = GitCli::default();
    let toolchain = MsBuild::new(
        settings.toolchain.msbuild_path.clone(),
        settings.toolchain.framework_root.clone(),
    );
    let package_manager = NuGetCli::new(settings.nuget.executable.clone(), settings.nuget.source.clone());
    let reporter = ConsoleReporter;

    let collaborators = Collaborators {
        hosting: &hosting,
        source_control: &source_control,
        toolchain: &toolchain,
        package_manager: &package_manager,
        reporter: &reporter,
    };

    let report = pipeline::run(&settings.pipeline_settings(&credentials), &collaborators).await?;
    tracing::info!(
        published = report.published(),
        failures = report.failures(),
        "Pipeline complete"
    );
    Ok(ExitCode::SUCCESS)
}
