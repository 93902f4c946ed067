//! # GitHub REST client
//!
//! Implements [`HostingService`] from `nuget-distributor-core` over the GitHub
//! REST API using `reqwest`.
//!
//! - `GET /users/{login}`: account lookup, `404` means the account does not exist.
//! - `GET /users/{login}/repos?per_page=100&page=N`: paged until a short page.
//! - `GET /repos/{owner}/{repo}/commits?per_page=1`: the page number of the
//!   `rel="last"` link is the commit count. An empty repository answers `409`.
//!
//! Requests carry a `User-Agent` (GitHub rejects requests without one) and,
//! when a secret is configured, basic auth for the account.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, LINK};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use nuget_distributor_core::contract::{Account, HostingService, RepositoryRef};
use nuget_distributor_core::error::CollaboratorError;

pub const USER_AGENT: &str = concat!("nuget-distributor/", env!("CARGO_PKG_VERSION"));
pub const PAGE_SIZE: usize = 100;

static LAST_PAGE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[?&]page=(\d+)[^>]*>\s*;\s*rel="last""#).unwrap());

#[derive(Debug, Deserialize)]
struct UserDto {
    login: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryDto {
    name: String,
    clone_url: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    fork: bool,
}

impl RepositoryDto {
    fn into_ref(self, owner_display_name: &str) -> RepositoryRef {
        RepositoryRef {
            name: self.name,
            clone_url: self.clone_url,
            html_url: self.html_url,
            owner_display_name: owner_display_name.to_string(),
            description: self.description,
            fork: self.fork,
        }
    }
}

pub struct GitHubClient {
    http: Client,
    api_url: String,
    auth: Option<(String, String)>,
}

impl GitHubClient {
    /// `auth` is `(login, secret)` for basic auth; anonymous when `None`.
    pub fn new(api_url: &str, auth: Option<(String, String)>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        tracing::info!(
            api_url,
            authenticated = auth.is_some(),
            "Initialized GitHub client"
        );
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .header(ACCEPT, "application/vnd.github+json");
        match &self.auth {
            Some((user, secret)) => request.basic_auth(user, Some(secret)),
            None => request,
        }
    }
}

#[async_trait]
impl HostingService for GitHubClient {
    async fn find_account(&self, login: &str) -> Result<Option<Account>, CollaboratorError> {
        tracing::info!(login, "Looking up GitHub account");
        let response = self.get(&format!("/users/{login}")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(login, "GitHub account not found");
            return Ok(None);
        }
        let user: UserDto = response.error_for_status()?.json().await?;
        Ok(Some(Account {
            login: user.login,
            name: user.name,
        }))
    }

    async fn list_repositories(
        &self,
        account: &Account,
    ) -> Result<Vec<RepositoryRef>, CollaboratorError> {
        let owner_display_name = account.display_name();
        let mut repositories = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<RepositoryDto> = self
                .get(&format!(
                    "/users/{}/repos?per_page={PAGE_SIZE}&page={page}",
                    account.login
                ))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let len = batch.len();
            tracing::debug!(login = %account.login, page, count = len, "Fetched repository page");
            repositories.extend(batch.into_iter().map(|r| r.into_ref(owner_display_name)));
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        tracing::info!(login = %account.login, count = repositories.len(), "Listed repositories");
        Ok(repositories)
    }

    async fn commit_count(&self, owner: &str, repository: &str) -> Result<u64, CollaboratorError> {
        let response = self
            .get(&format!("/repos/{owner}/{repository}/commits?per_page=1"))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            tracing::info!(owner, repository, "Repository is empty");
            return Ok(0);
        }
        let response = response.error_for_status()?;
        let last = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(last_page);
        match last {
            Some(count) => Ok(count),
            // No pagination: the single page holds every commit.
            None => {
                let commits: Vec<serde_json::Value> = response.json().await?;
                Ok(commits.len() as u64)
            }
        }
    }
}

/// Page number of the `rel="last"` entry of a `Link` header.
pub fn last_page(link: &str) -> Option<u64> {
    link.split(',')
        .find_map(|entry| LAST_PAGE_LINK.captures(entry))
        .and_then(|captures| captures[1].parse().ok())
}
