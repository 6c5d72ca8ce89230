//! Hosting-platform API access used to enumerate branches.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("branchsync/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Branches requested per API page; GitHub's maximum.
pub const BRANCH_PAGE_SIZE: usize = 100;

/// Future returned by host operations.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, HostError>> + Send + 'a>>;

/// Errors raised while talking to the hosting API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HostError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    Client {
        /// Builder error message.
        message: String,
    },
    /// The request did not complete.
    #[error("request to {url} failed: {message}")]
    Request {
        /// Requested URL.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// The API answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, usually a JSON error document.
        body: String,
    },
    /// The response body was not a branch list.
    #[error("failed to decode branch list from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser error message.
        message: String,
    },
}

/// Minimal interface to a code-hosting platform.
pub trait RepositoryHost {
    /// Lists every branch name of `owner/repo` in the order the host reports.
    fn list_branches<'a>(&'a self, owner: &'a str, repo: &'a str) -> HostFuture<'a, Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct BranchEntry {
    name: String,
}

/// GitHub REST API client. Requests are unauthenticated; private
/// repositories need a host that injects credentials upstream.
#[derive(Clone, Debug)]
pub struct GitHubHost {
    client: reqwest::Client,
    api_base_url: String,
}

impl GitHubHost {
    /// Builds a client against `api_base_url` (for example
    /// `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Client`] when the TLS backend cannot initialise.
    pub fn new(api_base_url: &str) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| HostError::Client {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// URL of the branch listing endpoint for `owner/repo`.
    #[must_use]
    pub fn branches_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/branches", self.api_base_url)
    }

    async fn fetch_page(&self, url: &str, page: usize) -> Result<Vec<String>, HostError> {
        let per_page = BRANCH_PAGE_SIZE.to_string();
        let page_number = page.to_string();
        let response = self
            .client
            .get(url)
            .header("Accept", GITHUB_ACCEPT)
            .query(&[("per_page", per_page.as_str()), ("page", page_number.as_str())])
            .send()
            .await
            .map_err(|err| HostError::Request {
                url: url.to_owned(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| HostError::Request {
            url: url.to_owned(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            return Err(HostError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        parse_branch_page(url, &body)
    }

    async fn fetch_all(&self, owner: &str, repo: &str) -> Result<Vec<String>, HostError> {
        let url = self.branches_url(owner, repo);
        let mut branches = Vec::new();
        let mut page = 1;
        loop {
            let names = self.fetch_page(&url, page).await?;
            let count = names.len();
            debug!(%url, page, count, "fetched branch page");
            branches.extend(names);
            if count < BRANCH_PAGE_SIZE {
                return Ok(branches);
            }
            page += 1;
        }
    }
}

impl RepositoryHost for GitHubHost {
    fn list_branches<'a>(&'a self, owner: &'a str, repo: &'a str) -> HostFuture<'a, Vec<String>> {
        Box::pin(self.fetch_all(owner, repo))
    }
}

/// Decodes one page of `GET /repos/{owner}/{repo}/branches`.
///
/// # Errors
///
/// Returns [`HostError::Decode`] when the body is not a JSON array of
/// objects carrying a `name`.
pub fn parse_branch_page(url: &str, body: &[u8]) -> Result<Vec<String>, HostError> {
    serde_json::from_slice::<Vec<BranchEntry>>(body)
        .map(|entries| entries.into_iter().map(|entry| entry.name).collect())
        .map_err(|err| HostError::Decode {
            url: url.to_owned(),
            message: err.to_string(),
        })
}
