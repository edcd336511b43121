pub mod types;

pub use types::{ChangedFile, ExistingComment, PrUrl};

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
/// Returns FetchError::InvalidUrl for malformed URLs.
pub fn parse_pr_url(url: &str) -> Result<PrUrl, FetchError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Remote PR-hosting operations the pipeline consumes.
///
/// Implementations must be Send + Sync so the pipeline can hold them
/// across await points; tests substitute an in-memory fake.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Ordered list of changed files for the PR, all pages included.
    async fn list_changed_files(&self, pr: &PrUrl) -> Result<Vec<ChangedFile>, FetchError>;

    /// All comments currently attached to the PR.
    async fn list_comments(&self, pr: &PrUrl) -> Result<Vec<ExistingComment>, FetchError>;

    /// Delete a single comment by id.
    async fn delete_comment(&self, pr: &PrUrl, comment_id: u64) -> Result<(), FetchError>;

    /// Post a new comment on the PR.
    async fn create_comment(&self, pr: &PrUrl, body: &str) -> Result<(), FetchError>;
}

/// GitHub REST v3 implementation of [`PullRequestHost`].
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// GitHub caps `per_page` at 100; fetching fewer than this signals the last page.
const PER_PAGE: usize = 100;

impl GithubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("User-Agent", "pr-reviewer")
            .header("Accept", "application/vnd.github.v3+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(&self.token)
    }
}

#[async_trait]
impl PullRequestHost for GithubClient {
    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn list_changed_files(&self, pr: &PrUrl) -> Result<Vec<ChangedFile>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.api_url, pr.owner, pr.repo, pr.pr_number
        );

        let mut files = Vec::new();
        let mut page = 1usize;
        loop {
            debug!(page, "fetching changed-files page");
            let batch: Vec<ChangedFile> = self
                .request(Method::GET, &url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let batch_len = batch.len();
            files.extend(batch);
            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(files = files.len(), "fetched changed files");
        Ok(files)
    }

    #[instrument(skip(self), fields(pr = pr.pr_number))]
    async fn list_comments(&self, pr: &PrUrl) -> Result<Vec<ExistingComment>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, pr.owner, pr.repo, pr.pr_number
        );

        let comments = self
            .request(Method::GET, &url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(comments)
    }

    #[instrument(skip(self), fields(pr = pr.pr_number, comment_id))]
    async fn delete_comment(&self, pr: &PrUrl, comment_id: u64) -> Result<(), FetchError> {
        let url = format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.api_url, pr.owner, pr.repo, comment_id
        );

        self.request(Method::DELETE, &url)
            .send()
            .await?
            .error_for_status()?;
        debug!(comment_id, "deleted existing comment");
        Ok(())
    }

    #[instrument(skip(self, body), fields(pr = pr.pr_number, body_bytes = body.len()))]
    async fn create_comment(&self, pr: &PrUrl, body: &str) -> Result<(), FetchError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, pr.owner, pr.repo, pr.pr_number
        );

        self.request(Method::POST, &url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
