use crate::github::{FetchError, PrUrl, PullRequestHost};
use tracing::{debug, info};

/// Keeps exactly one system-authored comment on the PR: every prior
/// comment carrying the marker token is deleted before the new body is
/// posted. Delete and post are independent remote mutations; a failure
/// between them leaves the PR without a review comment until the next
/// successful run, and concurrent runs on the same PR can still race.
pub struct CommentManager<'a, H: PullRequestHost> {
    host: &'a H,
    pr: &'a PrUrl,
    marker: &'a str,
}

impl<'a, H: PullRequestHost> CommentManager<'a, H> {
    pub fn new(host: &'a H, pr: &'a PrUrl, marker: &'a str) -> Self {
        Self { host, pr, marker }
    }

    /// The posted body: the hidden marker token on its own first line,
    /// then the text. The token renders invisibly in Markdown, so
    /// matching is an exact containment check rather than a guess at
    /// visible headings.
    fn marked_body(&self, text: &str) -> String {
        format!("{}\n{}", self.marker, text)
    }

    /// Delete every prior marked comment, then post the new one.
    pub async fn upsert(&self, text: &str) -> Result<(), FetchError> {
        let comments = self.host.list_comments(self.pr).await?;

        let stale: Vec<u64> = comments
            .iter()
            .filter(|comment| comment.body.contains(self.marker))
            .map(|comment| comment.id)
            .collect();

        for comment_id in stale {
            info!(comment_id, "deleting prior review comment");
            self.host.delete_comment(self.pr, comment_id).await?;
        }

        debug!(body_bytes = text.len(), "posting review comment");
        self.host.create_comment(self.pr, &self.marked_body(text)).await
    }
}
