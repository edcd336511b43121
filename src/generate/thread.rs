use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{GenerateError, ReviewGenerator};

/// Strategy B: the asynchronous job-thread protocol. A remote thread is
/// created, the prompt is attached as a single message, a run is started
/// with a pre-registered assistant identity, and the run is polled to a
/// terminal state before the thread's messages are fetched.
pub struct ThreadGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    assistant_id: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

/// Remote run states. Unknown statuses map to `Other` and keep the poll
/// loop going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
    #[serde(other)]
    Other,
}

impl RunStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Other => "other",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThreadHandle {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunHandle {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunState {
    status: RunStatus,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

/// Sleep-then-fetch until the first observed terminal status. Bounded:
/// exhausting `max_attempts` fails with the distinct Timeout error
/// instead of blocking forever.
pub(crate) async fn poll_until_terminal<F, Fut>(
    mut fetch_status: F,
    interval: Duration,
    max_attempts: u32,
) -> Result<RunStatus, GenerateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RunStatus, GenerateError>>,
{
    for _ in 0..max_attempts {
        tokio::time::sleep(interval).await;
        let status = fetch_status().await?;
        if status.is_terminal() {
            return Ok(status);
        }
        debug!(status = status.as_str(), "run not terminal yet");
    }
    Err(GenerateError::Timeout {
        attempts: max_attempts,
        interval,
    })
}

impl ThreadGenerator {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        assistant_id: impl Into<String>,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            poll_interval,
            max_poll_attempts,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn create_thread(&self) -> Result<String, GenerateError> {
        let thread: ThreadHandle = self
            .post("/threads")
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(thread.id)
    }

    async fn submit_input(&self, thread_id: &str, prompt: &str) -> Result<(), GenerateError> {
        self.post(&format!("/threads/{}/messages", thread_id))
            .json(&serde_json::json!({ "role": "user", "content": prompt }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn start_run(&self, thread_id: &str) -> Result<String, GenerateError> {
        let run: RunHandle = self
            .post(&format!("/threads/{}/runs", thread_id))
            .json(&serde_json::json!({ "assistant_id": self.assistant_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(run.id)
    }

    async fn fetch_run_status(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunStatus, GenerateError> {
        let state: RunState = self
            .get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(state.status)
    }

    async fn fetch_result_text(&self, thread_id: &str) -> Result<String, GenerateError> {
        let messages: MessageList = self
            .get(&format!("/threads/{}/messages", thread_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        extract_first_text(messages)
    }
}

/// The review is the first message's first content element's text value.
fn extract_first_text(messages: MessageList) -> Result<String, GenerateError> {
    messages
        .data
        .into_iter()
        .next()
        .and_then(|message| message.content.into_iter().next())
        .and_then(|block| block.text)
        .map(|text| text.value)
        .ok_or_else(|| {
            GenerateError::MalformedResponse("thread has no textual message content".to_string())
        })
}

#[async_trait]
impl ReviewGenerator for ThreadGenerator {
    #[instrument(skip(self, prompt), fields(assistant = %self.assistant_id, prompt_bytes = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let thread_id = self.create_thread().await?;
        debug!(%thread_id, "created review thread");

        self.submit_input(&thread_id, prompt).await?;
        debug!(%thread_id, "submitted diff as thread input");

        let run_id = self.start_run(&thread_id).await?;
        debug!(%thread_id, %run_id, "started review run");

        let status = poll_until_terminal(
            || self.fetch_run_status(&thread_id, &run_id),
            self.poll_interval,
            self.max_poll_attempts,
        )
        .await?;

        match status {
            RunStatus::Completed => self.fetch_result_text(&thread_id).await,
            other => Err(GenerateError::RunFailed(other.as_str().to_string())),
        }
    }
}
