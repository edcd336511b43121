pub mod completion;
pub mod thread;

pub use completion::CompletionGenerator;
pub use thread::ThreadGenerator;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation backend request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("generation backend returned an unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("review run ended in terminal state `{0}`")]
    RunFailed(String),

    #[error("review run did not finish within {attempts} status polls ({interval:?} apart)")]
    Timeout { attempts: u32, interval: Duration },
}

/// Which generation protocol to use against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One synchronous chat-completion request.
    #[default]
    Completion,
    /// Asynchronous job-thread protocol: create, submit, run, poll, fetch.
    Thread,
}

/// Produces review text from an assembled prompt. The two strategies are
/// interchangeable behind this trait; tests substitute a canned fake.
#[async_trait]
pub trait ReviewGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
