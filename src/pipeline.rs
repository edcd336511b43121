use thiserror::Error;
use tracing::{info, instrument};

use crate::comment::CommentManager;
use crate::config::ReviewConfig;
use crate::diff;
use crate::gate::{self, GateDecision, SkipPolicy};
use crate::generate::{GenerateError, ReviewGenerator};
use crate::github::{FetchError, PrUrl, PullRequestHost};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// How a pipeline run ended. The skip variants are successful
/// terminations, not failures.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every changed file was binary, patchless, or denylisted.
    NothingToReview,
    /// Change too small to review under the configured threshold.
    SkippedBelowThreshold {
        size_metric: usize,
        threshold: usize,
        notice_posted: bool,
    },
    /// A review was generated and upserted onto the PR.
    Posted { review: String },
}

/// Run the whole review pipeline for one PR: collect diffs, filter and
/// aggregate, size-gate, generate, and upsert the comment. Every remote
/// failure propagates immediately; no comment is ever posted from a
/// failed generation.
#[instrument(skip_all, fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
pub async fn run<H, G>(
    host: &H,
    generator: &G,
    pr: &PrUrl,
    config: &ReviewConfig,
) -> Result<RunOutcome, PipelineError>
where
    H: PullRequestHost,
    G: ReviewGenerator,
{
    info!("fetching changed files");
    let files = host.list_changed_files(pr).await?;
    info!(files = files.len(), "fetched changed files");

    let reviewable = diff::filter_reviewable(&files, &config.ignore_suffixes);
    let aggregated = diff::aggregate(&reviewable);
    if aggregated.is_empty() {
        info!("no applicable diffs found to review");
        return Ok(RunOutcome::NothingToReview);
    }
    info!(
        kept = reviewable.len(),
        size_metric = aggregated.size_metric,
        "aggregated diff"
    );

    if gate::decide(aggregated.size_metric, config.threshold) == GateDecision::Skip {
        let notice_posted = match config.skip_policy {
            SkipPolicy::Silent => false,
            SkipPolicy::Notice => {
                let notice = gate::notice_body(aggregated.size_metric, config.threshold);
                CommentManager::new(host, pr, &config.marker)
                    .upsert(&notice)
                    .await?;
                true
            }
        };
        info!(
            size_metric = aggregated.size_metric,
            threshold = config.threshold,
            notice_posted,
            "change below threshold, skipping AI review"
        );
        return Ok(RunOutcome::SkippedBelowThreshold {
            size_metric: aggregated.size_metric,
            threshold: config.threshold,
            notice_posted,
        });
    }

    let prompt = format!("{}{}", config.prompt, aggregated.body);
    info!(prompt_bytes = prompt.len(), "generating review");
    let review = generator.generate(&prompt).await?;

    CommentManager::new(host, pr, &config.marker)
        .upsert(&review)
        .await?;
    info!("review comment posted");

    Ok(RunOutcome::Posted { review })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::tests::{test_pr, FakeHost};
    use crate::github::ChangedFile;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeGenerator {
        text: String,
        calls: Mutex<u32>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: Mutex::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReviewGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            *self.calls.lock().unwrap() += 1;
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.text.clone())
        }
    }

    fn changed(name: &str, patch: Option<&str>) -> ChangedFile {
        ChangedFile {
            filename: name.to_string(),
            patch: patch.map(str::to_string),
        }
    }

    fn test_config(threshold: usize, skip_policy: SkipPolicy) -> ReviewConfig {
        ReviewConfig {
            threshold,
            skip_policy,
            prompt: "Review this diff:\n".to_string(),
            ..ReviewConfig::default()
        }
    }

    /// A patch whose size metric is exactly `markers`.
    fn patch_with_markers(markers: usize) -> String {
        format!("@@ -1,{} +1,{} @@{}", markers, markers, "\n+line".repeat(markers))
    }

    #[tokio::test]
    async fn test_all_files_filtered_means_nothing_to_review() {
        let host = FakeHost::new(vec![
            changed("logo.png", None),
            changed("notes.md", Some("@@\n+changed")),
        ]);
        let generator = FakeGenerator::new("should not run");

        let outcome = run(&host, &generator, &test_pr(), &test_config(0, SkipPolicy::Silent))
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NothingToReview));
        assert_eq!(generator.call_count(), 0);
        assert!(host.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_silent_skip_has_no_side_effects() {
        // 3 added + 2 removed markers across kept files, one skipped .png
        let host = FakeHost::new(vec![
            changed("a.rs", Some("@@ -1,1 +1,2 @@\n+one\n+two")),
            changed("b.rs", Some("@@ -2,2 +2,1 @@\n-gone\n-also")),
            changed("c.rs", Some("@@ -1,1 +1,1 @@\n+three")),
            changed("logo.png", None),
        ]);
        let generator = FakeGenerator::new("should not run");

        let outcome = run(&host, &generator, &test_pr(), &test_config(75, SkipPolicy::Silent))
            .await
            .unwrap();

        match outcome {
            RunOutcome::SkippedBelowThreshold {
                size_metric,
                threshold,
                notice_posted,
            } => {
                assert_eq!(size_metric, 5);
                assert_eq!(threshold, 75);
                assert!(!notice_posted);
            }
            other => panic!("expected below-threshold skip, got {:?}", other),
        }
        assert_eq!(generator.call_count(), 0);
        assert!(host.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_notice_skip_posts_fixed_comment() {
        let host = FakeHost::new(vec![changed("a.rs", Some("@@\n+one"))]);
        let generator = FakeGenerator::new("should not run");

        let outcome = run(&host, &generator, &test_pr(), &test_config(75, SkipPolicy::Notice))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::SkippedBelowThreshold { notice_posted: true, .. }
        ));
        assert_eq!(generator.call_count(), 0);
        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains("(1)"));
        assert!(comments[0].body.contains("(75)"));
    }

    #[tokio::test]
    async fn test_at_or_above_threshold_generates_exactly_once() {
        let host = FakeHost::new(vec![changed("a.rs", Some(patch_with_markers(80).as_str()))]);
        let generator = FakeGenerator::new("LGTM");

        let outcome = run(&host, &generator, &test_pr(), &test_config(75, SkipPolicy::Silent))
            .await
            .unwrap();

        match outcome {
            RunOutcome::Posted { review } => assert_eq!(review, "LGTM"),
            other => panic!("expected posted review, got {:?}", other),
        }
        assert_eq!(generator.call_count(), 1);

        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.ends_with("LGTM"));
    }

    #[tokio::test]
    async fn test_prior_marked_comment_is_deleted_before_posting() {
        let host = FakeHost::new(vec![changed("a.rs", Some(patch_with_markers(80).as_str()))]);
        let config = test_config(75, SkipPolicy::Silent);
        let stale_id = host.seed_comment(&format!("{}\nold review", config.marker));
        let generator = FakeGenerator::new("LGTM");

        run(&host, &generator, &test_pr(), &config).await.unwrap();

        assert_eq!(*host.deletes.lock().unwrap(), vec![stale_id]);
        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.ends_with("LGTM"));
    }

    #[tokio::test]
    async fn test_two_runs_leave_exactly_one_comment_with_latest_text() {
        let host = FakeHost::new(vec![changed("a.rs", Some(patch_with_markers(10).as_str()))]);
        let config = test_config(1, SkipPolicy::Silent);

        let first = FakeGenerator::new("first review");
        run(&host, &first, &test_pr(), &config).await.unwrap();

        let second = FakeGenerator::new("second review");
        run(&host, &second, &test_pr(), &config).await.unwrap();

        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.ends_with("second review"));
    }

    #[tokio::test]
    async fn test_prompt_carries_prefix_and_aggregated_body() {
        let host = FakeHost::new(vec![changed("a.rs", Some(patch_with_markers(5).as_str()))]);
        let generator = FakeGenerator::new("ok");

        run(&host, &generator, &test_pr(), &test_config(1, SkipPolicy::Silent))
            .await
            .unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Review this diff:\n"));
        assert!(prompts[0].contains("### File: a.rs"));
    }

    #[tokio::test]
    async fn test_failed_generation_posts_nothing() {
        struct FailingGenerator;

        #[async_trait]
        impl ReviewGenerator for FailingGenerator {
            async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
                Err(GenerateError::RunFailed("failed".to_string()))
            }
        }

        let host = FakeHost::new(vec![changed("a.rs", Some(patch_with_markers(10).as_str()))]);
        let result = run(
            &host,
            &FailingGenerator,
            &test_pr(),
            &test_config(1, SkipPolicy::Silent),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Generate(_))));
        assert!(host.comments.lock().unwrap().is_empty());
    }
}
