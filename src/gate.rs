use serde::Deserialize;

/// What to do when a change falls below the review threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipPolicy {
    /// End the run with no comment action.
    #[default]
    Silent,
    /// Post a fixed, non-AI comment stating the measured size and threshold.
    Notice,
}

/// Outcome of the size gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Change is substantial enough; invoke the review generator.
    Proceed,
    /// Below threshold; skip generation per the configured policy.
    Skip,
}

/// Inclusive-exclusive boundary: a metric equal to the threshold proceeds.
pub fn decide(size_metric: usize, threshold: usize) -> GateDecision {
    if size_metric < threshold {
        GateDecision::Skip
    } else {
        GateDecision::Proceed
    }
}

/// Body of the notice-skip comment.
pub fn notice_body(size_metric: usize, threshold: usize) -> String {
    format!(
        "Change size ({}) is below the review threshold ({}). Skipping AI review.",
        size_metric, threshold
    )
}
