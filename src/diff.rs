use crate::github::ChangedFile;
use tracing::debug;

/// A changed file that survived filtering: name plus a guaranteed patch.
#[derive(Debug, Clone)]
pub struct ReviewableFile {
    pub name: String,
    pub patch: String,
}

/// The single reviewable text blob for a PR, plus the metric the size
/// gate runs on.
#[derive(Debug, Clone)]
pub struct AggregatedDiff {
    /// Per-file diffs in upstream order, each preceded by a header line
    /// naming the file.
    pub body: String,
    /// Count of changed-line markers across all included patches: the
    /// number of newline-preceded `+` and `-` lines. A patch whose very
    /// first line is a change is undercounted by one, since that line
    /// has no preceding newline. This is a marker count, not a
    /// character count.
    pub size_metric: usize,
}

impl AggregatedDiff {
    /// True when no file contributed a diff; the caller treats this as
    /// "nothing to review", a terminal success rather than an error.
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Decide whether a file's diff participates in review.
///
/// Binary/patchless files are excluded, as is any file whose lowercased
/// name ends with a denylist entry. This is a suffix match, not an
/// extension match: `discss.txt` is excluded by `.txt` and `STYLE.CSS`
/// by `.css`.
pub fn is_reviewable(file: &ChangedFile, ignored_suffixes: &[String]) -> bool {
    if file.is_binary_or_patchless() {
        return false;
    }
    let name = file.filename.to_lowercase();
    !ignored_suffixes.iter().any(|suffix| name.ends_with(suffix))
}

/// Keep the files that participate in review, preserving upstream order.
pub fn filter_reviewable(files: &[ChangedFile], ignored_suffixes: &[String]) -> Vec<ReviewableFile> {
    files
        .iter()
        .filter_map(|file| {
            if !is_reviewable(file, ignored_suffixes) {
                debug!(file = %file.filename, "skipping file (binary, patchless, or ignored suffix)");
                return None;
            }
            // is_reviewable guarantees the patch is present
            file.patch.as_ref().map(|patch| ReviewableFile {
                name: file.filename.clone(),
                patch: patch.clone(),
            })
        })
        .collect()
}

/// Concatenate surviving per-file diffs into one blob and accumulate
/// the size metric. An empty input produces the empty-body sentinel.
pub fn aggregate(files: &[ReviewableFile]) -> AggregatedDiff {
    let mut body = String::new();
    let mut size_metric = 0usize;

    for file in files {
        body.push_str(&format!("\n### File: {}\n{}\n", file.name, file.patch));
        size_metric += changed_line_markers(&file.patch);
    }

    AggregatedDiff { body, size_metric }
}

/// Count added plus removed line markers in one patch: occurrences of
/// `"\n+"` and `"\n-"`.
fn changed_line_markers(patch: &str) -> usize {
    patch.matches("\n+").count() + patch.matches("\n-").count()
}
