/// Size summary of a unified diff, logged before the diff is sent for review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub files: usize,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStats {
    /// Count files and changed lines in a raw unified diff.
    ///
    /// File sections start with `diff --git`; `+++`/`---` header lines are not
    /// counted as changes.
    pub fn from_diff(raw_diff: &str) -> Self {
        let mut stats = DiffStats::default();
        let mut in_hunk = false;

        for line in raw_diff.lines() {
            if line.starts_with("diff --git ") {
                stats.files += 1;
                in_hunk = false;
                continue;
            }
            if line.starts_with("@@") {
                in_hunk = true;
                continue;
            }
            if !in_hunk {
                continue;
            }
            if line.starts_with('+') && !line.starts_with("+++") {
                stats.additions += 1;
            } else if line.starts_with('-') && !line.starts_with("---") {
                stats.deletions += 1;
            }
        }

        stats
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.additions == 0 && self.deletions == 0
    }
}
