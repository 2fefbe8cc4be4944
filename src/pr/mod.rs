pub mod diff;
pub mod types;

pub use types::PrRef;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Minimum number of `/`-separated segments in a PR URL:
/// `https:`, ``, host, owner, repo, `pull`, number.
const MIN_URL_SEGMENTS: usize = 7;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to run gh pr diff: {0}")]
    DiffFetch(#[source] std::io::Error),
}

/// Parse a pull-request URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
/// Only the segment positions are checked: owner at 3, repo at 4, number at 6.
pub fn parse_pr_url(url: &str) -> Result<PrRef, PrError> {
    let segments: Vec<&str> = url.split('/').collect();
    if segments.len() < MIN_URL_SEGMENTS {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let (owner, repo, pr_number) = (segments[3], segments[4], segments[6]);
    // Stricter than the segment count: empty parts never reach gh.
    if owner.is_empty() || repo.is_empty() || pr_number.is_empty() {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    Ok(PrRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        pr_number: pr_number.to_string(),
    })
}

/// Anything that can turn a pull-request reference into its unified diff.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn fetch_diff(&self, pr: &PrRef) -> Result<String, PrError>;
}

/// Fetches diffs by running `gh pr diff -R {owner}/{repo} {number}`.
pub struct GhCli {
    program: String,
}

impl GhCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DiffSource for GhCli {
    #[instrument(skip_all, fields(program = %self.program, pr = %pr))]
    async fn fetch_diff(&self, pr: &PrRef) -> Result<String, PrError> {
        let output = Command::new(&self.program)
            .args(["pr", "diff", "-R", &pr.repo_slug(), &pr.pr_number])
            .output()
            .await
            .map_err(PrError::DiffFetch)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut reason = format!("{} exited with {}", self.program, output.status);
            if !stderr.trim().is_empty() {
                reason.push_str(": ");
                reason.push_str(stderr.trim());
            }
            return Err(PrError::DiffFetch(std::io::Error::other(reason)));
        }

        let diff = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(diff_bytes = diff.len(), "received PR diff");
        Ok(diff)
    }
}
