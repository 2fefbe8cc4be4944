use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError, ConfigPolicy, Settings};
use crate::pr::diff::DiffStats;
use crate::pr::{self, DiffSource, PrError};
use crate::report::{self, ReportError};
use crate::review::{self, ReviewError, ReviewModel};

pub const USAGE: &str = "Usage: pr_review_cli -pr <PR_URL>";

/// A failed run. The display form is the single line shown to the user.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Error loading config: {0}")]
    Config(#[from] ConfigError),

    #[error("Error fetching PR diff: {0}")]
    Fetch(#[from] PrError),

    #[error("Error generating final consideration: {0}")]
    Review(#[from] ReviewError),

    #[error("Error writing review: {0}")]
    Output(#[from] ReportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No PR URL was given; only the usage line was printed.
    Usage,
    Reviewed,
}

/// One invocation of the tool, as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct Request<'a> {
    pub pr_url: Option<&'a str>,
    pub config_policy: ConfigPolicy,
    pub use_custom_prompt: bool,
    pub output_path: Option<&'a Path>,
}

/// Run the review pipeline: load config, fetch the diff, generate the review, print it.
///
/// `make_model` receives the settings and the instruction chosen from config, and
/// is only called once the diff is in hand.
pub async fn run<D, M, F, W>(
    request: &Request<'_>,
    settings: &Settings,
    diffs: &D,
    make_model: F,
    out: &mut W,
) -> Result<Outcome, RunError>
where
    D: DiffSource,
    M: ReviewModel,
    F: FnOnce(&Settings, String) -> Result<M, ReviewError>,
    W: Write,
{
    let Some(pr_url) = request.pr_url.filter(|url| !url.is_empty()) else {
        writeln!(out, "{USAGE}").map_err(ReportError::from)?;
        return Ok(Outcome::Usage);
    };

    info!("loading configuration");
    let config = Config::load(settings, request.config_policy)?;

    info!("parsing PR URL");
    let pr_ref = pr::parse_pr_url(pr_url)?;

    info!(pr = %pr_ref, "fetching pull request diff");
    let diff = diffs.fetch_diff(&pr_ref).await?;
    let stats = DiffStats::from_diff(&diff);
    info!(files = stats.files, additions = stats.additions, deletions = stats.deletions, "fetched PR diff");
    if stats.is_empty() {
        warn!("diff has no file changes, the review will be based on an empty diff");
    }

    info!("generating review");
    let instruction = review::instruction_for(&config, request.use_custom_prompt);
    let model = make_model(settings, instruction)?;
    let review = model.review(&diff, &config.api_key()).await?;

    report::output(&review, request.output_path, out)?;
    info!("done");

    Ok(Outcome::Reviewed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::PrRef;
    use crate::review::REVIEW_INSTRUCTION;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const DIFF: &str = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1 @@\n-old\n+new\n";

    /// Records every call the pipeline makes into the fakes.
    #[derive(Default)]
    struct CallLog {
        diff_calls: AtomicUsize,
        models_built: AtomicUsize,
        review_calls: AtomicUsize,
        pr_ref: Mutex<Option<PrRef>>,
        api_key: Mutex<Option<String>>,
        instruction: Mutex<Option<String>>,
    }

    struct FakeDiffs {
        diff: Option<String>,
        log: Arc<CallLog>,
    }

    #[async_trait]
    impl DiffSource for FakeDiffs {
        async fn fetch_diff(&self, pr: &PrRef) -> Result<String, PrError> {
            self.log.diff_calls.fetch_add(1, Ordering::SeqCst);
            *self.log.pr_ref.lock().unwrap() = Some(pr.clone());
            self.diff
                .clone()
                .ok_or_else(|| PrError::DiffFetch(std::io::Error::other("gh exited with exit status: 1")))
        }
    }

    struct FakeModel {
        reply: Option<String>,
        log: Arc<CallLog>,
    }

    #[async_trait]
    impl ReviewModel for FakeModel {
        async fn review(&self, _diff: &str, api_key: &str) -> Result<String, ReviewError> {
            self.log.review_calls.fetch_add(1, Ordering::SeqCst);
            *self.log.api_key.lock().unwrap() = Some(api_key.to_string());
            self.reply
                .clone()
                .ok_or(ReviewError::EmptyResponse { detail: None })
        }
    }

    struct Harness {
        log: Arc<CallLog>,
        settings: Settings,
        _config_file: tempfile::NamedTempFile,
    }

    impl Harness {
        fn new(config_toml: &str) -> Self {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(config_toml.as_bytes()).unwrap();
            let settings = Settings {
                config_path: Some(file.path().to_path_buf()),
                ..Settings::default()
            };
            Self {
                log: Arc::new(CallLog::default()),
                settings,
                _config_file: file,
            }
        }

        async fn run(
            &self,
            request: &Request<'_>,
            diff: Option<&str>,
            reply: Option<&str>,
        ) -> (Result<Outcome, RunError>, String) {
            let diffs = FakeDiffs {
                diff: diff.map(str::to_string),
                log: Arc::clone(&self.log),
            };
            let log = Arc::clone(&self.log);
            let reply = reply.map(str::to_string);
            let mut out = Vec::new();

            let result = run(
                request,
                &self.settings,
                &diffs,
                move |_settings, instruction| {
                    log.models_built.fetch_add(1, Ordering::SeqCst);
                    *log.instruction.lock().unwrap() = Some(instruction);
                    Ok(FakeModel {
                        reply,
                        log: Arc::clone(&log),
                    })
                },
                &mut out,
            )
            .await;

            (result, String::from_utf8(out).unwrap())
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.log.diff_calls.load(Ordering::SeqCst),
                self.log.models_built.load(Ordering::SeqCst),
                self.log.review_calls.load(Ordering::SeqCst),
            )
        }
    }

    fn request(pr_url: &str) -> Request<'_> {
        Request {
            pr_url: Some(pr_url),
            ..Request::default()
        }
    }

    #[tokio::test]
    async fn test_no_pr_url_prints_usage_only() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let (result, out) = harness.run(&Request::default(), Some(DIFF), Some("LGTM")).await;

        assert_eq!(result.unwrap(), Outcome::Usage);
        assert_eq!(out, "Usage: pr_review_cli -pr <PR_URL>\n");
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_empty_pr_url_prints_usage() {
        let harness = Harness::new("");
        let (result, out) = harness.run(&request(""), Some(DIFF), Some("LGTM")).await;

        assert_eq!(result.unwrap(), Outcome::Usage);
        assert_eq!(out, format!("{USAGE}\n"));
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_review_is_printed_verbatim() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let (result, out) = harness
            .run(
                &request("https://github.com/orgX/repoY/pull/123"),
                Some(DIFF),
                Some("LGTM\nApproved: true"),
            )
            .await;

        assert_eq!(result.unwrap(), Outcome::Reviewed);
        assert_eq!(out, "LGTM\nApproved: true\n");

        let pr = harness.log.pr_ref.lock().unwrap().clone().unwrap();
        assert_eq!(pr.owner, "orgX");
        assert_eq!(pr.repo, "repoY");
        assert_eq!(pr.pr_number, "123");
        assert_eq!(harness.log.api_key.lock().unwrap().as_deref(), Some("sk-test"));
        assert_eq!(
            harness.log.instruction.lock().unwrap().as_deref(),
            Some(REVIEW_INSTRUCTION)
        );
    }

    #[tokio::test]
    async fn test_short_url_fails_before_fetching() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let (result, out) = harness
            .run(&request("https://github.com/orgX/repoY"), Some(DIFF), Some("LGTM"))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RunError::Fetch(PrError::InvalidUrl(_))));
        assert!(err.to_string().starts_with("Error fetching PR diff: Invalid PR URL"));
        assert!(out.is_empty());
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_diff_failure_skips_model() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let (result, out) = harness
            .run(&request("https://github.com/orgX/repoY/pull/123"), None, Some("LGTM"))
            .await;

        assert!(matches!(result.unwrap_err(), RunError::Fetch(PrError::DiffFetch(_))));
        assert!(out.is_empty());
        assert_eq!(harness.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_empty_response_prints_nothing() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let (result, out) = harness
            .run(&request("https://github.com/orgX/repoY/pull/123"), Some(DIFF), None)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RunError::Review(ReviewError::EmptyResponse { .. })));
        assert_eq!(
            err.to_string(),
            "Error generating final consideration: No response received from the model"
        );
        assert!(out.is_empty());
        assert_eq!(harness.calls(), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_strict_policy_aborts_on_bad_config() {
        let harness = Harness::new("[apikey\n");
        let req = Request {
            config_policy: ConfigPolicy::Strict,
            ..request("https://github.com/orgX/repoY/pull/123")
        };
        let (result, out) = harness.run(&req, Some(DIFF), Some("LGTM")).await;

        let err = result.unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Parse(_))));
        assert!(err.to_string().starts_with("Error loading config:"));
        assert!(out.is_empty());
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_lenient_policy_continues_on_bad_config() {
        let harness = Harness::new("[apikey\n");
        let (result, out) = harness
            .run(&request("https://github.com/orgX/repoY/pull/123"), Some(DIFF), Some("ok"))
            .await;

        assert_eq!(result.unwrap(), Outcome::Reviewed);
        assert_eq!(out, "ok\n");
    }

    #[tokio::test]
    async fn test_custom_prompt_replaces_instruction() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n\n[prompt]\ncustom = \"Focus on SQL.\"\n");
        let req = Request {
            use_custom_prompt: true,
            ..request("https://github.com/orgX/repoY/pull/123")
        };
        let (result, _) = harness.run(&req, Some(DIFF), Some("ok")).await;

        assert!(result.is_ok());
        assert_eq!(
            harness.log.instruction.lock().unwrap().as_deref(),
            Some("\nFocus on SQL.")
        );
    }

    #[tokio::test]
    async fn test_custom_prompt_ignored_without_flag() {
        let harness = Harness::new("[prompt]\ncustom = \"Focus on SQL.\"\n[apikey]\nkey = \"k\"\n");
        let (result, _) = harness
            .run(&request("https://github.com/orgX/repoY/pull/123"), Some(DIFF), Some("ok"))
            .await;

        assert!(result.is_ok());
        assert_eq!(
            harness.log.instruction.lock().unwrap().as_deref(),
            Some(REVIEW_INSTRUCTION)
        );
    }

    #[tokio::test]
    async fn test_review_written_to_output_file() {
        let harness = Harness::new("[apikey]\nkey = \"sk-test\"\n");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.md");
        let req = Request {
            output_path: Some(path.as_path()),
            ..request("https://github.com/orgX/repoY/pull/123")
        };
        let (result, out) = harness.run(&req, Some(DIFF), Some("Approved: false")).await;

        assert_eq!(result.unwrap(), Outcome::Reviewed);
        assert!(out.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Approved: false\n");
    }
}
