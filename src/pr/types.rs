/// The parts of a pull-request URL needed to address it through the `gh` CLI.
///
/// The number is kept as the literal URL segment; `gh` does its own validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub pr_number: String,
}

impl PrRef {
    /// `owner/repo`, the form `gh -R` expects.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for PrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.pr_number)
    }
}
