use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write review: {0}")]
    Write(#[from] std::io::Error),
}

/// Output the review to the terminal (default) or to a file.
///
/// The text is written as-is followed by one newline.
#[instrument(skip(review, terminal), fields(review_bytes = review.len()))]
pub fn output<W: Write>(
    review: &str,
    output_path: Option<&Path>,
    terminal: &mut W,
) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing review to terminal");
            write_review(review, terminal)
        }
        Some(path) => {
            debug!(path = %path.display(), "writing review to file");
            let mut file = File::create(path)?;
            write_review(review, &mut file)
        }
    }
}

fn write_review<W: Write>(review: &str, out: &mut W) -> Result<(), ReportError> {
    writeln!(out, "{review}")?;
    out.flush()?;
    Ok(())
}
