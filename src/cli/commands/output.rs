//! Terminal rendering of progress lines.

use async_trait::async_trait;
use console::{style, StyledObject};
use indicatif::ProgressBar;

use crate::progress::ProgressSink;

/// Style a status line by what it reports.
pub fn styled_status(status: &str) -> StyledObject<&str> {
    if status.starts_with("Error") || status.contains(": Error") || status == "Site not found" {
        style(status).red()
    } else if status.starts_with("Completed download for")
        || status.ends_with("Download completed")
        || status == "Report downloaded successfully"
        || status == "All downloads completed"
    {
        style(status).green()
    } else {
        style(status).dim()
    }
}

/// Prints every progress line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

#[async_trait]
impl ProgressSink for ConsoleProgress {
    async fn emit(&self, message: String) {
        println!("{} {}", style("→").cyan(), styled_status(&message));
    }
}

/// Prints progress lines above a progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

#[async_trait]
impl ProgressSink for BarProgress {
    async fn emit(&self, message: String) {
        self.bar
            .println(format!("{} {}", style("→").cyan(), styled_status(&message)));
    }
}
