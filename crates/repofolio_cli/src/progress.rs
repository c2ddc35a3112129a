//! Rendering of [`PipelineProgress`] events.
//!
//! On a terminal the events drive indicatif bars; anywhere else (CI, cron,
//! pipes) they become `tracing` events. Bars draw to stderr so the JSON
//! result on stdout stays clean.

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use repofolio::{PipelineProgress, ProgressCallback};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Picks bars or log lines depending on where stdout goes.
pub enum ProgressReporter {
    /// Bars on a terminal.
    Interactive(InteractiveReporter),
    /// Log lines everywhere else.
    Logging(LoggingReporter),
}

impl ProgressReporter {
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: PipelineProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Callback to hand to [`repofolio::PipelineBuilder::progress`].
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Stop any bars still spinning before the result is printed.
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_forwards_to_reporter() {
        let reporter = Arc::new(ProgressReporter::Interactive(InteractiveReporter::hidden()));
        let callback = reporter.as_callback();

        callback(PipelineProgress::EnrichingRepos { total: 2 });
        callback(PipelineProgress::RepoEnriched {
            name: "demo".to_string(),
            has_readme: true,
            has_screenshot: false,
        });

        let ProgressReporter::Interactive(inner) = reporter.as_ref() else {
            panic!("expected interactive reporter");
        };
        assert_eq!(inner.enrich_position(), Some(1));
        reporter.finish();
    }

    #[test]
    fn test_logging_reporter_accepts_every_event() {
        let reporter = ProgressReporter::Logging(LoggingReporter::new());
        for event in [
            PipelineProgress::FetchingRepos {
                username: "bob".to_string(),
            },
            PipelineProgress::FetchComplete { total: 3 },
            PipelineProgress::FilterComplete {
                removed: 1,
                remaining: 2,
            },
            PipelineProgress::ScreenshotFailed {
                name: "demo".to_string(),
                error: "404".to_string(),
            },
            PipelineProgress::SnapshotWriteSkipped {
                reason: "read-only".to_string(),
            },
        ] {
            reporter.handle(event);
        }
        reporter.finish();
    }
}
