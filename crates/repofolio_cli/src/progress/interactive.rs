use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use repofolio::PipelineProgress;

/// Consolidated progress state behind a single lock.
#[derive(Default)]
struct ProgressState {
    /// Spinner while the account is listed.
    fetch_bar: Option<ProgressBar>,
    /// One tick per enriched repository.
    enrich_bar: Option<ProgressBar>,
    /// One tick per screenshot handled.
    mirror_bar: Option<ProgressBar>,
    mirror_failures: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Reporter that draws nothing.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            state: Mutex::new(ProgressState::default()),
        }
    }

    #[cfg(test)]
    pub fn enrich_position(&self) -> Option<u64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.enrich_bar.as_ref().map(ProgressBar::position)
    }

    fn counted_bar(&self, total: usize, prefix: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(Self::bar_style());
        pb.set_prefix(format!("{:10}", prefix));
        pb
    }

    fn note(&self, line: String) {
        self.multi.println(line).ok();
    }

    pub fn handle(&self, event: PipelineProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            PipelineProgress::FetchingRepos { username } => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_prefix(format!("{:10}", username));
                pb.set_message("Listing repositories...");
                state.fetch_bar = Some(pb);
            }

            PipelineProgress::FetchComplete { total } => {
                if let Some(ref pb) = state.fetch_bar {
                    pb.finish_with_message(format!("{} repositories listed", total));
                }
            }

            PipelineProgress::EnrichingRepos { total } => {
                let pb = self.counted_bar(total, "enrich");
                pb.set_message("Fetching topics, READMEs and languages...");
                state.enrich_bar = Some(pb);
            }

            PipelineProgress::RepoEnriched { name, .. } => {
                if let Some(ref pb) = state.enrich_bar {
                    pb.inc(1);
                    pb.set_message(name);
                }
            }

            PipelineProgress::EnrichComplete { total } => {
                if let Some(ref pb) = state.enrich_bar {
                    pb.finish_with_message(format!("{} repositories enriched", total));
                }
            }

            PipelineProgress::FilterComplete { removed, remaining } => {
                if removed > 0 {
                    self.note(format!(
                        "{} Excluded {} repositories by topic, {} remain",
                        style("-").dim(),
                        removed,
                        remaining
                    ));
                }
            }

            PipelineProgress::CheckComplete { changed, unchanged } => {
                let marker = if changed == 0 {
                    style("✓").green()
                } else {
                    style("~").yellow()
                };
                self.note(format!(
                    "{} {} changed, {} unchanged",
                    marker, changed, unchanged
                ));
            }

            PipelineProgress::MirroringScreenshots { total } => {
                let pb = self.counted_bar(total, "images");
                pb.set_message("Mirroring screenshots...");
                state.mirror_bar = Some(pb);
            }

            PipelineProgress::ScreenshotMirrored { name, .. }
            | PipelineProgress::ScreenshotSkipped { name } => {
                if let Some(ref pb) = state.mirror_bar {
                    pb.inc(1);
                    pb.set_message(name);
                }
            }

            PipelineProgress::ScreenshotFailed { name, error } => {
                state.mirror_failures += 1;
                if let Some(ref pb) = state.mirror_bar {
                    pb.inc(1);
                }
                self.note(format!(
                    "{} Screenshot for {}: {}",
                    style("!").yellow(),
                    name,
                    error
                ));
            }

            PipelineProgress::SnapshotSaved { path, total } => {
                if let Some(ref pb) = state.mirror_bar
                    && !pb.is_finished()
                {
                    let message = match state.mirror_failures {
                        0 => "Screenshots mirrored".to_string(),
                        n => format!("Screenshots mirrored ({} failed)", n),
                    };
                    pb.finish_with_message(message);
                }
                self.note(format!(
                    "{} Saved {} repositories to {}",
                    style("✓").green(),
                    total,
                    path
                ));
            }

            PipelineProgress::SnapshotWriteSkipped { reason } => {
                self.note(format!(
                    "{} Snapshot not written: {}",
                    style("!").yellow(),
                    reason
                ));
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for pb in [&state.fetch_bar, &state.enrich_bar, &state.mirror_bar]
            .into_iter()
            .flatten()
        {
            if !pb.is_finished() {
                pb.finish();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_bar_tracks_repositories() {
        let reporter = InteractiveReporter::hidden();
        assert_eq!(reporter.enrich_position(), None);

        reporter.handle(PipelineProgress::EnrichingRepos { total: 3 });
        for name in ["a", "b"] {
            reporter.handle(PipelineProgress::RepoEnriched {
                name: name.to_string(),
                has_readme: false,
                has_screenshot: false,
            });
        }
        assert_eq!(reporter.enrich_position(), Some(2));

        reporter.handle(PipelineProgress::EnrichComplete { total: 3 });
        reporter.finish();
    }

    #[test]
    fn test_mirror_failures_are_counted() {
        let reporter = InteractiveReporter::hidden();
        reporter.handle(PipelineProgress::MirroringScreenshots { total: 2 });
        reporter.handle(PipelineProgress::ScreenshotFailed {
            name: "a".to_string(),
            error: "HTTP 404".to_string(),
        });
        reporter.handle(PipelineProgress::ScreenshotSkipped {
            name: "b".to_string(),
        });

        let state = reporter.state.lock().unwrap();
        assert_eq!(state.mirror_failures, 1);
        assert_eq!(state.mirror_bar.as_ref().unwrap().position(), 2);
    }

    #[test]
    fn test_events_without_bars_are_ignored() {
        let reporter = InteractiveReporter::hidden();
        reporter.handle(PipelineProgress::RepoEnriched {
            name: "orphan".to_string(),
            has_readme: true,
            has_screenshot: true,
        });
        reporter.handle(PipelineProgress::FetchComplete { total: 0 });
        reporter.finish();
        assert_eq!(reporter.enrich_position(), None);
    }
}
