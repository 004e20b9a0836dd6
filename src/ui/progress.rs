use crate::scanner::IncrementalResult;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// Progress bars of a scan, driven by [`ProgressMessage`]s from the scanner.
pub struct ProgressManager {
    mp: MultiProgress,
    scanning: ProgressBar,
    storing: ProgressBar,
    writing: ProgressBar,
    handle: Option<thread::JoinHandle<()>>,
}

fn bar(mp: &MultiProgress, bar: ProgressBar) -> ProgressBar {
    if console::Term::stdout().is_term() {
        mp.add(bar)
    } else {
        ProgressBar::hidden()
    }
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let scanning = bar(&mp, ProgressBar::new(0).with_message("Scanning files"));
        let storing = bar(&mp, ProgressBar::new_spinner().with_message("Updating code model"));
        let writing = bar(&mp, ProgressBar::new_spinner().with_message("Writing database"));

        let scanning_clone = scanning.clone();
        let storing_clone = storing.clone();
        let writing_clone = writing.clone();

        let handle = thread::spawn(move || {
            let spinner_for = |phase: ProgressPhase| match phase {
                ProgressPhase::Scanning => &scanning_clone,
                ProgressPhase::Storing => &storing_clone,
                ProgressPhase::Writing => &writing_clone,
            };

            for msg in rx {
                match msg {
                    ProgressMessage::Started {
                        phase: ProgressPhase::Scanning,
                        total,
                    } => {
                        scanning_clone.set_length(total as u64);
                    }
                    ProgressMessage::Started { phase, .. } => {
                        spinner_for(phase).enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Progress { phase, file } => {
                        let bar = spinner_for(phase);
                        bar.inc(1);
                        if let Some(f) = file {
                            bar.set_message(format!("Scanning: {}", f));
                        }
                    }
                    ProgressMessage::Finished { phase } => {
                        spinner_for(phase).finish_with_message("Done");
                    }
                    ProgressMessage::FileNew(f) => storing_clone.set_message(format!("New: {f}")),
                    ProgressMessage::FileModified(f) => storing_clone.set_message(format!("Modified: {f}")),
                    ProgressMessage::FileDeleted(f) => storing_clone.set_message(format!("Deleted: {f}")),
                }
            }
        });

        (
            Self {
                mp,
                scanning,
                storing,
                writing,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the display thread. Every sender must have been dropped.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn clear(&self) {
        self.scanning.finish_and_clear();
        self.storing.finish_and_clear();
        self.writing.finish_and_clear();
        self.mp.clear().ok();
    }

    pub fn finish_with_summary(&self, duration: Duration, result: &IncrementalResult, total_files: usize) {
        self.clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().added),
            format!("Scan complete in {}", HumanDuration(duration)).style(theme().added)
        );
        println!(
            "  {} {} files  {} {} new  {} {} modified  {} {} deleted  {} {} new packages",
            Icons::FILE.style(theme().info),
            total_files,
            Icons::NEW.style(theme().added),
            result.new_files.len(),
            Icons::MOD.style(theme().changed),
            result.modified_files.len(),
            Icons::DEL.style(theme().removed),
            result.deleted_files.len(),
            Icons::PACKAGE.style(theme().info),
            result.new_packages.len()
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}
