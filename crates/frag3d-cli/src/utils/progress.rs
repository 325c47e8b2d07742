use frag3d::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;
const BUILD_PHASES: usize = 3;

struct BarState {
    pb: ProgressBar,
    phase: usize,
    current: &'static str,
}

/// Renders build progress on stderr: a spinner per phase, a bar for ring-closure attempts.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        pb.finish_and_clear();
        Self {
            state: Arc::new(Mutex::new(BarState {
                pb,
                phase: 0,
                current: "",
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };
            state.handle(progress);
        })
    }
}

impl BarState {
    fn handle(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.phase += 1;
                self.current = name;
                self.pb.reset();
                self.pb.set_length(0);
                self.pb.set_style(spinner_style());
                self.pb
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                self.pb.set_message(self.label());
            }
            Progress::PhaseFinish => {
                self.pb.disable_steady_tick();
                self.pb.finish_with_message(format!("{} ✓", self.label()));
            }
            Progress::TaskStart { total_steps } => {
                self.pb.disable_steady_tick();
                self.pb.reset();
                self.pb.set_length(total_steps);
                self.pb.set_position(0);
                self.pb.set_style(bar_style());
                self.pb.set_message(self.label());
            }
            Progress::TaskIncrement => self.pb.inc(1),
            Progress::TaskFinish => {
                let total = self.pb.length().unwrap_or(0);
                if self.pb.position() < total {
                    self.pb.set_position(total);
                }
                self.pb.finish();
            }
            Progress::Message(msg) => {
                if self.pb.is_finished() {
                    self.pb.set_message(msg);
                } else {
                    self.pb.println(format!("  {}", msg));
                }
            }
        }
    }

    fn label(&self) -> String {
        format!(
            "[{}/{}] {}",
            self.phase,
            BUILD_PHASES.max(self.phase),
            self.current
        )
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<36} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn handler_starts_finished_and_empty() {
        let handler = hidden();
        let state = handler.state.lock().unwrap();
        assert_eq!(state.pb.length(), Some(0));
        assert!(state.pb.is_finished());
        assert_eq!(state.phase, 0);
    }

    #[test]
    fn phases_are_numbered_and_tasks_fill_the_bar() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Assembling Tree",
        });
        assert_eq!(
            handler.state.lock().unwrap().pb.message(),
            "[1/3] Assembling Tree"
        );
        callback(Progress::PhaseFinish);

        callback(Progress::PhaseStart {
            name: "Closing Rings",
        });
        callback(Progress::TaskStart { total_steps: 4 });
        callback(Progress::TaskIncrement);
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.pb.length(), Some(4));
            assert_eq!(state.pb.position(), 1);
            assert_eq!(state.pb.message(), "[2/3] Closing Rings");
        }

        callback(Progress::TaskFinish);
        {
            let state = handler.state.lock().unwrap();
            assert!(state.pb.is_finished());
            assert_eq!(state.pb.position(), 4);
        }

        callback(Progress::PhaseFinish);
        callback(Progress::Message("Best candidate closed 1/1 rings".into()));
        assert_eq!(
            handler.state.lock().unwrap().pb.message(),
            "Best candidate closed 1/1 rings"
        );
    }

    #[test]
    fn callback_is_usable_from_another_thread() {
        let handler = hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: "Worker" });
            callback(Progress::TaskIncrement);
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        let state = handler.state.lock().unwrap();
        assert!(state.pb.is_finished());
        assert_eq!(state.pb.message(), "[1/3] Worker ✓");
    }
}
