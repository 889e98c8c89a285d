use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use normal_mode_analysis::engine::progress::{Progress, ProgressCallback};
use std::fmt::Write;
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// Renders engine progress events on a single terminal line.
///
/// Phases show as a spinner labelled with the phase name; tasks inside a phase switch the
/// line to a bar counting meshes or planes.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: ProgressBar,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        bar.finish_and_clear();
        Self { bar }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let bar = self.bar.clone();
        Box::new(move |event: Progress| match event {
            Progress::PhaseStart { name } => {
                bar.reset();
                bar.set_length(0);
                bar.set_style(spinner_style());
                bar.set_prefix(name);
                bar.set_message(name);
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                let phase = bar.prefix();
                bar.finish_with_message(format!("✓ {phase}"));
            }
            Progress::TaskStart { total_steps } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_length(total_steps);
                bar.set_style(bar_style());
            }
            Progress::TaskIncrement => bar.inc(1),
            Progress::TaskFinish => {
                if let Some(len) = bar.length() {
                    bar.set_position(len);
                }
                bar.finish();
            }
            Progress::Message(msg) => {
                if bar.is_finished() {
                    bar.set_message(msg);
                } else {
                    bar.println(format!("  {msg}"));
                }
            }
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").expect("static spinner template")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .expect("static bar template")
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
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
        assert_eq!(handler.bar.length(), Some(0));
        assert!(handler.bar.is_finished());
    }

    #[test]
    fn callback_tracks_phases_and_tasks() {
        let handler = hidden();
        let callback = handler.callback();

        callback(Progress::PhaseStart {
            name: "Averaging Masks",
        });
        assert_eq!(handler.bar.message(), "Averaging Masks");
        assert!(!handler.bar.is_finished());

        callback(Progress::TaskStart { total_steps: 4 });
        assert_eq!(handler.bar.length(), Some(4));
        assert_eq!(handler.bar.position(), 0);

        callback(Progress::TaskIncrement);
        callback(Progress::TaskIncrement);
        assert_eq!(handler.bar.position(), 2);

        callback(Progress::TaskFinish);
        assert!(handler.bar.is_finished());
        assert_eq!(handler.bar.position(), 4);

        callback(Progress::PhaseFinish);
        assert_eq!(handler.bar.message(), "✓ Averaging Masks");
    }

    #[test]
    fn callback_can_be_driven_from_another_thread() {
        let handler = hidden();
        let callback = handler.callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: "Writing" });
            callback(Progress::Message("halfway".into()));
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        assert!(handler.bar.is_finished());
        assert_eq!(handler.bar.message(), "✓ Writing");
    }
}
