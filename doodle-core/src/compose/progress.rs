/// Progress at the end of setup (cover decoded, source opened, encoder started).
pub const SETUP_END: f64 = 30.0;
/// Progress at the end of the cover hold.
pub const HOLD_END: f64 = 50.0;
/// Progress at the end of the cover-to-video transition.
pub const TRANSITION_END: f64 = 60.0;
/// Progress once playback capture has consumed the whole source.
pub const PLAYBACK_END: f64 = 95.0;
/// Progress after the encoder has been finalized.
pub const DONE: f64 = 100.0;

/// Forwards progress to a callback, never letting the reported value go backwards.
pub struct ProgressReporter<'a> {
    callback: &'a mut dyn FnMut(f64),
    last: Option<f64>,
}

impl<'a> ProgressReporter<'a> {
    /// Wrap `callback`, which receives values in `[0, 100]`.
    pub fn new(callback: &'a mut dyn FnMut(f64)) -> Self {
        Self {
            callback,
            last: None,
        }
    }

    /// Report `percent`. Values below the last report (or NaN) are dropped.
    pub fn report(&mut self, percent: f64) {
        if percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, DONE);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        (self.callback)(percent);
    }

    /// Report the start of band `[from, to]` scaled by `fraction` in `[0, 1]`.
    pub fn report_within(&mut self, from: f64, to: f64, fraction: f64) {
        self.report(from + (to - from) * fraction.clamp(0.0, 1.0));
    }

    /// Last value reported, if any.
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/progress.rs"]
mod tests;
