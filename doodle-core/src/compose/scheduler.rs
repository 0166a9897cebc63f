use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Longest uninterrupted sleep, so cancellation is noticed within a few milliseconds.
const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Outcome of waiting for a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The tick fired; the caller may draw and capture the next frame.
    Fired,
    /// The owner cancelled the composition.
    Cancelled,
}

/// Source of ticks for the compositor.
///
/// Fixed-length phases wait for *paced* ticks of a known interval. The playback phase waits
/// for *animation* ticks, which a display-driven target would tie to its refresh callback and
/// a headless target substitutes with a fixed-rate timer.
pub trait TickScheduler {
    /// Wait for the next tick of a fixed-length phase.
    fn paced_tick(&mut self, interval: Duration) -> Tick;

    /// Wait for the next tick of the playback phase.
    fn animation_tick(&mut self) -> Tick;
}

/// Wall-clock pacing with drift-free deadlines.
///
/// Each tick's deadline is the previous deadline plus the interval; if the caller falls more
/// than one interval behind, pacing restarts from now instead of bursting to catch up.
#[derive(Debug)]
pub struct WallClockTicker {
    animation_interval: Duration,
    cancel: CancellationToken,
    last_deadline: Option<Instant>,
}

impl WallClockTicker {
    /// Animation ticks fire every `animation_interval`.
    pub fn new(animation_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            animation_interval,
            cancel,
            last_deadline: None,
        }
    }

    fn wait(&mut self, interval: Duration) -> Tick {
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }
        let now = Instant::now();
        let deadline = match self.last_deadline {
            Some(prev) if prev + interval >= now => prev + interval,
            _ => now + interval,
        };
        self.last_deadline = Some(deadline);

        loop {
            if self.cancel.is_cancelled() {
                return Tick::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return Tick::Fired;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

impl TickScheduler for WallClockTicker {
    fn paced_tick(&mut self, interval: Duration) -> Tick {
        self.wait(interval)
    }

    fn animation_tick(&mut self) -> Tick {
        self.wait(self.animation_interval)
    }
}

/// Fires every tick immediately. Used for offline encoding and tests.
#[derive(Debug, Default)]
pub struct UnpacedTicker {
    cancel: CancellationToken,
    paced: u64,
    animation: u64,
}

impl UnpacedTicker {
    /// Create a ticker observing `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            paced: 0,
            animation: 0,
        }
    }

    /// Number of paced ticks fired so far.
    pub fn paced_ticks(&self) -> u64 {
        self.paced
    }

    /// Number of animation ticks fired so far.
    pub fn animation_ticks(&self) -> u64 {
        self.animation
    }
}

impl TickScheduler for UnpacedTicker {
    fn paced_tick(&mut self, _interval: Duration) -> Tick {
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }
        self.paced += 1;
        Tick::Fired
    }

    fn animation_tick(&mut self) -> Tick {
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }
        self.animation += 1;
        Tick::Fired
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/scheduler.rs"]
mod tests;
