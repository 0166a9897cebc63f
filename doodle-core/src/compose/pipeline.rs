use std::fmt;

use crate::assets::decode::{PreparedImage, decode_image};
use crate::compose::progress::{
    DONE, HOLD_END, PLAYBACK_END, ProgressReporter, SETUP_END, TRANSITION_END,
};
use crate::compose::scheduler::{Tick, TickScheduler};
use crate::compose::surface::Surface;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::media::source::{PlaybackState, VideoSource};

/// Share of the cover hold during which the fade-in runs.
const FADE_IN_SHARE: f64 = 0.3;

/// Timing of a composition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositionSettings {
    /// How long the cover is shown alone, in seconds.
    pub cover_hold_secs: f64,
    /// Length of the cover-to-video cross-fade, in seconds.
    pub transition_secs: f64,
    /// Output frame rate; also the pacing rate of every phase.
    pub target_fps: u32,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            cover_hold_secs: 1.5,
            transition_secs: 0.5,
            target_fps: 30,
        }
    }
}

impl CompositionSettings {
    /// Check the invariants and return the output frame rate.
    pub fn validate(&self) -> DoodleResult<Fps> {
        if !self.cover_hold_secs.is_finite() || self.cover_hold_secs < 0.0 {
            return Err(DoodleError::validation(
                "cover hold must be a finite, non-negative number of seconds",
            ));
        }
        if !self.transition_secs.is_finite() || self.transition_secs < 0.0 {
            return Err(DoodleError::validation(
                "transition must be a finite, non-negative number of seconds",
            ));
        }
        Fps::whole(self.target_fps)
    }
}

/// Tick counters for one finished composition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositionStats {
    /// Paced ticks spent holding the cover.
    pub hold_ticks: u64,
    /// Paced ticks spent cross-fading into the video.
    pub transition_ticks: u64,
    /// Animation ticks that captured a live video frame.
    pub playback_ticks: u64,
    /// Frames handed to the encoder.
    pub frames_pushed: u64,
}

/// Composition phases, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Cover decode, source validation, encoder start.
    Setup,
    /// Cover alone, with a fade-in.
    CoverHold,
    /// Cover cross-fading into the first video frame.
    Transition,
    /// Live video frames until the source ends.
    Playback,
    /// Encoder flush.
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::CoverHold => "cover_hold",
            Self::Transition => "transition",
            Self::Playback => "playback",
            Self::Finalize => "finalize",
        })
    }
}

/// Drives the phases of a composition over one surface and one encoder session.
///
/// The compositor never owns its collaborators: the caller opens the [`VideoSource`], provides
/// the [`FrameSink`], and chooses a [`TickScheduler`]. On success the sink has been ended; on
/// failure it has been aborted. Either way the source has been closed.
pub struct Compositor<'a> {
    settings: CompositionSettings,
    scheduler: &'a mut dyn TickScheduler,
}

impl<'a> Compositor<'a> {
    /// Create a compositor paced by `scheduler`.
    pub fn new(settings: CompositionSettings, scheduler: &'a mut dyn TickScheduler) -> Self {
        Self {
            settings,
            scheduler,
        }
    }

    /// Compose `cover_bytes` (an encoded image) and `source` into `sink`.
    ///
    /// `on_progress` receives non-decreasing values in `[0, 100]`, ending at exactly `100` on
    /// success.
    #[tracing::instrument(skip_all, fields(hold = self.settings.cover_hold_secs, fps = self.settings.target_fps))]
    pub fn run(
        &mut self,
        cover_bytes: &[u8],
        source: &mut dyn VideoSource,
        sink: &mut dyn FrameSink,
        on_progress: &mut dyn FnMut(f64),
    ) -> DoodleResult<CompositionStats> {
        let mut progress = ProgressReporter::new(on_progress);
        progress.report(0.0);
        let mut run = Run {
            settings: self.settings,
            scheduler: &mut *self.scheduler,
            source,
            sink,
            progress,
            next_index: 0,
            stats: CompositionStats::default(),
            phase: Phase::Setup,
        };

        match run.execute(cover_bytes) {
            Ok(()) => {
                run.source.close();
                run.progress.report(DONE);
                tracing::debug!(stats = ?run.stats, "composition finished");
                Ok(run.stats)
            }
            Err(e) => {
                tracing::warn!(phase = %run.phase, error = %e, "composition failed");
                run.sink.abort();
                run.source.close();
                Err(e)
            }
        }
    }
}

struct Run<'s, 'p> {
    settings: CompositionSettings,
    scheduler: &'s mut dyn TickScheduler,
    source: &'s mut dyn VideoSource,
    sink: &'s mut dyn FrameSink,
    progress: ProgressReporter<'p>,
    next_index: u64,
    stats: CompositionStats,
    phase: Phase,
}

impl Run<'_, '_> {
    fn execute(&mut self, cover_bytes: &[u8]) -> DoodleResult<()> {
        let fps = self.settings.validate()?;
        let (cover, mut surface) = self.setup(cover_bytes, fps)?;
        self.cover_hold(fps, &cover, &mut surface)?;
        self.transition(fps, &cover, &mut surface)?;
        self.playback(&mut surface)?;

        self.enter(Phase::Finalize);
        self.sink.end().map_err(as_encoding)
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(%phase, frames = self.next_index, "entering phase");
        self.phase = phase;
    }

    fn setup(&mut self, cover_bytes: &[u8], fps: Fps) -> DoodleResult<(PreparedImage, Surface)> {
        self.enter(Phase::Setup);
        let cover = decode_image(cover_bytes)
            .map_err(|e| DoodleError::cover_load(format!("cover image could not be decoded: {e}")))?;
        self.progress.report(10.0);

        let canvas = self.source.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(DoodleError::source_load("source video reports no dimensions"));
        }
        self.progress.report(20.0);

        let surface = Surface::new(canvas)?;
        let cover = cover.fit_to(canvas).map_err(|e| DoodleError::cover_load(e.to_string()))?;
        self.sink
            .begin(SinkConfig {
                width: canvas.width,
                height: canvas.height,
                fps,
            })
            .map_err(as_encoding)?;
        self.progress.report(SETUP_END);
        Ok((cover, surface))
    }

    fn cover_hold(&mut self, fps: Fps, cover: &PreparedImage, surface: &mut Surface) -> DoodleResult<()> {
        self.enter(Phase::CoverHold);
        let ticks = fps.secs_to_ticks(self.settings.cover_hold_secs);
        let fade_ticks = ticks as f64 * FADE_IN_SHARE;
        let interval = fps.tick_interval();

        for i in 0..ticks {
            surface.draw_image(cover, 1.0)?;
            if (i as f64) < fade_ticks {
                let alpha = i as f64 / fade_ticks;
                surface.draw_image(cover, alpha as f32)?;
            }
            self.capture(surface)?;
            self.stats.hold_ticks += 1;
            self.progress
                .report_within(SETUP_END, HOLD_END, (i + 1) as f64 / ticks as f64);
            let tick = self.scheduler.paced_tick(interval);
            self.wait(tick)?;
        }
        self.progress.report(HOLD_END);
        Ok(())
    }

    fn transition(&mut self, fps: Fps, cover: &PreparedImage, surface: &mut Surface) -> DoodleResult<()> {
        self.enter(Phase::Transition);
        let canvas = surface.canvas();
        let first = self
            .source
            .seek_to_start()
            .map_err(as_source_load)?
            .map(<[u8]>::to_vec);
        if let Some(frame) = &first {
            check_frame(frame, canvas)?;
        }

        let ticks = fps.secs_to_ticks(self.settings.transition_secs);
        let interval = fps.tick_interval();
        for i in 0..ticks {
            surface.draw_image(cover, 1.0)?;
            if let Some(frame) = &first {
                let alpha = (i + 1) as f64 / ticks as f64;
                surface.draw_rgba(frame, alpha as f32)?;
            }
            self.capture(surface)?;
            self.stats.transition_ticks += 1;
            self.progress
                .report_within(HOLD_END, TRANSITION_END, (i + 1) as f64 / ticks as f64);
            let tick = self.scheduler.paced_tick(interval);
            self.wait(tick)?;
        }
        self.progress.report(TRANSITION_END);
        Ok(())
    }

    fn playback(&mut self, surface: &mut Surface) -> DoodleResult<()> {
        self.enter(Phase::Playback);
        let canvas = surface.canvas();
        let duration = self.source.info().duration_secs;
        self.source.play().map_err(as_source_load)?;

        loop {
            if matches!(
                self.source.state(),
                PlaybackState::Ended | PlaybackState::Paused
            ) {
                break;
            }
            let Some(frame) = self.source.next_frame() else {
                break;
            };
            check_frame(frame, canvas)?;
            surface.draw_rgba(frame, 1.0)?;

            self.capture(surface)?;
            self.stats.playback_ticks += 1;
            if duration > 0.0 {
                let fraction = self.source.current_time() / duration;
                self.progress.report_within(TRANSITION_END, PLAYBACK_END, fraction);
            }
            let tick = self.scheduler.animation_tick();
            self.wait(tick)?;
        }

        if self.source.state() == PlaybackState::Paused {
            tracing::warn!(
                at = self.source.current_time(),
                "source paused before its end; finalizing with frames captured so far"
            );
        }
        self.progress.report(PLAYBACK_END);
        Ok(())
    }

    fn capture(&mut self, surface: &Surface) -> DoodleResult<()> {
        self.sink
            .push_frame(FrameIndex(self.next_index), surface.frame())
            .map_err(as_encoding)?;
        self.next_index += 1;
        self.stats.frames_pushed += 1;
        Ok(())
    }

    fn wait(&self, tick: Tick) -> DoodleResult<()> {
        match tick {
            Tick::Fired => Ok(()),
            Tick::Cancelled => Err(DoodleError::cancelled(format!(
                "composition cancelled during {}",
                self.phase
            ))),
        }
    }
}

fn check_frame(frame: &[u8], canvas: Canvas) -> DoodleResult<()> {
    if frame.len() != canvas.rgba_len() {
        return Err(DoodleError::source_load(format!(
            "decoded frame has {} bytes, expected {} for {}x{}",
            frame.len(),
            canvas.rgba_len(),
            canvas.width,
            canvas.height
        )));
    }
    Ok(())
}

fn as_encoding(e: DoodleError) -> DoodleError {
    match e {
        DoodleError::Encoding(_) | DoodleError::Cancelled(_) => e,
        other => DoodleError::encoding(other.to_string()),
    }
}

fn as_source_load(e: DoodleError) -> DoodleError {
    match e {
        DoodleError::SourceLoad(_) => e,
        other => DoodleError::source_load(other.to_string()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/pipeline.rs"]
mod tests;
