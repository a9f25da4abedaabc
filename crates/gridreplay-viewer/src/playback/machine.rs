use anyhow::Result;
use chrono::NaiveDate;
use gridreplay_core::{DaySimulation, DaySummary, GridState, SimulationStep, STEPS_PER_DAY};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::playback::dates::{date_range, format_date};
use crate::playback::store::PlaybackStore;

pub type RunId = u64;

/// Shared between a run and the tasks it spawned; once set, every pending
/// continuation of that run is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching { day: usize },
    Ticking { day: usize, step: usize },
    Finished,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Fetch {
        run: RunId,
        day: usize,
        date: NaiveDate,
        cancel: CancelFlag,
    },
    /// Replaces whatever timer is pending.
    Schedule { run: RunId, delay: Duration },
    CancelTimer,
    RefreshGridState { run: RunId, cancel: CancelFlag },
}

/// Playback controller logic without any clock or I/O. Inputs mutate the
/// store and return the effects the driver must carry out.
#[derive(Debug)]
pub struct PlaybackMachine {
    store: PlaybackStore,
    phase: Phase,
    run: RunId,
    cancel: CancelFlag,
    dates: Vec<NaiveDate>,
    day_steps: Vec<SimulationStep>,
    refresh_on_finish: bool,
}

impl PlaybackMachine {
    pub fn new(store: PlaybackStore, refresh_on_finish: bool) -> Self {
        Self {
            store,
            phase: Phase::Idle,
            run: 0,
            cancel: CancelFlag::new(),
            dates: Vec::new(),
            day_steps: Vec::new(),
            refresh_on_finish,
        }
    }

    pub fn store(&self) -> &PlaybackStore {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn run_id(&self) -> RunId {
        self.run
    }

    fn is_current(&self, run: RunId) -> bool {
        run == self.run && !self.cancel.is_cancelled()
    }

    fn retire_run(&mut self) {
        self.cancel.cancel();
        self.phase = Phase::Idle;
        self.dates.clear();
        self.day_steps.clear();
    }

    /// Replaces any active run with a new one covering `start..=end`.
    pub fn run(&mut self, start: NaiveDate, end: NaiveDate) -> Vec<Effect> {
        self.retire_run();
        let mut effects = vec![Effect::CancelTimer];
        let dates = match date_range(start, end) {
            Ok(dates) => dates,
            Err(err) => {
                tracing::warn!(%start, %end, "rejected playback range: {err:#}");
                self.store.stop();
                self.store.set_error(Some(format!("{err:#}")));
                return effects;
            }
        };

        self.run += 1;
        self.cancel = CancelFlag::new();
        self.store
            .start(dates.len(), dates.first().copied().map(format_date));
        self.dates = dates;
        tracing::info!(run = self.run, %start, %end, days = self.dates.len(), "playback started");
        effects.extend(self.begin_day(0));
        effects
    }

    fn begin_day(&mut self, day: usize) -> Vec<Effect> {
        let date = self.dates[day];
        self.store.set_day(day, Some(format_date(date)));
        self.store.set_fetching(true);
        self.day_steps.clear();
        self.phase = Phase::Fetching { day };
        tracing::debug!(run = self.run, day, %date, "fetching day");
        vec![Effect::Fetch {
            run: self.run,
            day,
            date,
            cancel: self.cancel.clone(),
        }]
    }

    pub fn on_day_fetched(
        &mut self,
        run: RunId,
        day: usize,
        result: Result<DaySimulation>,
    ) -> Vec<Effect> {
        if !self.is_current(run) || self.phase != (Phase::Fetching { day }) {
            tracing::debug!(run, day, current = self.run, "dropping stale day result");
            return Vec::new();
        }
        self.store.set_fetching(false);

        let sim = match result {
            Ok(sim) => sim,
            Err(err) => {
                tracing::warn!(run, day, "day fetch failed: {err:#}");
                self.retire_run();
                self.store.stop();
                self.store.set_error(Some(format!("{err:#}")));
                return vec![Effect::CancelTimer];
            }
        };

        let date = format_date(self.dates[day]);
        tracing::info!(run, day, %date, steps = sim.steps.len(), "day loaded");
        if sim.steps.len() != STEPS_PER_DAY {
            tracing::warn!(
                day,
                %date,
                steps = sim.steps.len(),
                expected = STEPS_PER_DAY,
                "day has an unusual step count, playing what arrived"
            );
        }
        let summary = sim
            .summary
            .unwrap_or_else(|| DaySummary::from_steps(&date, &sim.steps));
        self.store.record_day(summary, sim.grid_state);
        self.day_steps = sim.steps;

        if !self.store.is_playing() {
            return Vec::new();
        }
        self.phase = Phase::Ticking { day, step: 0 };
        if self.store.is_paused() {
            return Vec::new();
        }
        let mut effects = self.advance();
        effects.extend(self.schedule_next());
        effects
    }

    pub fn on_timer(&mut self, run: RunId) -> Vec<Effect> {
        if !self.is_current(run) {
            return Vec::new();
        }
        if !self.store.is_playing() || self.store.is_paused() {
            return Vec::new();
        }
        if !matches!(self.phase, Phase::Ticking { .. }) {
            return Vec::new();
        }
        let mut effects = self.advance();
        effects.extend(self.schedule_next());
        effects
    }

    // One step forward from Ticking: the next step, the next day, or the end.
    fn advance(&mut self) -> Vec<Effect> {
        let Phase::Ticking { day, step } = self.phase else {
            return Vec::new();
        };
        if let Some(next) = self.day_steps.get(step) {
            self.store.advance_step(next.clone());
            self.phase = Phase::Ticking { day, step: step + 1 };
            return Vec::new();
        }
        if day + 1 < self.dates.len() {
            return self.begin_day(day + 1);
        }
        self.finish()
    }

    fn finish(&mut self) -> Vec<Effect> {
        self.store.finish();
        self.phase = Phase::Finished;
        tracing::info!(run = self.run, days = self.dates.len(), "playback finished");
        if self.refresh_on_finish {
            vec![Effect::RefreshGridState {
                run: self.run,
                cancel: self.cancel.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    fn schedule_next(&self) -> Option<Effect> {
        let ticking = matches!(self.phase, Phase::Ticking { .. });
        (ticking && self.store.is_playing() && !self.store.is_paused()).then(|| {
            Effect::Schedule {
                run: self.run,
                delay: Duration::from_millis(self.store.speed_ms()),
            }
        })
    }

    pub fn pause(&mut self) -> Vec<Effect> {
        if self.store.is_playing() && !self.store.is_paused() {
            self.store.pause();
            tracing::debug!(run = self.run, phase = ?self.phase, "paused");
        }
        Vec::new()
    }

    pub fn resume(&mut self) -> Vec<Effect> {
        if !self.store.is_playing() || !self.store.is_paused() {
            return Vec::new();
        }
        self.store.resume();
        tracing::debug!(run = self.run, phase = ?self.phase, "resumed");
        self.schedule_next().into_iter().collect()
    }

    /// Manual single advance. Ignored while a day is still loading.
    pub fn skip(&mut self) -> Vec<Effect> {
        if !self.store.is_playing() || !matches!(self.phase, Phase::Ticking { .. }) {
            return Vec::new();
        }
        let mut effects = vec![Effect::CancelTimer];
        effects.extend(self.advance());
        effects.extend(self.schedule_next());
        effects
    }

    /// Takes effect at the next scheduling decision; a pending timer keeps
    /// the delay it was scheduled with.
    pub fn set_speed(&mut self, ms: u64) -> Vec<Effect> {
        if !self.store.set_speed(ms) {
            tracing::warn!(ms, "ignoring non-positive playback speed");
        }
        Vec::new()
    }

    pub fn stop(&mut self) -> Vec<Effect> {
        tracing::info!(run = self.run, phase = ?self.phase, "playback stopped");
        self.retire_run();
        self.store.stop();
        vec![Effect::CancelTimer]
    }

    pub fn on_grid_state(&mut self, run: RunId, result: Result<GridState>) -> Vec<Effect> {
        if !self.is_current(run) {
            return Vec::new();
        }
        match result {
            Ok(state) => self.store.set_grid_state(state),
            Err(err) => tracing::warn!(run, "grid state refresh failed: {err:#}"),
        }
        Vec::new()
    }
}
