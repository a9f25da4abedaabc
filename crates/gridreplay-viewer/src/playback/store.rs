use gridreplay_core::{DaySummary, GridState, SimulationStep};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_SPEED_MS: u64 = 500;

/// Projection of the most recently advanced step, as read by the HUD and
/// the view builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveMetrics {
    pub step: Option<u32>,
    pub hour: f64,
    pub time_label: String,
    pub converged: bool,
    pub total_power_kw: f64,
    pub total_losses_kw: f64,
    pub min_voltage_pu: f64,
    pub max_voltage_pu: f64,
    pub voltage_violations: u32,
    pub total_solar_kw: f64,
    pub total_wind_kw: f64,
    pub total_thermal_kw: f64,
    pub total_generation_kw: f64,
    pub bus_voltages: BTreeMap<String, f64>,
    pub feeder_power_kw: BTreeMap<String, f64>,
}

impl LiveMetrics {
    pub fn from_step(step: &SimulationStep) -> Self {
        Self {
            step: step.step,
            hour: step.hour,
            time_label: step.time_label(),
            converged: step.converged,
            total_power_kw: step.total_power_kw,
            total_losses_kw: step.total_losses_kw,
            min_voltage_pu: step.min_voltage_pu,
            max_voltage_pu: step.max_voltage_pu,
            voltage_violations: step.voltage_violations,
            total_solar_kw: step.total_solar_kw,
            total_wind_kw: step.total_wind_kw,
            total_thermal_kw: step.total_thermal_kw,
            total_generation_kw: step.total_generation_kw,
            bus_voltages: step.bus_voltages.clone(),
            feeder_power_kw: step.feeder_power_kw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub playing: bool,
    pub paused: bool,
    pub fetching: bool,
    pub day_index: usize,
    pub step_index: usize,
    pub total_days: usize,
    pub current_date: Option<String>,
    pub visible_steps: Vec<SimulationStep>,
    pub speed_ms: u64,
    pub live_metrics: Option<LiveMetrics>,
    pub error: Option<String>,
    pub grid_state: Option<GridState>,
    pub day_summaries: Vec<DaySummary>,
    pub revision: u64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            playing: false,
            paused: false,
            fetching: false,
            day_index: 0,
            step_index: 0,
            total_days: 0,
            current_date: None,
            visible_steps: Vec::new(),
            speed_ms: DEFAULT_SPEED_MS,
            live_metrics: None,
            error: None,
            grid_state: None,
            day_summaries: Vec::new(),
            revision: 0,
        }
    }
}

/// Single source of truth for playback. Every mutation goes through one of
/// the named actions below and bumps `revision`.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStore {
    session: PlaybackSession,
}

impl PlaybackStore {
    pub fn new(speed_ms: u64) -> Self {
        let mut store = Self::default();
        if speed_ms > 0 {
            store.session.speed_ms = speed_ms;
        }
        store
    }

    #[cfg(test)]
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn snapshot(&self) -> PlaybackSession {
        self.session.clone()
    }

    pub fn revision(&self) -> u64 {
        self.session.revision
    }

    pub fn is_playing(&self) -> bool {
        self.session.playing
    }

    pub fn is_paused(&self) -> bool {
        self.session.paused
    }

    pub fn speed_ms(&self) -> u64 {
        self.session.speed_ms
    }

    fn touch(&mut self) {
        self.session.revision += 1;
    }

    pub fn start(&mut self, total_days: usize, first_date: Option<String>) {
        let speed_ms = self.session.speed_ms;
        let revision = self.session.revision;
        self.session = PlaybackSession {
            playing: true,
            total_days,
            current_date: first_date,
            speed_ms,
            revision,
            ..PlaybackSession::default()
        };
        self.touch();
    }

    pub fn set_day(&mut self, day_index: usize, date: Option<String>) {
        self.session.day_index = day_index;
        self.session.current_date = date;
        self.session.step_index = 0;
        self.session.visible_steps.clear();
        self.touch();
    }

    pub fn advance_step(&mut self, step: SimulationStep) {
        self.session.live_metrics = Some(LiveMetrics::from_step(&step));
        self.session.visible_steps.push(step);
        self.session.step_index += 1;
        self.touch();
    }

    pub fn pause(&mut self) {
        self.session.paused = true;
        self.touch();
    }

    pub fn resume(&mut self) {
        self.session.paused = false;
        self.touch();
    }

    /// Returns false and leaves the session untouched for a zero interval.
    pub fn set_speed(&mut self, ms: u64) -> bool {
        if ms == 0 {
            return false;
        }
        self.session.speed_ms = ms;
        self.touch();
        true
    }

    pub fn set_fetching(&mut self, fetching: bool) {
        self.session.fetching = fetching;
        self.touch();
    }

    pub fn finish(&mut self) {
        self.session.playing = false;
        self.session.paused = false;
        self.session.fetching = false;
        self.touch();
    }

    pub fn stop(&mut self) {
        let speed_ms = self.session.speed_ms;
        let revision = self.session.revision;
        self.session = PlaybackSession {
            speed_ms,
            revision,
            ..PlaybackSession::default()
        };
        self.touch();
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.session.error = error;
        self.touch();
    }

    pub fn record_day(&mut self, summary: DaySummary, grid_state: Option<GridState>) {
        self.session.day_summaries.push(summary);
        if grid_state.is_some() {
            self.session.grid_state = grid_state;
        }
        self.touch();
    }

    pub fn set_grid_state(&mut self, state: GridState) {
        self.session.grid_state = Some(state);
        self.touch();
    }
}
