use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::graph::GraphState;
use crate::net::SimulationApi;
use crate::playback::{ControllerHandle, PlaybackSession, PlaybackUpdate};
use crate::ui::{day_summary_line, hud_line, shortcuts, Shortcut};

/// How long a finished run waits for the closing grid-state refresh.
const FINISH_GRACE: Duration = Duration::from_secs(5);

/// UI side of the viewer: receives session snapshots, recolors the graph,
/// prints the HUD and forwards shortcuts to the controller.
pub struct ReplayApp {
    pub graph: GraphState,
    pub session: PlaybackSession,
    handle: ControllerHandle,
    updates: Receiver<PlaybackUpdate>,
    api: Arc<dyn SimulationApi>,
    rt: tokio::runtime::Handle,
    wait_for_refresh: bool,
    closing_at: Option<Instant>,
    last_line: String,
}

impl ReplayApp {
    pub fn new(
        graph: GraphState,
        handle: ControllerHandle,
        updates: Receiver<PlaybackUpdate>,
        api: Arc<dyn SimulationApi>,
        rt: tokio::runtime::Handle,
        wait_for_refresh: bool,
    ) -> Self {
        Self {
            graph,
            session: PlaybackSession::default(),
            handle,
            updates,
            api,
            rt,
            wait_for_refresh,
            closing_at: None,
            last_line: String::new(),
        }
    }

    /// Pumps updates until the controller closes its channel.
    pub fn run(&mut self, mut keys: Receiver<Shortcut>, out: &mut impl Write) -> Result<()> {
        let updates = self.updates.clone();
        loop {
            let pending_keys = keys.clone();
            let timeout = self
                .closing_at
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            crossbeam_channel::select! {
                recv(updates) -> msg => match msg {
                    Ok(PlaybackUpdate::Session(session)) => self.on_session(session, out)?,
                    Ok(PlaybackUpdate::Closed) | Err(_) => return Ok(()),
                },
                recv(pending_keys) -> key => match key {
                    Ok(key) => self.on_shortcut(key, out)?,
                    Err(_) => keys = crossbeam_channel::never(),
                },
                default(timeout) => {
                    if self.closing_at.is_some() {
                        self.shutdown();
                    }
                }
            }
        }
    }

    fn on_session(&mut self, session: PlaybackSession, out: &mut impl Write) -> Result<()> {
        let was_playing = self.session.playing;
        let finished_before = self.closing_at.is_some();
        self.session = session;
        self.graph.apply_live(self.session.live_metrics.as_ref());

        let line = hud_line(&self.session, &self.graph.view.counts());
        if line != self.last_line {
            writeln!(out, "{line}")?;
            self.last_line = line;
        }

        if finished_before {
            // The only update expected after finishing is the grid-state refresh.
            self.log_grid_state();
            self.shutdown();
        } else if !self.session.playing && (was_playing || self.session.error.is_some()) {
            // A rejected run never starts playing but still ends the session.
            self.on_playback_ended(out)?;
        }
        Ok(())
    }

    fn on_playback_ended(&mut self, out: &mut impl Write) -> Result<()> {
        let finished = self.session.total_days > 0 && self.session.error.is_none();
        if !finished {
            self.shutdown();
            return Ok(());
        }
        for summary in &self.session.day_summaries {
            writeln!(out, "{}", day_summary_line(summary))?;
        }
        self.refresh_topology();
        if self.wait_for_refresh {
            self.closing_at = Some(Instant::now() + FINISH_GRACE);
        } else {
            self.shutdown();
        }
        Ok(())
    }

    // The service may rebuild its model during a run; pick up any change.
    fn refresh_topology(&mut self) {
        match self.rt.block_on(self.api.fetch_topology()) {
            Ok(topology) => {
                if self
                    .graph
                    .load_topology(topology, self.session.live_metrics.as_ref())
                {
                    tracing::info!("topology changed during playback");
                }
            }
            Err(err) => tracing::warn!("topology refresh failed: {err:#}"),
        }
    }

    fn log_grid_state(&self) {
        let Some(state) = &self.session.grid_state else {
            return;
        };
        let root_pu = self
            .graph
            .tree
            .root
            .as_ref()
            .and_then(|root| state.bus_voltage_pu(&root.0));
        tracing::info!(
            buses = state.buses.len(),
            disabled_lines = state.disabled_lines().count(),
            ?root_pu,
            "grid state refreshed"
        );
    }

    fn on_shortcut(&mut self, key: Shortcut, out: &mut impl Write) -> Result<()> {
        tracing::debug!(?key, "shortcut");
        if key.apply(&self.handle, self.session.speed_ms)? {
            writeln!(out, "{}", shortcuts::HELP)?;
        }
        if key == Shortcut::Stop && !self.session.playing {
            self.shutdown();
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.closing_at = None;
        if self.handle.shutdown().is_err() {
            tracing::debug!("controller already gone");
        }
    }
}

/// Reads shortcut lines from stdin on a dedicated thread.
pub fn spawn_stdin_reader() -> Receiver<Shortcut> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || read_shortcuts(std::io::stdin().lock(), &tx));
    rx
}

fn read_shortcuts(input: impl BufRead, tx: &Sender<Shortcut>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match Shortcut::parse(&line) {
            Some(key) => {
                if tx.send(key).is_err() {
                    break;
                }
            }
            None => tracing::warn!(input = %line.trim(), "unknown shortcut, try ?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::machine::PlaybackMachine;
    use crate::playback::{spawn_controller, PlaybackStore};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use gridreplay_core::{
        DaySimulation, GridState, SimulationStep, Topology, TopologyEdge, TopologyNode,
    };

    struct OneDayApi;

    #[async_trait]
    impl SimulationApi for OneDayApi {
        async fn fetch_topology(&self) -> Result<Topology> {
            Ok(Topology::new(
                vec![
                    TopologyNode::bus("sourcebus", Some(33.0)),
                    TopologyNode::bus("b1", Some(11.0)),
                ],
                vec![TopologyEdge::line("Line.F01_Sec1", "sourcebus", "b1")],
            ))
        }

        async fn fetch_day_simulation(&self, _date: NaiveDate) -> Result<DaySimulation> {
            let mut step = SimulationStep {
                converged: true,
                ..SimulationStep::default()
            };
            step.bus_voltages.insert("b1".into(), 0.93);
            step.feeder_power_kw.insert("F01".into(), -4.0);
            Ok(DaySimulation {
                steps: vec![step],
                ..DaySimulation::default()
            })
        }

        async fn fetch_current_grid_state(&self) -> Result<GridState> {
            Err(anyhow!("grid state unavailable"))
        }
    }

    #[test]
    fn replays_a_day_and_exits_when_finished() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let api: Arc<dyn SimulationApi> = Arc::new(OneDayApi);
        let mut graph = GraphState::default();
        let topology = rt.block_on(api.fetch_topology()).expect("topology");
        graph.load_topology(topology, None);

        let (tx, rx) = crossbeam_channel::unbounded();
        let machine = PlaybackMachine::new(PlaybackStore::new(10), false);
        let (handle, join) = {
            let _guard = rt.enter();
            spawn_controller(api.clone(), machine, tx)
        };
        let day = NaiveDate::from_ymd_opt(2025, 8, 1).expect("date");
        handle.run(day, day).expect("run queued");

        let mut app = ReplayApp::new(graph, handle, rx, api, rt.handle().clone(), false);
        let mut out = Vec::new();
        app.run(crossbeam_channel::never(), &mut out).expect("app loop");
        rt.block_on(join).expect("controller joins");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("[done]"));
        assert!(text.contains("2025-08-01 1/1 converged"));
        let counts = app.graph.view.counts();
        assert_eq!(counts.low, 1);
        assert_eq!(counts.reverse_flow, 1);
        assert_eq!(app.graph.layout_runs, 1);
    }

    #[test]
    fn rejected_range_ends_the_app_with_an_error() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let api: Arc<dyn SimulationApi> = Arc::new(OneDayApi);
        let (tx, rx) = crossbeam_channel::unbounded();
        let machine = PlaybackMachine::new(PlaybackStore::new(10), true);
        let (handle, join) = {
            let _guard = rt.enter();
            spawn_controller(api.clone(), machine, tx)
        };
        let start = NaiveDate::from_ymd_opt(2025, 8, 2).expect("date");
        let end = NaiveDate::from_ymd_opt(2025, 8, 1).expect("date");
        handle.run(start, end).expect("run queued");

        let mut app = ReplayApp::new(
            GraphState::default(),
            handle,
            rx,
            api,
            rt.handle().clone(),
            true,
        );
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut out = Vec::new();
            let result = app.run(crossbeam_channel::never(), &mut out);
            let _ = done_tx.send((result.is_ok(), app.session));
        });

        let (ok, session) = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("app loop exits after a rejected run");
        rt.block_on(join).expect("controller joins");

        assert!(ok);
        assert!(!session.playing);
        let error = session.error.expect("session error");
        assert!(error.contains("before start date"), "{error}");
    }

    #[test]
    fn stdin_lines_become_shortcuts() {
        let (tx, rx) = crossbeam_channel::unbounded();
        read_shortcuts("p\n\nbogus\nr\n+\n".as_bytes(), &tx);
        let keys: Vec<Shortcut> = rx.try_iter().collect();
        assert_eq!(keys, vec![Shortcut::Pause, Shortcut::Resume, Shortcut::Faster]);
    }
}
