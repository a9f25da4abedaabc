use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use crossbeam_channel::Sender;
use gridreplay_core::{DaySimulation, GridState};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use crate::net::SimulationApi;
use crate::playback::machine::{Effect, PlaybackMachine, RunId};
use crate::playback::PlaybackUpdate;

#[derive(Debug)]
enum Command {
    Run { start: NaiveDate, end: NaiveDate },
    Pause,
    Resume,
    Stop,
    Skip,
    SetSpeed(u64),
    Shutdown,
}

enum Completion {
    Day {
        run: RunId,
        day: usize,
        result: Result<DaySimulation>,
    },
    GridState {
        run: RunId,
        result: Result<GridState>,
    },
}

/// Cloneable front door to the controller task. Every call is queued and
/// applied in order by the task.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<Command>,
}

impl ControllerHandle {
    fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| anyhow!("playback controller has shut down"))
    }

    pub fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        self.send(Command::Run { start, end })
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn skip(&self) -> Result<()> {
        self.send(Command::Skip)
    }

    pub fn set_speed(&self, ms: u64) -> Result<()> {
        self.send(Command::SetSpeed(ms))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

struct PendingTimer {
    run: RunId,
    sleep: Pin<Box<Sleep>>,
}

struct Driver {
    api: Arc<dyn SimulationApi>,
    machine: PlaybackMachine,
    timer: Option<PendingTimer>,
    done_tx: UnboundedSender<Completion>,
    updates: Sender<PlaybackUpdate>,
    published: Option<u64>,
}

/// Starts the controller on the current tokio runtime. Session snapshots
/// flow to `updates` whenever the store changes.
pub fn spawn_controller(
    api: Arc<dyn SimulationApi>,
    machine: PlaybackMachine,
    updates: Sender<PlaybackUpdate>,
) -> (ControllerHandle, JoinHandle<()>) {
    let (tx, commands) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let driver = Driver {
        api,
        machine,
        timer: None,
        done_tx,
        updates,
        published: None,
    };
    let join = tokio::spawn(driver.drive(commands, done_rx));
    (ControllerHandle { tx }, join)
}

async fn wait_timer(timer: &mut Option<PendingTimer>) -> RunId {
    match timer {
        Some(t) => {
            t.sleep.as_mut().await;
            t.run
        }
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn drive(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut done: UnboundedReceiver<Completion>,
    ) {
        self.publish();
        loop {
            let effects = tokio::select! {
                cmd = commands.recv() => match cmd {
                    None | Some(Command::Shutdown) => break,
                    Some(cmd) => self.on_command(cmd),
                },
                Some(completion) = done.recv() => self.on_completion(completion),
                run = wait_timer(&mut self.timer) => {
                    self.timer = None;
                    self.machine.on_timer(run)
                }
            };
            self.execute(effects);
            self.publish();
        }
        tracing::debug!("playback controller exiting");
        let _ = self.updates.send(PlaybackUpdate::Closed);
    }

    fn on_command(&mut self, cmd: Command) -> Vec<Effect> {
        tracing::debug!(?cmd, phase = ?self.machine.phase(), "controller command");
        match cmd {
            Command::Run { start, end } => self.machine.run(start, end),
            Command::Pause => self.machine.pause(),
            Command::Resume => self.machine.resume(),
            Command::Stop => self.machine.stop(),
            Command::Skip => self.machine.skip(),
            Command::SetSpeed(ms) => self.machine.set_speed(ms),
            Command::Shutdown => Vec::new(),
        }
    }

    fn on_completion(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Day { run, day, result } => self.machine.on_day_fetched(run, day, result),
            Completion::GridState { run, result } => self.machine.on_grid_state(run, result),
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch {
                    run,
                    day,
                    date,
                    cancel,
                } => {
                    let api = self.api.clone();
                    self.spawn_completion(async move {
                        let result = api.fetch_day_simulation(date).await;
                        (!cancel.is_cancelled()).then_some(Completion::Day { run, day, result })
                    });
                }
                Effect::Schedule { run, delay } => {
                    self.timer = Some(PendingTimer {
                        run,
                        sleep: Box::pin(tokio::time::sleep(delay)),
                    });
                }
                Effect::CancelTimer => self.timer = None,
                Effect::RefreshGridState { run, cancel } => {
                    let api = self.api.clone();
                    self.spawn_completion(async move {
                        let result = api.fetch_current_grid_state().await;
                        (!cancel.is_cancelled()).then_some(Completion::GridState { run, result })
                    });
                }
            }
        }
    }

    fn spawn_completion<F>(&self, fut: F)
    where
        F: Future<Output = Option<Completion>> + Send + 'static,
    {
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            match fut.await {
                Some(completion) => {
                    let _ = tx.send(completion);
                }
                None => tracing::debug!("discarding result of a cancelled run"),
            }
        });
    }

    fn publish(&mut self) {
        let revision = self.machine.store().revision();
        if self.published == Some(revision) {
            return;
        }
        self.published = Some(revision);
        if self
            .updates
            .send(PlaybackUpdate::Session(self.machine.store().snapshot()))
            .is_err()
        {
            tracing::debug!("no playback listener attached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackSession, PlaybackStore};
    use async_trait::async_trait;
    use crossbeam_channel::Receiver;
    use gridreplay_core::{SimulationStep, Topology};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeApi {
        days: HashMap<NaiveDate, DaySimulation>,
        latency: Duration,
        calls: Mutex<Vec<NaiveDate>>,
    }

    impl FakeApi {
        fn new(days: &[(&str, usize)], latency: Duration) -> Self {
            let days = days
                .iter()
                .map(|(raw, len)| {
                    let steps = (0..*len)
                        .map(|i| SimulationStep {
                            step: Some(i as u32),
                            hour: i as f64 * 0.25,
                            converged: true,
                            ..SimulationStep::default()
                        })
                        .collect();
                    let sim = DaySimulation {
                        steps,
                        ..DaySimulation::default()
                    };
                    (date(raw), sim)
                })
                .collect();
            Self {
                days,
                latency,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SimulationApi for FakeApi {
        async fn fetch_topology(&self) -> Result<Topology> {
            Ok(Topology::default())
        }

        async fn fetch_day_simulation(&self, date: NaiveDate) -> Result<DaySimulation> {
            self.calls.lock().expect("calls lock").push(date);
            tokio::time::sleep(self.latency).await;
            self.days
                .get(&date)
                .cloned()
                .ok_or_else(|| anyhow!("HTTP 500: no model loaded for {date}"))
        }

        async fn fetch_current_grid_state(&self) -> Result<GridState> {
            Ok(GridState {
                timestamp: 42.0,
                ..GridState::default()
            })
        }
    }

    fn date(raw: &str) -> NaiveDate {
        crate::playback::dates::parse_date(raw).expect("valid date")
    }

    fn start(api: Arc<FakeApi>, speed_ms: u64) -> (ControllerHandle, Receiver<PlaybackUpdate>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let machine = PlaybackMachine::new(PlaybackStore::new(speed_ms), true);
        let (handle, _join) = spawn_controller(api, machine, tx);
        (handle, rx)
    }

    async fn wait_for(
        rx: &Receiver<PlaybackUpdate>,
        pred: impl Fn(&PlaybackSession) -> bool,
    ) -> PlaybackSession {
        for _ in 0..100_000 {
            while let Ok(update) = rx.try_recv() {
                if let PlaybackUpdate::Session(session) = update {
                    if pred(&session) {
                        return session;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("playback never reached the expected state");
    }

    #[tokio::test(start_paused = true)]
    async fn plays_a_two_day_run_to_completion() {
        let api = Arc::new(FakeApi::new(
            &[("2025-08-01", 4), ("2025-08-02", 4)],
            Duration::from_millis(50),
        ));
        let (handle, rx) = start(api.clone(), 10);

        handle
            .run(date("2025-08-01"), date("2025-08-02"))
            .expect("run queued");
        let done = wait_for(&rx, |s| {
            s.grid_state.as_ref().is_some_and(|g| g.timestamp == 42.0)
        })
        .await;

        assert!(!done.playing);
        assert_eq!(done.day_index, 1);
        assert_eq!(done.visible_steps.len(), 4);
        assert_eq!(done.day_summaries.len(), 2);
        assert_eq!(
            *api.calls.lock().expect("calls lock"),
            vec![date("2025-08-01"), date("2025-08-02")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_fetch_produces_no_further_updates() {
        let api = Arc::new(FakeApi::new(&[("2025-08-01", 96)], Duration::from_secs(1)));
        let (handle, rx) = start(api.clone(), 10);

        handle
            .run(date("2025-08-01"), date("2025-08-01"))
            .expect("run queued");
        wait_for(&rx, |s| s.fetching).await;
        handle.stop().expect("stop queued");
        let stopped = wait_for(&rx, |s| !s.playing && s.current_date.is_none()).await;

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
        assert!(stopped.visible_steps.is_empty());
        assert_eq!(api.calls.lock().expect("calls lock").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_reaches_the_session() {
        let api = Arc::new(FakeApi::new(&[], Duration::from_millis(10)));
        let (handle, rx) = start(api, 10);

        handle
            .run(date("2025-08-01"), date("2025-08-03"))
            .expect("run queued");
        let failed = wait_for(&rx, |s| s.error.is_some()).await;

        assert!(!failed.playing);
        let error = failed.error.unwrap_or_default();
        assert!(error.contains("no model loaded for 2025-08-01"));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_position_until_resume() {
        let api = Arc::new(FakeApi::new(&[("2025-08-01", 50)], Duration::from_millis(10)));
        let (handle, rx) = start(api, 20);

        handle
            .run(date("2025-08-01"), date("2025-08-01"))
            .expect("run queued");
        wait_for(&rx, |s| s.step_index >= 3).await;
        handle.pause().expect("pause queued");
        let paused = wait_for(&rx, |s| s.paused).await;
        let k = paused.step_index;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        handle.resume().expect("resume queued");
        let resumed = wait_for(&rx, |s| s.step_index == k + 1).await;

        let ids: Vec<Option<u32>> = resumed.visible_steps.iter().map(|s| s.step).collect();
        let expected: Vec<Option<u32>> = (0..=k as u32).map(Some).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_errors_once_the_task_is_gone() {
        let api = Arc::new(FakeApi::new(&[], Duration::ZERO));
        let (tx, rx) = crossbeam_channel::unbounded();
        let machine = PlaybackMachine::new(PlaybackStore::default(), false);
        let (handle, join) = spawn_controller(api, machine, tx);

        handle.shutdown().expect("shutdown queued");
        join.await.expect("controller task joins");

        assert!(handle.pause().is_err());
        let closed = rx.try_iter().any(|u| matches!(u, PlaybackUpdate::Closed));
        assert!(closed);
    }
}
