mod app;
mod graph;
mod net;
mod playback;
mod ui;
mod util;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;

use crate::app::ReplayApp;
use crate::graph::{build_view, layout, GraphState};
use crate::net::{FixtureSimulationApi, HttpSimulationApi, SimulationApi};
use crate::playback::machine::PlaybackMachine;
use crate::playback::{spawn_controller, PlaybackStore};
use crate::util::args::Cli;
use crate::util::config::{self, ReplayConfig};

// Logs go to stderr; stdout belongs to the HUD and --layout-only output.
fn init_tracing(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<ReplayConfig> {
    let path = cli.config.clone().or_else(config::config_file_path);
    let mut cfg = path
        .as_deref()
        .map(config::load_or_default_from_path)
        .unwrap_or_default();
    cli.apply_overrides(&mut cfg);
    if cli.save_config {
        let path = path.context("no config directory available")?;
        config::save_to_path(&cfg, &path)?;
        tracing::info!(path = %path.display(), "saved config");
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);
    let cfg = load_config(&cli)?;

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let api: Arc<dyn SimulationApi> = match &cli.fixtures {
        Some(dir) => Arc::new(FixtureSimulationApi::new(dir)),
        None => Arc::new(HttpSimulationApi::new(
            &cfg.api_base_url,
            cfg.request_timeout(),
        )),
    };

    let topology = rt
        .block_on(api.fetch_topology())
        .context("failed to load grid topology")?;

    if cli.layout_only {
        let positions = layout(&topology, &cfg.radial_options());
        let view = build_view(&topology, None, &positions, &cfg.thresholds());
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    let mut graph = GraphState::new(cfg.radial_options(), cfg.thresholds());
    graph.load_topology(topology, None);
    let Some((start, end)) = cli.date_span()? else {
        bail!("nothing to replay: pass --start (or --layout-only)");
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let machine = PlaybackMachine::new(
        PlaybackStore::new(cfg.speed_ms),
        cfg.refresh_grid_state_on_finish,
    );
    let (handle, join) = {
        let _guard = rt.enter();
        spawn_controller(api.clone(), machine, tx)
    };
    handle.run(start, end)?;

    let keys = if cli.no_stdin {
        crossbeam_channel::never()
    } else {
        app::spawn_stdin_reader()
    };
    let mut app = ReplayApp::new(
        graph,
        handle,
        rx,
        api,
        rt.handle().clone(),
        cfg.refresh_grid_state_on_finish,
    );
    app.run(keys, &mut std::io::stdout().lock())?;
    rt.block_on(join).context("playback controller panicked")?;

    if let Some(err) = &app.session.error {
        bail!("playback failed: {err}");
    }
    Ok(())
}
