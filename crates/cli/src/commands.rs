//! Subcommand implementations.

use color_eyre::eyre::{eyre, Result, WrapErr};
use colored::Colorize;
use mk_core::client::HelperClient;
use mk_core::config::loader::load_config;
use mk_core::config::models::AppConfig;
use mk_core::config::resolve::resolve_helper_command;
use mk_core::engine::PlaybackEngine;
use mk_core::helper::HelperServer;
use mk_core::platform::create_desktop;
use mk_core::scenario::{InMemoryStore, ScenarioStore};
use mk_core::session::driver::RecorderControl;
use mk_core::session::Recorder;
use mk_protocol::playback_models::{PlaybackEvent, PlaybackOutcome};
use mk_protocol::scenario_models::Scenario;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Exit code for a playback that stopped on a pixel wait.
const EXIT_WAIT_TIMED_OUT: u8 = 2;

pub async fn helper(root: &Path, no_native: bool) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let server = HelperServer::new(create_desktop(no_native), config.global.helper);
    server.serve_stdio().await.map_err(|e| eyre!(e))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn permissions(root: &Path, in_process: bool) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let client = connect(&config, in_process)?;
    let permissions = client.check_permissions().await?;
    client.shutdown().await?;

    let show = |granted: bool| {
        if granted {
            "granted".green()
        } else {
            "missing".red()
        }
    };
    println!("{:<16}{}", "accessibility", show(permissions.accessibility));
    println!("{:<16}{}", "screen capture", show(permissions.screen_capture));
    if let Some(note) = &permissions.note {
        println!("{}", note.dimmed());
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn list(root: &Path) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let store = InMemoryStore::with_scenarios(config.scenarios);
    let scenarios = store.list().await;

    if scenarios.is_empty() {
        println!("{}", "No scenarios found".dimmed());
        return Ok(ExitCode::SUCCESS);
    }
    for scenario in scenarios {
        println!(
            "{}  {}  {} steps  last used {}",
            scenario.id.to_string().dimmed(),
            scenario.name.bold(),
            scenario.steps.len(),
            scenario
                .last_used_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn play(
    root: &Path,
    in_process: bool,
    key: &str,
    timeout_ms: Option<u64>,
) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let scenario_id = find_scenario(&config.scenarios, key)
        .map(|s| s.id)
        .ok_or_else(|| eyre!("No scenario named or with id '{key}'"))?;

    let client = connect(&config, in_process)?;
    let store: Arc<dyn ScenarioStore> = Arc::new(InMemoryStore::with_scenarios(config.scenarios));
    let mut engine = PlaybackEngine::new(client.clone(), store);
    if let Some(timeout_ms) = timeout_ms {
        engine = engine.with_wait_timeout(timeout_ms);
    }

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_playback_event(&event);
        }
    });

    let result = engine.run(scenario_id, events_tx).await;
    let _ = printer.await;
    client.shutdown().await?;

    match result? {
        PlaybackOutcome::Completed => Ok(ExitCode::SUCCESS),
        PlaybackOutcome::WaitTimedOut { .. } => Ok(ExitCode::from(EXIT_WAIT_TIMED_OUT)),
    }
}

pub async fn record(
    root: &Path,
    in_process: bool,
    name: &str,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let store: Arc<dyn ScenarioStore> = Arc::new(InMemoryStore::with_scenarios(
        config.scenarios.iter().cloned(),
    ));
    let scenario = store.create(name).await;

    let client = connect(&config, in_process)?;
    let mut events = client
        .events()
        .ok_or_else(|| eyre!("Helper events already taken"))?;

    let (controls_tx, controls_rx) = mpsc::channel(16);
    spawn_stop_on_ctrl_c(controls_tx.clone());
    spawn_stdin_controls(controls_tx, config.scenarios);

    eprintln!(
        "{} {} (close the overlay or press Ctrl-C to stop)",
        "Recording".green().bold(),
        name.bold()
    );
    let mut recorder = Recorder::new(client.clone(), store, config.global.recorder);
    let recorded = recorder
        .record(scenario.id, &mut events, controls_rx)
        .await?;
    client.shutdown().await?;

    let json = serde_json::to_string_pretty(&recorded)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} steps to {}",
                "Saved".green().bold(),
                recorded.steps.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn connect(config: &AppConfig, in_process: bool) -> Result<Arc<HelperClient>> {
    if in_process {
        let server = HelperServer::new(create_desktop(false), config.global.helper);
        let (client, _server_task) = HelperClient::in_process(server);
        return Ok(Arc::new(client));
    }

    let command = resolve_helper_command(&config.global).map_err(|e| eyre!(e))?;
    info!(program = %command.program.display(), "Starting helper");
    Ok(Arc::new(HelperClient::spawn(&command)?))
}

/// Look a scenario up by id, then by exact name.
fn find_scenario<'a>(scenarios: &'a [Scenario], key: &str) -> Option<&'a Scenario> {
    if let Ok(id) = Uuid::parse_str(key) {
        return scenarios.iter().find(|s| s.id == id);
    }
    scenarios.iter().find(|s| s.name == key)
}

fn spawn_stop_on_ctrl_c(controls: mpsc::Sender<RecorderControl>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = controls.send(RecorderControl::Stop).await;
        }
    });
}

// A plain thread: a tokio stdin read cannot be cancelled and would hold
// the runtime open after recording ends.
fn spawn_stdin_controls(controls: mpsc::Sender<RecorderControl>, scenarios: Vec<Scenario>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_control(&line, &scenarios) {
                Ok(Some(control)) => {
                    if controls.blocking_send(control).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("{e}"),
            }
        }
    });
}

/// Parse one line typed during a recording.
fn parse_control(line: &str, scenarios: &[Scenario]) -> Result<Option<RecorderControl>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest = words.collect::<Vec<_>>().join(" ");

    let control = match verb {
        "stop" => RecorderControl::Stop,
        "delay" => {
            let ms = rest
                .parse()
                .wrap_err_with(|| format!("Invalid delay '{rest}', expected milliseconds"))?;
            RecorderControl::Delay(ms)
        }
        "ref" => {
            let target = find_scenario(scenarios, &rest)
                .ok_or_else(|| eyre!("No scenario named or with id '{rest}'"))?;
            RecorderControl::ScenarioRef(target.id)
        }
        other => return Err(eyre!("Unknown command '{other}', expected delay, ref or stop")),
    };
    Ok(Some(control))
}

fn print_playback_event(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::Started { name, depth, .. } => {
            println!("{}{} {}", "  ".repeat(*depth), "▶".cyan(), name.bold());
        }
        PlaybackEvent::StepStarted { index, step, .. } => {
            println!("  {} {}", format!("[{index}]").dimmed(), step.kind());
        }
        PlaybackEvent::StepCompleted { .. } => {}
        PlaybackEvent::WaitTimedOut {
            index, elapsed_ms, ..
        } => {
            println!(
                "{} step {index} not matched after {elapsed_ms} ms",
                "⏱ Wait timed out:".yellow().bold()
            );
        }
        PlaybackEvent::Finished { outcome, .. } => {
            if outcome.is_completed() {
                println!("{}", "✓ Completed".green().bold());
            }
        }
        PlaybackEvent::Failed { error, .. } => {
            println!("{} {error}", "✗ Failed:".red().bold());
        }
    }
}
