use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use glint::egui;
use glint::{OverlayConfig, OverlayRuntime};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const START_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let config = OverlayConfig {
        title: args.title,
        surface_size: args.size,
        gate_image: args.gate_image,
        font: args.font,
        start_visible: args.visible,
        ..OverlayConfig::default()
    };
    let mut overlay = OverlayRuntime::spawn(config).context("failed to start overlay runtime")?;

    // Background worker bumping a shared counter twice a second, stoppable
    // from a button inside the overlay.
    let counter = Arc::new(AtomicI32::new(0));
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let worker = thread::Builder::new()
        .name("demo-worker".into())
        .spawn({
            let counter = counter.clone();
            move || loop {
                match stop_rx.recv_timeout(Duration::from_millis(500)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
        .map_err(|err| anyhow!("failed to spawn demo worker: {err}"))?;

    // Window 1 reads the shared counter.
    overlay.begin("Window 1", {
        let counter = counter.clone();
        move |ui| {
            ui.label(format!("Counter: {}", counter.load(Ordering::Relaxed)));
        }
    });

    // Window 2 owns a per-window counter and can bump the shared one.
    overlay.begin("Window 2", {
        let global = counter.clone();
        let local = Arc::new(AtomicI32::new(0));
        move |ui| {
            local.fetch_add(1, Ordering::Relaxed);
            if ui.button("Increment global counter").clicked() {
                global.fetch_add(1, Ordering::Relaxed);
            }
            ui.label(format!("Local counter: {}", local.load(Ordering::Relaxed)));
        }
    });

    // A raw command drawing its own window with the worker stop button.
    overlay.invoke("Command 1", {
        let stop_tx = stop_tx.clone();
        move |ctx| {
            egui::Window::new("Command 1").show(ctx, |ui| {
                if ui.button("Stop worker thread").clicked() {
                    let _ = stop_tx.try_send(());
                }
            });
        }
    });

    // The render thread initialises on its own; give it a bounded grace
    // period before concluding the environment cannot host a window.
    let deadline = Instant::now() + START_TIMEOUT;
    while !overlay.is_running() {
        if Instant::now() >= deadline {
            overlay.shutdown().context("overlay failed to initialise")?;
            anyhow::bail!("overlay did not reach the running state");
        }
        thread::sleep(Duration::from_millis(10));
    }
    tracing::info!("overlay running; close the gate window to quit");

    while overlay.is_running() {
        for event in overlay.try_events() {
            tracing::info!(?event, "overlay event");
        }
        thread::sleep(Duration::from_millis(16));
    }

    overlay.shutdown()?;
    // The render thread has joined, so its final notifications (typically
    // the gate close that ended the loop) are all buffered by now.
    for event in overlay.try_events() {
        tracing::info!(?event, "overlay event");
    }
    let _ = stop_tx.send(());
    worker
        .join()
        .map_err(|err| anyhow!("demo worker panicked: {err:?}"))?;

    tracing::info!(
        counter = counter.load(Ordering::Relaxed),
        "demo shut down cleanly"
    );
    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
