//! Per-frame UI composition, kept free of any window or GPU handles so the
//! registry semantics can be exercised headless against a bare
//! [`egui::Context`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::commands::{Command, CommandRegistry};
use crate::gate::VisibilityGate;
use crate::runtime::SessionState;

/// State transitions a frame produced, for the render loop to report.
#[derive(Default)]
pub(crate) struct FrameOutcome {
    /// Set when the gate button flipped the visibility flag this frame;
    /// carries the new value.
    pub(crate) visibility: Option<bool>,
    /// Set when the gate window was closed; the running flag has already
    /// been cleared by the time the caller sees this.
    pub(crate) gate_closed: bool,
}

/// Executes one frame's worth of UI: the command snapshot (only while the
/// visibility flag is set), then the always-on gate, then the gate-to-running
/// coupling that turns a gate close into a shutdown request.
pub(crate) fn compose(
    ctx: &egui::Context,
    registry: &CommandRegistry,
    snapshot: &[(String, Command)],
    session: &SessionState,
    gate: &mut VisibilityGate,
) -> FrameOutcome {
    if session.is_visible() {
        run_commands(ctx, registry, snapshot);
    }

    let response = gate.show(ctx);

    let mut outcome = FrameOutcome::default();
    if response.toggled {
        outcome.visibility = Some(session.toggle_visibility());
    }
    if !response.open {
        session.set_running(false);
        outcome.gate_closed = true;
    }
    outcome
}

/// Runs one UI pass inside a panic fence. A panicking command callback must
/// not unwind the render thread: it is logged, the running flag is cleared,
/// and `None` tells the loop to stop instead of presenting.
pub(crate) fn compose_guarded(
    ctx: &egui::Context,
    raw_input: egui::RawInput,
    registry: &CommandRegistry,
    snapshot: &[(String, Command)],
    session: &SessionState,
    gate: &mut VisibilityGate,
) -> Option<(FrameOutcome, egui::FullOutput)> {
    let fenced = catch_unwind(AssertUnwindSafe(|| {
        let mut outcome = FrameOutcome::default();
        let output = ctx.run(raw_input, |ctx| {
            outcome = compose(ctx, registry, snapshot, session, gate);
        });
        (outcome, output)
    }));
    match fenced {
        Ok(pair) => Some(pair),
        Err(_panic) => {
            error!("panic while executing overlay commands; shutting the overlay down");
            session.set_running(false);
            None
        }
    }
}

/// Runs every callback in the snapshot. Windowed commands draw inside a
/// window scope named after their id; the open flag the user may have
/// flipped via the close button is written back to the registry afterwards.
fn run_commands(ctx: &egui::Context, registry: &CommandRegistry, snapshot: &[(String, Command)]) {
    for (id, command) in snapshot {
        match command {
            Command::Raw(draw) => draw(ctx),
            Command::Windowed { draw, open } => {
                let mut open_now = *open;
                egui::Window::new(id.as_str())
                    .open(&mut open_now)
                    .show(ctx, |ui| draw(ui));
                if open_now != *open {
                    registry.set_open(id, open_now);
                }
            }
        }
    }
}
