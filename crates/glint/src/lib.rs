//! Glint runs an egui overlay on a dedicated background thread and exposes a
//! thread-safe command registry so any thread can contribute named UI-drawing
//! callbacks without ever touching the windowing or GPU APIs directly.
//!
//! The overall flow is:
//!
//! ```text
//!   caller threads                      render thread
//!   ──────────────                      ─────────────
//!   invoke / begin / remove ──▶ CommandRegistry ──▶ per-frame snapshot
//!   toggle_visibility ────────▶ SessionState ─────▶ gate + command pass
//!   shutdown ─────────────────▶ wake + join ◀───── frame loop (winit/wgpu)
//! ```
//!
//! [`OverlayRuntime::spawn`] starts the thread; each frame it drains the
//! current command set, executes every callback while the visibility flag is
//! set, draws the always-on visibility gate, and presents through `wgpu`.
//! Closing the gate window shuts the whole loop down.
//!
//! ```no_run
//! use glint::{OverlayConfig, OverlayRuntime};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut overlay = OverlayRuntime::spawn(OverlayConfig::default())?;
//! overlay.begin("Status", |ui| {
//!     ui.label("hello from another thread");
//! });
//! // ... later ...
//! overlay.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod commands;
mod frame;
mod gate;
mod gpu;
mod runtime;
mod types;
mod window;

pub use runtime::OverlayRuntime;
pub use types::{OverlayConfig, OverlayEvent};

// Re-exported so embedders write callbacks against the same toolkit version.
pub use egui;
