use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration passed to the overlay runtime at start-up.
///
/// `OverlayConfig` mirrors the asset paths and window constants consumed when
/// the render thread boots. There is no file format behind it; embedders fill
/// in the fields (or a CLI does) and hand it to [`crate::OverlayRuntime::spawn`].
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    /// Host window title.
    pub title: String,
    /// Host window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Image decoded once for the visibility-gate button.
    pub gate_image: PathBuf,
    /// Optional TTF/OTF font installed over the toolkit defaults.
    pub font: Option<PathBuf>,
    /// Whether registered commands draw before the gate is first clicked.
    pub start_visible: bool,
    /// Whether the host window is shown at all (useful for tests and tools).
    pub show_window: bool,
    /// Upper bound on the per-frame wait for registry changes. Keeps a frame
    /// rate floor even when no commands are being registered.
    pub frame_wait: Duration,
    /// Framebuffer clear color (linear RGBA).
    pub clear_color: [f64; 4],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            title: "Glint Overlay".to_string(),
            surface_size: (800, 600),
            gate_image: PathBuf::from("gate.png"),
            font: None,
            start_visible: false,
            show_window: true,
            frame_wait: Duration::from_millis(16),
            clear_color: [0.45, 0.55, 0.60, 1.0],
        }
    }
}

/// Notifications emitted by the render thread, drained via
/// [`crate::OverlayRuntime::try_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    /// The gate button was clicked; carries the new visibility value.
    VisibilityToggled(bool),
    /// The gate window's close affordance was used. The render loop treats
    /// this as a quit request and shuts down.
    GateClosed,
}
