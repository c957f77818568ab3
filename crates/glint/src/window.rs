use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoopBuilder;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowBuilder;

use crate::commands::CommandRegistry;
use crate::frame;
use crate::gate::VisibilityGate;
use crate::gpu::GpuState;
use crate::runtime::SessionState;
use crate::types::{OverlayConfig, OverlayEvent};

/// Render thread entry point: window/GPU/toolkit initialization followed by
/// the self-paced frame loop.
///
/// The loop's cadence comes from the registry's bounded wait (so an idle
/// registry still yields a frame every `frame_wait`), not from the platform
/// event loop; events are pumped with a zero timeout once per frame. Any
/// initialization failure is logged and returned without the running flag
/// ever being set, so callers observe it as `is_running()` staying false.
pub(crate) fn run_render_thread(
    config: OverlayConfig,
    registry: Arc<CommandRegistry>,
    session: Arc<SessionState>,
    events: Sender<OverlayEvent>,
) -> Result<()> {
    let mut builder = EventLoopBuilder::new();
    #[cfg(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }
    #[cfg(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        EventLoopBuilderExtWindows::with_any_thread(&mut builder, true);
    }
    let mut event_loop = builder
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(window_size)
        .with_visible(config.show_window)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create overlay window: {err}"))?;
    let window = Arc::new(window);

    let mut gpu = GpuState::new(window.clone(), config.clear_color)
        .context("failed to initialise overlay GPU state")?;

    let ctx = egui::Context::default();
    if let Some(font) = config.font.as_deref() {
        install_font(&ctx, font);
    }
    let mut egui_state = egui_winit::State::new(
        ctx.clone(),
        egui::ViewportId::ROOT,
        window.as_ref(),
        Some(window.scale_factor() as f32),
        None,
    );
    let mut gate = VisibilityGate::new(config.gate_image.clone());

    session.set_running(true);
    info!(
        title = %config.title,
        width = window_size.width,
        height = window_size.height,
        "overlay render thread running"
    );

    let mut close_requested = false;
    while session.is_running() && !session.shutdown_requested() && !close_requested {
        // Frame pacing: wait for a registry change or shutdown, bounded so
        // input and animations keep flowing with an idle registry.
        let snapshot = registry.wait_and_snapshot(config.frame_wait, || {
            session.shutdown_requested()
        });

        let status = event_loop.pump_events(Some(Duration::ZERO), |event, _elwt| {
            if let Event::WindowEvent { window_id, event } = event {
                if window_id != window.id() {
                    return;
                }
                match &event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        close_requested = true;
                    }
                    WindowEvent::Resized(new_size) => {
                        gpu.resize(*new_size);
                    }
                    _ => {}
                }
                let _ = egui_state.on_window_event(&window, &event);
            }
        });
        if let PumpStatus::Exit(code) = status {
            info!(code, "platform requested event loop exit");
            close_requested = true;
        }
        if close_requested || session.shutdown_requested() {
            break;
        }

        // The UI pass runs inside a panic fence; a panicking command
        // callback has already cleared the running flag when it yields None.
        let raw_input = egui_state.take_egui_input(&window);
        let Some((outcome, full_output)) =
            frame::compose_guarded(&ctx, raw_input, &registry, &snapshot, &session, &mut gate)
        else {
            break;
        };
        egui_state.handle_platform_output(&window, full_output.platform_output);
        let primitives = ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        match gpu.paint(
            &primitives,
            &full_output.textures_delta,
            full_output.pixels_per_point,
        ) {
            Ok(()) => {
                if let Some(visible) = outcome.visibility {
                    info!(visible, "visibility toggled via gate");
                    let _ = events.send(OverlayEvent::VisibilityToggled(visible));
                }
                if outcome.gate_closed {
                    info!("gate closed; shutting the overlay down");
                    let _ = events.send(OverlayEvent::GateClosed);
                }
                session.bump_frame();
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; shutting the overlay down");
                break;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
            }
        }
    }

    session.set_running(false);
    info!(
        frames = session.frame_count(),
        "overlay render thread terminated"
    );
    Ok(())
}

/// Installs a caller-supplied font over the toolkit defaults. Failure to
/// read the file keeps the defaults and the loop running.
fn install_font(ctx: &egui::Context, path: &Path) {
    match fs::read(path) {
        Ok(bytes) => {
            let mut fonts = egui::FontDefinitions::default();
            fonts
                .font_data
                .insert("overlay".to_owned(), egui::FontData::from_owned(bytes));
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                if let Some(stack) = fonts.families.get_mut(&family) {
                    stack.insert(0, "overlay".to_owned());
                }
            }
            ctx.set_fonts(fonts);
            info!(path = %path.display(), "installed overlay font");
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read overlay font; keeping toolkit defaults"
            );
        }
    }
}
