use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver};
use tracing::error;

use crate::commands::CommandRegistry;
use crate::types::{OverlayConfig, OverlayEvent};
use crate::window;

/// Flags shared between the render thread and every caller thread.
///
/// Plain atomics, no transactional guarantee: a stale read of `visible` or
/// `running` only delays a cosmetic state change by at most one frame, which
/// is acceptable for this harness.
pub(crate) struct SessionState {
    running: AtomicBool,
    visible: AtomicBool,
    shutdown: AtomicBool,
    frames: AtomicU64,
}

impl SessionState {
    pub(crate) fn new(start_visible: bool) -> Self {
        Self {
            running: AtomicBool::new(false),
            visible: AtomicBool::new(start_visible),
            shutdown: AtomicBool::new(false),
            frames: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    /// Flips the visibility flag and returns the new value.
    pub(crate) fn toggle_visibility(&self) -> bool {
        !self.visible.fetch_xor(true, Ordering::AcqRel)
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub(crate) fn bump_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owning handle for the overlay render thread.
///
/// Construction spawns the thread; [`shutdown`] (or `Drop`) stops it. There
/// is no hidden global: embedders hold the handle and hand clones of their
/// state into the registered callbacks. Callbacks must own or share (`Arc`)
/// everything they touch; capturing references to stack locals is not
/// expressible through this API and that is intentional.
///
/// Registration is fire-and-forget: no call here blocks beyond a short-held
/// registry lock, and no error is reported back. The only failure signal an
/// embedder can observe is [`is_running`] staying false after a spawn.
///
/// [`shutdown`]: OverlayRuntime::shutdown
/// [`is_running`]: OverlayRuntime::is_running
pub struct OverlayRuntime {
    registry: Arc<CommandRegistry>,
    session: Arc<SessionState>,
    events: Receiver<OverlayEvent>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl OverlayRuntime {
    /// Spawns the render thread and returns immediately.
    ///
    /// The thread performs window and GPU initialization on its own; this
    /// call does not wait for that to finish. If initialization fails the
    /// thread logs the error and exits without ever setting the running
    /// flag, and [`shutdown`](OverlayRuntime::shutdown) surfaces the error.
    pub fn spawn(config: OverlayConfig) -> Result<Self> {
        let registry = Arc::new(CommandRegistry::new());
        let session = Arc::new(SessionState::new(config.start_visible));
        let (event_tx, event_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("glint-overlay".into())
            .spawn({
                let registry = registry.clone();
                let session = session.clone();
                move || log_thread_exit(window::run_render_thread(config, registry, session, event_tx))
            })
            .map_err(|err| anyhow!("failed to spawn overlay thread: {err}"))?;

        Ok(Self {
            registry,
            session,
            events: event_rx,
            join_handle: Some(handle),
        })
    }

    /// Registers (or replaces) a free-drawing command under `id`.
    ///
    /// The callback runs once per frame while the visibility flag is set and
    /// may open any window scopes it likes against the supplied context.
    pub fn invoke(&self, id: impl Into<String>, draw: impl Fn(&egui::Context) + Send + Sync + 'static) {
        self.registry.insert_raw(id, draw);
    }

    /// Registers (or replaces) a command drawn inside a window scope named
    /// after `id`. The window's open/closed state persists per id across
    /// frames and across replacement.
    pub fn begin(&self, id: impl Into<String>, draw: impl Fn(&mut egui::Ui) + Send + Sync + 'static) {
        self.registry.insert_windowed(id, draw);
    }

    /// Removes the command registered under `id`, if any.
    pub fn remove(&self, id: &str) {
        self.registry.remove(id);
    }

    /// Flips whether registered commands execute; returns the new value.
    /// The visibility gate itself renders regardless.
    pub fn toggle_visibility(&self) -> bool {
        self.session.toggle_visibility()
    }

    /// Whether the render loop is currently active. False both before the
    /// window finishes initializing and after any shutdown path.
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Frames presented so far. Diagnostic only.
    pub fn frame_count(&self) -> u64 {
        self.session.frame_count()
    }

    /// Drains pending overlay notifications without blocking.
    pub fn try_events(&self) -> Vec<OverlayEvent> {
        self.events.try_iter().collect()
    }

    /// Requests shutdown, wakes the frame wait, and joins the render thread.
    ///
    /// Blocks until the thread has terminated. Idempotent: a second call
    /// returns `Ok(())` immediately.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.join_handle.take() else {
            return Ok(());
        };
        self.session.request_shutdown();
        self.registry.notify();
        match handle.join() {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("overlay thread panicked: {panic:?}")),
        }
    }
}

/// Terminal logging for the render thread. An embedder that only polls
/// `is_running`, or drops the handle without calling `shutdown`, still gets
/// a diagnostic when initialization or the frame loop fails; `shutdown`
/// additionally surfaces the same error as its return value.
fn log_thread_exit(result: Result<()>) -> Result<()> {
    if let Err(err) = &result {
        error!(error = %err, "overlay render thread failed");
    }
    result
}

impl Drop for OverlayRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            self.session.request_shutdown();
            self.registry.notify();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
impl OverlayRuntime {
    /// Builds a runtime around an arbitrary thread body so channel and
    /// shutdown behaviour can be tested without a display.
    fn with_render_body(
        body: impl FnOnce(Arc<SessionState>, crossbeam_channel::Sender<OverlayEvent>) -> Result<()>
            + Send
            + 'static,
    ) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        let session = Arc::new(SessionState::new(false));
        let (event_tx, event_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("glint-overlay".into())
            .spawn({
                let session = session.clone();
                move || body(session, event_tx)
            })
            .expect("failed to spawn test render thread");
        Self {
            registry,
            session,
            events: event_rx,
            join_handle: Some(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[test]
    fn visibility_flag_toggles() {
        let session = SessionState::new(false);
        assert!(!session.is_visible());
        assert!(session.toggle_visibility());
        assert!(session.is_visible());
        assert!(!session.toggle_visibility());
        assert!(!session.is_visible());
    }

    #[test]
    fn start_visible_is_honoured() {
        let session = SessionState::new(true);
        assert!(session.is_visible());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let config = OverlayConfig {
            show_window: false,
            ..OverlayConfig::default()
        };
        let mut runtime = OverlayRuntime::spawn(config).expect("spawn should not fail");

        // Whether window init succeeded (desktop session) or failed
        // (headless CI), the first shutdown joins the thread...
        let _ = runtime.shutdown();
        // ...and the second is a no-op that must not block or error.
        assert!(runtime.shutdown().is_ok());
        assert!(!runtime.is_running());
    }

    #[test]
    fn events_sent_before_thread_exit_survive_shutdown() {
        let mut runtime = OverlayRuntime::with_render_body(|session, events| {
            session.set_running(true);
            events
                .send(OverlayEvent::GateClosed)
                .map_err(|err| anyhow!("event receiver gone: {err}"))?;
            session.set_running(false);
            Ok(())
        });

        // The thread has exited by the time join returns; its final events
        // must still be waiting in the channel.
        runtime.shutdown().expect("thread exits cleanly");
        assert!(!runtime.is_running());
        assert_eq!(runtime.try_events(), vec![OverlayEvent::GateClosed]);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).expect("log output is utf-8")
        }
    }

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn render_thread_failure_is_logged() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            log_thread_exit(Err(anyhow!("no compatible display")))
        });

        // The error is both surfaced to the caller and written to the log.
        assert!(result.is_err());
        let output = log.contents();
        assert!(output.contains("overlay render thread failed"));
        assert!(output.contains("no compatible display"));
    }
}
