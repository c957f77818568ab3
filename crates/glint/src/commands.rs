use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Draw callback that paints freely against the toolkit context.
pub(crate) type RawDraw = Arc<dyn Fn(&egui::Context) + Send + Sync>;

/// Draw callback that paints inside a managed window scope.
pub(crate) type WindowDraw = Arc<dyn Fn(&mut egui::Ui) + Send + Sync>;

/// A named, replaceable draw callback executed once per frame.
///
/// Windowed commands carry their window's open flag as explicit per-id state:
/// replacing the callback under the same id preserves it, so a window the
/// user closed stays closed across re-registration.
#[derive(Clone)]
pub(crate) enum Command {
    Raw(RawDraw),
    Windowed { draw: WindowDraw, open: bool },
}

#[derive(Default)]
struct RegistryInner {
    commands: HashMap<String, Command>,
    dirty: bool,
}

/// Thread-safe mapping from command ids to draw callbacks.
///
/// A single mutex protects the map; registration and removal are short
/// upserts under the lock. The render thread calls [`wait_and_snapshot`]
/// once per frame: a bounded condition-variable wait (the frame-pacing
/// floor) followed by a full copy of the mapping, so callbacks always run
/// outside the lock and may themselves register or remove commands.
///
/// [`wait_and_snapshot`]: CommandRegistry::wait_and_snapshot
pub(crate) struct CommandRegistry {
    inner: Mutex<RegistryInner>,
    changed: Condvar,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            changed: Condvar::new(),
        }
    }

    /// A poisoned lock only means some caller panicked mid-registration; the
    /// map itself is always in a consistent state, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts a free-drawing command. Last write wins.
    pub(crate) fn insert_raw(
        &self,
        id: impl Into<String>,
        draw: impl Fn(&egui::Context) + Send + Sync + 'static,
    ) {
        let mut inner = self.lock();
        inner.commands.insert(id.into(), Command::Raw(Arc::new(draw)));
        inner.dirty = true;
        drop(inner);
        self.changed.notify_one();
    }

    /// Upserts a windowed command, preserving the existing open flag when the
    /// id was already registered as windowed.
    pub(crate) fn insert_windowed(
        &self,
        id: impl Into<String>,
        draw: impl Fn(&mut egui::Ui) + Send + Sync + 'static,
    ) {
        let id = id.into();
        let mut inner = self.lock();
        let open = match inner.commands.get(&id) {
            Some(Command::Windowed { open, .. }) => *open,
            _ => true,
        };
        inner.commands.insert(
            id,
            Command::Windowed {
                draw: Arc::new(draw),
                open,
            },
        );
        inner.dirty = true;
        drop(inner);
        self.changed.notify_one();
    }

    /// Erases a command if present; silently does nothing otherwise.
    pub(crate) fn remove(&self, id: &str) {
        let mut inner = self.lock();
        if inner.commands.remove(id).is_some() {
            inner.dirty = true;
            drop(inner);
            self.changed.notify_one();
        }
    }

    /// Writes back a windowed command's open flag after a frame. Render
    /// thread only; deliberately does not wake the frame wait.
    pub(crate) fn set_open(&self, id: &str, open: bool) {
        let mut inner = self.lock();
        if let Some(Command::Windowed { open: stored, .. }) = inner.commands.get_mut(id) {
            *stored = open;
        }
    }

    /// Wakes the frame wait without marking the mapping dirty. Used by the
    /// runtime to deliver a shutdown request promptly.
    pub(crate) fn notify(&self) {
        self.changed.notify_all();
    }

    /// Waits up to `timeout` for a registry change (or until `wake` reports
    /// true, e.g. shutdown), then returns a snapshot copy of the mapping.
    ///
    /// Iteration order of the snapshot is unspecified. Callbacks are `Arc`s,
    /// so the copy is cheap and the lock is released before any of them run.
    pub(crate) fn wait_and_snapshot(
        &self,
        timeout: Duration,
        wake: impl Fn() -> bool,
    ) -> Vec<(String, Command)> {
        let mut inner = self.lock();
        if !inner.dirty && !wake() {
            let (guard, _timed_out) = self
                .changed
                .wait_timeout_while(inner, timeout, |state| !state.dirty && !wake())
                .unwrap_or_else(PoisonError::into_inner);
            inner = guard;
        }
        inner.dirty = false;
        inner
            .commands
            .iter()
            .map(|(id, command)| (id.clone(), command.clone()))
            .collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    fn snapshot(registry: &CommandRegistry) -> Vec<(String, Command)> {
        registry.wait_and_snapshot(Duration::ZERO, || false)
    }

    fn run_raw(command: &Command, ctx: &egui::Context) {
        match command {
            Command::Raw(draw) => draw(ctx),
            Command::Windowed { .. } => panic!("expected a raw command"),
        }
    }

    #[test]
    fn last_registration_wins() {
        let registry = CommandRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = hits.clone();
        registry.insert_raw("counter", move |_ctx| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = hits.clone();
        registry.insert_raw("counter", move |_ctx| {
            second.fetch_add(10, Ordering::SeqCst);
        });

        let snapshot = snapshot(&registry);
        assert_eq!(snapshot.len(), 1);
        run_raw(&snapshot[0].1, &egui::Context::default());
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn removal_is_visible_in_the_next_snapshot() {
        let registry = CommandRegistry::new();
        registry.insert_raw("a", |_ctx| {});
        registry.insert_raw("b", |_ctx| {});
        assert_eq!(snapshot(&registry).len(), 2);

        registry.remove("a");
        let remaining = snapshot(&registry);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, "b");

        // Removing an absent id is a no-op.
        registry.remove("a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_registrations_are_not_lost() {
        let registry = Arc::new(CommandRegistry::new());
        let threads: Vec<_> = (0..16)
            .map(|index| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.insert_raw(format!("command-{index}"), |_ctx| {});
                })
            })
            .collect();
        for handle in threads {
            handle.join().expect("registration thread panicked");
        }
        assert_eq!(registry.len(), 16);
    }

    #[test]
    fn windowed_open_flag_survives_replacement() {
        let registry = CommandRegistry::new();
        registry.insert_windowed("panel", |_ui| {});
        registry.set_open("panel", false);
        registry.insert_windowed("panel", |_ui| {});

        let snapshot = snapshot(&registry);
        match &snapshot[0].1 {
            Command::Windowed { open, .. } => assert!(!open),
            Command::Raw(_) => panic!("expected a windowed command"),
        }
    }

    #[test]
    fn set_open_ignores_raw_and_absent_ids() {
        let registry = CommandRegistry::new();
        registry.insert_raw("raw", |_ctx| {});
        registry.set_open("raw", false);
        registry.set_open("missing", false);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registration_wakes_a_waiting_snapshot() {
        let registry = Arc::new(CommandRegistry::new());

        let producer = {
            let registry = registry.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                registry.insert_raw("late", |_ctx| {});
            })
        };

        let started = Instant::now();
        let snapshot = registry.wait_and_snapshot(Duration::from_secs(5), || false);
        producer.join().expect("producer thread panicked");

        assert_eq!(snapshot.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wake_predicate_short_circuits_the_wait() {
        let registry = CommandRegistry::new();
        let started = Instant::now();
        let snapshot = registry.wait_and_snapshot(Duration::from_secs(5), || true);
        assert!(snapshot.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
