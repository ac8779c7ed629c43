use hashbrown::HashMap;
use sorrel_http::Swansong;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

/// The cross-connection session table.
///
/// Each accepted connection registers a control handle (its swansong
/// and a last-activity tick) and removes it again when the session
/// ends. The registry never owns a session's transport or buffers; it
/// exists so the idle sweeper and server shutdown can reach sessions
/// from outside. It is written only on connect and disconnect, and
/// read by the sweeper.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    epoch: OnceInstant,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, SessionHandle>>,
}

#[derive(Debug)]
struct SessionHandle {
    swansong: Swansong,
    last_activity: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a session, returning a guard that deregisters it on
    /// drop. The guard carries the activity cell the transport
    /// wrapper ticks.
    pub(crate) fn register(self: &Arc<Self>, swansong: Swansong) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let last_activity = Arc::new(AtomicU64::new(self.now_millis()));

        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(
                id,
                SessionHandle {
                    swansong,
                    last_activity: last_activity.clone(),
                },
            );
        }

        SessionGuard {
            registry: self.clone(),
            id,
            last_activity,
            epoch: self.epoch.get(),
        }
    }

    /// how many sessions are currently registered
    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    /// Shut down every session whose last activity tick precedes
    /// `now - timeout`. Returns how many were closed.
    pub(crate) fn close_idle(&self, timeout: Duration) -> usize {
        let cutoff = self
            .now_millis()
            .saturating_sub(timeout.as_millis() as u64);
        let mut closed = 0;

        if let Ok(sessions) = self.sessions.lock() {
            for handle in sessions.values() {
                if handle.last_activity.load(Ordering::Relaxed) < cutoff
                    && !handle.swansong.state().is_shutting_down()
                {
                    drop(handle.swansong.shut_down());
                    closed += 1;
                }
            }
        }

        closed
    }

    /// shut down every registered session
    pub(crate) fn shut_down_all(&self) {
        if let Ok(sessions) = self.sessions.lock() {
            for handle in sessions.values() {
                drop(handle.swansong.shut_down());
            }
        }
    }

    fn deregister(&self, id: u64) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&id);
        }
    }

    fn now_millis(&self) -> u64 {
        self.epoch.get().elapsed().as_millis() as u64
    }
}

/// RAII membership in the [`SessionRegistry`].
#[derive(Debug)]
pub(crate) struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
    last_activity: Arc<AtomicU64>,
    epoch: Instant,
}

impl SessionGuard {
    /// the activity tracker for this session's transport
    pub(crate) fn activity(&self) -> ActivityTracker {
        ActivityTracker {
            last_activity: self.last_activity.clone(),
            epoch: self.epoch,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

/// Ticks a session's last-activity cell; cloned into the transport
/// wrapper.
#[derive(Debug, Clone)]
pub(crate) struct ActivityTracker {
    last_activity: Arc<AtomicU64>,
    epoch: Instant,
}

impl ActivityTracker {
    pub(crate) fn touch(&self) {
        self.last_activity
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }
}

/// An `Instant` that defaults to "when first observed", so the
/// registry can derive monotonic millisecond ticks without a
/// constructor-time clock read in `Default`.
#[derive(Debug)]
struct OnceInstant(std::sync::OnceLock<Instant>);

impl Default for OnceInstant {
    fn default() -> Self {
        Self(std::sync::OnceLock::new())
    }
}

impl OnceInstant {
    fn get(&self) -> Instant {
        *self.0.get_or_init(Instant::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_drop() {
        let registry = Arc::new(SessionRegistry::new());
        let guard = registry.register(Swansong::new());
        assert_eq!(registry.len(), 1);
        drop(guard);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn close_idle_only_touches_stale_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let fresh = Swansong::new();
        let _guard = registry.register(fresh.clone());
        assert_eq!(registry.close_idle(Duration::from_secs(60)), 0);
        assert!(!fresh.state().is_shutting_down());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(registry.close_idle(Duration::ZERO), 1);
        assert!(fresh.state().is_shutting_down());
    }

    #[test]
    fn shut_down_all() {
        let registry = Arc::new(SessionRegistry::new());
        let a = Swansong::new();
        let b = Swansong::new();
        let _ga = registry.register(a.clone());
        let _gb = registry.register(b.clone());
        registry.shut_down_all();
        assert!(a.state().is_shutting_down());
        assert!(b.state().is_shutting_down());
    }
}
