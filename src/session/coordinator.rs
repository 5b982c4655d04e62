use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::alarm::{Alarm, AlarmKind, AlarmSet};
use crate::config::SessionTiming;
use crate::identity::AuthState;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No cycle running: not authenticated, torn down, or an extend is in flight.
    Idle,
    /// Alarms armed, warning not yet shown.
    Counting,
    /// Warning shown, countdown running toward expiry.
    Warning,
    /// Forced logout in progress; returns to `Idle` once the logout settles.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub timing: SessionTiming,
    /// Whether a presentation surface exists for the warning. Without one the
    /// expiry alarm still fires but no warning or countdown is shown.
    pub warning_surface: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self { timing: SessionTiming::default(), warning_surface: true }
    }
}

struct CycleState {
    /// Bumped by every start, teardown and forced logout. Alarm callbacks carrying
    /// an older generation do nothing.
    generation: u64,
    alarms: AlarmSet,
    /// Generation of the cycle whose extend is pending. A pending extend from an
    /// older cycle does not block extends in the current one.
    extend_in_flight: Option<u64>,
    expires_at: Option<Instant>,
}

struct Inner<A: AuthState> {
    auth: Arc<A>,
    options: CoordinatorOptions,
    state: Mutex<CycleState>,
    remaining: watch::Sender<u64>,
    warning_visible: watch::Sender<bool>,
    phase: watch::Sender<SessionPhase>,
}

/// Client-side mirror of the server session lifetime.
///
/// Cloning yields another handle to the same coordinator. Alarm tasks only hold
/// weak references, so dropping the last handle cancels every pending alarm.
/// All methods that arm alarms must run inside a tokio runtime.
pub struct SessionCoordinator<A: AuthState> {
    inner: Arc<Inner<A>>,
}

impl<A: AuthState> Clone for SessionCoordinator<A> {
    fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<A: AuthState> SessionCoordinator<A> {
    pub fn new(auth: Arc<A>, options: CoordinatorOptions) -> Self {
        if options.timing.is_degenerate() {
            warn!(
                target: "saintbi::session",
                total_ms = options.timing.total.as_millis() as u64,
                warning_lead_ms = options.timing.warning_lead.as_millis() as u64,
                "warning lead is not shorter than the session; the warning will fire immediately"
            );
        }
        let (remaining, _) = watch::channel(options.timing.warning_seconds());
        let (warning_visible, _) = watch::channel(false);
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let inner = Inner {
            auth,
            options,
            state: Mutex::new(CycleState { generation: 0, alarms: AlarmSet::default(), extend_in_flight: None, expires_at: None }),
            remaining,
            warning_visible,
            phase,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Construct and, when the session is already authenticated (a reload), start the cycle.
    pub fn mount(auth: Arc<A>, options: CoordinatorOptions) -> Self {
        let coordinator = Self::new(auth, options);
        if coordinator.inner.auth.is_authenticated() {
            coordinator.start();
        }
        coordinator
    }

    /// Cancel any running cycle and, if authenticated, arm a fresh one.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Hide the warning and ask the server for more time. Success restarts the
    /// cycle from now; failure forces a logout. Ignored while another extend is
    /// pending or when no cycle is running.
    pub async fn extend(&self) {
        self.inner.extend().await;
    }

    /// Cancel everything and log out. Safe from any phase.
    pub async fn logout(&self) {
        self.inner.force_logout("manual", None).await;
    }

    /// Cancel every alarm without calling the server. Idempotent.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn phase(&self) -> SessionPhase { *self.inner.phase.borrow() }
    pub fn remaining_seconds(&self) -> u64 { *self.inner.remaining.borrow() }
    pub fn warning_visible(&self) -> bool { *self.inner.warning_visible.borrow() }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> { self.inner.phase.subscribe() }
    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> { self.inner.remaining.subscribe() }
    pub fn subscribe_warning(&self) -> watch::Receiver<bool> { self.inner.warning_visible.subscribe() }

    pub fn timing(&self) -> SessionTiming { self.inner.options.timing }

    /// Time left until the expiry alarm, if a cycle is armed.
    pub fn expires_in(&self) -> Option<Duration> {
        let st = self.inner.state.lock();
        st.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_extending(&self) -> bool {
        let st = self.inner.state.lock();
        st.extend_in_flight == Some(st.generation)
    }

    pub fn armed_alarms(&self) -> Vec<AlarmKind> { self.inner.state.lock().alarms.armed() }
}

impl<A: AuthState> Inner<A> {
    fn set_phase(&self, next: SessionPhase) {
        self.phase.send_if_modified(|p| {
            let changed = *p != next;
            *p = next;
            changed
        });
    }

    fn set_warning_visible(&self, visible: bool) {
        self.warning_visible.send_if_modified(|v| {
            let changed = *v != visible;
            *v = visible;
            changed
        });
    }

    fn start(self: &Arc<Self>) {
        let timing = self.options.timing;
        let mut st = self.state.lock();
        st.generation += 1;
        st.alarms.cancel_all();
        st.expires_at = None;
        self.set_warning_visible(false);
        if !self.auth.is_authenticated() {
            drop(st);
            self.set_phase(SessionPhase::Idle);
            debug!(target: "saintbi::session", "start skipped: not authenticated");
            return;
        }

        let generation = st.generation;
        let now = Instant::now();
        let warn_at = now + timing.warning_delay();
        let expire_at = now + timing.total;
        st.expires_at = Some(expire_at);

        let weak = Arc::downgrade(self);
        st.alarms.arm(Alarm::spawn(AlarmKind::Warning, async move {
            sleep_until(warn_at).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_warning(generation);
            }
        }));
        let weak = Arc::downgrade(self);
        st.alarms.arm(Alarm::spawn(AlarmKind::Expiry, async move {
            sleep_until(expire_at).await;
            if let Some(inner) = weak.upgrade() {
                inner.force_logout("expired", Some(generation)).await;
            }
        }));
        drop(st);

        self.set_phase(SessionPhase::Counting);
        info!(
            target: "saintbi::session",
            generation,
            warning_in_secs = timing.warning_delay().as_secs(),
            expires_in_secs = timing.total.as_secs(),
            "session cycle started"
        );
    }

    fn on_warning(self: &Arc<Self>, generation: u64) {
        let seconds = self.options.timing.warning_seconds();
        let mut st = self.state.lock();
        if st.generation != generation {
            return;
        }
        st.alarms.detach(AlarmKind::Warning);
        self.remaining.send_replace(seconds);
        self.set_phase(SessionPhase::Warning);
        if !self.options.warning_surface {
            debug!(target: "saintbi::session", "no warning surface; expiry stays armed");
            return;
        }
        self.set_warning_visible(true);
        if seconds > 0 {
            st.alarms.arm(spawn_tick(Arc::downgrade(self), generation));
        }
        drop(st);
        info!(target: "saintbi::session", remaining_secs = seconds, "session expiry warning shown");
    }

    /// Returns whether the tick should keep running.
    fn on_tick(&self, generation: u64) -> bool {
        let mut st = self.state.lock();
        if st.generation != generation {
            return false;
        }
        let mut left = 0;
        self.remaining.send_modify(|r| {
            *r = r.saturating_sub(1);
            left = *r;
        });
        if left == 0 {
            st.alarms.detach(AlarmKind::Tick);
            return false;
        }
        true
    }

    async fn extend(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock();
            if st.extend_in_flight == Some(st.generation) {
                debug!(target: "saintbi::session", "extend already in flight; ignoring");
                return;
            }
            if st.expires_at.is_none() {
                debug!(target: "saintbi::session", "no session cycle running; ignoring extend");
                return;
            }
            st.extend_in_flight = Some(st.generation);
            st.alarms.cancel(AlarmKind::Tick);
            st.alarms.cancel(AlarmKind::Warning);
            st.generation
        };
        self.set_warning_visible(false);
        self.set_phase(SessionPhase::Idle);

        let extended = self.auth.extend_session().await;

        let current = {
            let mut st = self.state.lock();
            if st.extend_in_flight == Some(generation) {
                st.extend_in_flight = None;
            }
            st.generation == generation
        };
        if !current {
            debug!(target: "saintbi::session", extended, "session changed while extend was pending; result discarded");
            return;
        }
        if extended {
            self.start();
        } else {
            warn!(target: "saintbi::session", "session extend failed; forcing logout");
            self.force_logout("extend_rejected", None).await;
        }
    }

    /// `only_generation` is set by the expiry alarm: it acts only if its cycle is still current.
    async fn force_logout(self: &Arc<Self>, reason: &'static str, only_generation: Option<u64>) {
        let generation = {
            let mut st = self.state.lock();
            if let Some(g) = only_generation {
                if st.generation != g {
                    return;
                }
                st.alarms.detach(AlarmKind::Expiry);
            }
            st.generation += 1;
            st.alarms.cancel_all();
            st.expires_at = None;
            st.generation
        };
        self.set_warning_visible(false);
        self.set_phase(SessionPhase::Expired);
        info!(target: "saintbi::session", reason, "forcing logout");

        self.auth.logout().await;

        if self.state.lock().generation == generation {
            self.set_phase(SessionPhase::Idle);
        }
    }

    fn teardown(&self) {
        {
            let mut st = self.state.lock();
            st.generation += 1;
            st.alarms.cancel_all();
            st.expires_at = None;
        }
        self.set_warning_visible(false);
        self.set_phase(SessionPhase::Idle);
        debug!(target: "saintbi::session", "coordinator torn down");
    }
}

fn spawn_tick<A: AuthState>(weak: Weak<Inner<A>>, generation: u64) -> Alarm {
    let first = Instant::now() + TICK;
    Alarm::spawn(AlarmKind::Tick, async move {
        let mut ticks = interval_at(first, TICK);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let Some(inner) = weak.upgrade() else { return };
            if !inner.on_tick(generation) {
                return;
            }
        }
    })
}
