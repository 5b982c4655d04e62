//! Owned, cancellable alarm tokens.
//!
//! An `Alarm` wraps a spawned tokio task. Dropping the token aborts the task, so
//! whoever owns the token owns the pending callback. `AlarmSet` holds at most one
//! alarm per kind; arming a kind replaces (and aborts) whatever was there.

use std::future::Future;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    /// One-shot: show the expiry warning.
    Warning,
    /// One-shot: the session is over, force logout.
    Expiry,
    /// Repeating: decrement the countdown once per second.
    Tick,
}

#[derive(Debug)]
pub struct Alarm {
    kind: AlarmKind,
    handle: Option<JoinHandle<()>>,
}

impl Alarm {
    /// Spawn `fut` on the current tokio runtime. Panics outside a runtime, like `tokio::spawn`.
    pub fn spawn<F>(kind: AlarmKind, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self { kind, handle: Some(tokio::spawn(fut)) }
    }

    pub fn kind(&self) -> AlarmKind { self.kind }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    pub fn cancel(mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }

    /// Give up ownership without aborting. Used by an alarm task that is running
    /// its own callback and must not cancel itself mid-way.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}

#[derive(Debug, Default)]
pub struct AlarmSet {
    warning: Option<Alarm>,
    expiry: Option<Alarm>,
    tick: Option<Alarm>,
}

impl AlarmSet {
    fn slot(&mut self, kind: AlarmKind) -> &mut Option<Alarm> {
        match kind {
            AlarmKind::Warning => &mut self.warning,
            AlarmKind::Expiry => &mut self.expiry,
            AlarmKind::Tick => &mut self.tick,
        }
    }

    pub fn arm(&mut self, alarm: Alarm) {
        let slot = self.slot(alarm.kind());
        if let Some(previous) = slot.replace(alarm) {
            previous.cancel();
        }
    }

    pub fn cancel(&mut self, kind: AlarmKind) {
        if let Some(a) = self.slot(kind).take() {
            a.cancel();
        }
    }

    pub fn detach(&mut self, kind: AlarmKind) {
        if let Some(a) = self.slot(kind).take() {
            a.detach();
        }
    }

    /// Safe on an empty set.
    pub fn cancel_all(&mut self) {
        self.cancel(AlarmKind::Warning);
        self.cancel(AlarmKind::Expiry);
        self.cancel(AlarmKind::Tick);
    }

    /// Kinds whose task is still pending, in firing order.
    pub fn armed(&self) -> Vec<AlarmKind> {
        [&self.warning, &self.expiry, &self.tick]
            .into_iter()
            .flatten()
            .filter(|a| !a.is_finished())
            .map(|a| a.kind())
            .collect()
    }
}
