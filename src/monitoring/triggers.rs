//! Change notifications for blocking queries

use std::str::FromStr;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{LqlError, Result};

/// What kind of change woke a waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    All,
    Check,
    State,
    Log,
    Downtime,
    Comment,
    Command,
    Program,
}

impl TriggerKind {
    pub const KINDS: [TriggerKind; 8] = [
        TriggerKind::All,
        TriggerKind::Check,
        TriggerKind::State,
        TriggerKind::Log,
        TriggerKind::Downtime,
        TriggerKind::Comment,
        TriggerKind::Command,
        TriggerKind::Program,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for TriggerKind {
    type Err = LqlError;

    fn from_str(s: &str) -> Result<Self> {
        TriggerKind::KINDS
            .iter()
            .copied()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| {
                LqlError::BadRequest(format!(
                    "invalid trigger '{}', allowed: {}",
                    s,
                    TriggerKind::KINDS
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::All => write!(f, "all"),
            TriggerKind::Check => write!(f, "check"),
            TriggerKind::State => write!(f, "state"),
            TriggerKind::Log => write!(f, "log"),
            TriggerKind::Downtime => write!(f, "downtime"),
            TriggerKind::Comment => write!(f, "comment"),
            TriggerKind::Command => write!(f, "command"),
            TriggerKind::Program => write!(f, "program"),
        }
    }
}

/// One condition variable per trigger kind, sharing a mutex
///
/// Waiters re-check their predicate under the mutex and notifiers take it
/// before signalling, so a change published between a check and the wait is
/// never missed.
#[derive(Debug, Default)]
pub struct Triggers {
    mutex: Mutex<()>,
    conditions: [Condvar; 8],
}

impl Triggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake everybody waiting for `kind` or for any change
    pub fn notify(&self, kind: TriggerKind) {
        let _guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        self.conditions[kind.index()].notify_all();
        if kind != TriggerKind::All {
            self.conditions[TriggerKind::All.index()].notify_all();
        }
    }

    /// Wake every waiter
    pub fn notify_all_kinds(&self) {
        let _guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        for condition in &self.conditions {
            condition.notify_all();
        }
    }

    /// Block until `predicate` holds or `timeout` elapses
    ///
    /// A zero timeout waits forever. Returns whether the predicate held.
    pub fn wait_for<F>(&self, kind: TriggerKind, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        let condition = &self.conditions[kind.index()];
        if timeout.is_zero() {
            let _guard = condition
                .wait_while(guard, |_| !predicate())
                .unwrap_or_else(|e| e.into_inner());
            true
        } else {
            let (_guard, result) = condition
                .wait_timeout_while(guard, timeout, |_| !predicate())
                .unwrap_or_else(|e| e.into_inner());
            !result.timed_out()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_trigger_names() {
        assert_eq!("state".parse::<TriggerKind>().unwrap(), TriggerKind::State);
        let err = "bogus".parse::<TriggerKind>().unwrap_err();
        assert!(err.to_string().starts_with("invalid trigger 'bogus'"));
    }

    #[test]
    fn test_wait_returns_immediately_when_true() {
        let triggers = Triggers::new();
        assert!(triggers.wait_for(TriggerKind::All, Duration::from_millis(10), || true));
    }

    #[test]
    fn test_wait_times_out() {
        let triggers = Triggers::new();
        assert!(!triggers.wait_for(TriggerKind::Check, Duration::from_millis(20), || false));
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let triggers = Arc::new(Triggers::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let triggers = Arc::clone(&triggers);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                triggers.wait_for(TriggerKind::State, Duration::from_secs(10), || {
                    flag.load(Ordering::SeqCst)
                })
            })
        };

        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        triggers.notify(TriggerKind::State);
        assert!(waiter.join().unwrap());
    }
}
