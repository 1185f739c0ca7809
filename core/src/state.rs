//! Module state reports and the shared store the arbitration pass reads.
//!
//! The store is the only part of the manager touched from other threads:
//! services and module worker threads call `report_state`/`clear_state`
//! through a [`StateHandle`] or [`StateReporter`] while the frame loop runs
//! expiry and resolution. One mutex covers the states, the rule table and
//! the module bindings, so a reporter's binding check and its write happen
//! in the same critical section as `unbind`.

use crate::error::ModuleError;
use crate::priority::{resolve, PriorityRule};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Opaque key-value bag attached to a state report.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The latest state reported by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleState {
    pub state: String,
    pub metadata: Metadata,
    pub weight_override: Option<i64>,
    /// Lifetime in seconds; `None` falls back to the manager default.
    pub expires_in: Option<f64>,
    pub timestamp: Instant,
}

impl ModuleState {
    /// A timeout of zero or less never expires.
    pub fn is_expired(&self, now: Instant, default_timeout: f64) -> bool {
        let timeout = self.expires_in.unwrap_or(default_timeout);
        if timeout <= 0.0 {
            return false;
        }
        now.saturating_duration_since(self.timestamp).as_secs_f64() > timeout
    }
}

/// Optional fields of a state report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateReport {
    pub metadata: Metadata,
    pub weight: Option<i64>,
    pub expires_in: Option<f64>,
}

impl StateReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn expires_in(mut self, seconds: f64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Monotonic time source for state timestamps and expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Largest single step [`ManualClock::advance`] takes (about a century).
const MAX_STEP_SECONDS: f64 = 100.0 * 365.25 * 24.0 * 3600.0;

/// A clock that only moves when told to. Used for deterministic expiry.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward. Negative and NaN steps are ignored, huge
    /// ones saturate instead of overflowing `Instant`.
    pub fn advance(&self, seconds: f64) {
        let step = Duration::try_from_secs_f64(seconds.clamp(0.0, MAX_STEP_SECONDS)).unwrap_or(Duration::ZERO);
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        let advanced = offset.saturating_add(step);
        if self.origin.checked_add(advanced).is_some() {
            *offset = advanced;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SHARED STORE
// ============================================================================

struct Arbitration {
    states: HashMap<String, ModuleState>,
    rules: Vec<PriorityRule>,
    default_timeout: f64,
    /// Live binding token per registered module name
    bindings: HashMap<String, u64>,
    next_binding: u64,
}

pub(crate) struct StateStore {
    inner: Mutex<Arbitration>,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    pub(crate) fn new(clock: Arc<dyn Clock>, rules: Vec<PriorityRule>, default_timeout: f64) -> Self {
        Self {
            inner: Mutex::new(Arbitration {
                states: HashMap::new(),
                rules,
                default_timeout,
                bindings: HashMap::new(),
                next_binding: 1,
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arbitration> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    fn record(&self, state: &str, report: StateReport) -> ModuleState {
        ModuleState {
            state: state.to_string(),
            metadata: report.metadata,
            weight_override: report.weight,
            expires_in: report.expires_in,
            timestamp: self.clock.now(),
        }
    }

    pub(crate) fn report(&self, module: &str, state: &str, report: StateReport) {
        let record = self.record(state, report);
        self.lock().states.insert(module.to_string(), record);
    }

    /// Issue a fresh binding token for `module`, replacing any previous one.
    pub(crate) fn bind(&self, module: &str) -> u64 {
        let mut guard = self.lock();
        let token = guard.next_binding;
        guard.next_binding += 1;
        guard.bindings.insert(module.to_string(), token);
        token
    }

    /// Revoke the binding of `module` and drop its state in one step.
    pub(crate) fn unbind(&self, module: &str) {
        let mut guard = self.lock();
        guard.bindings.remove(module);
        guard.states.remove(module);
    }

    fn is_bound(&self, module: &str, token: u64) -> bool {
        self.lock().bindings.get(module) == Some(&token)
    }

    /// Write or clear the state of `module` only while `token` is its live binding.
    fn report_bound(&self, module: &str, token: u64, state: Option<(&str, StateReport)>) -> Result<(), ModuleError> {
        let record = state.map(|(state, report)| self.record(state, report));
        let mut guard = self.lock();
        if guard.bindings.get(module) != Some(&token) {
            return Err(ModuleError::NotBound);
        }
        match record {
            Some(record) => {
                guard.states.insert(module.to_string(), record);
            }
            None => {
                guard.states.remove(module);
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&self, module: &str) -> bool {
        self.lock().states.remove(module).is_some()
    }

    pub(crate) fn get(&self, module: &str) -> Option<ModuleState> {
        self.lock().states.get(module).cloned()
    }

    /// Drop every state older than its effective timeout. Returns the names dropped.
    pub(crate) fn expire(&self, now: Instant) -> Vec<String> {
        let mut guard = self.lock();
        let default_timeout = guard.default_timeout;
        let expired: Vec<String> = guard
            .states
            .iter()
            .filter(|(_, s)| s.is_expired(now, default_timeout))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            guard.states.remove(name);
        }
        expired
    }

    pub(crate) fn resolve(&self) -> Option<String> {
        let guard = self.lock();
        resolve(&guard.rules, &guard.states).map(str::to_string)
    }

    pub(crate) fn configure(&self, rules: Vec<PriorityRule>, default_timeout: f64) {
        let mut guard = self.lock();
        guard.rules = rules;
        guard.default_timeout = default_timeout;
    }

    pub(crate) fn rules(&self) -> Vec<PriorityRule> {
        self.lock().rules.clone()
    }

    pub(crate) fn default_timeout(&self) -> f64 {
        self.lock().default_timeout
    }
}

/// Cloneable, thread-safe entry point for reporting on behalf of any module.
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<StateStore>,
}

impl StateHandle {
    pub(crate) fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Replace the stored state of `module` with a freshly time-stamped record.
    pub fn report_state(&self, module: &str, state: &str, report: StateReport) {
        self.store.report(module, state, report);
    }

    pub fn clear_state(&self, module: &str) {
        self.store.clear(module);
    }

    pub fn state_of(&self, module: &str) -> Option<ModuleState> {
        self.store.get(module)
    }
}

/// A module's own, non-owning line back to the manager.
///
/// Handed out through [`ModuleContext`](crate::ModuleContext) at bind time.
/// Once the module is unbound every clone fails with [`ModuleError::NotBound`],
/// including reporters of an earlier registration under the same name.
#[derive(Clone)]
pub struct StateReporter {
    name: String,
    store: Weak<StateStore>,
    token: u64,
}

impl StateReporter {
    pub(crate) fn new(name: &str, store: &Arc<StateStore>, token: u64) -> Self {
        Self {
            name: name.to_string(),
            store: Arc::downgrade(store),
            token,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.is_bound(&self.name, self.token))
    }

    /// Report `state` for this module, or clear it when `state` is `None`.
    pub fn report_state(&self, state: Option<&str>, report: StateReport) -> Result<(), ModuleError> {
        let store = self.store.upgrade().ok_or(ModuleError::NotBound)?;
        store.report_bound(&self.name, self.token, state.map(|state| (state, report)))
    }

    pub fn clear_state(&self) -> Result<(), ModuleError> {
        self.report_state(None, StateReport::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_clock() -> (Arc<StateStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(StateStore::new(clock.clone(), Vec::new(), 15.0));
        (store, clock)
    }

    #[test]
    fn test_state_expiry_uses_default_timeout() {
        let (store, clock) = store_with_clock();
        store.report("camera", "warning", StateReport::new());

        clock.advance(15.0);
        assert!(store.expire(clock.now()).is_empty());

        clock.advance(0.5);
        assert_eq!(store.expire(clock.now()), vec!["camera".to_string()]);
        assert!(store.get("camera").is_none());
    }

    #[test]
    fn test_explicit_expiry_overrides_default() {
        let (store, clock) = store_with_clock();
        store.report("radar", "air-traffic", StateReport::new().expires_in(2.0));

        clock.advance(3.0);
        assert_eq!(store.expire(clock.now()), vec!["radar".to_string()]);
    }

    #[test]
    fn test_non_positive_timeout_never_expires() {
        let (store, clock) = store_with_clock();
        store.report("a", "on", StateReport::new().expires_in(0.0));
        store.report("b", "on", StateReport::new().expires_in(-1.0));

        clock.advance(10_000.0);
        assert!(store.expire(clock.now()).is_empty());

        store.configure(Vec::new(), 0.0);
        store.report("c", "on", StateReport::new());
        clock.advance(10_000.0);
        assert!(store.expire(clock.now()).is_empty());
    }

    #[test]
    fn test_report_replaces_without_merge() {
        let (store, _clock) = store_with_clock();
        store.report("camera", "warning", StateReport::new().with("zone", "driveway").weight(5));
        store.report("camera", "danger", StateReport::new());

        let state = store.get("camera").unwrap();
        assert_eq!(state.state, "danger");
        assert!(state.metadata.is_empty());
        assert_eq!(state.weight_override, None);
    }

    #[test]
    fn test_reporter_fails_once_unbound() {
        let (store, _clock) = store_with_clock();
        let token = store.bind("camera");
        let reporter = StateReporter::new("camera", &store, token);

        reporter.report_state(Some("warning"), StateReport::new()).unwrap();
        assert_eq!(store.get("camera").unwrap().state, "warning");

        reporter.clear_state().unwrap();
        assert!(store.get("camera").is_none());

        reporter.report_state(Some("warning"), StateReport::new()).unwrap();
        store.unbind("camera");
        assert!(store.get("camera").is_none());
        assert!(!reporter.is_bound());
        assert!(matches!(
            reporter.report_state(Some("warning"), StateReport::new()),
            Err(ModuleError::NotBound)
        ));
        assert!(store.get("camera").is_none());
    }

    #[test]
    fn test_stale_reporter_rejected_after_rebind() {
        let (store, _clock) = store_with_clock();
        let stale = StateReporter::new("radar", &store, store.bind("radar"));
        store.unbind("radar");
        let fresh = StateReporter::new("radar", &store, store.bind("radar"));

        assert!(matches!(
            stale.report_state(Some("air-traffic"), StateReport::new()),
            Err(ModuleError::NotBound)
        ));
        assert!(store.get("radar").is_none());
        fresh.report_state(Some("air-traffic"), StateReport::new()).unwrap();
        assert!(fresh.is_bound());
        assert!(!stale.is_bound());
    }

    #[test]
    fn test_manual_clock_saturates_on_huge_steps() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(f64::INFINITY);
        clock.advance(f64::NAN);
        clock.advance(-5.0);
        let after = clock.now();
        assert!(after > start);

        for _ in 0..1_000 {
            clock.advance(f64::MAX);
        }
        assert!(clock.now() >= after);
    }

    #[test]
    fn test_reporter_fails_after_store_dropped() {
        let (store, _clock) = store_with_clock();
        let reporter = StateReporter::new("camera", &store, store.bind("camera"));
        drop(store);
        assert!(!reporter.is_bound());
        assert!(matches!(reporter.clear_state(), Err(ModuleError::NotBound)));
    }
}
