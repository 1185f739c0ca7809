//! Module registry and per-frame arbitration.
//!
//! `update`, `render` and `handle_event` run on the frame-loop thread and
//! take `&mut self`. State reports from other threads go through the shared
//! store (see [`StateHandle`]); registry changes stay on the owning thread.

use crate::error::panic_message;
use crate::module::{Host, ModuleContext, ScreenModule};
use crate::priority::{PriorityConfig, PriorityRule};
use crate::state::{Clock, ModuleState, StateHandle, StateReport, StateReporter, StateStore, SystemClock};
use crate::ModuleError;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A registered module.
struct ModuleEntry<H: Host> {
    module: Box<dyn ScreenModule<H>>,
    active: bool,
}

/// Run the unload hook; failures and panics are logged, never propagated.
fn run_unload<H: Host>(module: &mut Box<dyn ScreenModule<H>>, name: &str) {
    match catch_unwind(AssertUnwindSafe(|| module.on_unload())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("ModuleManager: '{}' on_unload failed: {:#}", name, e),
        Err(panic) => log::error!(
            "ModuleManager: '{}' on_unload panicked: {}",
            name,
            panic_message(panic.as_ref())
        ),
    }
}

/// Coordinates screen modules and applies priority rules.
pub struct ModuleManager<H: Host> {
    app: Arc<H>,
    modules: HashMap<String, ModuleEntry<H>>,
    /// Registration order
    order: Vec<String>,
    store: Arc<StateStore>,
    idle_cycle: Vec<String>,
    idle_index: usize,
    idle_timer: f64,
    idle_dwell: f64,
    current_screen: Option<String>,
}

impl<H: Host> ModuleManager<H> {
    pub fn new(app: Arc<H>, config: PriorityConfig) -> Self {
        Self::with_clock(app, config, Arc::new(SystemClock))
    }

    pub fn with_clock(app: Arc<H>, config: PriorityConfig, clock: Arc<dyn Clock>) -> Self {
        let PriorityConfig {
            timeout_seconds,
            idle,
            rules,
        } = config;
        Self {
            app,
            modules: HashMap::new(),
            order: Vec::new(),
            store: Arc::new(StateStore::new(clock, rules, timeout_seconds)),
            idle_cycle: idle.cycle,
            idle_index: 0,
            idle_timer: 0.0,
            idle_dwell: idle.dwell_seconds.max(0.0),
            current_screen: None,
        }
    }

    /// Replace the rule table, default timeout and idle settings wholesale.
    pub fn configure(&mut self, config: PriorityConfig) {
        self.store.configure(config.rules, config.timeout_seconds);
        self.idle_cycle = config.idle.cycle;
        self.idle_dwell = config.idle.dwell_seconds.max(0.0);
        self.sync_idle_index();
    }

    // ------------------------------------------------------------------ registration

    /// Bind `module` under `name` and run its load hook.
    pub fn register(&mut self, name: &str, mut module: Box<dyn ScreenModule<H>>) -> Result<(), ModuleError> {
        if self.modules.contains_key(name) {
            return Err(ModuleError::AlreadyRegistered(name.to_string()));
        }

        let token = self.store.bind(name);
        let reporter = StateReporter::new(name, &self.store, token);
        let cx = ModuleContext::new(name, Arc::clone(&self.app), reporter);
        if let Err(e) = module.on_load(&cx) {
            // Let the module release whatever it set up before failing.
            run_unload(&mut module, name);
            self.store.unbind(name);
            return Err(ModuleError::LoadFailed {
                name: name.to_string(),
                source: e.into(),
            });
        }

        self.modules.insert(name.to_string(), ModuleEntry { module, active: false });
        self.order.push(name.to_string());
        log::debug!("ModuleManager: registered '{}'", name);
        Ok(())
    }

    /// Unbind and remove a module, dropping its state. Returns false if unknown.
    ///
    /// Unregistering the active screen leaves no screen active until the
    /// next resolution or explicit activation.
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(mut entry) = self.modules.remove(name) else {
            return false;
        };
        self.order.retain(|n| n != name);
        run_unload(&mut entry.module, name);
        self.store.unbind(name);
        if self.current_screen.as_deref() == Some(name) {
            self.current_screen = None;
        }
        log::debug!("ModuleManager: unregistered '{}'", name);
        true
    }

    /// Unregister every module in registration order.
    pub fn shutdown(&mut self) {
        for name in self.order.clone() {
            self.unregister(&name);
        }
    }

    /// Drop idle-cycle names that are not registered. An empty result falls
    /// back to every registered module in registration order.
    pub fn finalize_idle_cycle(&mut self) {
        self.idle_cycle.retain(|n| self.modules.contains_key(n));
        if self.idle_cycle.is_empty() {
            self.idle_cycle = self.order.clone();
        }
        self.sync_idle_index();
    }

    // ---------------------------------------------------------------------- runtime

    /// Expire stale state, tick every module, then resolve and act.
    pub fn update(&mut self, dt: f64) {
        let expired = self.store.expire(self.store.now());
        for name in &expired {
            log::debug!("ModuleManager: state of '{}' expired", name);
        }

        for name in &self.order {
            if let Some(entry) = self.modules.get_mut(name) {
                entry.module.update(dt);
            }
        }

        match self.store.resolve() {
            Some(screen) => {
                if self.current_screen.as_deref() != Some(screen.as_str()) {
                    self.activate(&screen);
                }
                self.idle_timer = 0.0;
            }
            None => self.advance_idle(dt),
        }
    }

    pub fn render(&mut self, surface: &mut H::Surface) {
        if let Some(entry) = self.active_entry() {
            entry.module.render(surface);
        }
    }

    pub fn handle_event(&mut self, event: &H::Event) {
        if let Some(entry) = self.active_entry() {
            entry.module.handle_event(event);
        }
    }

    /// Forced navigation: reset the idle timer and activate `name`,
    /// bypassing rule resolution for this call.
    pub fn set_active(&mut self, name: &str) -> bool {
        self.idle_timer = 0.0;
        self.activate(name)
    }

    /// Make `name` the active screen. Unknown names are ignored (returns false).
    ///
    /// Re-activating the screen that is already showing fires no hooks.
    pub fn activate(&mut self, name: &str) -> bool {
        if !self.modules.contains_key(name) {
            return false;
        }

        if self.current_screen.as_deref() != Some(name) {
            if let Some(previous) = self
                .current_screen
                .take()
                .and_then(|prev| self.modules.get_mut(&prev))
            {
                previous.active = false;
                previous.module.on_hide();
            }

            self.current_screen = Some(name.to_string());
            if let Some(entry) = self.modules.get_mut(name) {
                entry.active = true;
                entry.module.on_show();
            }
            self.app.set_current_screen(name);
            log::debug!("ModuleManager: activated '{}'", name);
        }

        if let Some(pos) = self.idle_cycle.iter().position(|n| n == name) {
            self.idle_index = pos;
        }
        true
    }

    fn advance_idle(&mut self, dt: f64) {
        if self.idle_cycle.is_empty() {
            return;
        }

        let in_cycle = self
            .current_screen
            .as_ref()
            .is_some_and(|current| self.idle_cycle.contains(current));
        if !in_cycle {
            if let Some(first) = self.next_registered(0) {
                self.idle_index = first;
                let name = self.idle_cycle[first].clone();
                self.activate(&name);
            }
            self.idle_timer = 0.0;
            return;
        }

        self.idle_timer += dt;
        if self.idle_timer < self.idle_dwell {
            return;
        }
        self.idle_timer = 0.0;
        if let Some(next) = self.next_registered(self.idle_index + 1) {
            self.idle_index = next;
            let name = self.idle_cycle[next].clone();
            self.activate(&name);
        }
    }

    /// First cycle position at or after `start` (wrapping) naming a registered module.
    fn next_registered(&self, start: usize) -> Option<usize> {
        let len = self.idle_cycle.len();
        (0..len)
            .map(|k| (start + k) % len)
            .find(|&i| self.modules.contains_key(&self.idle_cycle[i]))
    }

    fn sync_idle_index(&mut self) {
        self.idle_index = self
            .current_screen
            .as_ref()
            .and_then(|current| self.idle_cycle.iter().position(|n| n == current))
            .unwrap_or(0);
    }

    fn active_entry(&mut self) -> Option<&mut ModuleEntry<H>> {
        let current = self.current_screen.as_ref()?;
        self.modules.get_mut(current)
    }

    // ---------------------------------------------------------------------- states

    /// Replace the stored state of `module` with a freshly time-stamped record.
    pub fn report_state(&self, module: &str, state: &str, report: StateReport) {
        self.store.report(module, state, report);
    }

    pub fn clear_state(&self, module: &str) {
        self.store.clear(module);
    }

    /// A cloneable handle for reporting from other threads.
    pub fn state_handle(&self) -> StateHandle {
        StateHandle::new(Arc::clone(&self.store))
    }

    // -------------------------------------------------------------------- accessors

    pub fn app(&self) -> &Arc<H> {
        &self.app
    }

    pub fn current_screen(&self) -> Option<&str> {
        self.current_screen.as_deref()
    }

    /// Registered module names in registration order.
    pub fn module_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.modules.get(name).is_some_and(|e| e.active)
    }

    pub fn state_of(&self, name: &str) -> Option<ModuleState> {
        self.store.get(name)
    }

    pub fn rules(&self) -> Vec<PriorityRule> {
        self.store.rules()
    }

    pub fn default_timeout(&self) -> f64 {
        self.store.default_timeout()
    }

    pub fn idle_cycle(&self) -> &[String] {
        &self.idle_cycle
    }

    pub fn idle_dwell(&self) -> f64 {
        self.idle_dwell
    }
}

impl<H: Host> Drop for ModuleManager<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
