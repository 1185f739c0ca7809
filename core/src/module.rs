use crate::event_bus::EventBus;
use crate::state::{StateReport, StateReporter};
use crate::ModuleError;
use std::sync::Arc;

/// The host application the manager and its modules are bound to.
///
/// The host picks its own drawing target and input event types. Everything
/// else is optional: a host that wants to know which screen is showing
/// overrides [`Host::set_current_screen`], and a host that shares an event
/// bus with modules and services exposes it through [`Host::event_bus`].
pub trait Host: Send + Sync + 'static {
    /// Drawing target passed to [`ScreenModule::render`]
    type Surface;
    /// Input event passed to [`ScreenModule::handle_event`]
    type Event;

    /// Mirror of the active screen name, updated on every activation.
    fn set_current_screen(&self, _name: &str) {}

    fn event_bus(&self) -> Option<Arc<EventBus>> {
        None
    }
}

/// A pluggable full-screen unit of the dashboard.
///
/// Only [`render`](ScreenModule::render) is required. Every registered module
/// is ticked each frame through [`update`](ScreenModule::update) whether it
/// is showing or not; `render` and `handle_event` only reach the active one.
pub trait ScreenModule<H: Host>: Send {
    /// Called once per registration, right after the module is bound.
    /// An error aborts the registration; `on_unload` still runs so anything
    /// set up before the failure can be released.
    fn on_load(&mut self, _cx: &ModuleContext<H>) -> crate::Result<()> {
        Ok(())
    }

    /// Called when the module is unregistered. Errors are logged; the
    /// binding is torn down regardless.
    fn on_unload(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// The module became the active screen.
    fn on_show(&mut self) {}

    /// The module stopped being the active screen.
    fn on_hide(&mut self) {}

    /// Advance internal state by `dt` seconds. Must not block.
    fn update(&mut self, _dt: f64) {}

    fn render(&mut self, surface: &mut H::Surface);

    fn handle_event(&mut self, _event: &H::Event) {}
}

/// Identity and back-references handed to a module when it is bound.
pub struct ModuleContext<H: Host> {
    name: String,
    app: Arc<H>,
    reporter: StateReporter,
}

impl<H: Host> Clone for ModuleContext<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            app: Arc::clone(&self.app),
            reporter: self.reporter.clone(),
        }
    }
}

impl<H: Host> ModuleContext<H> {
    pub(crate) fn new(name: &str, app: Arc<H>, reporter: StateReporter) -> Self {
        Self {
            name: name.to_string(),
            app,
            reporter,
        }
    }

    /// Name assigned by the manager at registration.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app(&self) -> &Arc<H> {
        &self.app
    }

    pub fn event_bus(&self) -> Option<Arc<EventBus>> {
        self.app.event_bus()
    }

    /// A cloneable reporter, usable from background threads.
    pub fn reporter(&self) -> StateReporter {
        self.reporter.clone()
    }

    /// Report `state`, or clear this module's state when `state` is `None`.
    pub fn report_state(&self, state: Option<&str>, report: StateReport) -> Result<(), ModuleError> {
        self.reporter.report_state(state, report)
    }
}
